//! Host [`Platform`]: memory from `/proc/meminfo`, restart as a flag.
//!
//! A host process cannot reset the chip, so a restart request is recorded
//! and the run loop polls [`HostPlatform::restart_requested`] to exit.
//! Clones share the record.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use super::{Platform, RestartKind};

#[derive(Debug, Default)]
struct Requests {
    restarts: Vec<RestartKind>,
}

/// Host-side [`Platform`].
#[derive(Debug, Clone, Default)]
pub struct HostPlatform {
    requests: Arc<Mutex<Requests>>,
    fixed_free_memory: Option<u64>,
}

impl HostPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `bytes` as free memory instead of probing the OS.
    pub fn with_free_memory(mut self, bytes: u64) -> Self {
        self.fixed_free_memory = Some(bytes);
        self
    }

    /// The first restart requested so far, if any.
    pub fn restart_requested(&self) -> Option<RestartKind> {
        self.lock().restarts.first().copied()
    }

    /// Every restart request, oldest first.
    pub fn restart_requests(&self) -> Vec<RestartKind> {
        self.lock().restarts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Requests> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Platform for HostPlatform {
    fn free_memory(&self) -> Option<u64> {
        self.fixed_free_memory.or_else(probe_available_memory)
    }

    fn request_restart(&mut self, kind: RestartKind) {
        info!("{} requested", kind.as_str());
        self.lock().restarts.push(kind);
    }
}

/// `MemAvailable` from `/proc/meminfo`, in bytes.
fn probe_available_memory() -> Option<u64> {
    let meminfo = match std::fs::read_to_string("/proc/meminfo") {
        Ok(text) => text,
        Err(e) => {
            debug!("free memory unavailable: {e}");
            return None;
        }
    };
    parse_mem_available(&meminfo)
}

fn parse_mem_available(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kib| kib.parse::<u64>().ok())
        .map(|kib| kib * 1024)
}

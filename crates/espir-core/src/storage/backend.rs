//! The byte-store abstraction behind catalog persistence.
//!
//! A [`ByteStore`] is a fixed-size, linear, byte-addressed region such as an
//! EEPROM emulation partition.  The catalog writes its whole encoded form at
//! offset 0 on every mutation and reads the whole region back at start-up.
//!
//! # Testability
//!
//! [`MemoryStore`] keeps the region in RAM behind an `Arc<Mutex<_>>`.  Cloning
//! it yields a second handle onto the same bytes, so a test can hand one handle
//! to the catalog and keep the other to inspect what was written or to inject a
//! write fault.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::limits::ERASED_BYTE;
use crate::storage::codec::StoreError;

/// A fixed-size non-volatile byte region.
pub trait ByteStore: Send {
    /// Size of the region in bytes.
    fn capacity(&self) -> usize;

    /// Reads the entire region.
    fn read(&self) -> Result<Vec<u8>, StoreError>;

    /// Writes `bytes` at offset 0 and makes them durable before returning.
    ///
    /// Bytes past `bytes.len()` are left as they were.
    fn write(&mut self, bytes: &[u8]) -> Result<(), StoreError>;

    /// Resets every byte of the region to the erased value (`0xFF`).
    fn erase(&mut self) -> Result<(), StoreError>;
}

/// Checks a pending write against the region size.
pub fn check_fits(bytes: &[u8], capacity: usize) -> Result<(), StoreError> {
    if bytes.len() > capacity {
        Err(StoreError::StorageFull {
            needed: bytes.len(),
            capacity,
        })
    } else {
        Ok(())
    }
}

// ── In-memory store ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct MemoryRegion {
    bytes: Vec<u8>,
    fail_writes: bool,
    write_count: u32,
}

/// RAM-backed [`ByteStore`] with write-fault injection.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    region: Arc<Mutex<MemoryRegion>>,
}

impl MemoryStore {
    /// Creates an erased region of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self::from_bytes(vec![ERASED_BYTE; capacity])
    }

    /// Creates a region holding exactly `bytes`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            region: Arc::new(Mutex::new(MemoryRegion {
                bytes,
                fail_writes: false,
                write_count: 0,
            })),
        }
    }

    /// Makes every subsequent `write` and `erase` fail while `fail` is set.
    pub fn set_write_fault(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Returns a copy of the current region contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }

    /// Number of successful writes and erases so far.
    pub fn write_count(&self) -> u32 {
        self.lock().write_count
    }

    fn lock(&self) -> MutexGuard<'_, MemoryRegion> {
        // A panic while holding the lock cannot leave the byte vector in a
        // torn state, so a poisoned lock is still safe to reuse.
        self.region.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ByteStore for MemoryStore {
    fn capacity(&self) -> usize {
        self.lock().bytes.len()
    }

    fn read(&self) -> Result<Vec<u8>, StoreError> {
        Ok(self.snapshot())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        let mut region = self.lock();
        if region.fail_writes {
            return Err(StoreError::Backend("injected write fault".to_string()));
        }
        check_fits(bytes, region.bytes.len())?;
        region.bytes[..bytes.len()].copy_from_slice(bytes);
        region.write_count += 1;
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        let mut region = self.lock();
        if region.fail_writes {
            return Err(StoreError::Backend("injected erase fault".to_string()));
        }
        region.bytes.fill(ERASED_BYTE);
        region.write_count += 1;
        Ok(())
    }
}

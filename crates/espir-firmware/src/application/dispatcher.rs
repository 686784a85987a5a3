//! CommandDispatcher: turns request text into catalog and hardware actions.
//!
//! Every inbound request goes through the same pipeline:
//!
//! 1. [`parse_request`] checks the envelope (`INVALID_JSON`,
//!    `MISSING_COMMAND`, `UNKNOWN_COMMAND`).
//! 2. The handler for the command kind checks its own parameters.  A missing
//!    key fails with `MISSING_PARAMETERS` before the catalog or hardware is
//!    touched.
//! 3. The handler acts and builds a typed [`Response`], stamped with the
//!    injected [`Clock`].
//! 4. The response is handed to the transport; if no peer is attached it is
//!    dropped.
//!
//! LEARN and RESET finish later.  LEARN is acknowledged at once and its
//! terminal response is sent from [`CommandDispatcher::update`] when the
//! [`LearnSession`] closes.  RESET is acknowledged at once and the restart is
//! requested from `update` once the restart delay has passed.
//!
//! # Architecture
//!
//! The dispatcher depends only on the facade traits and on the catalog it
//! owns.  The composition root injects every collaborator at construction
//! time, so unit tests can drive it with simulated hardware, a manual clock,
//! and an in-memory transport.

use espir_core::domain::limits::{
    DEFAULT_LEARN_TIMEOUT_MS, MAX_COMMANDS, MAX_LEARN_TIMEOUT_MS, RESTART_DELAY_MS,
};
use espir_core::protocol::messages::{
    CommandListData, DeviceListData, ExportData, ImportData, LearnStartedData, LearnTimeoutData,
    LearnUnsavedData, LearnedData, ResetData, SystemStatus, TargetData,
};
use espir_core::{
    parse_request, Catalog, CatalogError, CatalogErrorKind, CatalogSnapshot, CommandEntry,
    CommandKind, DeviceProfile, ErrorCode, IrCode, IrCodeJson, Parameters, Request, RequestError,
    Response, ResponseData, ResponseStatus,
};
use tracing::{debug, info, warn};

use super::learn_session::{LearnOutcome, LearnSession, LearnTarget};
use crate::infrastructure::hardware::{HardwareError, HardwareFacade};
use crate::infrastructure::platform::{Clock, Platform, RestartKind};
use crate::infrastructure::storage::config::FirmwareConfig;
use crate::infrastructure::transport::TransportFacade;

/// Version string reported by GET_STATUS.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

type HandlerResult = Result<Response, RequestError>;

/// Tunables taken from the `[learning]` and `[firmware]` config sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherSettings {
    pub default_learn_timeout_ms: u64,
    pub max_learn_timeout_ms: u64,
    pub restart_delay_ms: u64,
    pub firmware_version: String,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            default_learn_timeout_ms: DEFAULT_LEARN_TIMEOUT_MS,
            max_learn_timeout_ms: MAX_LEARN_TIMEOUT_MS,
            restart_delay_ms: RESTART_DELAY_MS,
            firmware_version: FIRMWARE_VERSION.to_string(),
        }
    }
}

impl From<&FirmwareConfig> for DispatcherSettings {
    fn from(config: &FirmwareConfig) -> Self {
        Self {
            default_learn_timeout_ms: config.learning.default_timeout_ms,
            max_learn_timeout_ms: config.learning.max_timeout_ms,
            restart_delay_ms: config.firmware.restart_delay_ms,
            ..Self::default()
        }
    }
}

/// Routes requests to the catalog and the hardware facade.
pub struct CommandDispatcher {
    catalog: Catalog,
    hardware: Box<dyn HardwareFacade>,
    clock: Box<dyn Clock>,
    platform: Box<dyn Platform>,
    settings: DispatcherSettings,
    learn: LearnSession,
    /// Restart time and kind, set by RESET.
    pending_restart: Option<(u64, RestartKind)>,
}

impl CommandDispatcher {
    pub fn new(
        catalog: Catalog,
        hardware: Box<dyn HardwareFacade>,
        clock: Box<dyn Clock>,
        platform: Box<dyn Platform>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            catalog,
            hardware,
            clock,
            platform,
            settings,
            learn: LearnSession::new(),
            pending_restart: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// `true` when no LEARN is in flight and no restart is pending.
    pub fn is_idle(&self) -> bool {
        !self.learn.is_active() && self.pending_restart.is_none()
    }

    pub fn restart_pending(&self) -> bool {
        self.pending_restart.is_some()
    }

    /// Handles one request and returns its immediate response.
    ///
    /// `transport` is only read, for the GET_STATUS snapshot.
    pub fn handle(&mut self, text: &str, transport: &dyn TransportFacade) -> Response {
        let response = match parse_request(text) {
            Ok(request) => {
                let kind = request.kind;
                debug!("dispatching {kind}");
                let response = self.dispatch(request, transport).unwrap_or_else(Response::from);
                match response.error_code() {
                    Some(code) => warn!("{kind} failed: {code:?}"),
                    None => info!("{kind} -> {:?}", response.status),
                }
                response
            }
            Err(err) => {
                warn!("rejected request: {:?} {}", err.code, err.details);
                Response::from(err)
            }
        };
        response.stamped(self.clock.now_ms())
    }

    /// Handles one request and delivers the response over `transport`.
    pub fn process(&mut self, text: &str, transport: &mut dyn TransportFacade) {
        let response = self.handle(text, &*transport);
        deliver(transport, &response);
    }

    /// Per-tick housekeeping: hardware update, learn state machine step,
    /// and the pending restart.
    pub fn update(&mut self, transport: &mut dyn TransportFacade) {
        self.hardware.update();
        let now = self.clock.now_ms();

        if let Some(outcome) = self.learn.poll(now, self.hardware.as_mut()) {
            let response = self.finish_learn(outcome).stamped(now);
            deliver(transport, &response);
        }

        if let Some((at_ms, kind)) = self.pending_restart {
            if now >= at_ms {
                self.pending_restart = None;
                self.platform.request_restart(kind);
            }
        }
    }

    fn dispatch(&mut self, request: Request, transport: &dyn TransportFacade) -> HandlerResult {
        let params = &request.parameters;
        match request.kind {
            CommandKind::Learn => self.start_learn(params),
            CommandKind::Transmit => self.transmit(params),
            CommandKind::ListDevices => Ok(self.list_devices()),
            CommandKind::AddDevice => self.add_device(params),
            CommandKind::DeleteDevice => self.delete_device(params),
            CommandKind::GetStatus => Ok(self.status(transport)),
            CommandKind::Reset => self.reset(params),
            CommandKind::ListCommands => self.list_commands(params),
            CommandKind::AddCommand => self.add_command(params),
            CommandKind::DeleteCommand => self.delete_command(params),
            CommandKind::Export => Ok(self.export()),
            CommandKind::Import => self.import(params),
        }
    }

    // ── LEARN ─────────────────────────────────────────────────────────────────

    fn start_learn(&mut self, params: &Parameters) -> HandlerResult {
        let target = if params.contains("device") || params.contains("command") {
            params.require(&["device", "command"])?;
            Some(LearnTarget {
                device: params.required_str("device")?.to_string(),
                command: params.required_str("command")?.to_string(),
                description: params
                    .optional_str("description")?
                    .unwrap_or_default()
                    .to_string(),
            })
        } else {
            None
        };

        let max = self.settings.max_learn_timeout_ms;
        let timeout_ms = match params.optional_u64("timeout")? {
            None => self.settings.default_learn_timeout_ms,
            Some(t) if (1..=max).contains(&t) => t,
            Some(t) => {
                return Err(RequestError::invalid(format!(
                    "timeout must be in 1..={max} ms, got {t}"
                )))
            }
        };

        if self.learn.is_active() {
            return Err(RequestError::new(
                ErrorCode::HardwareUnavailable,
                "IR learning already in progress",
            ));
        }

        // The receiver is only claimed if the capture could be saved.
        if let Some(target) = &target {
            let Some(device) = self.catalog.get_device(&target.device) else {
                return Err(catalog_failure(&CatalogError::DeviceNotFound(
                    target.device.clone(),
                )));
            };
            if device.command(&target.command).is_some() {
                return Err(catalog_failure(&CatalogError::CommandExists {
                    device: target.device.clone(),
                    command: target.command.clone(),
                }));
            }
            if device.commands.len() >= MAX_COMMANDS {
                return Err(catalog_failure(&CatalogError::TooManyCommands {
                    device: target.device.clone(),
                    max: MAX_COMMANDS,
                }));
            }
        }

        self.hardware.start_learning().map_err(hardware_failure)?;
        self.learn.begin(self.clock.now_ms(), timeout_ms, target);

        Ok(
            Response::ok("IR learning started").with_data(ResponseData::LearnStarted(
                LearnStartedData {
                    timeout: timeout_ms,
                    status: "learning",
                },
            )),
        )
    }

    fn finish_learn(&mut self, outcome: LearnOutcome) -> Response {
        match outcome {
            LearnOutcome::Learned { code, target: None } => Response::ok(
                "IR code learned successfully",
            )
            .with_data(ResponseData::Learned(LearnedData {
                code: code.to_transport(),
                device: None,
                command: None,
                saved: None,
            })),
            LearnOutcome::Learned {
                code,
                target: Some(target),
            } => {
                let transport_form = code.to_transport();
                let entry = CommandEntry::new(target.command.clone(), target.description, code);
                match self.catalog.add_command(&target.device, entry) {
                    Ok(()) => Response::ok("IR code learned and saved").with_data(
                        ResponseData::Learned(LearnedData {
                            code: transport_form,
                            device: Some(target.device),
                            command: Some(target.command),
                            saved: Some(true),
                        }),
                    ),
                    Err(err) => {
                        warn!("learned code for {}/{} not saved: {err}", target.device, target.command);
                        let failure = catalog_failure(&err);
                        Response::new(failure.status, "IR code learned but not saved").with_data(
                            ResponseData::LearnUnsaved(LearnUnsavedData {
                                error: failure.code,
                                details: failure.details,
                                code: transport_form,
                                device: target.device,
                                command: target.command,
                                saved: false,
                            }),
                        )
                    }
                }
            }
            LearnOutcome::TimedOut { timeout_ms, .. } => Response::new(
                ResponseStatus::Timeout,
                "Learning timeout - no IR signal received",
            )
            .with_data(ResponseData::LearnTimeout(LearnTimeoutData {
                error: ErrorCode::Timeout,
                timeout: timeout_ms,
            })),
        }
    }

    // ── TRANSMIT ──────────────────────────────────────────────────────────────

    fn transmit(&mut self, params: &Parameters) -> HandlerResult {
        params.require(&["device", "command"])?;
        let device = params.required_str("device")?;
        let command = params.required_str("command")?;

        let Some(entry) = self.catalog.get_command(device, command) else {
            let miss = if self.catalog.device_exists(device) {
                CatalogError::CommandNotFound {
                    device: device.to_string(),
                    command: command.to_string(),
                }
            } else {
                CatalogError::DeviceNotFound(device.to_string())
            };
            return Err(RequestError {
                status: ResponseStatus::NotFound,
                code: ErrorCode::NotFound,
                details: miss.to_string(),
            });
        };
        let code = entry.code.clone();

        self.hardware.transmit(&code).map_err(hardware_failure)?;
        Ok(Response::ok("IR code transmitted successfully")
            .with_data(ResponseData::Target(TargetData::command(device, command))))
    }

    // ── Devices ───────────────────────────────────────────────────────────────

    fn list_devices(&self) -> Response {
        let devices = self.catalog.list_devices();
        let count = devices.len();
        Response::ok("Devices retrieved successfully")
            .with_data(ResponseData::Devices(DeviceListData { devices, count }))
    }

    fn add_device(&mut self, params: &Parameters) -> HandlerResult {
        params.require(&["name", "type"])?;
        let name = params.required_str("name")?;
        let device_type = params.required_str("type")?;
        let manufacturer = params.optional_str("manufacturer")?.unwrap_or_default();
        let model = params.optional_str("model")?.unwrap_or_default();

        let profile = DeviceProfile::new(name, device_type)
            .with_manufacturer(manufacturer)
            .with_model(model);
        self.catalog
            .add_device(profile)
            .map_err(|e| catalog_failure(&e))?;

        Ok(
            Response::ok("Device added successfully").with_data(ResponseData::Target(TargetData {
                device: name.to_string(),
                device_type: Some(device_type.to_string()),
                command: None,
            })),
        )
    }

    fn delete_device(&mut self, params: &Parameters) -> HandlerResult {
        let name = params.required_str("name")?;
        self.catalog
            .remove_device(name)
            .map_err(|e| catalog_failure(&e))?;
        Ok(Response::ok("Device deleted successfully")
            .with_data(ResponseData::Target(TargetData::device(name))))
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    fn list_commands(&self, params: &Parameters) -> HandlerResult {
        let device = params.required_str("device")?;
        let commands = self
            .catalog
            .list_commands(device)
            .map_err(|e| catalog_failure(&e))?;
        let count = commands.len();
        Ok(
            Response::ok("Commands retrieved successfully").with_data(ResponseData::Commands(
                CommandListData {
                    device: device.to_string(),
                    commands,
                    count,
                },
            )),
        )
    }

    fn add_command(&mut self, params: &Parameters) -> HandlerResult {
        params.require(&["device", "command", "code"])?;
        let device = params.required_str("device")?;
        let command = params.required_str("command")?;
        let description = params.optional_str("description")?.unwrap_or_default();
        let json: IrCodeJson = params.required("code")?;
        let code = IrCode::from_transport(&json)
            .map_err(|e| RequestError::invalid(format!("parameter \"code\": {e}")))?;

        self.catalog
            .add_command(device, CommandEntry::new(command, description, code))
            .map_err(|e| catalog_failure(&e))?;
        Ok(Response::ok("Command added successfully")
            .with_data(ResponseData::Target(TargetData::command(device, command))))
    }

    fn delete_command(&mut self, params: &Parameters) -> HandlerResult {
        params.require(&["device", "command"])?;
        let device = params.required_str("device")?;
        let command = params.required_str("command")?;
        self.catalog
            .remove_command(device, command)
            .map_err(|e| catalog_failure(&e))?;
        Ok(Response::ok("Command deleted successfully")
            .with_data(ResponseData::Target(TargetData::command(device, command))))
    }

    // ── Backup ────────────────────────────────────────────────────────────────

    fn export(&self) -> Response {
        Response::ok("Catalog exported successfully").with_data(ResponseData::Export(ExportData {
            exported: self.clock.now_ms(),
            snapshot: self.catalog.export_all(),
        }))
    }

    fn import(&mut self, params: &Parameters) -> HandlerResult {
        params.require(&["devices"])?;
        let snapshot: CatalogSnapshot = params.as_object()?;
        let devices = self
            .catalog
            .import_all(&snapshot)
            .map_err(|e| catalog_failure(&e))?;
        Ok(Response::ok("Catalog imported successfully")
            .with_data(ResponseData::Imported(ImportData { devices })))
    }

    // ── Status and reset ──────────────────────────────────────────────────────

    fn status(&self, transport: &dyn TransportFacade) -> Response {
        let devices = self.catalog.status();
        let store_error = devices.corrupt_on_load.then_some(ErrorCode::CorruptStore);
        let status = SystemStatus {
            ir: self.hardware.status(),
            transport: transport.status(),
            devices,
            firmware: self.settings.firmware_version.clone(),
            uptime: self.clock.now_ms(),
            free_heap: self.platform.free_memory(),
            store_error,
        };
        Response::ok("Status retrieved successfully")
            .with_data(ResponseData::Status(Box::new(status)))
    }

    fn reset(&mut self, params: &Parameters) -> HandlerResult {
        let kind = match params.optional_str("type")? {
            Some("factory") => RestartKind::Factory,
            _ => RestartKind::Plain,
        };

        if kind == RestartKind::Factory {
            self.catalog.reset().map_err(|e| {
                RequestError::new(ErrorCode::StorageFull, format!("factory reset failed: {e}"))
            })?;
        }

        let delay = self.settings.restart_delay_ms;
        let now = self.clock.now_ms();
        // A second RESET keeps the first deadline; a factory reset wins the kind.
        self.pending_restart = Some(match self.pending_restart {
            Some((at_ms, RestartKind::Plain)) => (at_ms, kind),
            Some(pending) => pending,
            None => (now.saturating_add(delay), kind),
        });
        info!("{} scheduled in {delay} ms", kind.as_str());

        let message = match kind {
            RestartKind::Factory => "Factory reset completed",
            RestartKind::Plain => "System restart initiated",
        };
        Ok(Response::ok(message).with_data(ResponseData::Reset(ResetData {
            kind: kind.as_str().to_string(),
            restart_in_ms: delay,
        })))
    }
}

fn deliver(transport: &mut dyn TransportFacade, response: &Response) {
    if !transport.send_response(&response.to_json()) {
        warn!("no peer attached; dropped {:?} response", response.status);
    }
}

fn catalog_failure(err: &CatalogError) -> RequestError {
    let code = match err {
        // The field passes the name rules but cannot be stored in a record.
        CatalogError::FieldTooLong { .. } => ErrorCode::StorageFull,
        _ => match err.kind() {
            CatalogErrorKind::NotFound => ErrorCode::NotFound,
            CatalogErrorKind::AlreadyExists => ErrorCode::AlreadyExists,
            CatalogErrorKind::CapacityExceeded => ErrorCode::CapacityExceeded,
            CatalogErrorKind::Persistence => ErrorCode::StorageFull,
            CatalogErrorKind::InvalidField => return RequestError::invalid(err.to_string()),
        },
    };
    RequestError::new(code, err.to_string())
}

fn hardware_failure(err: HardwareError) -> RequestError {
    RequestError::new(ErrorCode::HardwareUnavailable, err.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::hardware::simulated::SimulatedHardware;
    use crate::infrastructure::hardware::MockHardwareFacade;
    use crate::infrastructure::platform::{HostPlatform, ManualClock};
    use crate::infrastructure::transport::memory::MemoryTransport;
    use espir_core::{IrProtocol, MemoryStore};
    use serde_json::{json, Value};

    struct Harness {
        dispatcher: CommandDispatcher,
        hardware: SimulatedHardware,
        clock: ManualClock,
        platform: HostPlatform,
        transport: MemoryTransport,
        store: MemoryStore,
    }

    fn harness() -> Harness {
        let store = MemoryStore::new(4096);
        let mut catalog = Catalog::new(Box::new(store.clone()));
        catalog.load();
        let hardware = SimulatedHardware::new();
        let clock = ManualClock::new();
        let platform = HostPlatform::new().with_free_memory(1024);
        let dispatcher = CommandDispatcher::new(
            catalog,
            Box::new(hardware.clone()),
            Box::new(clock.clone()),
            Box::new(platform.clone()),
            DispatcherSettings::default(),
        );
        Harness {
            dispatcher,
            hardware,
            clock,
            platform,
            transport: MemoryTransport::new(),
            store,
        }
    }

    impl Harness {
        fn send(&mut self, request: Value) -> Value {
            let response = self
                .dispatcher
                .handle(&request.to_string(), &self.transport);
            serde_json::from_str(&response.to_json()).expect("response is JSON")
        }

        fn tick(&mut self) -> Vec<Value> {
            self.dispatcher.update(&mut self.transport);
            self.transport
                .take_responses()
                .iter()
                .map(|r| serde_json::from_str(r).expect("response is JSON"))
                .collect()
        }
    }

    fn add_tv(h: &mut Harness) {
        let r = h.send(json!({"command": "ADD_DEVICE", "parameters": {"name": "TV", "type": "tv"}}));
        assert_eq!(r["status"], "OK");
    }

    fn nec_json() -> Value {
        json!({"protocol": "NEC", "value": "20df10ef", "bits": 32})
    }

    // ── Envelope ──────────────────────────────────────────────────────────────

    #[test]
    fn test_malformed_json_is_invalid_json() {
        let mut h = harness();
        let response = h.dispatcher.handle("{not json", &h.transport);
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.error_code(), Some(ErrorCode::InvalidJson));
    }

    #[test]
    fn test_unknown_command_names_offender() {
        let mut h = harness();
        let r = h.send(json!({"command": "SELF_DESTRUCT"}));
        assert_eq!(r["data"]["error"], "UNKNOWN_COMMAND");
        assert!(r["data"]["details"]
            .as_str()
            .unwrap()
            .contains("SELF_DESTRUCT"));
    }

    #[test]
    fn test_response_carries_clock_timestamp() {
        let mut h = harness();
        h.clock.set(4242);
        let r = h.send(json!({"command": "LIST_DEVICES"}));
        assert_eq!(r["timestamp"], 4242);
    }

    // ── Devices ───────────────────────────────────────────────────────────────

    #[test]
    fn test_add_device_then_duplicate_then_list() {
        // Arrange
        let mut h = harness();
        let add = json!({"command": "ADD_DEVICE", "parameters": {"name": "TV1", "type": "television"}});

        // Act
        let first = h.send(add.clone());
        let second = h.send(add);
        let list = h.send(json!({"command": "LIST_DEVICES", "parameters": {}}));

        // Assert
        assert_eq!(first["status"], "OK");
        assert_eq!(first["message"], "Device added successfully");
        assert_eq!(second["status"], "ERROR");
        assert_eq!(second["data"]["error"], "ALREADY_EXISTS");
        assert_eq!(list["data"]["count"], 1);
        assert_eq!(list["data"]["devices"][0]["name"], "TV1");
        assert_eq!(list["data"]["devices"][0]["commandCount"], 0);
    }

    #[test]
    fn test_add_device_missing_type_lists_missing_key() {
        let mut h = harness();
        let r = h.send(json!({"command": "ADD_DEVICE", "parameters": {"name": "TV"}}));
        assert_eq!(r["data"]["error"], "MISSING_PARAMETERS");
        assert_eq!(r["data"]["details"], "Missing required parameters: type");
        assert!(h.dispatcher.catalog().is_empty());
        assert_eq!(h.store.write_count(), 0);
    }

    #[test]
    fn test_add_device_with_overlong_name_is_invalid() {
        let mut h = harness();
        let name = "N".repeat(33);
        let r = h.send(json!({"command": "ADD_DEVICE", "parameters": {"name": name, "type": "tv"}}));
        assert_eq!(r["status"], "INVALID");
        assert_eq!(r["data"]["error"], "INVALID_PARAMETER");
    }

    #[test]
    fn test_add_device_with_unstorable_model_is_storage_full() {
        let mut h = harness();
        let model = "m".repeat(300);
        let r = h.send(json!({"command": "ADD_DEVICE",
            "parameters": {"name": "TV", "type": "tv", "model": model}}));
        assert_eq!(r["status"], "ERROR");
        assert_eq!(r["data"]["error"], "STORAGE_FULL");
        assert!(h.dispatcher.catalog().is_empty());
    }

    #[test]
    fn test_delete_unknown_device_is_not_found_error() {
        let mut h = harness();
        let r = h.send(json!({"command": "DELETE_DEVICE", "parameters": {"name": "Ghost"}}));
        assert_eq!(r["status"], "ERROR");
        assert_eq!(r["data"]["error"], "NOT_FOUND");
    }

    #[test]
    fn test_write_fault_reports_storage_full_and_keeps_catalog() {
        let mut h = harness();
        h.store.set_write_fault(true);
        let r = h.send(json!({"command": "ADD_DEVICE", "parameters": {"name": "TV", "type": "tv"}}));
        assert_eq!(r["data"]["error"], "STORAGE_FULL");
        assert!(h.dispatcher.catalog().is_empty());
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    #[test]
    fn test_add_list_transmit_delete_command() {
        // Arrange
        let mut h = harness();
        add_tv(&mut h);

        // Act
        let added = h.send(json!({"command": "ADD_COMMAND", "parameters":
            {"device": "TV", "command": "Power", "description": "toggle", "code": nec_json()}}));
        let listed = h.send(json!({"command": "LIST_COMMANDS", "parameters": {"device": "TV"}}));
        let sent = h.send(json!({"command": "TRANSMIT", "parameters": {"device": "TV", "command": "Power"}}));
        let deleted = h.send(json!({"command": "DELETE_COMMAND", "parameters": {"device": "TV", "command": "Power"}}));

        // Assert
        assert_eq!(added["status"], "OK");
        assert_eq!(listed["data"]["count"], 1);
        assert_eq!(listed["data"]["commands"][0]["description"], "toggle");
        assert_eq!(sent["message"], "IR code transmitted successfully");
        assert_eq!(
            h.hardware.transmitted(),
            vec![IrCode::decoded(IrProtocol::Nec, 0x20DF_10EF, 32)]
        );
        assert_eq!(deleted["status"], "OK");
        assert!(!h.dispatcher.catalog().command_exists("TV", "Power"));
    }

    #[test]
    fn test_add_command_with_bad_code_is_invalid() {
        let mut h = harness();
        add_tv(&mut h);
        let r = h.send(json!({"command": "ADD_COMMAND", "parameters":
            {"device": "TV", "command": "Power", "code": {"protocol": "NEC", "value": "zz", "bits": 32}}}));
        assert_eq!(r["status"], "INVALID");
        assert!(!h.dispatcher.catalog().command_exists("TV", "Power"));
    }

    #[test]
    fn test_transmit_unknown_command_is_not_found_status() {
        let mut h = harness();
        add_tv(&mut h);
        let r = h.send(json!({"command": "TRANSMIT", "parameters": {"device": "TV", "command": "Power"}}));
        assert_eq!(r["status"], "NOT_FOUND");
        assert_eq!(r["data"]["error"], "NOT_FOUND");
        assert!(h.hardware.transmitted().is_empty());
    }

    #[test]
    fn test_transmit_hardware_fault_is_hardware_unavailable() {
        let mut h = harness();
        add_tv(&mut h);
        h.send(json!({"command": "ADD_COMMAND", "parameters":
            {"device": "TV", "command": "Power", "code": nec_json()}}));
        h.hardware.set_transmit_fault(true);

        let r = h.send(json!({"command": "TRANSMIT", "parameters": {"device": "TV", "command": "Power"}}));

        assert_eq!(r["status"], "ERROR");
        assert_eq!(r["data"]["error"], "HARDWARE_UNAVAILABLE");
    }

    #[test]
    fn test_missing_parameters_never_reach_hardware() {
        // Arrange: a mock with no expectations panics on any call
        let store = MemoryStore::new(1024);
        let catalog = Catalog::new(Box::new(store.clone()));
        let mut dispatcher = CommandDispatcher::new(
            catalog,
            Box::new(MockHardwareFacade::new()),
            Box::new(ManualClock::new()),
            Box::new(HostPlatform::new()),
            DispatcherSettings::default(),
        );
        let transport = MemoryTransport::new();

        // Act
        let transmit = dispatcher.handle(
            r#"{"command":"TRANSMIT","parameters":{"device":"TV"}}"#,
            &transport,
        );
        let learn = dispatcher.handle(
            r#"{"command":"LEARN","parameters":{"device":"TV"}}"#,
            &transport,
        );

        // Assert
        assert_eq!(transmit.error_code(), Some(ErrorCode::MissingParameters));
        assert_eq!(learn.error_code(), Some(ErrorCode::MissingParameters));
        assert_eq!(store.write_count(), 0);
    }

    // ── LEARN ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_learn_ack_then_code_on_capture() {
        // Arrange
        let mut h = harness();

        // Act
        let ack = h.send(json!({"command": "LEARN", "parameters": {"timeout": 5000}}));
        h.hardware
            .inject_signal(IrCode::decoded(IrProtocol::Sony, 0xA90, 12));
        h.clock.advance(50);
        let terminal = h.tick();

        // Assert
        assert_eq!(ack["message"], "IR learning started");
        assert_eq!(ack["data"], json!({"timeout": 5000, "status": "learning"}));
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0]["message"], "IR code learned successfully");
        assert_eq!(terminal[0]["data"]["protocol"], "SONY");
        assert_eq!(terminal[0]["data"]["value"], "a90");
        assert!(h.dispatcher.is_idle());
    }

    #[test]
    fn test_learn_with_target_saves_command() {
        let mut h = harness();
        add_tv(&mut h);

        h.send(json!({"command": "LEARN", "parameters": {"device": "TV", "command": "Mute"}}));
        h.hardware
            .inject_signal(IrCode::decoded(IrProtocol::Nec, 0x10, 32));
        let terminal = h.tick();

        assert_eq!(terminal[0]["message"], "IR code learned and saved");
        assert_eq!(terminal[0]["data"]["saved"], true);
        assert!(h.dispatcher.catalog().command_exists("TV", "Mute"));
    }

    #[test]
    fn test_learn_times_out_without_storing() {
        // Arrange
        let mut h = harness();
        add_tv(&mut h);
        h.send(json!({"command": "LEARN", "parameters": {"timeout": 100, "device": "TV", "command": "Power"}}));

        // Act
        h.clock.advance(99);
        let early = h.tick();
        h.clock.advance(1);
        let terminal = h.tick();

        // Assert
        assert!(early.is_empty());
        assert_eq!(terminal[0]["status"], "TIMEOUT");
        assert_eq!(terminal[0]["data"], json!({"error": "TIMEOUT", "timeout": 100}));
        assert!(!h.dispatcher.catalog().command_exists("TV", "Power"));
        assert!(!h.hardware.status().learning);
    }

    #[test]
    fn test_learn_into_full_device_is_refused_before_start() {
        // Arrange
        let mut h = harness();
        add_tv(&mut h);
        for i in 0..MAX_COMMANDS {
            let r = h.send(json!({"command": "ADD_COMMAND", "parameters":
                {"device": "TV", "command": format!("Cmd{i}"), "code": nec_json()}}));
            assert_eq!(r["status"], "OK");
        }

        // Act
        let r = h.send(json!({"command": "LEARN", "parameters": {"device": "TV", "command": "Mute"}}));

        // Assert
        assert_eq!(r["status"], "ERROR");
        assert_eq!(r["data"]["error"], "CAPACITY_EXCEEDED");
        assert!(!h.hardware.status().learning);
        assert!(h.dispatcher.is_idle());
    }

    #[test]
    fn test_learned_code_that_cannot_be_saved_is_returned() {
        // Arrange
        let mut h = harness();
        add_tv(&mut h);
        h.send(json!({"command": "LEARN", "parameters": {"device": "TV", "command": "Mute"}}));
        h.store.set_write_fault(true);

        // Act
        h.hardware
            .inject_signal(IrCode::decoded(IrProtocol::Nec, 0x10, 32));
        let terminal = h.tick();

        // Assert
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0]["status"], "ERROR");
        assert_eq!(terminal[0]["message"], "IR code learned but not saved");
        let data = &terminal[0]["data"];
        assert_eq!(data["error"], "STORAGE_FULL");
        assert_eq!(data["saved"], false);
        assert_eq!(data["code"]["protocol"], "NEC");
        assert_eq!(data["code"]["value"], "10");
        assert!(!h.dispatcher.catalog().command_exists("TV", "Mute"));
    }

    #[test]
    fn test_learn_out_of_range_timeout_is_invalid() {
        let mut h = harness();
        let zero = h.send(json!({"command": "LEARN", "parameters": {"timeout": 0}}));
        let huge = h.send(json!({"command": "LEARN", "parameters": {"timeout": 600000}}));
        assert_eq!(zero["status"], "INVALID");
        assert_eq!(huge["status"], "INVALID");
        assert!(!h.hardware.status().learning);
    }

    #[test]
    fn test_learn_while_learning_is_hardware_unavailable() {
        let mut h = harness();
        h.send(json!({"command": "LEARN"}));
        let second = h.send(json!({"command": "LEARN"}));
        assert_eq!(second["data"]["error"], "HARDWARE_UNAVAILABLE");
    }

    #[test]
    fn test_learn_into_unknown_device_is_refused_before_start() {
        let mut h = harness();
        let r = h.send(json!({"command": "LEARN", "parameters": {"device": "Ghost", "command": "Power"}}));
        assert_eq!(r["data"]["error"], "NOT_FOUND");
        assert!(!h.hardware.status().learning);
        assert!(h.dispatcher.is_idle());
    }

    #[test]
    fn test_learn_hardware_not_ready_is_hardware_unavailable() {
        let mut h = harness();
        h.hardware.set_ready(false);
        let r = h.send(json!({"command": "LEARN"}));
        assert_eq!(r["data"]["error"], "HARDWARE_UNAVAILABLE");
        assert!(h.dispatcher.is_idle());
    }

    #[test]
    fn test_learn_start_uses_configured_default_timeout() {
        // Arrange
        let mut hardware = MockHardwareFacade::new();
        hardware.expect_start_learning().times(1).returning(|| Ok(()));
        let settings = DispatcherSettings {
            default_learn_timeout_ms: 7_000,
            ..DispatcherSettings::default()
        };
        let mut dispatcher = CommandDispatcher::new(
            Catalog::new(Box::new(MemoryStore::new(64))),
            Box::new(hardware),
            Box::new(ManualClock::new()),
            Box::new(HostPlatform::new()),
            settings,
        );

        // Act
        let ack = dispatcher.handle(r#"{"command":"LEARN"}"#, &MemoryTransport::new());

        // Assert
        assert_eq!(
            ack.data,
            Some(ResponseData::LearnStarted(LearnStartedData {
                timeout: 7_000,
                status: "learning"
            }))
        );
    }

    // ── Status, backup, reset ────────────────────────────────────────────────

    #[test]
    fn test_status_aggregates_every_component() {
        let mut h = harness();
        add_tv(&mut h);
        h.clock.set(9_000);

        let r = h.send(json!({"command": "GET_STATUS"}));

        let data = &r["data"];
        assert_eq!(data["ir"], json!({"ready": true, "learning": false, "hasLearned": false}));
        assert_eq!(data["transport"]["connected"], true);
        assert_eq!(data["devices"]["deviceCount"], 1);
        assert_eq!(data["devices"]["maxDevices"], 50);
        assert_eq!(data["firmware"], FIRMWARE_VERSION);
        assert_eq!(data["uptime"], 9_000);
        assert_eq!(data["freeHeap"], 1024);
        assert!(data.get("storeError").is_none());
    }

    #[test]
    fn test_status_reports_corrupt_store_found_at_load() {
        // Arrange: valid magic, impossible device count
        let mut catalog = Catalog::new(Box::new(MemoryStore::from_bytes(vec![0xAA, 0x55, 0xFE, 0, 0, 0])));
        catalog.load();
        let mut dispatcher = CommandDispatcher::new(
            catalog,
            Box::new(SimulatedHardware::new()),
            Box::new(ManualClock::new()),
            Box::new(HostPlatform::new()),
            DispatcherSettings::default(),
        );

        // Act
        let r = dispatcher.handle(r#"{"command":"GET_STATUS"}"#, &MemoryTransport::new());

        // Assert
        let value: Value = serde_json::from_str(&r.to_json()).unwrap();
        assert_eq!(value["status"], "OK");
        assert_eq!(value["data"]["storeError"], "CORRUPT_STORE");
        assert_eq!(value["data"]["devices"]["loaded"], true);
        assert_eq!(value["data"]["devices"]["corruptOnLoad"], true);
    }

    #[test]
    fn test_export_then_import_restores_catalog() {
        // Arrange
        let mut h = harness();
        add_tv(&mut h);
        h.send(json!({"command": "ADD_COMMAND", "parameters":
            {"device": "TV", "command": "Power", "code": nec_json()}}));
        h.clock.set(4_200);
        let exported = h.send(json!({"command": "EXPORT"}));
        h.send(json!({"command": "DELETE_DEVICE", "parameters": {"name": "TV"}}));

        // Act
        let imported = h.send(json!({"command": "IMPORT", "parameters": exported["data"].clone()}));

        // Assert
        assert_eq!(exported["data"]["exported"], 4_200);
        assert_eq!(imported["data"]["devices"], 1);
        assert!(h.dispatcher.catalog().command_exists("TV", "Power"));
    }

    #[test]
    fn test_import_without_devices_is_missing_parameters() {
        let mut h = harness();
        let r = h.send(json!({"command": "IMPORT", "parameters": {"version": "1.0"}}));
        assert_eq!(r["data"]["error"], "MISSING_PARAMETERS");
    }

    #[test]
    fn test_factory_reset_wipes_catalog_and_restarts_once_after_delay() {
        // Arrange
        let mut h = harness();
        add_tv(&mut h);

        // Act
        let ack = h.send(json!({"command": "RESET", "parameters": {"type": "factory"}}));
        h.clock.advance(999);
        h.tick();
        let before = h.platform.restart_requests();
        h.clock.advance(1);
        h.tick();
        h.clock.advance(5_000);
        h.tick();

        // Assert
        assert_eq!(ack["message"], "Factory reset completed");
        assert_eq!(ack["data"], json!({"type": "factory", "restartInMs": 1000}));
        assert!(h.dispatcher.catalog().is_empty());
        assert!(before.is_empty());
        assert_eq!(h.platform.restart_requests(), vec![RestartKind::Factory]);
    }

    #[test]
    fn test_plain_reset_keeps_catalog() {
        let mut h = harness();
        add_tv(&mut h);

        let ack = h.send(json!({"command": "RESET"}));

        assert_eq!(ack["message"], "System restart initiated");
        assert_eq!(h.dispatcher.catalog().len(), 1);
        assert!(h.dispatcher.restart_pending());
    }

    #[test]
    fn test_factory_reset_erase_fault_schedules_no_restart() {
        let mut h = harness();
        add_tv(&mut h);
        h.store.set_write_fault(true);

        let r = h.send(json!({"command": "RESET", "parameters": {"type": "factory"}}));
        h.clock.advance(2_000);
        h.tick();

        assert_eq!(r["data"]["error"], "STORAGE_FULL");
        assert_eq!(h.dispatcher.catalog().len(), 1);
        assert!(h.platform.restart_requests().is_empty());
    }

    #[test]
    fn test_process_drops_response_without_peer() {
        let mut h = harness();
        h.transport.set_connected(false);

        h.dispatcher
            .process(r#"{"command":"LIST_DEVICES"}"#, &mut h.transport);

        assert_eq!(h.transport.dropped(), 1);
        assert!(h.transport.take_responses().is_empty());
    }
}

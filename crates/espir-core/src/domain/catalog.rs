//! The device/command catalog.
//!
//! The [`Catalog`] is the appliance's only database: an ordered list of named
//! devices ("Living Room TV"), each holding an ordered list of named IR
//! commands ("Power", "Volume Up").
//!
//! # Invariants (for beginners)
//!
//! After every public call returns, all of these hold:
//!
//! - No two devices share a name; no two commands of one device share a name.
//! - At most [`MAX_DEVICES`] devices, and at most [`MAX_COMMANDS`] commands
//!   per device.
//! - The in-memory list equals what the [`ByteStore`] would decode to.
//!
//! The last point is what makes the catalog safe across power loss.  Every
//! mutation builds the *next* device list on the side, encodes it, writes it,
//! and only swaps it in once the write succeeded.  If encoding or writing
//! fails, the previous list is still in place and the caller gets an error.
//!
//! # Ownership
//!
//! The catalog owns every [`DeviceProfile`] and [`CommandEntry`].  Lookups
//! return short-lived borrows; listings return owned summary snapshots.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::ir_code::{IrCode, IrCodeJson};
use crate::domain::limits::{MAX_COMMANDS, MAX_DEVICES, MAX_FIELD_LEN, MAX_NAME_LEN};
use crate::storage::backend::ByteStore;
use crate::storage::codec::{decode_catalog, encode_catalog, is_blank, StoreError};

/// Version string written into export snapshots.
pub const SNAPSHOT_VERSION: &str = "1.0";

// ── Error type ────────────────────────────────────────────────────────────────

/// Broad category of a [`CatalogError`], used by the protocol layer to pick a
/// response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    NotFound,
    AlreadyExists,
    CapacityExceeded,
    InvalidField,
    Persistence,
}

/// Errors returned by catalog operations.
///
/// A failed operation never changes the catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("command {command:?} not found on device {device:?}")]
    CommandNotFound { device: String, command: String },

    #[error("device already exists: {0}")]
    DeviceExists(String),

    #[error("command {command:?} already exists on device {device:?}")]
    CommandExists { device: String, command: String },

    #[error("catalog already holds the maximum of {max} devices")]
    TooManyDevices { max: usize },

    #[error("device {device:?} already holds the maximum of {max} commands")]
    TooManyCommands { device: String, max: usize },

    /// The mutation would not fit in the backing store.
    #[error("catalog needs {needed} bytes but the store holds {capacity}")]
    StorageExhausted { needed: usize, capacity: usize },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A text field is longer than the record format can store.
    #[error("{field} is {len} bytes, the store holds at most {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// The backing store failed; the in-memory catalog was left unchanged.
    #[error("catalog persistence failed: {0}")]
    Persistence(StoreError),
}

impl CatalogError {
    /// Returns the broad category of this error.
    pub fn kind(&self) -> CatalogErrorKind {
        match self {
            CatalogError::DeviceNotFound(_) | CatalogError::CommandNotFound { .. } => {
                CatalogErrorKind::NotFound
            }
            CatalogError::DeviceExists(_) | CatalogError::CommandExists { .. } => {
                CatalogErrorKind::AlreadyExists
            }
            CatalogError::TooManyDevices { .. }
            | CatalogError::TooManyCommands { .. }
            | CatalogError::StorageExhausted { .. } => CatalogErrorKind::CapacityExceeded,
            CatalogError::InvalidField { .. } | CatalogError::FieldTooLong { .. } => {
                CatalogErrorKind::InvalidField
            }
            CatalogError::Persistence(_) => CatalogErrorKind::Persistence,
        }
    }

    /// Maps an encode-time refusal onto the catalog's taxonomy.
    fn from_encode(err: StoreError) -> Self {
        match err {
            StoreError::StorageFull { needed, capacity } => {
                CatalogError::StorageExhausted { needed, capacity }
            }
            StoreError::FieldTooLong { field, len, max } => {
                CatalogError::FieldTooLong { field, len, max }
            }
            other => CatalogError::Persistence(other),
        }
    }
}

// ── Entities ──────────────────────────────────────────────────────────────────

/// A named IR command belonging to one device.
///
/// Never mutated in place: replacing a command is remove + add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub name: String,
    pub description: String,
    pub code: IrCode,
}

impl CommandEntry {
    pub fn new(name: impl Into<String>, description: impl Into<String>, code: IrCode) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            code,
        }
    }
}

/// A remote-controllable device and its commands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceProfile {
    /// Unique key within the catalog.
    pub name: String,
    pub device_type: String,
    pub manufacturer: String,
    pub model: String,
    /// Insertion-ordered, at most [`MAX_COMMANDS`].
    pub commands: Vec<CommandEntry>,
}

impl DeviceProfile {
    /// Creates a device with empty manufacturer/model and no commands.
    pub fn new(name: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            ..Self::default()
        }
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Looks up a command by exact (case-sensitive) name.
    pub fn command(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.iter().find(|c| c.name == name)
    }

    fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            name: self.name.clone(),
            device_type: self.device_type.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            command_count: self.commands.len(),
        }
    }
}

// ── Snapshots ─────────────────────────────────────────────────────────────────

/// Listing entry for one device.  Never exposes IR code internals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub manufacturer: String,
    pub model: String,
    pub command_count: usize,
}

/// Listing entry for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSummary {
    pub name: String,
    pub description: String,
}

/// Complete backup of the catalog, every IR code field included.
///
/// ```json
/// {"version":"1.0","devices":[{"name":"TV","type":"tv","manufacturer":"","model":"",
///   "commands":[{"name":"Power","description":"","code":{"protocol":"NEC","value":"20df10ef","bits":32,"description":""}}]}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default = "default_snapshot_version")]
    pub version: String,
    #[serde(default)]
    pub devices: Vec<DeviceSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub commands: Vec<CommandSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSnapshot {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub code: IrCodeJson,
}

fn default_snapshot_version() -> String {
    SNAPSHOT_VERSION.to_string()
}

/// Catalog section of the GET_STATUS report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatus {
    pub loaded: bool,
    pub device_count: usize,
    pub max_devices: usize,
    pub store_size: usize,
    pub store_used: usize,
    /// The last load found unreadable or corrupt data and discarded it.
    pub corrupt_on_load: bool,
}

/// Result of [`Catalog::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The store held a valid catalog.
    Restored { devices: usize },
    /// The store was blank or unreadable; the catalog starts empty.
    Empty { reason: String },
}

// ── Catalog ───────────────────────────────────────────────────────────────────

/// The persistent device/command catalog.
pub struct Catalog {
    devices: Vec<DeviceProfile>,
    loaded: bool,
    corrupt_on_load: bool,
    store: Box<dyn ByteStore>,
    used_bytes: usize,
}

impl Catalog {
    /// Creates an empty, not-yet-loaded catalog backed by `store`.
    pub fn new(store: Box<dyn ByteStore>) -> Self {
        Self {
            devices: Vec::new(),
            loaded: false,
            corrupt_on_load: false,
            store,
            used_bytes: 0,
        }
    }

    /// Restores the catalog from the store.  Called once at start-up.
    ///
    /// A blank, corrupt, or unreadable store yields an empty catalog; either
    /// way `loaded` becomes `true` because an empty catalog is a valid state.
    pub fn load(&mut self) -> LoadOutcome {
        self.corrupt_on_load = false;
        let outcome = match self.store.read() {
            Err(e) => {
                warn!("catalog store unreadable, starting empty: {e}");
                self.corrupt_on_load = true;
                self.devices.clear();
                self.used_bytes = 0;
                LoadOutcome::Empty {
                    reason: e.to_string(),
                }
            }
            Ok(region) => match decode_catalog(&region) {
                Ok((devices, used)) => {
                    info!("catalog restored: {} devices, {used} bytes", devices.len());
                    self.devices = devices;
                    self.used_bytes = used;
                    LoadOutcome::Restored {
                        devices: self.devices.len(),
                    }
                }
                Err(e) => {
                    if is_blank(&region) {
                        info!("no catalog in store, starting empty");
                    } else {
                        warn!("catalog store rejected, starting empty: {e}");
                        self.corrupt_on_load = true;
                    }
                    self.devices.clear();
                    self.used_bytes = 0;
                    LoadOutcome::Empty {
                        reason: e.to_string(),
                    }
                }
            },
        };
        self.loaded = true;
        outcome
    }

    /// `true` once [`Catalog::load`] has run.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// All devices in insertion order.
    pub fn devices(&self) -> &[DeviceProfile] {
        &self.devices
    }

    // ── Devices ───────────────────────────────────────────────────────────────

    /// Appends a new device with zero commands and persists.
    ///
    /// Any commands on `profile` are discarded; attach them with
    /// [`Catalog::add_command`].
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidField`], [`CatalogError::DeviceExists`],
    /// [`CatalogError::TooManyDevices`], [`CatalogError::StorageExhausted`],
    /// or [`CatalogError::Persistence`].
    pub fn add_device(&mut self, profile: DeviceProfile) -> Result<(), CatalogError> {
        validate_metadata(&profile)?;
        if self.device_exists(&profile.name) {
            return Err(CatalogError::DeviceExists(profile.name));
        }
        if self.devices.len() >= MAX_DEVICES {
            return Err(CatalogError::TooManyDevices { max: MAX_DEVICES });
        }

        let name = profile.name.clone();
        let mut next = self.devices.clone();
        next.push(DeviceProfile {
            commands: Vec::new(),
            ..profile
        });
        self.commit(next)?;
        info!("added device {name:?}");
        Ok(())
    }

    /// Removes a device and all its commands, preserving the order of the rest.
    ///
    /// # Errors
    ///
    /// [`CatalogError::DeviceNotFound`] or [`CatalogError::Persistence`].
    pub fn remove_device(&mut self, name: &str) -> Result<(), CatalogError> {
        let index = self.device_index(name)?;
        let mut next = self.devices.clone();
        next.remove(index);
        self.commit(next)?;
        info!("removed device {name:?}");
        Ok(())
    }

    /// Replaces type/manufacturer/model of the device named `profile.name`.
    /// Its commands are left untouched.
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidField`], [`CatalogError::DeviceNotFound`],
    /// [`CatalogError::StorageExhausted`], or [`CatalogError::Persistence`].
    pub fn update_device(&mut self, profile: DeviceProfile) -> Result<(), CatalogError> {
        validate_metadata(&profile)?;
        let index = self.device_index(&profile.name)?;
        let mut next = self.devices.clone();
        let target = &mut next[index];
        target.device_type = profile.device_type;
        target.manufacturer = profile.manufacturer;
        target.model = profile.model;
        self.commit(next)?;
        info!("updated device {:?}", profile.name);
        Ok(())
    }

    pub fn get_device(&self, name: &str) -> Option<&DeviceProfile> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn device_exists(&self, name: &str) -> bool {
        self.get_device(name).is_some()
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Appends a command to a device and persists.
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidField`], [`CatalogError::DeviceNotFound`],
    /// [`CatalogError::TooManyCommands`], [`CatalogError::CommandExists`],
    /// [`CatalogError::StorageExhausted`], or [`CatalogError::Persistence`].
    pub fn add_command(&mut self, device: &str, entry: CommandEntry) -> Result<(), CatalogError> {
        validate_command(&entry)?;
        let index = self.device_index(device)?;
        let owner = &self.devices[index];
        if owner.commands.len() >= MAX_COMMANDS {
            return Err(CatalogError::TooManyCommands {
                device: device.to_string(),
                max: MAX_COMMANDS,
            });
        }
        if owner.command(&entry.name).is_some() {
            return Err(CatalogError::CommandExists {
                device: device.to_string(),
                command: entry.name,
            });
        }

        let command = entry.name.clone();
        let mut next = self.devices.clone();
        next[index].commands.push(entry);
        self.commit(next)?;
        info!("added command {command:?} to device {device:?}");
        Ok(())
    }

    /// Removes a command, preserving the order of the rest.
    ///
    /// # Errors
    ///
    /// [`CatalogError::DeviceNotFound`], [`CatalogError::CommandNotFound`], or
    /// [`CatalogError::Persistence`].
    pub fn remove_command(&mut self, device: &str, command: &str) -> Result<(), CatalogError> {
        let index = self.device_index(device)?;
        let position = self.devices[index]
            .commands
            .iter()
            .position(|c| c.name == command)
            .ok_or_else(|| CatalogError::CommandNotFound {
                device: device.to_string(),
                command: command.to_string(),
            })?;

        let mut next = self.devices.clone();
        next[index].commands.remove(position);
        self.commit(next)?;
        info!("removed command {command:?} from device {device:?}");
        Ok(())
    }

    /// Returns the command, or `None` if either key is absent.
    pub fn get_command(&self, device: &str, command: &str) -> Option<&CommandEntry> {
        self.get_device(device)?.command(command)
    }

    pub fn command_exists(&self, device: &str, command: &str) -> bool {
        self.get_command(device, command).is_some()
    }

    // ── Listings ──────────────────────────────────────────────────────────────

    /// Summaries of every device, in insertion order.
    pub fn list_devices(&self) -> Vec<DeviceSummary> {
        self.devices.iter().map(DeviceProfile::summary).collect()
    }

    /// Summaries of one device's commands, in insertion order.
    ///
    /// # Errors
    ///
    /// [`CatalogError::DeviceNotFound`].
    pub fn list_commands(&self, device: &str) -> Result<Vec<CommandSummary>, CatalogError> {
        let owner = self
            .get_device(device)
            .ok_or_else(|| CatalogError::DeviceNotFound(device.to_string()))?;
        Ok(owner
            .commands
            .iter()
            .map(|c| CommandSummary {
                name: c.name.clone(),
                description: c.description.clone(),
            })
            .collect())
    }

    // ── Backup ────────────────────────────────────────────────────────────────

    /// Produces a complete backup of the catalog.
    pub fn export_all(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            devices: self
                .devices
                .iter()
                .map(|d| DeviceSnapshot {
                    name: d.name.clone(),
                    device_type: d.device_type.clone(),
                    manufacturer: d.manufacturer.clone(),
                    model: d.model.clone(),
                    commands: d
                        .commands
                        .iter()
                        .map(|c| CommandSnapshot {
                            name: c.name.clone(),
                            description: c.description.clone(),
                            code: c.code.to_transport(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Replaces the whole catalog with `snapshot`.
    ///
    /// The snapshot is validated with the same rules as individual adds and
    /// persisted before it becomes visible.  On any failure the previous
    /// catalog stays in place.  Returns the number of imported devices.
    ///
    /// # Errors
    ///
    /// Any [`CatalogError`] an equivalent sequence of adds would raise.
    pub fn import_all(&mut self, snapshot: &CatalogSnapshot) -> Result<usize, CatalogError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CatalogError::InvalidField {
                field: "version",
                reason: format!("unsupported snapshot version {:?}", snapshot.version),
            });
        }

        let mut next: Vec<DeviceProfile> = Vec::with_capacity(snapshot.devices.len());
        for device in &snapshot.devices {
            let mut profile = DeviceProfile::new(device.name.clone(), device.device_type.clone())
                .with_manufacturer(device.manufacturer.clone())
                .with_model(device.model.clone());
            validate_metadata(&profile)?;
            if next.iter().any(|d| d.name == profile.name) {
                return Err(CatalogError::DeviceExists(profile.name));
            }
            if next.len() >= MAX_DEVICES {
                return Err(CatalogError::TooManyDevices { max: MAX_DEVICES });
            }

            for command in &device.commands {
                let code = IrCode::from_transport(&command.code).map_err(|e| {
                    CatalogError::InvalidField {
                        field: "command.code",
                        reason: e.to_string(),
                    }
                })?;
                let entry = CommandEntry::new(command.name.clone(), command.description.clone(), code);
                validate_command(&entry)?;
                if profile.commands.len() >= MAX_COMMANDS {
                    return Err(CatalogError::TooManyCommands {
                        device: profile.name,
                        max: MAX_COMMANDS,
                    });
                }
                if profile.command(&entry.name).is_some() {
                    return Err(CatalogError::CommandExists {
                        device: profile.name,
                        command: entry.name,
                    });
                }
                profile.commands.push(entry);
            }
            next.push(profile);
        }

        let count = next.len();
        self.commit(next)?;
        info!("imported {count} devices");
        Ok(count)
    }

    // ── Maintenance ───────────────────────────────────────────────────────────

    /// Empties the catalog and erases the store.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Persistence`] if the erase fails; the catalog is then
    /// left as it was, matching the un-erased store.
    pub fn reset(&mut self) -> Result<(), CatalogError> {
        self.store.erase().map_err(|e| {
            warn!("catalog erase failed: {e}");
            CatalogError::Persistence(e)
        })?;
        self.devices.clear();
        self.used_bytes = 0;
        info!("catalog reset");
        Ok(())
    }

    /// Snapshot for GET_STATUS.
    pub fn status(&self) -> CatalogStatus {
        CatalogStatus {
            loaded: self.loaded,
            device_count: self.devices.len(),
            max_devices: MAX_DEVICES,
            store_size: self.store.capacity(),
            store_used: self.used_bytes,
            corrupt_on_load: self.corrupt_on_load,
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn device_index(&self, name: &str) -> Result<usize, CatalogError> {
        self.devices
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| CatalogError::DeviceNotFound(name.to_string()))
    }

    /// Encodes and writes `next`, then makes it the current state.
    fn commit(&mut self, next: Vec<DeviceProfile>) -> Result<(), CatalogError> {
        let bytes = encode_catalog(&next, self.store.capacity()).map_err(|e| {
            warn!("catalog mutation refused by encoder: {e}");
            CatalogError::from_encode(e)
        })?;
        self.store.write(&bytes).map_err(|e| {
            warn!("catalog write failed, mutation rolled back: {e}");
            CatalogError::Persistence(e)
        })?;
        debug!("catalog persisted: {} bytes", bytes.len());
        self.used_bytes = bytes.len();
        self.devices = next;
        Ok(())
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

fn validate_name(field: &'static str, name: &str) -> Result<(), CatalogError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(CatalogError::InvalidField {
            field,
            reason: format!("must be 1..={MAX_NAME_LEN} bytes, got {}", name.len()),
        });
    }
    Ok(())
}

fn validate_text(field: &'static str, text: &str) -> Result<(), CatalogError> {
    if text.len() > MAX_FIELD_LEN {
        return Err(CatalogError::FieldTooLong {
            field,
            len: text.len(),
            max: MAX_FIELD_LEN,
        });
    }
    Ok(())
}

fn validate_metadata(profile: &DeviceProfile) -> Result<(), CatalogError> {
    validate_name("device.name", &profile.name)?;
    validate_text("device.type", &profile.device_type)?;
    validate_text("device.manufacturer", &profile.manufacturer)?;
    validate_text("device.model", &profile.model)
}

fn validate_command(entry: &CommandEntry) -> Result<(), CatalogError> {
    validate_name("command.name", &entry.name)?;
    validate_text("command.description", &entry.description)?;
    validate_text("command.code.description", &entry.code.description)?;
    entry.code.validate().map_err(|e| CatalogError::InvalidField {
        field: "command.code",
        reason: e.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

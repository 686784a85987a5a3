//! Capacity bounds for the catalog and its persisted form.
//!
//! These are compile-time constants because the backing store is a fixed-size
//! region and the record format uses single-byte counts and length prefixes.

/// Maximum number of devices held by one catalog.
pub const MAX_DEVICES: usize = 50;

/// Maximum number of commands attached to one device.
pub const MAX_COMMANDS: usize = 20;

/// Maximum length in bytes of a device or command name.
pub const MAX_NAME_LEN: usize = 32;

/// Maximum length in bytes of any other persisted text field.
///
/// Bounded by the single-byte length prefix of the record format.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Maximum number of raw timing entries in one IR code.
pub const MAX_RAW_TIMINGS: usize = 512;

/// Two-byte marker at offset 0 of a valid catalog region.
pub const STORE_MAGIC: [u8; 2] = [0xAA, 0x55];

/// Default size in bytes of the non-volatile catalog region.
pub const DEFAULT_STORE_SIZE: usize = 4096;

/// Byte value of an erased store cell.
pub const ERASED_BYTE: u8 = 0xFF;

/// LEARN timeout when the request does not name one.
pub const DEFAULT_LEARN_TIMEOUT_MS: u64 = 15_000;

/// Largest LEARN timeout a request may ask for.
pub const MAX_LEARN_TIMEOUT_MS: u64 = 60_000;

/// Pause between acknowledging RESET and restarting.
pub const RESTART_DELAY_MS: u64 = 1_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_fit_single_byte_prefixes() {
        assert!(MAX_DEVICES <= u8::MAX as usize);
        assert!(MAX_COMMANDS <= u8::MAX as usize);
        assert!(MAX_NAME_LEN <= MAX_FIELD_LEN);
    }

    #[test]
    fn test_raw_timing_count_fits_two_byte_prefix() {
        assert!(MAX_RAW_TIMINGS <= u16::MAX as usize);
    }
}

//! Domain entities for the ESPIR catalog.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer is called the **domain**.  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from OS APIs, radios, IR peripherals, or async runtimes.
//! - Can be compiled and tested on any host without any hardware attached.
//!
//! The one outward-facing seam is durability: the [`catalog::Catalog`] hands
//! its encoded bytes to a [`crate::storage::ByteStore`] trait object, so tests
//! can swap in memory while the firmware plugs in flash or a file.

/// The device/command catalog: the core domain concept.
///
/// See [`catalog::Catalog`] for the main type.
pub mod catalog;

/// The infrared code value type.
pub mod ir_code;

/// Fixed capacity bounds shared by the catalog, codec, and protocol.
pub mod limits;

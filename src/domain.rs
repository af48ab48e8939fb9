//! Domain models for requirements management.
//!
//! This module contains the core domain types: item identifiers, outline
//! levels, items, review fingerprints and validation findings. Nothing
//! here touches the filesystem.

pub mod item;
pub use item::{Item, Link, Reference};

pub mod issue;
pub use issue::{Issue, Severity, Subject};

pub mod level;
pub use level::Level;

pub mod stamp;
pub use stamp::{Stamp, StampContent};

/// Item identifier types and parsing.
pub mod uid;
pub use uid::{Prefix, Separator, Uid};

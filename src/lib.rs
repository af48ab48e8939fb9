//! Plain-text Requirements Management
//!
//! Requirements are version-controllable text files organised into
//! documents, linked across documents for traceability, with review
//! fingerprints that flag stale links when a parent changes.

pub mod domain;
pub use domain::{Issue, Item, Level, Link, Prefix, Separator, Severity, Stamp, Uid};

/// Filesystem storage: item formats, documents and tree discovery.
pub mod storage;
pub use storage::{Document, ItemFormat, OnMalformed, Tree};

/// Document export and import.
pub mod exchange;

/// External reference resolution.
pub mod reference;

/// Tree validation.
pub mod validate;

//! Filesystem layout: item file formats, document directories, tree
//! discovery and version-control hooks.

/// Item file encoding and decoding.
pub mod codec;
pub mod document;
pub mod tree;
pub mod vcs;

pub use codec::ItemFormat;
pub use document::{CONFIG_FILE, Document, OnMalformed, OutlineEntry, SKIP_FILE};
pub use tree::Tree;
pub use vcs::{NullVcs, Vcs};

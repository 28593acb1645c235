//! Content discovery.

/// Named, ordered, deduplicated content lists.
pub mod registry;
/// Directory scanning with source-over-artifact preference.
pub mod scanner;

pub use registry::{ContentList, ContentRegistry, SharedRegistry};
pub use scanner::{is_valid, ContentScanner, ScanRule};

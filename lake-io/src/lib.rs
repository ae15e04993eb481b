//! Storage plumbing for the lake read path.
//!
//! Segment files live on object storage or a local filesystem. This crate resolves a storage
//! location to a backend, describes segment files with whatever the metadata already knows
//! about them, and provides bounded task pools used to fan work out across threads without
//! queueing unboundedly.

pub use dispatcher::*;
pub use file::*;
pub use store::*;

mod dispatcher;
mod file;
mod store;

/// Default number of footer bytes requested with the first read of a segment file.
pub const DEFAULT_FOOTER_SIZE_HINT: u64 = 16 * 1024;

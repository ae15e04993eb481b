//! Read path of rowsets stored in the object-storage lake table format.
//!
//! A table is partitioned into tablets. Every tablet version is described by one immutable
//! [`TabletMetadataPb`](metadata::TabletMetadataPb) snapshot listing its rowsets, and every
//! rowset is a group of immutable segment files written together with one schema.
//!
//! A [`Rowset`] turns the segment files listed by its metadata into row streams:
//!
//! 1. Segments are opened through the [`TabletManager`], optionally fanning the loads out to a
//!    bounded [`TaskPool`](lake_io::TaskPool). Results keep metadata order whichever way each
//!    load ran, and segment files lost to a concurrent vacuum can be tolerated.
//! 2. Columns referenced only by delete predicates are appended to the read schema for the
//!    segment reader, and projected away again afterwards.
//! 3. For primary-key tables, each segment reader is handed loaders for the delete vectors and
//!    delta column groups of the read version. Nothing is fetched until the reader asks.
//! 4. Scans split by row id ranges or short key ranges only touch their share of each segment.
//! 5. Streams of a rowset whose segments do not overlap are concatenated in segment order.
//!
//! The segment binary format itself is owned by the [`SegmentStore`](segments::SegmentStore)
//! implementation.

pub mod config;
mod loader;
pub mod location;
pub mod memory;
pub mod metadata;
pub mod options;
pub mod overlay;
pub mod predicate;
pub mod range;
mod rowset;
pub mod schema;
pub mod segments;
pub mod stream;
mod tablet_manager;

pub use config::LakeConfig;
pub use options::{RowsetReadOptions, SplitStrategy};
pub use rowset::*;
pub use tablet_manager::*;

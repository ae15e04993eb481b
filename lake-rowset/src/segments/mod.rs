//! Segment files and the store that opens them.
//!
//! The segment binary format is owned by the [`SegmentStore`] implementation. This crate only
//! orchestrates which segments are opened, with which options, and how their chunk streams are
//! combined.

mod cache;
#[cfg(any(test, feature = "test-harness"))]
pub mod test;

use std::sync::Arc;

use arrow_schema::SchemaRef;
use async_trait::async_trait;
pub use cache::*;
use lake_error::LakeResult;
use lake_io::{FileInfo, FileSystemRef, LakeIoOptions};

use crate::options::SegmentReadOptions;
use crate::schema::TabletSchemaRef;
use crate::stream::SendableChunkStream;

/// Everything needed to open one segment file.
#[derive(Clone)]
pub struct SegmentOpenOptions {
    pub fs: FileSystemRef,
    pub file_info: FileInfo,
    /// Ordinal of the segment within its rowset.
    pub segment_id: u32,
    /// Expected footer size, refined as segments of the same rowset are opened.
    pub footer_size_hint: Option<u64>,
    pub io_options: LakeIoOptions,
    pub fill_metadata_cache: bool,
    pub tablet_schema: TabletSchemaRef,
}

/// Opens segment files.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Open a segment. A missing file must be reported as a not-found error.
    async fn open(&self, options: SegmentOpenOptions) -> LakeResult<SegmentRef>;
}

/// An opened segment file.
#[async_trait]
pub trait Segment: Send + Sync {
    /// Ordinal of the segment within its rowset.
    fn id(&self) -> u32;

    fn num_rows(&self) -> u32;

    fn file_info(&self) -> &FileInfo;

    /// Actual footer size, if known once the segment is open.
    fn footer_size(&self) -> Option<u64> {
        None
    }

    /// Create a stream over the rows of the segment selected by `options`, with the columns of
    /// `schema`.
    ///
    /// Returns an end-of-file error when pruning proves that no row can be selected.
    async fn new_iterator(
        &self,
        schema: SchemaRef,
        options: &SegmentReadOptions,
    ) -> LakeResult<SendableChunkStream>;
}

pub type SegmentRef = Arc<dyn Segment>;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use lake_io::{FileSystemRef, LakeIoOptions};
use lake_metrics::LakeMetrics;

use crate::overlay::{DeltaColumnGroupLoader, DelvecLoader};
use crate::predicate::{DeletePredicates, PredicateTree, SegmentDeletePredicates};
use crate::range::RowRanges;
use crate::schema::TabletSchemaRef;

pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// How a rowset scan is partitioned for parallel execution.
///
/// A scan uses at most one strategy.
#[derive(Debug, Clone, Default)]
pub enum SplitStrategy {
    #[default]
    None,
    /// Physical split: explicit row id ranges per segment.
    RowidRange(Arc<RowidRangeOption>),
    /// Logical split: ranges of encoded short keys, applied by every segment.
    ShortKeyRanges(Arc<ShortKeyRangesOption>),
}

/// The rows of one segment assigned to a split.
#[derive(Debug, Clone)]
pub struct SegmentSplit {
    pub row_ranges: Arc<RowRanges>,
    pub is_first_split_of_segment: bool,
}

/// Row id ranges assigned to a split, by rowset and segment.
///
/// Segments without an entry do not take part in the split.
#[derive(Debug, Clone, Default)]
pub struct RowidRangeOption {
    splits: HashMap<(u32, u32), SegmentSplit>,
}

impl RowidRangeOption {
    pub fn add(
        &mut self,
        rowset_id: u32,
        segment_id: u32,
        row_ranges: RowRanges,
        is_first_split_of_segment: bool,
    ) {
        self.splits.insert(
            (rowset_id, segment_id),
            SegmentSplit {
                row_ranges: Arc::new(row_ranges),
                is_first_split_of_segment,
            },
        );
    }

    pub fn get_segment_rowid_range(&self, rowset_id: u32, segment_id: u32) -> Option<&SegmentSplit> {
        self.splits.get(&(rowset_id, segment_id))
    }
}

/// One end of a [`ShortKeyRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortKey {
    pub key: Bytes,
    pub inclusive: bool,
}

/// A range of encoded short keys. An absent bound is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortKeyRange {
    pub lower: Option<ShortKey>,
    pub upper: Option<ShortKey>,
}

#[derive(Debug, Clone, Default)]
pub struct ShortKeyRangesOption {
    pub short_key_ranges: Vec<Arc<ShortKeyRange>>,
    pub is_first_split_of_tablet: bool,
}

/// Options of one rowset read.
#[derive(Clone)]
pub struct RowsetReadOptions {
    /// Snapshot version used to resolve the primary-key overlay.
    pub version: i64,
    pub is_primary_keys: bool,
    pub pred_tree: Option<Arc<PredicateTree>>,
    /// The part of `pred_tree` usable for zone map pruning.
    pub pred_tree_for_zone_map: Option<Arc<PredicateTree>>,
    pub delete_predicates: Option<Arc<DeletePredicates>>,
    pub split: SplitStrategy,
    /// Schema delete predicate column ids refer to. Defaults to the rowset's own schema.
    pub tablet_schema: Option<TabletSchemaRef>,
    pub use_page_cache: bool,
    pub chunk_size: usize,
    pub lake_io_opts: LakeIoOptions,
    /// Per-query statistics. The tablet manager's registry is used when absent.
    pub stats: Option<LakeMetrics>,
}

impl Default for RowsetReadOptions {
    fn default() -> Self {
        Self {
            version: 0,
            is_primary_keys: false,
            pred_tree: None,
            pred_tree_for_zone_map: None,
            delete_predicates: None,
            split: SplitStrategy::None,
            tablet_schema: None,
            use_page_cache: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            lake_io_opts: LakeIoOptions::default(),
            stats: None,
        }
    }
}

impl RowsetReadOptions {
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn with_primary_keys(mut self, is_primary_keys: bool) -> Self {
        self.is_primary_keys = is_primary_keys;
        self
    }

    pub fn with_pred_tree(mut self, pred_tree: PredicateTree) -> Self {
        self.pred_tree = Some(Arc::new(pred_tree));
        self
    }

    pub fn with_pred_tree_for_zone_map(mut self, pred_tree: PredicateTree) -> Self {
        self.pred_tree_for_zone_map = Some(Arc::new(pred_tree));
        self
    }

    pub fn with_delete_predicates(mut self, delete_predicates: Arc<DeletePredicates>) -> Self {
        self.delete_predicates = Some(delete_predicates);
        self
    }

    pub fn with_split(mut self, split: SplitStrategy) -> Self {
        self.split = split;
        self
    }

    pub fn with_tablet_schema(mut self, tablet_schema: TabletSchemaRef) -> Self {
        self.tablet_schema = Some(tablet_schema);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_lake_io_opts(mut self, lake_io_opts: LakeIoOptions) -> Self {
        self.lake_io_opts = lake_io_opts;
        self
    }

    pub fn with_stats(mut self, stats: LakeMetrics) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// Options handed to a segment reader.
#[derive(Clone)]
pub struct SegmentReadOptions {
    pub fs: FileSystemRef,
    pub stats: LakeMetrics,
    /// Rows to read when the scan is physically split.
    pub rowid_range: Option<Arc<RowRanges>>,
    pub short_key_ranges: Vec<Arc<ShortKeyRange>>,
    pub is_first_split_of_segment: bool,
    pub pred_tree: Option<Arc<PredicateTree>>,
    pub pred_tree_for_zone_map: Option<Arc<PredicateTree>>,
    pub delete_predicates: SegmentDeletePredicates,
    pub use_page_cache: bool,
    pub chunk_size: usize,
    pub tablet_schema: Option<TabletSchemaRef>,
    pub lake_io_opts: LakeIoOptions,

    pub is_primary_keys: bool,
    pub delvec_loader: Option<Arc<dyn DelvecLoader>>,
    pub dcg_loader: Option<Arc<dyn DeltaColumnGroupLoader>>,
    pub version: i64,
    pub tablet_id: i64,
    pub rowset_id: u32,
}

impl SegmentReadOptions {
    pub fn new(fs: FileSystemRef, stats: LakeMetrics) -> Self {
        Self {
            fs,
            stats,
            rowid_range: None,
            short_key_ranges: Vec::new(),
            is_first_split_of_segment: true,
            pred_tree: None,
            pred_tree_for_zone_map: None,
            delete_predicates: SegmentDeletePredicates::default(),
            use_page_cache: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            tablet_schema: None,
            lake_io_opts: LakeIoOptions::default(),
            is_primary_keys: false,
            delvec_loader: None,
            dcg_loader: None,
            version: 0,
            tablet_id: 0,
            rowset_id: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rowid_ranges_are_keyed_by_rowset_and_segment() {
        let mut option = RowidRangeOption::default();
        option.add(4, 1, RowRanges::new([0..10]), false);
        let split = option.get_segment_rowid_range(4, 1).unwrap();
        assert!(!split.is_first_split_of_segment);
        assert_eq!(split.row_ranges.span_size(), 10);
        assert!(option.get_segment_rowid_range(4, 0).is_none());
        assert!(option.get_segment_rowid_range(5, 1).is_none());
    }

    #[test]
    fn read_options_builder() {
        let options = RowsetReadOptions::default()
            .with_version(7)
            .with_primary_keys(true)
            .with_chunk_size(16);
        assert_eq!(options.version, 7);
        assert!(options.is_primary_keys);
        assert_eq!(options.chunk_size, 16);
        assert!(matches!(options.split, SplitStrategy::None));
    }
}

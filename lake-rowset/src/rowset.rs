use std::borrow::Cow;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use arrow_schema::SchemaRef;
use lake_error::{LakeResult, lake_err, lake_panic};
use lake_io::LakeIoOptions;
use lake_metrics::LakeMetrics;
use tokio::sync::OnceCell;

use crate::metadata::{RowsetMetadataRef, TabletMetadataPtr};
use crate::options::{RowsetReadOptions, SegmentReadOptions, SplitStrategy};
use crate::overlay::{LakeDeltaColumnGroupLoader, LakeDelvecLoader, MetaFileBuilder};
use crate::schema::{TabletColumn, TabletSchemaRef, augment_schema};
use crate::segments::SegmentRef;
use crate::stream::{SendableChunkStream, new_projection_stream, new_union_stream};
use crate::tablet_manager::TabletManager;

/// Tablet-unique identifier of a rowset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowsetId(u32);

impl RowsetId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

impl Display for RowsetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "rowset-{}", self.0)
    }
}

/// A group of immutable segments written together, bound to one schema.
///
/// Creating a rowset is cheap: it holds the shared metadata snapshot and a schema handle. Segments
/// are opened on first use and reused by every later read of the same instance. Row streams are
/// created per read and never retained.
pub struct Rowset {
    tablet_mgr: Arc<TabletManager>,
    tablet_id: i64,
    metadata: RowsetMetadataRef,
    index: usize,
    tablet_schema: TabletSchemaRef,
    segments: OnceCell<Vec<SegmentRef>>,
}

impl Rowset {
    /// The rowset at `index` of `tablet_metadata`.
    ///
    /// Rowsets without an explicit schema mapping use the tablet's current schema, others the
    /// historical schema they map to.
    ///
    /// # Panics
    ///
    /// Panics if the mapped schema id is missing from the historical schemas of the snapshot.
    pub fn new(
        tablet_mgr: Arc<TabletManager>,
        tablet_metadata: TabletMetadataPtr,
        index: usize,
    ) -> LakeResult<Self> {
        let metadata = RowsetMetadataRef::in_tablet(tablet_metadata.clone(), index)?;
        let schema_pb = match tablet_metadata.rowset_to_schema.get(&metadata.id) {
            None => tablet_metadata.schema.as_ref().ok_or_else(
                || lake_err!(Corruption: "tablet:{} has no current schema", tablet_metadata.id),
            )?,
            Some(schema_id) => match tablet_metadata.historical_schemas.get(schema_id) {
                Some(schema_pb) => schema_pb,
                None => lake_panic!(
                    "tablet:{} rowset:{} is bound to schema {} missing from historical schemas",
                    tablet_metadata.id,
                    metadata.id,
                    schema_id
                ),
            },
        };
        let tablet_schema = tablet_mgr.schemas().get_or_insert(schema_pb)?;

        Ok(Self {
            tablet_mgr,
            tablet_id: tablet_metadata.id,
            metadata,
            index,
            tablet_schema,
            segments: OnceCell::new(),
        })
    }

    /// A rowset whose record is not part of a tablet snapshot.
    ///
    /// Delta column groups cannot be resolved for such a rowset.
    pub fn with_schema(
        tablet_mgr: Arc<TabletManager>,
        tablet_id: i64,
        metadata: impl Into<RowsetMetadataRef>,
        index: usize,
        tablet_schema: TabletSchemaRef,
    ) -> Self {
        Self {
            tablet_mgr,
            tablet_id,
            metadata: metadata.into(),
            index,
            tablet_schema,
            segments: OnceCell::new(),
        }
    }

    pub fn tablet_mgr(&self) -> &Arc<TabletManager> {
        &self.tablet_mgr
    }

    pub fn tablet_id(&self) -> i64 {
        self.tablet_id
    }

    pub fn id(&self) -> u32 {
        self.metadata.id
    }

    pub fn rowset_id(&self) -> RowsetId {
        RowsetId::new(self.metadata.id)
    }

    /// Position of the rowset in its tablet snapshot.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn metadata(&self) -> &RowsetMetadataRef {
        &self.metadata
    }

    pub fn tablet_schema(&self) -> &TabletSchemaRef {
        &self.tablet_schema
    }

    pub fn num_segments(&self) -> usize {
        self.metadata.segments.len()
    }

    pub fn num_rows(&self) -> i64 {
        self.metadata.num_rows
    }

    pub fn data_size(&self) -> i64 {
        self.metadata.data_size
    }

    pub fn is_overlapped(&self) -> bool {
        self.metadata.overlapped
    }

    pub fn version(&self) -> i64 {
        self.metadata.version
    }

    /// Create the row streams of one read of the rowset.
    ///
    /// Segments without rows, without rows in the split, or pruned entirely by the segment reader
    /// are skipped. When the rowset is not overlapped the per-segment streams are concatenated
    /// into a single stream in segment order; otherwise one stream per segment is returned and
    /// the caller merges them.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(tablet_id = self.tablet_id, rowset_id = self.id()))
    )]
    pub async fn read(
        &self,
        schema: &SchemaRef,
        options: &RowsetReadOptions,
    ) -> LakeResult<Vec<SendableChunkStream>> {
        let mut seg_options = self.segment_read_options(options.stats.clone())?;
        seg_options.pred_tree = options.pred_tree.clone();
        seg_options.pred_tree_for_zone_map = options.pred_tree_for_zone_map.clone();
        seg_options.use_page_cache = options.use_page_cache;
        seg_options.chunk_size = options.chunk_size;
        seg_options.lake_io_opts = options.lake_io_opts;
        if options.is_primary_keys {
            self.bind_overlay(
                &mut seg_options,
                options.version,
                LakeDelvecLoader::new(
                    self.tablet_mgr.update_mgr().clone(),
                    None,
                    options.lake_io_opts.fill_data_cache,
                ),
            );
        }

        // Delete predicate column ids refer to the read's tablet schema.
        let delete_schema = options
            .tablet_schema
            .as_ref()
            .unwrap_or(&self.tablet_schema);
        let delete_predicates = options
            .delete_predicates
            .as_ref()
            .map(|deletes| deletes.predicates_for(self.index))
            .unwrap_or_default();
        let delete_fields = delete_predicates
            .column_ids()
            .into_iter()
            .map(|cid| delete_schema.column(cid).map(TabletColumn::to_field))
            .collect::<LakeResult<Vec<_>>>()?;
        let read_schema = augment_schema(schema, delete_fields);
        let augmented = matches!(read_schema, Cow::Owned(_));
        seg_options.tablet_schema = Some(delete_schema.clone());
        seg_options.delete_predicates = delete_predicates;

        let segments = self
            .segments(options.lake_io_opts, options.lake_io_opts.fill_data_cache)
            .await?;
        let segments_read = seg_options.stats.counter("lake.rowset.segments.read");

        let mut streams = Vec::with_capacity(segments.len());
        for segment in segments {
            if segment.num_rows() == 0 {
                continue;
            }

            let mut segment_options = seg_options.clone();
            match &options.split {
                SplitStrategy::None => {}
                SplitStrategy::RowidRange(rowid_range) => {
                    let Some(split) = rowid_range.get_segment_rowid_range(self.id(), segment.id())
                    else {
                        continue;
                    };
                    segment_options.rowid_range = Some(split.row_ranges.clone());
                    segment_options.is_first_split_of_segment = split.is_first_split_of_segment;
                }
                SplitStrategy::ShortKeyRanges(short_key_ranges) => {
                    segment_options.short_key_ranges = short_key_ranges.short_key_ranges.clone();
                    segment_options.is_first_split_of_segment =
                        short_key_ranges.is_first_split_of_tablet;
                }
            }

            segments_read.inc();
            let stream = match segment
                .new_iterator(SchemaRef::clone(&read_schema), &segment_options)
                .await
            {
                Ok(stream) => stream,
                Err(e) if e.is_end_of_file() => continue,
                Err(e) => return Err(e),
            };
            if augmented {
                streams.push(new_projection_stream(schema.clone(), stream)?);
            } else {
                streams.push(stream);
            }
        }

        if streams.len() > 1 && !self.is_overlapped() {
            return Ok(vec![new_union_stream(streams)?]);
        }
        Ok(streams)
    }

    /// Number of streams [`Rowset::read`] returns for a read without split.
    pub async fn get_read_iterator_num(&self) -> LakeResult<usize> {
        let segments = self.segments(LakeIoOptions::default(), false).await?;
        let num_streams = segments.iter().filter(|s| s.num_rows() > 0).count();
        if num_streams > 1 && !self.is_overlapped() {
            return Ok(1);
        }
        Ok(num_streams)
    }

    /// One stream per non-empty segment over all of its rows, without predicates or
    /// concatenation.
    pub async fn get_each_segment_iterator(
        &self,
        schema: &SchemaRef,
        fill_data_cache: bool,
        stats: Option<LakeMetrics>,
    ) -> LakeResult<Vec<SendableChunkStream>> {
        let io_options = LakeIoOptions::default().with_fill_data_cache(fill_data_cache);
        let mut seg_options = self.segment_read_options(stats)?;
        seg_options.lake_io_opts = io_options;
        seg_options.tablet_schema = Some(self.tablet_schema.clone());

        let segments = self.segments(io_options, fill_data_cache).await?;
        Self::new_segment_iterators(segments, schema, &seg_options).await
    }

    /// Like [`Rowset::get_each_segment_iterator`], with the primary-key overlay of `version`
    /// applied.
    ///
    /// Delete vectors pending in `builder` take precedence over persisted ones.
    pub async fn get_each_segment_iterator_with_delvec(
        &self,
        schema: &SchemaRef,
        version: i64,
        builder: Option<Arc<MetaFileBuilder>>,
        stats: Option<LakeMetrics>,
    ) -> LakeResult<Vec<SendableChunkStream>> {
        let mut seg_options = self.segment_read_options(stats)?;
        seg_options.tablet_schema = Some(self.tablet_schema.clone());
        self.bind_overlay(
            &mut seg_options,
            version,
            LakeDelvecLoader::new(self.tablet_mgr.update_mgr().clone(), builder, true),
        );

        let segments = self.segments(LakeIoOptions::default(), false).await?;
        Self::new_segment_iterators(segments, schema, &seg_options).await
    }

    /// The opened segments of the rowset.
    ///
    /// Segments are loaded by the first call, with its options, and reused afterwards.
    pub async fn segments(
        &self,
        io_options: LakeIoOptions,
        fill_metadata_cache: bool,
    ) -> LakeResult<&[SegmentRef]> {
        self.segments
            .get_or_try_init(|| self.load_segments(io_options, fill_metadata_cache))
            .await
            .map(Vec::as_slice)
    }

    /// The opened segments of the rowset, or nothing if they cannot be loaded.
    pub async fn get_segments(&self) -> Vec<SegmentRef> {
        match self.segments(LakeIoOptions::default(), true).await {
            Ok(segments) => segments.to_vec(),
            Err(e) => {
                log::warn!(
                    "Failed to load segments of tablet:{} rowset:{}: {e}",
                    self.tablet_id,
                    self.id()
                );
                Vec::new()
            }
        }
    }

    fn segment_read_options(&self, stats: Option<LakeMetrics>) -> LakeResult<SegmentReadOptions> {
        let root = self.tablet_mgr.tablet_root_location(self.tablet_id);
        let fs = self.tablet_mgr.file_system(&root)?;
        let stats = stats.unwrap_or_else(|| self.tablet_mgr.metrics().clone());
        Ok(SegmentReadOptions::new(fs, stats))
    }

    fn bind_overlay(
        &self,
        seg_options: &mut SegmentReadOptions,
        version: i64,
        delvec_loader: LakeDelvecLoader,
    ) {
        seg_options.is_primary_keys = true;
        seg_options.delvec_loader = Some(Arc::new(delvec_loader));
        seg_options.dcg_loader = Some(Arc::new(LakeDeltaColumnGroupLoader::new(
            self.metadata.tablet_metadata().cloned(),
        )));
        seg_options.version = version;
        seg_options.tablet_id = self.tablet_id;
        seg_options.rowset_id = self.id();
    }

    async fn new_segment_iterators(
        segments: &[SegmentRef],
        schema: &SchemaRef,
        seg_options: &SegmentReadOptions,
    ) -> LakeResult<Vec<SendableChunkStream>> {
        let mut streams = Vec::with_capacity(segments.len());
        for segment in segments.iter().filter(|s| s.num_rows() > 0) {
            match segment.new_iterator(schema.clone(), seg_options).await {
                Ok(stream) => streams.push(stream),
                Err(e) if e.is_end_of_file() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(streams)
    }
}

impl Debug for Rowset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rowset")
            .field("tablet_id", &self.tablet_id)
            .field("rowset_id", &self.id())
            .field("index", &self.index)
            .field("num_segments", &self.num_segments())
            .field("overlapped", &self.is_overlapped())
            .finish()
    }
}

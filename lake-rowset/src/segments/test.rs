//! In-memory segment store and update manager for tests.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arrow_array::{BooleanArray, RecordBatch, RecordBatchOptions};
use arrow_arith::boolean::{and, not};
use arrow_schema::SchemaRef;
use arrow_select::filter::filter_record_batch;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream;
use lake_error::{LakeError, LakeResult, lake_bail, lake_err};
use lake_io::FileInfo;
use parking_lot::Mutex;

use super::{Segment, SegmentOpenOptions, SegmentRef, SegmentStore};
use crate::options::SegmentReadOptions;
use crate::overlay::{DelVector, DelVectorPtr, TabletSegmentId, UpdateManager};
use crate::stream::{ChunkStreamAdapter, ChunkStreamExt, SendableChunkStream};

/// A failure injected into [`TestSegmentStore::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    NotFound,
    Io,
}

/// A [`SegmentStore`] serving segments registered in memory, keyed by file name.
#[derive(Default)]
pub struct TestSegmentStore {
    segments: DashMap<String, Vec<RecordBatch>>,
    failures: DashMap<String, InjectedFailure>,
    open_delays: DashMap<String, usize>,
    open_calls: AtomicUsize,
    opened: Mutex<Vec<SegmentOpenOptions>>,
    reads: Arc<Mutex<Vec<SegmentReadOptions>>>,
}

impl TestSegmentStore {
    /// Register a segment file made of `batches`, all of the segment's full schema.
    pub fn add_segment(&self, name: impl Into<String>, batches: Vec<RecordBatch>) {
        self.segments.insert(name.into(), batches);
    }

    pub fn fail(&self, name: impl Into<String>, failure: InjectedFailure) {
        self.failures.insert(name.into(), failure);
    }

    /// Yield `yields` times before finishing the open of `name`.
    pub fn delay_open(&self, name: impl Into<String>, yields: usize) {
        self.open_delays.insert(name.into(), yields);
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Options of every open request, in arrival order.
    pub fn opened(&self) -> Vec<SegmentOpenOptions> {
        self.opened.lock().clone()
    }

    /// Options of every iterator created over segments of this store, in arrival order.
    pub fn reads(&self) -> Vec<SegmentReadOptions> {
        self.reads.lock().clone()
    }
}

#[async_trait]
impl SegmentStore for TestSegmentStore {
    async fn open(&self, options: SegmentOpenOptions) -> LakeResult<SegmentRef> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.opened.lock().push(options.clone());

        let name = options.file_info.file_name().to_string();
        let yields = self.open_delays.get(&name).map(|d| *d).unwrap_or_default();
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }

        match self.failures.get(&name).map(|f| *f) {
            Some(InjectedFailure::NotFound) => {
                lake_bail!(NotFound: "segment {} not found", options.file_info.path)
            }
            Some(InjectedFailure::Io) => {
                return Err(LakeError::from(io::Error::other(format!(
                    "injected failure reading {}",
                    options.file_info.path
                ))));
            }
            None => {}
        }

        let batches = self
            .segments
            .get(&name)
            .map(|b| b.clone())
            .ok_or_else(|| lake_err!(NotFound: "segment {} not found", options.file_info.path))?;
        Ok(Arc::new(
            TestSegment::new(options.segment_id, options.file_info, batches)
                .with_read_log(self.reads.clone()),
        ))
    }
}

/// A segment over in-memory batches.
///
/// Honors row id ranges, predicate trees, delete predicates, delete vectors and the chunk size.
/// Short key ranges are ignored.
pub struct TestSegment {
    id: u32,
    file_info: FileInfo,
    batches: Vec<RecordBatch>,
    num_rows: u32,
    reads: Arc<Mutex<Vec<SegmentReadOptions>>>,
}

impl TestSegment {
    pub fn new(id: u32, file_info: FileInfo, batches: Vec<RecordBatch>) -> Self {
        let num_rows = batches.iter().map(RecordBatch::num_rows).sum::<usize>();
        Self {
            id,
            file_info,
            batches,
            num_rows: u32::try_from(num_rows).unwrap_or(u32::MAX),
            reads: Arc::default(),
        }
    }

    /// Record the options of every iterator request into `reads`.
    pub fn with_read_log(mut self, reads: Arc<Mutex<Vec<SegmentReadOptions>>>) -> Self {
        self.reads = reads;
        self
    }

    fn project(schema: &SchemaRef, batch: &RecordBatch) -> LakeResult<RecordBatch> {
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                batch.column_by_name(field.name()).cloned().ok_or_else(|| {
                    lake_err!(InvalidArgument: "segment has no column {}", field.name())
                })
            })
            .collect::<LakeResult<Vec<_>>>()?;
        let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
        Ok(RecordBatch::try_new_with_options(
            schema.clone(),
            columns,
            &options,
        )?)
    }
}

#[async_trait]
impl Segment for TestSegment {
    fn id(&self) -> u32 {
        self.id
    }

    fn num_rows(&self) -> u32 {
        self.num_rows
    }

    fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    async fn new_iterator(
        &self,
        schema: SchemaRef,
        options: &SegmentReadOptions,
    ) -> LakeResult<SendableChunkStream> {
        self.reads.lock().push(options.clone());
        if let Some(ranges) = &options.rowid_range {
            if ranges.intersect(0..self.num_rows).is_empty() {
                lake_bail!(EndOfFile: "no rows of segment {} in the requested ranges", self.id);
            }
        }

        let delvec = match (&options.delvec_loader, options.is_primary_keys) {
            (Some(loader), true) => {
                let tsid = TabletSegmentId::for_segment(options.tablet_id, options.rowset_id, self.id);
                Some(loader.load(tsid, options.version).await?)
            }
            _ => None,
        };

        let mut chunks: Vec<LakeResult<RecordBatch>> = Vec::new();
        let mut offset = 0u32;
        for batch in &self.batches {
            let projected = Self::project(&schema, batch)?;
            let len = batch.num_rows();
            let mut selection = match &options.rowid_range {
                Some(ranges) => ranges.selection(offset, len),
                None => BooleanArray::from(vec![true; len]),
            };
            if let Some(delvec) = &delvec {
                selection = delvec.apply_to(&selection, offset);
            }
            if let Some(pred_tree) = &options.pred_tree {
                selection = and(&selection, &pred_tree.evaluate(&projected)?)?;
            }
            if !options.delete_predicates.is_empty() {
                let deleted = options.delete_predicates.evaluate(&projected)?;
                selection = and(&selection, &not(&deleted)?)?;
            }

            let selected = filter_record_batch(&projected, &selection)?;
            let chunk_size = options.chunk_size.max(1);
            let mut start = 0;
            while start < selected.num_rows() {
                let length = chunk_size.min(selected.num_rows() - start);
                chunks.push(Ok(selected.slice(start, length)));
                start += length;
            }
            offset = offset.saturating_add(u32::try_from(len).unwrap_or(u32::MAX));
        }

        log::debug!("Created iterator over {} chunks of {}", chunks.len(), self.file_info.path);
        Ok(ChunkStreamAdapter::new(schema, stream::iter(chunks)).into_sendable())
    }
}

/// An [`UpdateManager`] serving delete vectors registered in memory.
#[derive(Default)]
pub struct TestUpdateManager {
    delvecs: DashMap<TabletSegmentId, DelVectorPtr>,
    calls: AtomicUsize,
}

impl TestUpdateManager {
    pub fn add_delvec(&self, tsid: TabletSegmentId, delvec: DelVector) {
        self.delvecs.insert(tsid, Arc::new(delvec));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateManager for TestUpdateManager {
    async fn get_del_vec(
        &self,
        tsid: TabletSegmentId,
        version: i64,
        _fill_cache: bool,
    ) -> LakeResult<DelVectorPtr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .delvecs
            .get(&tsid)
            .filter(|dv| dv.version() <= version)
            .map(|dv| dv.clone())
            .unwrap_or_else(|| Arc::new(DelVector::new(version, []))))
    }
}

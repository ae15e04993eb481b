use std::time::Instant;

use lake_error::{LakeResult, lake_bail};
use lake_io::{FileInfo, JoinHandle, LakeIoOptions, TaskPoolExt};

use crate::memory::check_current_mem_limit;
use crate::rowset::Rowset;
use crate::segments::SegmentRef;

/// Result slot of one segment, in metadata order.
enum Slot {
    /// Loaded in place. `None` marks a tolerated lost segment.
    Loaded(Option<SegmentRef>),
    /// Submitted to the load pool, resolving to the result and the segment name.
    Pending(JoinHandle<(LakeResult<SegmentRef>, String)>),
}

impl Rowset {
    /// Open every segment listed by the rowset metadata, in metadata order.
    ///
    /// Loads go through the tablet manager's pool when parallel loading is enabled. A load the
    /// pool refuses runs in place instead, so the call never waits for pool capacity. Segments
    /// with zero rows are part of the result.
    ///
    /// Nothing is cached here, see [`Rowset::segments`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, io_options), fields(tablet_id = self.tablet_id(), rowset_id = self.id()))
    )]
    pub async fn load_segments(
        &self,
        io_options: LakeIoOptions,
        fill_metadata_cache: bool,
    ) -> LakeResult<Vec<SegmentRef>> {
        check_current_mem_limit("LoadSegments")?;
        let started = Instant::now();

        let mgr = self.tablet_mgr();
        let config = mgr.config();
        let metadata = self.metadata();

        let has_segment_size = metadata.has_segment_size();
        if !has_segment_size && !metadata.segment_size.is_empty() {
            log::error!(
                "tablet:{} rowset:{} segments size:{} != segment_size size:{}, ignoring recorded sizes",
                self.tablet_id(),
                self.id(),
                metadata.segments.len(),
                metadata.segment_size.len()
            );
        }

        let pool = mgr
            .load_segment_pool()
            .filter(|_| config.enable_load_segment_parallel);
        let mut footer_size_hint = config.footer_size_hint;
        let mut slots = Vec::with_capacity(metadata.segments.len());

        for ((index, name), segment_id) in metadata.segments.iter().enumerate().zip(0u32..) {
            let mut file_info = FileInfo::new(mgr.segment_location(self.tablet_id(), name));
            if let Some(size) = metadata
                .segment_size
                .get(index)
                .filter(|_| has_segment_size)
            {
                file_info = file_info.with_size(*size);
            }
            if !metadata.segment_encryption_metas.is_empty() {
                let Some(meta) = metadata.segment_encryption_metas.get(index) else {
                    lake_bail!(
                        Corruption: "tablet:{} rowset:{} index:{} >= segment_encryption_metas size:{}",
                        self.tablet_id(),
                        self.id(),
                        index,
                        metadata.segment_encryption_metas.len()
                    );
                };
                file_info = file_info.with_encryption_meta(meta.clone());
            }

            if let Some(pool) = pool {
                let task_mgr = mgr.clone();
                let task_info = file_info.clone();
                let task_name = name.clone();
                let tablet_schema = self.tablet_schema().clone();
                let task = async move {
                    let result = task_mgr
                        .load_segment(
                            task_info,
                            segment_id,
                            None,
                            io_options,
                            fill_metadata_cache,
                            tablet_schema,
                        )
                        .await;
                    (result, task_name)
                };
                match pool.try_spawn(task) {
                    Ok(handle) => {
                        slots.push(Slot::Pending(handle));
                        continue;
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to submit load of segment {} to the load pool, loading in place: {e}",
                            file_info.path
                        );
                        mgr.metrics()
                            .counter("lake.rowset.segments.load_serial_fallback")
                            .inc();
                    }
                }
            }

            let result = mgr
                .load_segment(
                    file_info,
                    segment_id,
                    Some(footer_size_hint),
                    io_options,
                    fill_metadata_cache,
                    self.tablet_schema().clone(),
                )
                .await;
            let segment = self.tolerate_lost_segment(result, name)?;
            if let Some(footer_size) = segment.as_ref().and_then(|s| s.footer_size()) {
                footer_size_hint = footer_size;
            }
            slots.push(Slot::Loaded(segment));
        }

        let loaded = mgr.metrics().counter("lake.rowset.segments.loaded");
        let mut segments = Vec::with_capacity(slots.len());
        for slot in slots {
            let segment = match slot {
                Slot::Loaded(segment) => segment,
                Slot::Pending(handle) => {
                    let (result, name) = handle.await?;
                    self.tolerate_lost_segment(result, &name)?
                }
            };
            if let Some(segment) = segment {
                loaded.inc();
                segments.push(segment);
            }
        }
        mgr.metrics()
            .timer("lake.rowset.segments.load_latency")
            .update(started.elapsed());
        Ok(segments)
    }

    fn tolerate_lost_segment(
        &self,
        result: LakeResult<SegmentRef>,
        name: &str,
    ) -> LakeResult<Option<SegmentRef>> {
        match result {
            Ok(segment) => Ok(Some(segment)),
            Err(e) if e.is_not_found() && self.tablet_mgr().config().ignore_lost_segment => {
                log::warn!(
                    "Ignored lost segment {name} of tablet:{} rowset:{}: {e}",
                    self.tablet_id(),
                    self.id()
                );
                self.tablet_mgr()
                    .metrics()
                    .counter("lake.rowset.segments.lost")
                    .inc();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

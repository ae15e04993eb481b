use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use bytes::Bytes;
use lake_error::LakeResult;
use lake_io::{FileInfo, FileSystemRef, FileSystemRegistry, LakeIoOptions, TaskPool};
use lake_metrics::LakeMetrics;
use moka::future::Cache;
use prost::Message;

use crate::config::LakeConfig;
use crate::location::LocationProvider;
use crate::metadata::{TabletMetadataPtr, decode_tablet_metadata};
use crate::overlay::UpdateManager;
use crate::schema::{SchemaRegistry, TabletSchemaRef};
use crate::segments::{
    MokaSegmentCache, SegmentCache, SegmentCacheMetrics, SegmentOpenOptions, SegmentRef,
    SegmentStore,
};

const METADATA_CACHE_CAPACITY: u64 = 1024;

/// Process-wide services shared by every rowset of every tablet.
pub struct TabletManager {
    location_provider: Arc<dyn LocationProvider>,
    segment_store: Arc<dyn SegmentStore>,
    update_mgr: Arc<dyn UpdateManager>,
    load_segment_pool: Option<Arc<dyn TaskPool>>,
    config: LakeConfig,
    metrics: LakeMetrics,
    schemas: SchemaRegistry,
    segment_cache: Arc<dyn SegmentCache>,
    metadata_cache: Cache<(i64, i64), TabletMetadataPtr>,
    file_systems: FileSystemRegistry,
}

impl TabletManager {
    pub fn builder(
        location_provider: Arc<dyn LocationProvider>,
        segment_store: Arc<dyn SegmentStore>,
        update_mgr: Arc<dyn UpdateManager>,
    ) -> TabletManagerBuilder {
        TabletManagerBuilder {
            location_provider,
            segment_store,
            update_mgr,
            load_segment_pool: None,
            config: LakeConfig::default(),
            metrics: LakeMetrics::default(),
            segment_cache: None,
        }
    }

    pub fn tablet_root_location(&self, tablet_id: i64) -> String {
        self.location_provider.root_location(tablet_id)
    }

    pub fn segment_location(&self, tablet_id: i64, segment_name: &str) -> String {
        self.location_provider
            .segment_location(tablet_id, segment_name)
    }

    pub fn metadata_location(&self, tablet_id: i64, version: i64) -> String {
        self.location_provider.metadata_location(tablet_id, version)
    }

    /// Storage backend serving `location`.
    pub fn file_system(&self, location: &str) -> LakeResult<FileSystemRef> {
        self.file_systems.resolve(location)
    }

    pub fn file_systems(&self) -> &FileSystemRegistry {
        &self.file_systems
    }

    pub fn update_mgr(&self) -> &Arc<dyn UpdateManager> {
        &self.update_mgr
    }

    /// Pool for parallel segment loads, if one was configured.
    pub fn load_segment_pool(&self) -> Option<&Arc<dyn TaskPool>> {
        self.load_segment_pool.as_ref()
    }

    pub fn config(&self) -> &LakeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &LakeMetrics {
        &self.metrics
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Open a segment, going through the shared segment cache.
    ///
    /// The opened segment is only added to the cache when `fill_metadata_cache` is set.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, io_options, tablet_schema)))]
    pub async fn load_segment(
        &self,
        file_info: FileInfo,
        segment_id: u32,
        footer_size_hint: Option<u64>,
        io_options: LakeIoOptions,
        fill_metadata_cache: bool,
        tablet_schema: TabletSchemaRef,
    ) -> LakeResult<SegmentRef> {
        if let Some(segment) = self.segment_cache.get(&file_info.path).await? {
            log::debug!("Resolved segment {} from cache", file_info.path);
            return Ok(segment);
        }

        let fs = self.file_system(&file_info.path)?;
        let path = file_info.path.clone();
        let segment = self
            .segment_store
            .open(SegmentOpenOptions {
                fs,
                file_info,
                segment_id,
                footer_size_hint,
                io_options,
                fill_metadata_cache,
                tablet_schema,
            })
            .await?;

        if fill_metadata_cache {
            if let Err(e) = self.segment_cache.put(&path, segment.clone()).await {
                log::warn!("Failed to store segment {path} in cache: {e}");
            }
        }
        Ok(segment)
    }

    /// Load the metadata snapshot of `tablet_id` at `version`.
    pub async fn get_tablet_metadata(
        &self,
        tablet_id: i64,
        version: i64,
    ) -> LakeResult<TabletMetadataPtr> {
        if let Some(metadata) = self.metadata_cache.get(&(tablet_id, version)).await {
            return Ok(metadata);
        }
        let location = self.metadata_location(tablet_id, version);
        let bytes = self
            .file_system(&location)?
            .read(&location)
            .await
            .map_err(|e| e.with_context(format!("reading metadata of tablet {tablet_id}")))?;
        let metadata = decode_tablet_metadata(bytes)?;
        self.metadata_cache
            .insert((tablet_id, version), metadata.clone())
            .await;
        Ok(metadata)
    }

    /// Persist a metadata snapshot. Snapshots are immutable once written.
    pub async fn put_tablet_metadata(&self, metadata: TabletMetadataPtr) -> LakeResult<()> {
        let location = self.metadata_location(metadata.id, metadata.version);
        self.file_system(&location)?
            .write(&location, Bytes::from(metadata.encode_to_vec()))
            .await?;
        self.metadata_cache
            .insert((metadata.id, metadata.version), metadata)
            .await;
        Ok(())
    }
}

impl Debug for TabletManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabletManager")
            .field("config", &self.config)
            .field("has_load_segment_pool", &self.load_segment_pool.is_some())
            .finish()
    }
}

pub struct TabletManagerBuilder {
    location_provider: Arc<dyn LocationProvider>,
    segment_store: Arc<dyn SegmentStore>,
    update_mgr: Arc<dyn UpdateManager>,
    load_segment_pool: Option<Arc<dyn TaskPool>>,
    config: LakeConfig,
    metrics: LakeMetrics,
    segment_cache: Option<Arc<dyn SegmentCache>>,
}

impl TabletManagerBuilder {
    pub fn with_config(mut self, config: LakeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: LakeMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_load_segment_pool(mut self, pool: Arc<dyn TaskPool>) -> Self {
        self.load_segment_pool = Some(pool);
        self
    }

    /// Configure a custom [`SegmentCache`] instead of one sized by the config.
    pub fn with_segment_cache(mut self, segment_cache: Arc<dyn SegmentCache>) -> Self {
        self.segment_cache = Some(segment_cache);
        self
    }

    pub fn build(self) -> Arc<TabletManager> {
        let segment_cache = self.segment_cache.unwrap_or_else(|| {
            Arc::new(SegmentCacheMetrics::new(
                MokaSegmentCache::new(self.config.segment_cache_capacity),
                &self.metrics,
            ))
        });
        Arc::new(TabletManager {
            location_provider: self.location_provider,
            segment_store: self.segment_store,
            update_mgr: self.update_mgr,
            load_segment_pool: self.load_segment_pool,
            config: self.config,
            metrics: self.metrics,
            schemas: SchemaRegistry::default(),
            segment_cache,
            metadata_cache: Cache::new(METADATA_CACHE_CAPACITY),
            file_systems: FileSystemRegistry::default(),
        })
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use lake_error::LakeResult;
use lake_io::DEFAULT_FOOTER_SIZE_HINT;
use lake_metrics::{Counter, LakeMetrics};
use moka::future::{Cache, CacheBuilder};

use super::SegmentRef;

/// A cache of opened segments, keyed by segment path.
#[async_trait]
pub trait SegmentCache: Send + Sync {
    async fn get(&self, path: &str) -> LakeResult<Option<SegmentRef>>;
    async fn put(&self, path: &str, segment: SegmentRef) -> LakeResult<()>;
}

pub struct NoOpSegmentCache;

#[async_trait]
impl SegmentCache for NoOpSegmentCache {
    async fn get(&self, _path: &str) -> LakeResult<Option<SegmentRef>> {
        Ok(None)
    }

    async fn put(&self, _path: &str, _segment: SegmentRef) -> LakeResult<()> {
        Ok(())
    }
}

/// A [`SegmentCache`] based around an in-memory Moka cache.
pub struct MokaSegmentCache(Cache<String, SegmentRef>);

impl MokaSegmentCache {
    pub fn new(max_capacity: u64) -> Self {
        Self(
            CacheBuilder::new(max_capacity)
                .name("lake-segment-cache")
                // An open segment mostly holds its decoded footer.
                .weigher(|_, segment: &SegmentRef| {
                    let footer = segment.footer_size().unwrap_or(DEFAULT_FOOTER_SIZE_HINT);
                    u32::try_from(footer).unwrap_or(u32::MAX)
                })
                .build(),
        )
    }
}

#[async_trait]
impl SegmentCache for MokaSegmentCache {
    async fn get(&self, path: &str) -> LakeResult<Option<SegmentRef>> {
        Ok(self.0.get(path).await)
    }

    async fn put(&self, path: &str, segment: SegmentRef) -> LakeResult<()> {
        self.0.insert(path.to_string(), segment).await;
        Ok(())
    }
}

pub struct SegmentCacheMetrics<C> {
    segment_cache: C,

    hits: Arc<Counter>,
    misses: Arc<Counter>,
    stores: Arc<Counter>,
}

impl<C: SegmentCache> SegmentCacheMetrics<C> {
    pub fn new(segment_cache: C, metrics: &LakeMetrics) -> Self {
        Self {
            segment_cache,
            hits: metrics.counter("lake.segments.cache.hits"),
            misses: metrics.counter("lake.segments.cache.misses"),
            stores: metrics.counter("lake.segments.cache.stores"),
        }
    }
}

#[async_trait]
impl<C: SegmentCache> SegmentCache for SegmentCacheMetrics<C> {
    async fn get(&self, path: &str) -> LakeResult<Option<SegmentRef>> {
        let result = self.segment_cache.get(path).await?;
        if result.is_some() {
            self.hits.inc()
        } else {
            self.misses.inc()
        }
        Ok(result)
    }

    async fn put(&self, path: &str, segment: SegmentRef) -> LakeResult<()> {
        self.segment_cache.put(path, segment).await?;
        self.stores.inc();
        Ok(())
    }
}

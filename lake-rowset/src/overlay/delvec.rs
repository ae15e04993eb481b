use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use arrow_array::BooleanArray;
use async_trait::async_trait;
use lake_error::LakeResult;
use parking_lot::RwLock;
use roaring::RoaringBitmap;

use super::TabletSegmentId;

/// Rows of one segment deleted as of a version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelVector {
    version: i64,
    deletes: RoaringBitmap,
}

pub type DelVectorPtr = Arc<DelVector>;

impl DelVector {
    pub fn new(version: i64, deletes: impl IntoIterator<Item = u32>) -> Self {
        Self {
            version,
            deletes: deletes.into_iter().collect(),
        }
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn cardinality(&self) -> u64 {
        self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
    }

    pub fn is_deleted(&self, row_id: u32) -> bool {
        self.deletes.contains(row_id)
    }

    /// Clear deleted rows from a selection covering the rows starting at `offset_row_id`.
    pub fn apply_to(&self, selection: &BooleanArray, offset_row_id: u32) -> BooleanArray {
        if self.deletes.is_empty() {
            return selection.clone();
        }
        (offset_row_id..)
            .zip(selection.iter())
            .map(|(row_id, keep)| keep.map(|keep| keep && !self.deletes.contains(row_id)))
            .collect()
    }
}

/// The update-management subsystem that owns persisted delete vectors.
#[async_trait]
pub trait UpdateManager: Send + Sync {
    async fn get_del_vec(
        &self,
        tsid: TabletSegmentId,
        version: i64,
        fill_cache: bool,
    ) -> LakeResult<DelVectorPtr>;
}

/// Delete vectors produced by an in-progress metadata update, not yet visible through the
/// [`UpdateManager`].
#[derive(Debug, Default)]
pub struct MetaFileBuilder {
    delvecs: RwLock<HashMap<TabletSegmentId, DelVectorPtr>>,
}

impl MetaFileBuilder {
    pub fn append_delvec(&self, tsid: TabletSegmentId, delvec: DelVector) {
        self.delvecs.write().insert(tsid, Arc::new(delvec));
    }

    pub fn find_delvec(&self, tsid: &TabletSegmentId) -> Option<DelVectorPtr> {
        self.delvecs.read().get(tsid).cloned()
    }
}

/// Resolves the delete vector of a segment on demand.
#[async_trait]
pub trait DelvecLoader: Send + Sync {
    async fn load(&self, tsid: TabletSegmentId, version: i64) -> LakeResult<DelVectorPtr>;
}

/// A [`DelvecLoader`] backed by the tablet's [`UpdateManager`].
///
/// Pending delete vectors of an attached [`MetaFileBuilder`] take precedence over persisted ones.
pub struct LakeDelvecLoader {
    update_mgr: Arc<dyn UpdateManager>,
    builder: Option<Arc<MetaFileBuilder>>,
    fill_cache: bool,
}

impl LakeDelvecLoader {
    pub fn new(
        update_mgr: Arc<dyn UpdateManager>,
        builder: Option<Arc<MetaFileBuilder>>,
        fill_cache: bool,
    ) -> Self {
        Self {
            update_mgr,
            builder,
            fill_cache,
        }
    }

    pub fn fill_cache(&self) -> bool {
        self.fill_cache
    }
}

#[async_trait]
impl DelvecLoader for LakeDelvecLoader {
    async fn load(&self, tsid: TabletSegmentId, version: i64) -> LakeResult<DelVectorPtr> {
        if let Some(delvec) = self.builder.as_ref().and_then(|b| b.find_delvec(&tsid)) {
            return Ok(delvec);
        }
        self.update_mgr
            .get_del_vec(tsid, version, self.fill_cache)
            .await
    }
}

impl Debug for LakeDelvecLoader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LakeDelvecLoader")
            .field("has_builder", &self.builder.is_some())
            .field("fill_cache", &self.fill_cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyUpdateManager;

    #[async_trait]
    impl UpdateManager for EmptyUpdateManager {
        async fn get_del_vec(
            &self,
            _tsid: TabletSegmentId,
            version: i64,
            _fill_cache: bool,
        ) -> LakeResult<DelVectorPtr> {
            Ok(Arc::new(DelVector::new(version, [])))
        }
    }

    #[test]
    fn apply_to_respects_offset() {
        let dv = DelVector::new(1, [3, 5]);
        let all = BooleanArray::from(vec![true; 3]);
        assert_eq!(dv.apply_to(&all, 0), BooleanArray::from(vec![true, true, true]));
        assert_eq!(dv.apply_to(&all, 1), BooleanArray::from(vec![true, true, false]));
        assert_eq!(dv.apply_to(&all, 3), BooleanArray::from(vec![false, true, false]));
        assert_eq!(dv.apply_to(&all, 4), BooleanArray::from(vec![true, false, true]));
    }

    #[tokio::test]
    async fn builder_takes_precedence() {
        let builder = Arc::new(MetaFileBuilder::default());
        let tsid = TabletSegmentId::for_segment(10, 4, 1);
        builder.append_delvec(tsid, DelVector::new(9, [0]));

        let loader = LakeDelvecLoader::new(Arc::new(EmptyUpdateManager), Some(builder), true);
        assert_eq!(loader.load(tsid, 3).await.unwrap().version(), 9);
        let other = TabletSegmentId::for_segment(10, 4, 2);
        assert_eq!(loader.load(other, 3).await.unwrap().version(), 3);
        assert!(loader.load(other, 3).await.unwrap().is_empty());
    }
}

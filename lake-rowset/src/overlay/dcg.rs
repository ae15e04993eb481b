use std::sync::Arc;

use async_trait::async_trait;
use lake_error::{LakeResult, lake_bail};

use super::TabletSegmentId;
use crate::metadata::TabletMetadataPtr;

/// Updated values of some columns of a segment, written at `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaColumnGroup {
    version: i64,
    column_file: String,
    column_ids: Vec<u32>,
}

impl DeltaColumnGroup {
    pub fn new(version: i64, column_file: impl Into<String>, column_ids: Vec<u32>) -> Self {
        Self {
            version,
            column_file: column_file.into(),
            column_ids,
        }
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn column_file(&self) -> &str {
        &self.column_file
    }

    /// Unique ids of the updated columns.
    pub fn column_ids(&self) -> &[u32] {
        &self.column_ids
    }
}

/// Delta column groups of one segment, newest first.
pub type DeltaColumnGroupList = Vec<Arc<DeltaColumnGroup>>;

/// Resolves the delta column groups of a segment on demand.
#[async_trait]
pub trait DeltaColumnGroupLoader: Send + Sync {
    async fn load(&self, tsid: TabletSegmentId, version: i64) -> LakeResult<DeltaColumnGroupList>;
}

/// A [`DeltaColumnGroupLoader`] reading the groups recorded in a tablet metadata snapshot.
///
/// A loader without a snapshot knows of no groups.
#[derive(Debug, Clone, Default)]
pub struct LakeDeltaColumnGroupLoader {
    tablet_metadata: Option<TabletMetadataPtr>,
}

impl LakeDeltaColumnGroupLoader {
    pub fn new(tablet_metadata: Option<TabletMetadataPtr>) -> Self {
        Self { tablet_metadata }
    }
}

#[async_trait]
impl DeltaColumnGroupLoader for LakeDeltaColumnGroupLoader {
    async fn load(&self, tsid: TabletSegmentId, version: i64) -> LakeResult<DeltaColumnGroupList> {
        let Some(metadata) = &self.tablet_metadata else {
            return Ok(Vec::new());
        };
        if metadata.id != tsid.tablet_id {
            lake_bail!(
                InvalidArgument: "delta column groups of tablet {} requested from metadata of tablet {}",
                tsid.tablet_id,
                metadata.id
            );
        }
        let Some(dcg_ver) = metadata
            .dcg_meta
            .as_ref()
            .and_then(|meta| meta.dcgs.get(&tsid.segment_id))
        else {
            return Ok(Vec::new());
        };

        let mut groups: DeltaColumnGroupList = dcg_ver
            .versions
            .iter()
            .enumerate()
            .filter(|(_, v)| **v <= version)
            .map(|(idx, v)| {
                let column_file = dcg_ver.column_files.get(idx).cloned().unwrap_or_default();
                let column_ids = dcg_ver
                    .unique_column_ids
                    .get(idx)
                    .map(|ids| ids.column_ids.clone())
                    .unwrap_or_default();
                Arc::new(DeltaColumnGroup::new(*v, column_file, column_ids))
            })
            .collect();
        groups.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::metadata::{
        DeltaColumnGroupColumnIdsPb, DeltaColumnGroupMetadataPb, DeltaColumnGroupVerPb,
        TabletMetadataPb,
    };

    fn metadata() -> TabletMetadataPtr {
        let ver = DeltaColumnGroupVerPb {
            column_files: vec!["v2.cols".into(), "v5.cols".into(), "v8.cols".into()],
            unique_column_ids: vec![
                DeltaColumnGroupColumnIdsPb {
                    column_ids: vec![1],
                },
                DeltaColumnGroupColumnIdsPb {
                    column_ids: vec![2],
                },
                DeltaColumnGroupColumnIdsPb {
                    column_ids: vec![1, 2],
                },
            ],
            versions: vec![2, 5, 8],
        };
        Arc::new(TabletMetadataPb {
            id: 10,
            dcg_meta: Some(DeltaColumnGroupMetadataPb {
                dcgs: HashMap::from([(4, ver)]),
            }),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn groups_up_to_version_newest_first() {
        let loader = LakeDeltaColumnGroupLoader::new(Some(metadata()));
        let groups = loader.load(TabletSegmentId::new(10, 4), 6).await.unwrap();
        let versions: Vec<_> = groups.iter().map(|g| g.version()).collect();
        assert_eq!(versions, vec![5, 2]);
        assert_eq!(groups[0].column_file(), "v5.cols");
        assert_eq!(groups[0].column_ids(), &[2]);
    }

    #[tokio::test]
    async fn unbound_or_unknown_segment_is_empty() {
        let unbound = LakeDeltaColumnGroupLoader::default();
        assert!(unbound.load(TabletSegmentId::new(10, 4), 9).await.unwrap().is_empty());

        let loader = LakeDeltaColumnGroupLoader::new(Some(metadata()));
        assert!(loader.load(TabletSegmentId::new(10, 5), 9).await.unwrap().is_empty());
        assert!(loader.load(TabletSegmentId::new(11, 4), 9).await.is_err());
    }
}

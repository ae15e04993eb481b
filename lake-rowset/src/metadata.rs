//! Persisted tablet metadata records.
//!
//! A tablet's state at a version is one immutable [`TabletMetadataPb`] snapshot. New states are
//! published as new snapshots, so a [`TabletMetadataPtr`] may be shared freely by every rowset
//! built from it.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use bytes::Bytes;
use lake_error::{LakeResult, lake_bail};
use prost::Message;

#[derive(Clone, PartialEq, Eq, Message)]
pub struct TabletMetadataPb {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub version: i64,
    #[prost(message, optional, tag = "3")]
    pub schema: Option<TabletSchemaPb>,
    #[prost(message, repeated, tag = "4")]
    pub rowsets: Vec<RowsetMetadataPb>,
    #[prost(uint32, tag = "5")]
    pub next_rowset_id: u32,
    /// Schema id of every rowset not written with the current schema, keyed by rowset id.
    #[prost(map = "uint32, int64", tag = "6")]
    pub rowset_to_schema: HashMap<u32, i64>,
    /// Every schema still referenced by a live rowset, keyed by schema id.
    #[prost(map = "int64, message", tag = "7")]
    pub historical_schemas: HashMap<i64, TabletSchemaPb>,
    #[prost(message, optional, tag = "8")]
    pub dcg_meta: Option<DeltaColumnGroupMetadataPb>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct RowsetMetadataPb {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// Whether segments may hold overlapping key ranges.
    #[prost(bool, tag = "2")]
    pub overlapped: bool,
    #[prost(string, repeated, tag = "3")]
    pub segments: Vec<String>,
    #[prost(int64, tag = "4")]
    pub num_rows: i64,
    #[prost(int64, tag = "5")]
    pub data_size: i64,
    /// Byte size of each segment. Absent in records written before sizes were tracked.
    #[prost(uint64, repeated, tag = "6")]
    pub segment_size: Vec<u64>,
    #[prost(bytes = "bytes", repeated, tag = "7")]
    pub segment_encryption_metas: Vec<Bytes>,
    #[prost(int64, tag = "8")]
    pub version: i64,
}

impl RowsetMetadataPb {
    /// Recorded sizes are only trusted when there is exactly one per segment.
    pub fn has_segment_size(&self) -> bool {
        self.segment_size.len() == self.segments.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum KeysTypePb {
    DupKeys = 0,
    UniqueKeys = 1,
    AggKeys = 2,
    PrimaryKeys = 3,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct TabletSchemaPb {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(enumeration = "KeysTypePb", tag = "2")]
    pub keys_type: i32,
    #[prost(message, repeated, tag = "3")]
    pub column: Vec<ColumnPb>,
    #[prost(int32, tag = "4")]
    pub num_short_key_columns: i32,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct ColumnPb {
    #[prost(int32, tag = "1")]
    pub unique_id: i32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub r#type: String,
    #[prost(bool, tag = "4")]
    pub is_key: bool,
    #[prost(bool, tag = "5")]
    pub is_nullable: bool,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct DeltaColumnGroupMetadataPb {
    /// Delta column groups keyed by segment id.
    #[prost(map = "uint32, message", tag = "1")]
    pub dcgs: HashMap<u32, DeltaColumnGroupVerPb>,
}

/// Every delta column group written for one segment, index-aligned across fields.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct DeltaColumnGroupVerPb {
    #[prost(string, repeated, tag = "1")]
    pub column_files: Vec<String>,
    #[prost(message, repeated, tag = "2")]
    pub unique_column_ids: Vec<DeltaColumnGroupColumnIdsPb>,
    #[prost(int64, repeated, tag = "3")]
    pub versions: Vec<i64>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct DeltaColumnGroupColumnIdsPb {
    #[prost(uint32, repeated, tag = "1")]
    pub column_ids: Vec<u32>,
}

/// An immutable, shared tablet metadata snapshot.
pub type TabletMetadataPtr = Arc<TabletMetadataPb>;

/// Decode a serialized tablet metadata snapshot.
pub fn decode_tablet_metadata(bytes: Bytes) -> LakeResult<TabletMetadataPtr> {
    Ok(Arc::new(TabletMetadataPb::decode(bytes)?))
}

/// A handle to one rowset record.
///
/// The record either lives inside a shared tablet snapshot, addressed by index, or stands alone
/// for callers that assembled it outside of any snapshot.
#[derive(Debug, Clone)]
pub enum RowsetMetadataRef {
    Tablet {
        metadata: TabletMetadataPtr,
        index: usize,
    },
    Standalone(Arc<RowsetMetadataPb>),
}

impl RowsetMetadataRef {
    pub fn in_tablet(metadata: TabletMetadataPtr, index: usize) -> LakeResult<Self> {
        if index >= metadata.rowsets.len() {
            lake_bail!(
                InvalidArgument: "rowset index {} out of range for tablet {} with {} rowsets",
                index,
                metadata.id,
                metadata.rowsets.len()
            );
        }
        Ok(Self::Tablet { metadata, index })
    }

    /// The owning tablet snapshot, if any.
    pub fn tablet_metadata(&self) -> Option<&TabletMetadataPtr> {
        match self {
            Self::Tablet { metadata, .. } => Some(metadata),
            Self::Standalone(_) => None,
        }
    }
}

impl From<RowsetMetadataPb> for RowsetMetadataRef {
    fn from(value: RowsetMetadataPb) -> Self {
        Self::Standalone(Arc::new(value))
    }
}

impl Deref for RowsetMetadataRef {
    type Target = RowsetMetadataPb;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Tablet { metadata, index } => &metadata.rowsets[*index],
            Self::Standalone(rowset) => rowset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_roundtrips_through_protobuf() {
        let metadata = TabletMetadataPb {
            id: 10,
            version: 3,
            rowsets: vec![RowsetMetadataPb {
                id: 1,
                segments: vec!["a.dat".to_string(), "b.dat".to_string()],
                segment_size: vec![100],
                ..Default::default()
            }],
            rowset_to_schema: HashMap::from([(1, 7)]),
            ..Default::default()
        };
        let decoded = decode_tablet_metadata(Bytes::from(metadata.encode_to_vec())).unwrap();
        assert_eq!(*decoded, metadata);
        assert!(!decoded.rowsets[0].has_segment_size());
    }

    #[test]
    fn rowset_ref_checks_bounds() {
        let metadata = Arc::new(TabletMetadataPb {
            id: 10,
            rowsets: vec![RowsetMetadataPb {
                id: 4,
                ..Default::default()
            }],
            ..Default::default()
        });
        let rowset = RowsetMetadataRef::in_tablet(metadata.clone(), 0).unwrap();
        assert_eq!(rowset.id, 4);
        assert!(rowset.tablet_metadata().is_some());
        assert!(RowsetMetadataRef::in_tablet(metadata, 1).is_err());
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(decode_tablet_metadata(Bytes::from_static(&[0xff, 0xff, 0xff])).is_err());
    }
}

//! Primary-key overlay: delete vectors and delta column groups.
//!
//! Segments are immutable. Deletes and partial column updates that happen after a rowset was
//! written are recorded per segment and version, and applied by the segment reader at read time
//! through the loaders defined here. Loaders are cheap identity bindings; nothing is fetched until
//! a segment reader asks.

mod dcg;
mod delvec;

pub use dcg::*;
pub use delvec::*;

/// Identifies a segment across the whole tablet.
///
/// Segment ids are allocated contiguously per rowset: the rowset id plus the segment's ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabletSegmentId {
    pub tablet_id: i64,
    pub segment_id: u32,
}

impl TabletSegmentId {
    pub fn new(tablet_id: i64, segment_id: u32) -> Self {
        Self {
            tablet_id,
            segment_id,
        }
    }

    /// Segment ids wrap around at `u32::MAX`.
    pub fn for_segment(tablet_id: i64, rowset_id: u32, ordinal: u32) -> Self {
        Self::new(tablet_id, rowset_id.wrapping_add(ordinal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_ids_follow_rowset_id() {
        assert_eq!(TabletSegmentId::for_segment(10, 4, 2), TabletSegmentId::new(10, 6));
        assert_eq!(
            TabletSegmentId::for_segment(10, u32::MAX, 2),
            TabletSegmentId::new(10, 1)
        );
    }
}

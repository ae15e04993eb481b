use std::ops::Range;

use arrow_array::BooleanArray;
use itertools::Itertools;

/// A sorted set of disjoint, non-adjacent, half-open row id ranges within one segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRanges(Vec<Range<u32>>);

impl RowRanges {
    pub fn new(ranges: impl IntoIterator<Item = Range<u32>>) -> Self {
        let mut ranges: Vec<_> = ranges.into_iter().filter(|r| !r.is_empty()).collect();
        ranges.sort_by_key(|r| r.start);
        Self(
            ranges
                .into_iter()
                .coalesce(|a, b| {
                    if b.start <= a.end {
                        Ok(a.start..a.end.max(b.end))
                    } else {
                        Err((a, b))
                    }
                })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ranges(&self) -> &[Range<u32>] {
        &self.0
    }

    /// Number of rows covered.
    pub fn span_size(&self) -> u64 {
        self.0.iter().map(|r| u64::from(r.end - r.start)).sum()
    }

    pub fn contains(&self, row: u32) -> bool {
        let idx = self.0.partition_point(|r| r.end <= row);
        self.0.get(idx).is_some_and(|r| r.start <= row)
    }

    /// Restrict to the rows in `bounds`.
    pub fn intersect(&self, bounds: Range<u32>) -> Self {
        Self(
            self.0
                .iter()
                .map(|r| r.start.max(bounds.start)..r.end.min(bounds.end))
                .filter(|r| !r.is_empty())
                .collect(),
        )
    }

    /// Selection mask for the `len` rows starting at row id `offset`.
    pub fn selection(&self, offset: u32, len: usize) -> BooleanArray {
        (0..len)
            .map(|i| {
                u32::try_from(i)
                    .ok()
                    .and_then(|i| offset.checked_add(i))
                    .is_some_and(|row| self.contains(row))
            })
            .map(Some)
            .collect()
    }
}

impl FromIterator<Range<u32>> for RowRanges {
    fn from_iter<T: IntoIterator<Item = Range<u32>>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_sorted_and_coalesced() {
        let ranges = RowRanges::new([10..20, 0..5, 5..7, 15..30, 40..40]);
        assert_eq!(ranges.ranges(), &[0..7, 10..30]);
        assert_eq!(ranges.span_size(), 27);
    }

    #[test]
    fn membership_and_intersection() {
        let ranges: RowRanges = [2..4, 8..10].into_iter().collect();
        assert!(ranges.contains(3));
        assert!(!ranges.contains(4));
        assert!(ranges.contains(8));
        assert_eq!(ranges.intersect(3..9).ranges(), &[3..4, 8..9]);
        assert!(ranges.intersect(4..8).is_empty());
    }

    #[test]
    fn selection_is_relative_to_offset() {
        let ranges = RowRanges::new([2..4]);
        assert_eq!(
            ranges.selection(1, 4),
            BooleanArray::from(vec![false, true, true, false])
        );
    }
}

#![deny(missing_docs)]
//! Lake read path metrics

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use witchcraft_metrics::{Metric, MetricRegistry, Metrics, MetricsIter};

/// A metric registry for reader statistics.
///
/// Cloning is cheap: clones share the same underlying registry, so a handle can be stored in
/// read options and the counters observed by whoever created it.
#[derive(Default, Clone)]
pub struct LakeMetrics {
    registry: Arc<MetricRegistry>,
    default_tags: Arc<DefaultTags>,
}

// re-export exposed metric types
pub use witchcraft_metrics::{Counter, MetricId, Timer};

/// Default tags for metrics used in [`LakeMetrics`].
#[derive(Default)]
pub struct DefaultTags(BTreeMap<Cow<'static, str>, Cow<'static, str>>);

impl<K, V> From<&[(K, V)]> for DefaultTags
where
    K: Clone + Into<Cow<'static, str>>,
    V: Clone + Into<Cow<'static, str>>,
{
    fn from(pairs: &[(K, V)]) -> Self {
        DefaultTags(
            pairs
                .iter()
                .map(|(k, v)| (k.clone().into(), v.clone().into()))
                .collect(),
        )
    }
}

impl LakeMetrics {
    /// Create an empty metric registry with default tags.
    pub fn default_with_tags(default_tags: impl Into<DefaultTags>) -> Self {
        Self {
            registry: Arc::new(MetricRegistry::default()),
            default_tags: Arc::new(default_tags.into()),
        }
    }

    /// Returns the counter with the specified ID, creating a default instance if absent.
    ///
    /// # Panics
    ///
    /// Panics if a metric is registered with the ID that is not a counter.
    pub fn counter<T>(&self, id: T) -> Arc<Counter>
    where
        T: Into<MetricId>,
    {
        self.registry.counter(id)
    }

    /// The latency timer named `id`, e.g. `lake.rowset.segments.load_latency`.
    ///
    /// # Panics
    ///
    /// Panics if `id` names a metric of another kind.
    pub fn timer<T>(&self, id: T) -> Arc<Timer>
    where
        T: Into<MetricId>,
    {
        self.registry.timer(id)
    }

    /// Returns a snapshot of the metrics in the registry.
    ///
    /// Modifications to the registry after this method is called will not affect the state of the returned `MetricsSnapshot`.
    pub fn metrics(&self) -> MetricsSnapshot<'_> {
        MetricsSnapshot {
            snapshot: self.registry.metrics(),
            default_tags: &self.default_tags,
        }
    }
}

/// A snapshot of the metrics in a registry with default tags.
pub struct MetricsSnapshot<'a> {
    snapshot: Metrics,
    default_tags: &'a DefaultTags,
}

impl MetricsSnapshot<'_> {
    /// Create an iterator over the metrics snapshot.
    pub fn iter(&self) -> LakeMetricsIter<'_> {
        LakeMetricsIter {
            iter: self.snapshot.iter(),
            default_tags: self.default_tags,
        }
    }
}

/// Metrics Iterator that applies the default tags to each metric in the inner iterator.
pub struct LakeMetricsIter<'a> {
    iter: MetricsIter<'a>,
    default_tags: &'a DefaultTags,
}

impl<'a> Iterator for LakeMetricsIter<'a> {
    type Item = (MetricId, &'a Metric);

    #[inline]
    fn next(&mut self) -> Option<(MetricId, &'a Metric)> {
        self.iter.next().map(|(k, v)| {
            let mut metric_id = k.clone();
            for (tag_key, tag_value) in self.default_tags.0.iter() {
                metric_id = metric_id.with_tag(tag_key.clone(), tag_value.clone())
            }

            (metric_id, v)
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = LakeMetrics::default();
        let other = metrics.clone();
        other.counter("lake.rowset.segments.read").add(3);
        assert_eq!(metrics.counter("lake.rowset.segments.read").count(), 3);
    }

    #[test]
    fn timers_record_durations() {
        let metrics = LakeMetrics::default();
        let timer = metrics.timer("lake.rowset.segments.load_latency");
        timer.update(std::time::Duration::from_millis(3));
        timer.update(std::time::Duration::from_millis(5));
        assert_eq!(metrics.timer("lake.rowset.segments.load_latency").count(), 2);
    }

    #[test]
    fn snapshot_applies_default_tags() {
        let metrics = LakeMetrics::default_with_tags([("tablet", "10")].as_slice());
        metrics.counter("lake.rowset.segments.loaded").inc();
        let (id, _) = metrics.metrics().iter().next().unwrap();
        assert_eq!(id.name(), "lake.rowset.segments.loaded");
    }
}

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lake_error::{LakeResult, lake_bail};

tokio::task_local! {
    static CURRENT_TRACKER: Arc<MemTracker>;
}

/// Tracks the memory consumption of a query or load against an optional limit.
#[derive(Debug)]
pub struct MemTracker {
    label: String,
    limit: Option<u64>,
    consumption: AtomicU64,
}

impl MemTracker {
    pub fn new(label: impl Into<String>, limit: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            limit,
            consumption: AtomicU64::new(0),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn consume(&self, bytes: u64) {
        self.consumption.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn release(&self, bytes: u64) {
        // Saturate rather than wrap if releases outnumber consumption.
        let _ = self
            .consumption
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(c.saturating_sub(bytes))
            });
    }

    pub fn consumption(&self) -> u64 {
        self.consumption.load(Ordering::Relaxed)
    }

    pub fn limit_exceeded(&self) -> bool {
        self.limit.is_some_and(|limit| self.consumption() > limit)
    }

    /// Fail with a resource-exhausted error if the limit is exceeded.
    pub fn check_mem_limit(&self, msg: &str) -> LakeResult<()> {
        if let Some(limit) = self.limit.filter(|_| self.limit_exceeded()) {
            lake_bail!(
                ResourceExhausted: "{}: memory limit of {} exceeded, consumption {} > limit {}",
                msg,
                self.label,
                self.consumption(),
                limit
            );
        }
        Ok(())
    }

    /// Run `fut` with `tracker` installed as the tracker of the calling context.
    pub async fn scope<F: Future>(tracker: Arc<MemTracker>, fut: F) -> F::Output {
        CURRENT_TRACKER.scope(tracker, fut).await
    }

    /// The tracker of the calling context, if one is installed.
    pub fn current() -> Option<Arc<MemTracker>> {
        CURRENT_TRACKER.try_with(Arc::clone).ok()
    }
}

/// Check the memory limit of the calling context. Passes when no tracker is installed.
pub fn check_current_mem_limit(msg: &str) -> LakeResult<()> {
    match MemTracker::current() {
        Some(tracker) => tracker.check_mem_limit(msg),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_saturates() {
        let tracker = MemTracker::new("query", Some(10));
        tracker.consume(4);
        tracker.release(6);
        assert_eq!(tracker.consumption(), 0);
    }

    #[tokio::test]
    async fn scoped_tracker_is_checked() {
        assert!(check_current_mem_limit("LoadSegments").is_ok());

        let tracker = MemTracker::new("query", Some(10));
        tracker.consume(11);
        let result = MemTracker::scope(tracker.clone(), async {
            check_current_mem_limit("LoadSegments")
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.is_resource_exhausted());
        assert!(err.to_string().contains("LoadSegments: memory limit of query exceeded"));

        tracker.release(5);
        let result = MemTracker::scope(tracker, async { check_current_mem_limit("x") }).await;
        assert!(result.is_ok());
    }
}

use std::sync::Arc;

use futures::future::BoxFuture;
use lake_error::{LakeResult, lake_err};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use super::TaskPool;

/// A [pool][TaskPool] that spawns onto an existing Tokio runtime, bounding the number of tasks
/// in flight.
#[derive(Debug, Clone)]
pub struct HandlePool {
    handle: Handle,
    permits: Arc<Semaphore>,
}

impl HandlePool {
    pub fn new(handle: Handle, max_in_flight: usize) -> Self {
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// A pool on the runtime of the calling context.
    pub fn current(max_in_flight: usize) -> LakeResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| lake_err!("HandlePool requires a Tokio runtime: {e}"))?;
        Ok(Self::new(handle, max_in_flight))
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl TaskPool for HandlePool {
    fn try_submit(&self, task: BoxFuture<'static, ()>) -> LakeResult<()> {
        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|e| lake_err!("pool rejected task: {e}"))?;
        self.handle.spawn(async move {
            task.await;
            drop(permit);
        });
        Ok(())
    }
}

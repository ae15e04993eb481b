mod handle;
mod tokio;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use lake_error::{LakeResult, lake_err};

pub use self::handle::*;
pub use self::tokio::*;

/// A bounded pool that may refuse work.
///
/// Unlike a runtime's `spawn`, submission fails immediately when the pool has no room, leaving
/// the caller free to run the work itself.
pub trait TaskPool: Send + Sync {
    /// Submit a task for execution, failing if the pool cannot accept it right now.
    fn try_submit(&self, task: BoxFuture<'static, ()>) -> LakeResult<()>;
}

/// Extension methods for [`TaskPool`]s.
pub trait TaskPoolExt: TaskPool {
    /// Submit a future and obtain a handle to its output.
    fn try_spawn<F, R>(&self, fut: F) -> LakeResult<JoinHandle<R>>
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.try_submit(
            async move {
                tx.send(fut.await).ok();
            }
            .boxed(),
        )?;
        Ok(JoinHandle(rx))
    }
}

impl<P: TaskPool + ?Sized> TaskPoolExt for P {}

/// Resolves to the output of a task submitted through [`TaskPoolExt::try_spawn`].
///
/// Resolves to an error if the task was dropped without completing, e.g. because it panicked or
/// its pool shut down.
#[derive(Debug)]
pub struct JoinHandle<R>(oneshot::Receiver<R>);

impl<R> Future for JoinHandle<R> {
    type Output = LakeResult<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0
            .poll_unpin(cx)
            .map(|result| result.map_err(|_| lake_err!("task dropped before completion")))
    }
}

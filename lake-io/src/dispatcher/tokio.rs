use std::fmt::{self, Debug, Formatter};
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::thread::JoinHandle;

use futures::FutureExt;
use futures::future::BoxFuture;
use lake_error::{LakeResult, lake_bail, lake_err};

use super::TaskPool;

/// A [pool][TaskPool] of worker threads, each driving its own Tokio `current_thread` runtime.
///
/// Each worker runs one task at a time. At most `queue_capacity` further tasks wait for a free
/// worker; beyond that, submission is rejected.
pub struct DispatchPool {
    name: String,
    submitter: flume::Sender<BoxFuture<'static, ()>>,
    threads: Vec<JoinHandle<()>>,
}

impl DispatchPool {
    pub fn new(name: &str, num_threads: usize, queue_capacity: usize) -> LakeResult<Self> {
        let (submitter, rx) = flume::bounded(queue_capacity);
        let threads = (0..num_threads)
            .map(|tid| {
                let rx: flume::Receiver<BoxFuture<'static, ()>> = rx.clone();
                let thread_name = format!("{name}-{tid}");
                std::thread::Builder::new()
                    .name(thread_name.clone())
                    .spawn(move || worker(thread_name, rx))
                    .map_err(|e| lake_err!(Context: "spawning pool worker", e.into()))
            })
            .collect::<LakeResult<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            submitter,
            threads,
        })
    }

    /// Gracefully shutdown the pool, consuming it.
    ///
    /// Queued tasks are run before the workers exit.
    pub fn shutdown(self) -> LakeResult<()> {
        drop(self.submitter);
        for thread in self.threads {
            thread.join().unwrap_or_else(|err| resume_unwind(err));
        }
        Ok(())
    }
}

fn worker(thread_name: String, rx: flume::Receiver<BoxFuture<'static, ()>>) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("{thread_name}: failed to build runtime: {e}");
            return;
        }
    };

    rt.block_on(async move {
        while let Ok(task) = rx.recv_async().await {
            // A panicking task drops its result sender, which its JoinHandle reports as an error.
            if AssertUnwindSafe(task).catch_unwind().await.is_err() {
                log::error!("{thread_name}: task panicked");
            }
        }
    });
}

impl TaskPool for DispatchPool {
    fn try_submit(&self, task: BoxFuture<'static, ()>) -> LakeResult<()> {
        match self.submitter.try_send(task) {
            Ok(()) => Ok(()),
            Err(flume::TrySendError::Full(_)) => {
                lake_bail!("pool {} rejected task: queue is full", self.name)
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                lake_bail!("pool {} rejected task: pool is shut down", self.name)
            }
        }
    }
}

impl Debug for DispatchPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchPool")
            .field("name", &self.name)
            .field("threads", &self.threads.len())
            .finish()
    }
}

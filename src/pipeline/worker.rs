use std::future::Future;
use std::pin::Pin;

use anyhow::{Result, anyhow};
use async_channel::Sender;
use tokio::task::JoinHandle;
use tracing::trace;

pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A fixed-size pool of execution units draining a shared task queue.
///
/// The queue holds at most one task, so submission blocks while every worker
/// is busy; that is the backpressure between the diff producer and the
/// executors. `close()` guarantees every submitted task runs before the
/// workers are joined.
pub struct WorkerPool {
    sender: Sender<Task>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(worker_size: usize) -> Self {
        let (sender, receiver) = async_channel::bounded::<Task>(1);

        let workers = (0..worker_size)
            .map(|worker| {
                let receiver = receiver.clone();
                tokio::spawn(async move {
                    trace!(worker = worker, "worker has started.");
                    while let Ok(task) = receiver.recv().await {
                        task.await;
                    }
                    trace!(worker = worker, "worker has been finished.");
                })
            })
            .collect();

        Self { sender, workers }
    }

    pub async fn submit(&self, task: Task) -> Result<()> {
        self.sender
            .send(task)
            .await
            .map_err(|_| anyhow!("async_channel::Sender::send() failed."))
    }

    /// Closes the queue and joins every worker. Tasks already submitted are
    /// drained before the workers exit.
    pub async fn close(self) {
        self.sender.close();
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

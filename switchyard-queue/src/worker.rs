//! Worker running consumer loops over a [`JobQueue`].

use crate::error::{QueueError, QueueResult};
use crate::queue::JobQueue;
use futures::StreamExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Job handler function type.
pub type JobHandler = Arc<dyn Fn(String) -> BoxFuture<'static, QueueResult<()>> + Send + Sync>;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of independent consumer loops
    pub concurrency: usize,

    /// Pause before re-opening a consumer after a store error
    pub restart_delay: Duration,

    /// Whether to log job execution
    pub log_execution: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            restart_delay: Duration::from_secs(1),
            log_execution: true,
        }
    }
}

/// Worker that hands every consumed job id to a handler.
///
/// Each loop is an independent competing consumer. Stopping the worker
/// cancels the loops cooperatively, so a job being handled is allowed to
/// finish.
pub struct Worker {
    queue: JobQueue,
    handler: JobHandler,
    config: WorkerConfig,
    cancel: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
}

impl Worker {
    /// Create a new worker.
    pub fn new<F, Fut>(queue: JobQueue, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueueResult<()>> + Send + 'static,
    {
        Self::with_config(queue, handler, WorkerConfig::default())
    }

    /// Create a worker with custom configuration.
    pub fn with_config<F, Fut>(queue: JobQueue, handler: F, config: WorkerConfig) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueueResult<()>> + Send + 'static,
    {
        let handler: JobHandler = Arc::new(
            move |job_id: String| -> BoxFuture<'static, QueueResult<()>> {
                Box::pin(handler(job_id))
            },
        );
        Self {
            queue,
            handler,
            config,
            cancel: None,
            handles: Vec::new(),
        }
    }

    /// Start the consumer loops.
    pub fn start(&mut self) -> QueueResult<()> {
        if self.cancel.is_some() {
            return Err(QueueError::WorkerAlreadyRunning);
        }

        let cancel = CancellationToken::new();
        info!(
            queue = %self.queue.config().queue_name,
            concurrency = self.config.concurrency,
            "Starting worker"
        );

        for i in 0..self.config.concurrency.max(1) {
            let queue = self.queue.clone();
            let handler = self.handler.clone();
            let config = self.config.clone();
            let cancel = cancel.clone();

            self.handles.push(tokio::spawn(async move {
                run_loop(i, queue, handler, config, cancel).await;
            }));
        }

        self.cancel = Some(cancel);
        Ok(())
    }

    /// Stop the worker and wait for every loop to finish its current job.
    pub async fn stop(&mut self) -> QueueResult<()> {
        let cancel = self.cancel.take().ok_or(QueueError::WorkerNotRunning)?;
        info!(queue = %self.queue.config().queue_name, "Stopping worker");
        cancel.cancel();

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker loop panicked");
            }
        }

        info!(queue = %self.queue.config().queue_name, "Worker stopped");
        Ok(())
    }

    /// Check if the worker is running.
    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }
}

async fn run_loop(
    index: usize,
    queue: JobQueue,
    handler: JobHandler,
    config: WorkerConfig,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        let mut jobs = queue.consume_jobs(cancel.clone());

        while let Some(next) = jobs.next().await {
            match next {
                Ok(job_id) => {
                    if config.log_execution {
                        debug!(worker = index, job_id = %job_id, "Processing job");
                    }

                    match handler(job_id.clone()).await {
                        Ok(()) => {
                            if config.log_execution {
                                debug!(worker = index, job_id = %job_id, "Job completed");
                            }
                        }
                        Err(e) => {
                            error!(worker = index, job_id = %job_id, error = %e, "Job failed");
                        }
                    }
                }
                Err(e) => {
                    error!(worker = index, error = %e, "Error consuming jobs");
                }
            }
        }

        // The stream only ends early on a store error.
        if !cancel.is_cancelled() {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(config.restart_delay) => {}
            }
        }
    }

    debug!(worker = index, "Worker loop stopped");
}

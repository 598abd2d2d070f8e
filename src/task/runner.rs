//! Cron runner for scheduled tasks.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};

use super::{CollectMetricsTask, TaskError};
use crate::collector::DatabaseCollector;

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Metadata about a registered job.
#[derive(Debug, Clone)]
pub struct JobInfo {
    /// Job UUID.
    pub id: uuid::Uuid,
    /// Task name.
    pub name: String,
    /// Cron expression.
    pub schedule: String,
}

/// Runs tasks on cron schedules.
///
/// Uses `tokio-cron-scheduler`. Task errors are logged and never stop the
/// scheduler.
pub struct TaskRunner {
    scheduler: JobScheduler,
    jobs: Arc<RwLock<HashMap<uuid::Uuid, JobInfo>>>,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field(
                "job_count",
                &self.jobs.try_read().map(|j| j.len()).unwrap_or(0),
            )
            .finish_non_exhaustive()
    }
}

impl TaskRunner {
    /// Create a new runner.
    pub async fn new() -> Result<Self, TaskError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| TaskError::Scheduler(e.to_string()))?;

        Ok(Self {
            scheduler,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Schedule collection passes.
    pub async fn add_collect(
        &self,
        task: Arc<CollectMetricsTask>,
        schedule: &str,
    ) -> Result<uuid::Uuid, TaskError> {
        self.add_job("collect_metrics", schedule, move || {
            let task = Arc::clone(&task);
            async move { run_collect(&task).await }
        })
        .await
    }

    /// Schedule expiry cleanup of the database collector.
    pub async fn add_cleanup(
        &self,
        collector: Arc<DatabaseCollector>,
        schedule: &str,
    ) -> Result<uuid::Uuid, TaskError> {
        self.add_job("metric_cleanup", schedule, move || {
            let collector = Arc::clone(&collector);
            async move {
                match collector.cleanup(Utc::now()).await {
                    Ok(deleted) => tracing::info!(deleted, "Metric cleanup complete"),
                    Err(e) => tracing::error!(error = %e, "Metric cleanup failed"),
                }
            }
        })
        .await
    }

    /// Schedule an arbitrary async task.
    pub async fn add_job<F, Fut>(
        &self,
        name: &str,
        schedule: &str,
        run: F,
    ) -> Result<uuid::Uuid, TaskError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let run = Arc::new(run);
        let job_name = name.to_owned();
        let job = Job::new_cron_job_async(schedule, move |_: uuid::Uuid, _: JobScheduler| {
            let (run, name) = (Arc::clone(&run), job_name.clone());
            Box::pin(async move {
                tracing::debug!(task = %name, "Running scheduled task");
                run().await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
        .map_err(|e| TaskError::Scheduler(e.to_string()))?;

        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| TaskError::Scheduler(e.to_string()))?;

        self.jobs.write().await.insert(
            job_id,
            JobInfo {
                id: job_id,
                name: name.to_owned(),
                schedule: schedule.to_owned(),
            },
        );

        tracing::info!(task = %name, job_id = %job_id, schedule, "Task scheduled");
        Ok(job_id)
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), TaskError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| TaskError::Scheduler(e.to_string()))?;
        tracing::info!("Task scheduler started");
        Ok(())
    }

    /// List all registered jobs.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        self.jobs.read().await.values().cloned().collect()
    }

    /// Get the number of registered jobs.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Gracefully shutdown the scheduler with default timeout.
    pub async fn shutdown(self) -> Result<(), TaskError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown with custom timeout.
    pub async fn shutdown_with_timeout(mut self, timeout: Duration) -> Result<(), TaskError> {
        let shutdown = tokio::time::timeout(timeout, async {
            self.scheduler
                .shutdown()
                .await
                .map_err(|e| TaskError::Scheduler(e.to_string()))
        })
        .await;

        match shutdown {
            Ok(Ok(())) => {
                tracing::info!("Task scheduler shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!("Task scheduler shutdown timed out");
                Ok(())
            }
        }
    }
}

/// Execute a single collection pass and log the outcome.
async fn run_collect(task: &CollectMetricsTask) {
    let start = std::time::Instant::now();
    match task.execute(None).await {
        Ok(report) => {
            tracing::debug!(
                items = report.item_count(),
                duration_ms = start.elapsed().as_millis(),
                "Scheduled collection succeeded"
            );
        }
        Err(TaskError::AlreadyRunning(_)) => {
            tracing::info!("Previous collection pass still running, skipping");
        }
        Err(e) => {
            tracing::error!(error = %e, "Scheduled collection failed");
        }
    }
}

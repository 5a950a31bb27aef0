pub mod session_cleanup;

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::CleanupConfig;
use crate::db::Database;

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    db: Database,
    cleanup: CleanupConfig,
    running: AtomicBool,
}

impl WorkerManager {
    pub async fn new(db: Database, cleanup: CleanupConfig) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await.map_err(WorkerError::Scheduler)?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            db,
            cleanup,
            running: AtomicBool::new(false),
        })
    }

    pub async fn start(&self) -> Result<(), WorkerError> {
        if !self.cleanup.enabled {
            info!("SESSION_CLEANUP_ENABLED is false, skipping worker startup");
            return Ok(());
        }

        let scheduler = self.scheduler.lock().await;

        let db = self.db.clone();
        let stale_hours = self.cleanup.stale_hours;
        let shutdown_rx = self.shutdown_tx.subscribe();
        let job = Job::new_async(self.cleanup.schedule.as_str(), move |_uuid, _lock| {
            let db = db.clone();
            let mut rx = shutdown_rx.resubscribe();
            Box::pin(async move {
                tokio::select! {
                    _ = rx.recv() => {},
                    result = session_cleanup::abandon_stale_sessions(&db, stale_hours) => {
                        if let Err(e) = result {
                            error!(error = %e, "Session cleanup worker error");
                        }
                    }
                }
            })
        })
        .map_err(WorkerError::Scheduler)?;
        scheduler.add(job).await.map_err(WorkerError::Scheduler)?;
        info!(schedule = %self.cleanup.schedule, stale_hours, "Session cleanup worker scheduled");

        scheduler.start().await.map_err(WorkerError::Scheduler)?;
        self.running.store(true, Ordering::Relaxed);
        info!("All workers started");

        Ok(())
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }

        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

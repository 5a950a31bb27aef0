use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::Config;
use crate::db::Database;
use crate::services::ExamService;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    config: Arc<Config>,
    db: Database,
    exams: Arc<ExamService>,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        let exams = Arc::new(ExamService::new(db.clone(), config.exam.clone()));
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            config: Arc::new(config),
            db,
            exams,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn exams(&self) -> Arc<ExamService> {
        Arc::clone(&self.exams)
    }
}

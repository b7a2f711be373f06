use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

pub type JobId = String;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("No job with id {0}")]
    JobNotFound(JobId),
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

/// When a job fires.
///
/// The duration fields add up to the interval of a recurring job, or to the
/// delay of a single-shot job that has no `run_date`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSchedule {
    pub weeks: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub run_date: Option<DateTime<Utc>>,
}

impl JobSchedule {
    pub fn every_seconds(seconds: u64) -> Self {
        JobSchedule {
            seconds,
            ..Self::default()
        }
    }

    pub fn every_minutes(minutes: u64) -> Self {
        JobSchedule {
            minutes,
            ..Self::default()
        }
    }

    pub fn at(run_date: DateTime<Utc>) -> Self {
        JobSchedule {
            run_date: Some(run_date),
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        let seconds = self
            .weeks
            .saturating_mul(7 * 24 * 3600)
            .saturating_add(self.days.saturating_mul(24 * 3600))
            .saturating_add(self.hours.saturating_mul(3600))
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.seconds);
        Duration::from_secs(seconds)
    }

    /// Delay until a single-shot job fires; a past run date fires at once.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match self.run_date {
            Some(run_date) => (run_date - now).to_std().unwrap_or(Duration::ZERO),
            None => self.interval(),
        }
    }
}

/// Background jobs running on their own tokio tasks.
///
/// Cloning shares the registry. Jobs outlive every handle until they are
/// removed, finish (single-shot) or [`Scheduler::shutdown`] is called.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    jobs: Arc<Mutex<HashMap<JobId, JoinHandle<()>>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job<F, Fut>(
        &self,
        callback: F,
        single: bool,
        schedule: &JobSchedule,
    ) -> Result<JobId, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_id = Uuid::new_v4().to_string();

        // Held across the spawn so a job that fires immediately cannot
        // deregister itself before it has been registered.
        let mut jobs = self.jobs.lock();

        let handle = if single {
            let delay = schedule.delay_from(Utc::now());
            let registry = Arc::clone(&self.jobs);
            let id = job_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                registry.lock().remove(&id);
                callback().await;
            })
        } else {
            let period = schedule.interval();
            if period.is_zero() {
                return Err(SchedulerError::InvalidSchedule(
                    "interval must be longer than zero".to_string(),
                ));
            }
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    callback().await;
                }
            })
        };

        jobs.insert(job_id.clone(), handle);
        info!(
            "Added {} job with id {}",
            if single { "single" } else { "interval" },
            job_id
        );

        Ok(job_id)
    }

    pub fn remove_job(&self, job_id: &str) -> Result<(), SchedulerError> {
        let handle = self
            .jobs
            .lock()
            .remove(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;
        handle.abort();
        info!("Removed job with id {}", job_id);
        Ok(())
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.lock().contains_key(job_id)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn shutdown(&self) {
        let drained: Vec<(JobId, JoinHandle<()>)> = self.jobs.lock().drain().collect();
        for (_, handle) in &drained {
            handle.abort();
        }
        if !drained.is_empty() {
            info!("Scheduler stopped {} job(s)", drained.len());
        }
    }
}

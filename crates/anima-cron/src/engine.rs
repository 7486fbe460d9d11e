//! In-process scheduler: a 1 s tick loop over in-memory (job, next-fire)
//! entries, rebuilt from the store whenever a CRUD path nudges the handle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Notify};
use tracing::{error, info, warn};

use anima_store::{CronJob, CronJobUpdate, JobStatus, NewCronJob, RunStatus, Store};

use crate::schedule::next_fire;

/// Executes a fired job as a synthetic agent turn. The gateway implements
/// this over the orchestrator; the engine stays decoupled from the LLM.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, message: &str) -> std::result::Result<(), String>;
}

/// Shared job-management handle. CRUD goes through the store and then nudges
/// the engine to rebuild its trigger list.
#[derive(Clone)]
pub struct CronHandle {
    store: Arc<Store>,
    notify: Arc<Notify>,
}

impl CronHandle {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn create_job(&self, new: &NewCronJob) -> anima_store::Result<CronJob> {
        let job = self.store.create_cron_job(new)?;
        self.refresh();
        Ok(job)
    }

    pub fn get_job(&self, id: i64) -> anima_store::Result<Option<CronJob>> {
        self.store.get_cron_job(id)
    }

    pub fn list_jobs(&self, status: Option<JobStatus>) -> anima_store::Result<Vec<CronJob>> {
        self.store.list_cron_jobs(status)
    }

    pub fn update_job(&self, id: i64, update: &CronJobUpdate) -> anima_store::Result<CronJob> {
        let job = self.store.update_cron_job(id, update)?;
        self.refresh();
        Ok(job)
    }

    pub fn delete_job(&self, id: i64) -> anima_store::Result<()> {
        self.store.delete_cron_job(id)?;
        self.refresh();
        Ok(())
    }

    pub fn pause_job(&self, id: i64) -> anima_store::Result<CronJob> {
        let job = self.store.set_cron_job_status(id, JobStatus::Paused)?;
        self.refresh();
        Ok(job)
    }

    pub fn resume_job(&self, id: i64) -> anima_store::Result<CronJob> {
        let job = self.store.set_cron_job_status(id, JobStatus::Active)?;
        self.refresh();
        Ok(job)
    }

    pub fn clone_job(&self, id: i64, new_name: Option<&str>) -> anima_store::Result<CronJob> {
        let job = self.store.clone_cron_job(id, new_name)?;
        self.refresh();
        Ok(job)
    }

    /// Ask the engine to rebuild its trigger list from the store.
    pub fn refresh(&self) {
        self.notify.notify_one();
    }
}

struct Entry {
    job_id: i64,
    recurring: bool,
    next_fire: DateTime<Utc>,
}

/// The tick loop. Owns nothing durable: every fire re-reads the job row.
pub struct CronEngine {
    handle: CronHandle,
    runner: Arc<dyn JobRunner>,
    entries: Vec<Entry>,
}

impl CronEngine {
    pub fn new(handle: CronHandle, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            handle,
            runner,
            entries: Vec::new(),
        }
    }

    /// Run until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.rebuild();
        info!(jobs = self.entries.len(), "cron engine started");

        let notify = Arc::clone(&self.handle.notify);
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(Utc::now()),
                _ = notify.notified() => {
                    self.rebuild();
                    info!(jobs = self.entries.len(), "cron engine reloaded");
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("cron engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn rebuild(&mut self) {
        let now = Utc::now();
        self.entries = match self.handle.store.list_cron_jobs(Some(JobStatus::Active)) {
            Ok(jobs) => jobs
                .iter()
                .filter_map(|job| {
                    let fire = next_fire(job, now)?;
                    Some(Entry {
                        job_id: job.id,
                        recurring: !job.is_one_time,
                        next_fire: fire,
                    })
                })
                .collect(),
            Err(e) => {
                error!(error = %e, "cron engine failed to load jobs");
                Vec::new()
            }
        };
    }

    /// Fire every due entry. Execution is spawned so the LLM round-trip
    /// never stalls the tick loop.
    fn tick(&mut self, now: DateTime<Utc>) {
        let mut fired = Vec::new();
        for entry in &self.entries {
            if entry.next_fire <= now {
                fired.push(entry.job_id);
            }
        }
        if fired.is_empty() {
            return;
        }

        for job_id in &fired {
            info!(job_id, "cron trigger fired");
            let store = Arc::clone(&self.handle.store);
            let runner = Arc::clone(&self.runner);
            let job_id = *job_id;
            tokio::spawn(async move {
                execute_job(store, runner, job_id).await;
            });
        }

        // Advance recurring entries past `now`; one-time entries are spent
        // (the executor pauses the job row).
        self.entries.retain_mut(|entry| {
            if !fired.contains(&entry.job_id) {
                return true;
            }
            if !entry.recurring {
                return false;
            }
            match self
                .handle
                .store
                .get_cron_job(entry.job_id)
                .ok()
                .flatten()
                .and_then(|job| next_fire(&job, now))
            {
                Some(next) => {
                    entry.next_fire = next;
                    true
                }
                None => false,
            }
        });
    }
}

/// Execute one fired job: re-read, skip if missing or paused, run the
/// synthetic turn, record the outcome, pause one-time jobs after success.
pub async fn execute_job(store: Arc<Store>, runner: Arc<dyn JobRunner>, job_id: i64) {
    let job = match store.get_cron_job(job_id) {
        Ok(Some(job)) => job,
        Ok(None) => {
            error!(job_id, "fired cron job no longer exists");
            return;
        }
        Err(e) => {
            error!(job_id, error = %e, "failed to re-read fired cron job");
            return;
        }
    };

    if job.status != JobStatus::Active {
        info!(job_id, "skipping inactive cron job");
        record(&store, job_id, RunStatus::Skipped, None);
        return;
    }

    info!(
        job_id,
        name = %job.name,
        one_time = job.is_one_time,
        "executing cron job"
    );
    let message = format!("[Cron: {}]\n\n{}", job.name, job.instructions);

    match runner.run_job(&message).await {
        Ok(()) => {
            record(&store, job_id, RunStatus::Success, None);
            info!(job_id, "cron job completed");
            if job.is_one_time {
                if let Err(e) = store.set_cron_job_status(job_id, JobStatus::Paused) {
                    error!(job_id, error = %e, "failed to deactivate one-time job");
                } else {
                    info!(job_id, "one-time job completed and deactivated");
                }
            }
        }
        Err(err) => {
            error!(job_id, error = %err, "cron job failed");
            record(&store, job_id, RunStatus::Error, Some(&err));
        }
    }
}

fn record(store: &Store, job_id: i64, status: RunStatus, error_text: Option<&str>) {
    if let Err(e) = store.record_run(job_id, status, error_text) {
        warn!(job_id, error = %e, "failed to record cron run");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
        fail_with: Option<String>,
    }

    impl RecordingRunner {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_with: None,
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_with: Some(message.to_string()),
            })
        }
    }

    #[async_trait]
    impl JobRunner for RecordingRunner {
        async fn run_job(&self, message: &str) -> std::result::Result<(), String> {
            self.calls.lock().unwrap().push(message.to_string());
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    fn one_time_job(store: &Store) -> CronJob {
        store
            .create_cron_job(&NewCronJob {
                name: "Dentist".into(),
                description: None,
                instructions: "Remind about the appointment".into(),
                timezone: "America/New_York".into(),
                schedule_days: None,
                schedule_time: Some("7:00 PM".into()),
                run_date: Some("2026-02-25".parse().unwrap()),
                created_by: "user".into(),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn successful_one_time_run_pauses_the_job() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let job = one_time_job(&store);
        let runner = RecordingRunner::ok();

        execute_job(Arc::clone(&store), runner.clone(), job.id).await;

        let job = store.get_cron_job(job.id).unwrap().unwrap();
        assert_eq!(job.run_count, 1);
        assert_eq!(job.last_run_status, Some(RunStatus::Success));
        assert_eq!(job.status, JobStatus::Paused);

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("[Cron: Dentist]\n\n"));
        assert!(calls[0].contains("Remind about the appointment"));
    }

    #[tokio::test]
    async fn paused_job_records_skipped_without_running() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let job = one_time_job(&store);
        store.set_cron_job_status(job.id, JobStatus::Paused).unwrap();
        let runner = RecordingRunner::ok();

        execute_job(Arc::clone(&store), runner.clone(), job.id).await;

        let job = store.get_cron_job(job.id).unwrap().unwrap();
        assert_eq!(job.last_run_status, Some(RunStatus::Skipped));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn runner_failure_records_error_and_keeps_job_active() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let job = store
            .create_cron_job(&NewCronJob {
                name: "News".into(),
                description: None,
                instructions: "fetch".into(),
                timezone: "UTC".into(),
                schedule_days: Some(vec![0, 1, 2, 3, 4, 5, 6]),
                schedule_time: Some("9:00".into()),
                run_date: None,
                created_by: "user".into(),
            })
            .unwrap();
        let runner = RecordingRunner::failing("provider exploded");

        execute_job(Arc::clone(&store), runner, job.id).await;

        let job = store.get_cron_job(job.id).unwrap().unwrap();
        assert_eq!(job.last_run_status, Some(RunStatus::Error));
        assert_eq!(job.last_run_error.as_deref(), Some("provider exploded"));
        assert_eq!(job.status, JobStatus::Active);
    }

    #[tokio::test]
    async fn handle_crud_round_trip() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let handle = CronHandle::new(store);
        let job = one_time_job(handle.store());

        assert_eq!(handle.list_jobs(None).unwrap().len(), 1);
        handle.pause_job(job.id).unwrap();
        assert!(handle.list_jobs(Some(JobStatus::Active)).unwrap().is_empty());
        handle.resume_job(job.id).unwrap();
        handle.delete_job(job.id).unwrap();
        assert!(handle.list_jobs(None).unwrap().is_empty());
    }
}

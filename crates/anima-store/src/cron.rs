//! Cron job rows. The schedule shape invariant lives here: one-time jobs
//! carry `run_date` and no day set; recurring jobs carry a non-empty day set
//! and no date; both carry `schedule_time`.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::info;

use crate::error::{Result, StoreError};
use crate::types::*;
use crate::Store;

const JOB_COLUMNS: &str = "id, name, description, instructions, timezone, schedule_days, \
     schedule_time, run_date, is_one_time, status, created_by, created_at, updated_at, \
     last_run_at, last_run_status, last_run_error, run_count";

impl Store {
    pub fn create_cron_job(&self, new: &NewCronJob) -> Result<CronJob> {
        let is_one_time = new.run_date.is_some();
        validate_shape(
            is_one_time,
            new.schedule_days.as_deref(),
            new.schedule_time.as_deref(),
        )?;

        let days_json = new
            .schedule_days
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = now_rfc3339();

        let conn = self.conn();
        conn.execute(
            "INSERT INTO cron_jobs
             (name, description, instructions, timezone, schedule_days, schedule_time,
              run_date, is_one_time, status, created_by, created_at, updated_at, run_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', ?9, ?10, ?10, 0)",
            params![
                new.name,
                new.description,
                new.instructions,
                new.timezone,
                days_json,
                new.schedule_time,
                new.run_date.map(|d| d.to_string()),
                is_one_time,
                new.created_by,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        let job = self.get_cron_job(id)?.expect("row just inserted");
        info!(
            job_id = id,
            name = %job.name,
            one_time = is_one_time,
            "cron job created"
        );
        Ok(job)
    }

    pub fn get_cron_job(&self, id: i64) -> Result<Option<CronJob>> {
        let conn = self.conn();
        let job = conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM cron_jobs WHERE id = ?1"),
                params![id],
                row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    /// All jobs newest first, optionally filtered by status.
    pub fn list_cron_jobs(&self, status: Option<JobStatus>) -> Result<Vec<CronJob>> {
        let conn = self.conn();
        let mut out = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM cron_jobs WHERE status = ?1 ORDER BY created_at DESC"
                ))?;
                let rows = stmt.query_map(params![status.to_string()], row_to_job)?;
                out.extend(rows.filter_map(|r| r.ok()));
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM cron_jobs ORDER BY created_at DESC"
                ))?;
                let rows = stmt.query_map([], row_to_job)?;
                out.extend(rows.filter_map(|r| r.ok()));
            }
        }
        Ok(out)
    }

    /// Field-mask update. Providing `run_date` switches the job to one-time
    /// (clearing the day set); providing `schedule_days` switches it to
    /// recurring (clearing the date). The shape invariant is revalidated.
    pub fn update_cron_job(&self, id: i64, update: &CronJobUpdate) -> Result<CronJob> {
        let current = self
            .get_cron_job(id)?
            .ok_or(StoreError::JobNotFound { id })?;

        let name = update.name.clone().unwrap_or(current.name);
        let description = update.description.clone().or(current.description);
        let instructions = update.instructions.clone().unwrap_or(current.instructions);
        let timezone = update.timezone.clone().unwrap_or(current.timezone);
        let schedule_time = update.schedule_time.clone().or(current.schedule_time);
        let status = update.status.unwrap_or(current.status);

        let (is_one_time, run_date, schedule_days) = match (&update.run_date, &update.schedule_days) {
            (Some(date), _) => (true, Some(*date), None),
            (None, Some(days)) => (false, None, Some(days.clone())),
            (None, None) => (current.is_one_time, current.run_date, current.schedule_days),
        };
        validate_shape(is_one_time, schedule_days.as_deref(), schedule_time.as_deref())?;

        let days_json = schedule_days
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn();
        conn.execute(
            "UPDATE cron_jobs SET
                 name = ?1, description = ?2, instructions = ?3, timezone = ?4,
                 schedule_days = ?5, schedule_time = ?6, run_date = ?7,
                 is_one_time = ?8, status = ?9, updated_at = ?10
             WHERE id = ?11",
            params![
                name,
                description,
                instructions,
                timezone,
                days_json,
                schedule_time,
                run_date.map(|d| d.to_string()),
                is_one_time,
                status.to_string(),
                now_rfc3339(),
                id,
            ],
        )?;
        drop(conn);

        info!(job_id = id, "cron job updated");
        Ok(self.get_cron_job(id)?.expect("row exists"))
    }

    pub fn delete_cron_job(&self, id: i64) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute("DELETE FROM cron_jobs WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(StoreError::JobNotFound { id });
        }
        info!(job_id = id, "cron job deleted");
        Ok(())
    }

    pub fn set_cron_job_status(&self, id: i64, status: JobStatus) -> Result<CronJob> {
        self.update_cron_job(
            id,
            &CronJobUpdate {
                status: Some(status),
                ..CronJobUpdate::default()
            },
        )
    }

    /// Stamp the outcome of one execution and bump `run_count`.
    pub fn record_run(&self, id: i64, status: RunStatus, error: Option<&str>) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE cron_jobs SET
                 last_run_at = ?1,
                 last_run_status = ?2,
                 last_run_error = ?3,
                 run_count = run_count + 1
             WHERE id = ?4",
            params![now_rfc3339(), status.to_string(), error, id],
        )?;
        Ok(())
    }

    /// Copy a job under a new name. Clones are always user-created.
    pub fn clone_cron_job(&self, id: i64, new_name: Option<&str>) -> Result<CronJob> {
        let original = self
            .get_cron_job(id)?
            .ok_or(StoreError::JobNotFound { id })?;
        let name = new_name
            .map(String::from)
            .unwrap_or_else(|| format!("{} (Copy)", original.name));

        self.create_cron_job(&NewCronJob {
            name,
            description: original.description,
            instructions: original.instructions,
            timezone: original.timezone,
            schedule_days: original.schedule_days,
            schedule_time: original.schedule_time,
            run_date: original.run_date,
            created_by: "user".to_string(),
        })
    }
}

fn validate_shape(
    is_one_time: bool,
    schedule_days: Option<&[u8]>,
    schedule_time: Option<&str>,
) -> Result<()> {
    if schedule_time.map(str::trim).filter(|t| !t.is_empty()).is_none() {
        return Err(StoreError::InvalidSchedule(
            "schedule_time is required".into(),
        ));
    }
    if is_one_time {
        if schedule_days.is_some() {
            return Err(StoreError::InvalidSchedule(
                "one-time jobs cannot carry schedule_days".into(),
            ));
        }
    } else {
        match schedule_days {
            Some(days) if !days.is_empty() => {
                if days.iter().any(|d| *d > 6) {
                    return Err(StoreError::InvalidSchedule(
                        "schedule_days must be 0..=6 (0 = Monday)".into(),
                    ));
                }
            }
            _ => {
                return Err(StoreError::InvalidSchedule(
                    "recurring jobs require a non-empty schedule_days".into(),
                ))
            }
        }
    }
    Ok(())
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<CronJob> {
    let days_json: Option<String> = row.get(5)?;
    let run_date: Option<String> = row.get(7)?;
    let status_str: String = row.get(9)?;
    let created_str: String = row.get(11)?;
    let updated_str: String = row.get(12)?;
    let last_run_str: Option<String> = row.get(13)?;
    let last_status_str: Option<String> = row.get(14)?;

    Ok(CronJob {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        instructions: row.get(3)?,
        timezone: row.get(4)?,
        schedule_days: days_json.and_then(|j| serde_json::from_str(&j).ok()),
        schedule_time: row.get(6)?,
        run_date: run_date.and_then(|d| d.parse().ok()),
        is_one_time: row.get(8)?,
        status: status_str.parse().unwrap_or(JobStatus::Paused),
        created_by: row.get(10)?,
        created_at: parse_utc(&created_str),
        updated_at: parse_utc(&updated_str),
        last_run_at: last_run_str.as_deref().map(parse_utc),
        last_run_status: last_status_str.and_then(|s| s.parse().ok()),
        last_run_error: row.get(15)?,
        run_count: row.get(16)?,
    })
}

fn parse_utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Timezones offered by the dashboard dropdown.
pub const COMMON_TIMEZONES: &[(&str, &str)] = &[
    ("America/New_York", "Eastern Time (ET)"),
    ("America/Chicago", "Central Time (CT)"),
    ("America/Denver", "Mountain Time (MT)"),
    ("America/Los_Angeles", "Pacific Time (PT)"),
    ("America/Anchorage", "Alaska Time (AKT)"),
    ("Pacific/Honolulu", "Hawaii Time (HT)"),
    ("Europe/London", "Greenwich Mean Time (GMT)"),
    ("Europe/Paris", "Central European Time (CET)"),
    ("Europe/Athens", "Eastern European Time (EET)"),
    ("Asia/Tokyo", "Japan Standard Time (JST)"),
    ("Asia/Shanghai", "China Standard Time (CST)"),
    ("Asia/Dubai", "Gulf Standard Time (GST)"),
    ("Australia/Sydney", "Australian Eastern Time (AET)"),
    ("Pacific/Auckland", "New Zealand Time (NZT)"),
    ("UTC", "UTC"),
];

/// Human-readable rendering of a weekday set (0 = Monday).
pub fn format_days(days: &[u8]) -> String {
    const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    let set: std::collections::BTreeSet<u8> = days.iter().copied().collect();
    if set.len() == 7 {
        return "Every day".to_string();
    }
    if set == [0u8, 1, 2, 3, 4].into_iter().collect() {
        return "Weekdays".to_string();
    }
    if set == [5u8, 6].into_iter().collect() {
        return "Weekends".to_string();
    }
    set.iter()
        .filter_map(|d| DAY_NAMES.get(*d as usize))
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recurring() -> NewCronJob {
        NewCronJob {
            name: "Morning briefing".into(),
            description: None,
            instructions: "Summarise the news".into(),
            timezone: "America/New_York".into(),
            schedule_days: Some(vec![0, 1, 2, 3, 4]),
            schedule_time: Some("7:00 AM".into()),
            run_date: None,
            created_by: "user".into(),
        }
    }

    fn one_time() -> NewCronJob {
        NewCronJob {
            name: "Reminder".into(),
            description: Some("one shot".into()),
            instructions: "Remind about the dentist".into(),
            timezone: "America/New_York".into(),
            schedule_days: None,
            schedule_time: Some("7:00 PM".into()),
            run_date: Some("2026-02-25".parse().unwrap()),
            created_by: "agent".into(),
        }
    }

    #[test]
    fn shape_invariant_holds_for_both_kinds() {
        let store = Store::open_in_memory().unwrap();
        let rec = store.create_cron_job(&recurring()).unwrap();
        assert!(!rec.is_one_time);
        assert!(rec.run_date.is_none());
        assert_eq!(rec.schedule_days.as_deref(), Some(&[0u8, 1, 2, 3, 4][..]));

        let once = store.create_cron_job(&one_time()).unwrap();
        assert!(once.is_one_time);
        assert!(once.schedule_days.is_none());
        assert_eq!(once.run_date, Some("2026-02-25".parse().unwrap()));
    }

    #[test]
    fn recurring_without_days_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let mut job = recurring();
        job.schedule_days = Some(vec![]);
        assert!(matches!(
            store.create_cron_job(&job),
            Err(StoreError::InvalidSchedule(_))
        ));
        job.schedule_days = None;
        assert!(store.create_cron_job(&job).is_err());
    }

    #[test]
    fn missing_schedule_time_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let mut job = one_time();
        job.schedule_time = None;
        assert!(matches!(
            store.create_cron_job(&job),
            Err(StoreError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn out_of_range_day_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let mut job = recurring();
        job.schedule_days = Some(vec![0, 7]);
        assert!(store.create_cron_job(&job).is_err());
    }

    #[test]
    fn record_run_increments_count_and_stamps_status() {
        let store = Store::open_in_memory().unwrap();
        let job = store.create_cron_job(&recurring()).unwrap();
        store.record_run(job.id, RunStatus::Success, None).unwrap();
        store
            .record_run(job.id, RunStatus::Error, Some("boom"))
            .unwrap();

        let job = store.get_cron_job(job.id).unwrap().unwrap();
        assert_eq!(job.run_count, 2);
        assert_eq!(job.last_run_status, Some(RunStatus::Error));
        assert_eq!(job.last_run_error.as_deref(), Some("boom"));
        assert!(job.last_run_at.is_some());
    }

    #[test]
    fn status_filter_and_pause_resume() {
        let store = Store::open_in_memory().unwrap();
        let a = store.create_cron_job(&recurring()).unwrap();
        let _b = store.create_cron_job(&one_time()).unwrap();

        store.set_cron_job_status(a.id, JobStatus::Paused).unwrap();
        let active = store.list_cron_jobs(Some(JobStatus::Active)).unwrap();
        assert_eq!(active.len(), 1);

        store.set_cron_job_status(a.id, JobStatus::Active).unwrap();
        assert_eq!(store.list_cron_jobs(Some(JobStatus::Active)).unwrap().len(), 2);
    }

    #[test]
    fn update_switches_shape_when_date_provided() {
        let store = Store::open_in_memory().unwrap();
        let job = store.create_cron_job(&recurring()).unwrap();

        let updated = store
            .update_cron_job(
                job.id,
                &CronJobUpdate {
                    run_date: Some("2026-03-01".parse().unwrap()),
                    ..CronJobUpdate::default()
                },
            )
            .unwrap();
        assert!(updated.is_one_time);
        assert!(updated.schedule_days.is_none());
    }

    #[test]
    fn clone_copies_schedule_with_new_name() {
        let store = Store::open_in_memory().unwrap();
        let job = store.create_cron_job(&recurring()).unwrap();
        let copy = store.clone_cron_job(job.id, None).unwrap();
        assert_eq!(copy.name, "Morning briefing (Copy)");
        assert_eq!(copy.schedule_days, job.schedule_days);
        assert_eq!(copy.created_by, "user");
        assert_ne!(copy.id, job.id);
    }

    #[test]
    fn delete_missing_job_errors() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            store.delete_cron_job(999),
            Err(StoreError::JobNotFound { id: 999 })
        ));
    }

    #[test]
    fn day_formatting_reads_naturally() {
        assert_eq!(format_days(&[0, 1, 2, 3, 4, 5, 6]), "Every day");
        assert_eq!(format_days(&[0, 1, 2, 3, 4]), "Weekdays");
        assert_eq!(format_days(&[5, 6]), "Weekends");
        assert_eq!(format_days(&[0, 2, 4]), "Mon, Wed, Fri");
    }
}

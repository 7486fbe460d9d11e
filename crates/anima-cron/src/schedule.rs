//! Trigger derivation: `schedule_time` parsing and timezone-aware next-fire
//! computation for both job shapes.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use anima_store::CronJob;

use crate::error::{Result, SchedulerError};

/// Parse "7:00 PM", "7 PM", "19:00" or "19" into (hour, minute).
pub fn parse_time(raw: &str) -> Result<(u32, u32)> {
    let upper = raw.trim().to_uppercase();
    let err = || SchedulerError::InvalidTime(raw.to_string());

    let (time_part, meridiem) = if let Some(stripped) = upper.strip_suffix("PM") {
        (stripped.trim().to_string(), Some(true))
    } else if let Some(stripped) = upper.strip_suffix("AM") {
        (stripped.trim().to_string(), Some(false))
    } else {
        (upper, None)
    };

    let (hour_str, minute_str) = match time_part.split_once(':') {
        Some((h, m)) => (h.trim(), m.trim()),
        None => (time_part.trim(), "0"),
    };
    let mut hour: u32 = hour_str.parse().map_err(|_| err())?;
    let minute: u32 = minute_str.parse().map_err(|_| err())?;

    match meridiem {
        Some(is_pm) => {
            if hour == 0 || hour > 12 {
                return Err(err());
            }
            if is_pm && hour != 12 {
                hour += 12;
            } else if !is_pm && hour == 12 {
                hour = 0;
            }
        }
        None => {
            if hour > 23 {
                return Err(err());
            }
        }
    }
    if minute > 59 {
        return Err(err());
    }
    Ok((hour, minute))
}

/// The next UTC instant a job should fire strictly after `after`, or `None`
/// when the schedule is exhausted or malformed.
pub fn next_fire(job: &CronJob, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let tz: Tz = job.timezone.parse().unwrap_or_else(|_| {
        warn!(job_id = job.id, timezone = %job.timezone, "unknown job timezone, using America/New_York");
        chrono_tz::America::New_York
    });
    let time_str = job.schedule_time.as_deref()?;
    let (hour, minute) = match parse_time(time_str) {
        Ok(hm) => hm,
        Err(e) => {
            warn!(job_id = job.id, error = %e, "unparseable schedule_time");
            return None;
        }
    };
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;

    if job.is_one_time {
        let date = job.run_date?;
        let candidate = local_to_utc(tz, date.and_time(time))?;
        return (candidate > after).then_some(candidate);
    }

    let days = job.schedule_days.as_ref()?;
    if days.is_empty() {
        return None;
    }
    let local_after = after.with_timezone(&tz);

    // Walk up to 8 days so "today at a time already passed" rolls over to
    // the next scheduled weekday.
    for offset in 0..=7i64 {
        let date = local_after.date_naive() + Duration::days(offset);
        let weekday = date.weekday().num_days_from_monday() as u8;
        if !days.contains(&weekday) {
            continue;
        }
        if let Some(candidate) = local_to_utc(tz, date.and_time(time)) {
            if candidate > after {
                return Some(candidate);
            }
        }
    }
    None
}

/// Resolve a local wall-clock time to UTC, taking the earlier instant on
/// DST-ambiguous times and skipping non-existent ones.
fn local_to_utc(tz: Tz, local: chrono::NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_store::{JobStatus, NewCronJob, Store};

    #[test]
    fn parses_twelve_hour_times() {
        assert_eq!(parse_time("7:00 PM").unwrap(), (19, 0));
        assert_eq!(parse_time("7:30 AM").unwrap(), (7, 30));
        assert_eq!(parse_time("12:00 AM").unwrap(), (0, 0));
        assert_eq!(parse_time("12:15 PM").unwrap(), (12, 15));
        assert_eq!(parse_time("7 PM").unwrap(), (19, 0));
    }

    #[test]
    fn parses_twenty_four_hour_times() {
        assert_eq!(parse_time("19:00").unwrap(), (19, 0));
        assert_eq!(parse_time("00:05").unwrap(), (0, 5));
        assert_eq!(parse_time("9").unwrap(), (9, 0));
    }

    #[test]
    fn rejects_nonsense_times() {
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("13:00 PM").is_err());
        assert!(parse_time("7:75").is_err());
        assert!(parse_time("soon").is_err());
    }

    fn make_job(new: &NewCronJob) -> CronJob {
        let store = Store::open_in_memory().unwrap();
        store.create_cron_job(new).unwrap()
    }

    #[test]
    fn one_time_fires_once_at_local_time() {
        // 2026-02-25 7:00 PM in New York is 2026-02-26 00:00 UTC (EST, UTC-5).
        let job = make_job(&NewCronJob {
            name: "once".into(),
            description: None,
            instructions: "do it".into(),
            timezone: "America/New_York".into(),
            schedule_days: None,
            schedule_time: Some("7:00 PM".into()),
            run_date: Some("2026-02-25".parse().unwrap()),
            created_by: "user".into(),
        });
        assert_eq!(job.status, JobStatus::Active);

        let before = Utc.with_ymd_and_hms(2026, 2, 25, 12, 0, 0).unwrap();
        let fire = next_fire(&job, before).unwrap();
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 2, 26, 0, 0, 0).unwrap());

        // Exhausted once the instant has passed.
        assert!(next_fire(&job, fire).is_none());
    }

    #[test]
    fn recurring_rolls_to_next_scheduled_weekday() {
        // Mon/Wed/Fri at 7:00 AM New York. 2026-02-25 is a Wednesday.
        let job = make_job(&NewCronJob {
            name: "briefing".into(),
            description: None,
            instructions: "brief".into(),
            timezone: "America/New_York".into(),
            schedule_days: Some(vec![0, 2, 4]),
            schedule_time: Some("7:00 AM".into()),
            run_date: None,
            created_by: "user".into(),
        });

        // Wednesday 8 AM local (13:00 UTC): today's slot has passed, next is Friday.
        let after = Utc.with_ymd_and_hms(2026, 2, 25, 13, 0, 0).unwrap();
        let fire = next_fire(&job, after).unwrap();
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 2, 27, 12, 0, 0).unwrap());

        // Wednesday 6 AM local: today's slot is still ahead.
        let early = Utc.with_ymd_and_hms(2026, 2, 25, 10, 0, 0).unwrap();
        let fire = next_fire(&job, early).unwrap();
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 2, 25, 12, 0, 0).unwrap());
    }

    #[test]
    fn recurring_single_day_wraps_a_full_week() {
        // Sunday-only at noon UTC; asked right after Sunday noon.
        let job = make_job(&NewCronJob {
            name: "weekly".into(),
            description: None,
            instructions: "tick".into(),
            timezone: "UTC".into(),
            schedule_days: Some(vec![6]),
            schedule_time: Some("12:00".into()),
            run_date: None,
            created_by: "user".into(),
        });

        // 2026-03-01 is a Sunday.
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let fire = next_fire(&job, after).unwrap();
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap());
    }
}

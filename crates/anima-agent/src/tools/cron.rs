//! Cron management tools. The agent can schedule its own future work; every
//! mutation refreshes the in-process scheduler through the handle.

use async_trait::async_trait;
use serde_json::json;

use anima_cron::CronHandle;
use anima_store::{cron::format_days, CronJob, CronJobUpdate, JobStatus, NewCronJob};

use super::{Tool, ToolResult};

fn render_job(job: &CronJob) -> String {
    let schedule = if job.is_one_time {
        format!(
            "once on {} at {}",
            job.run_date.map(|d| d.to_string()).unwrap_or_default(),
            job.schedule_time.as_deref().unwrap_or("?")
        )
    } else {
        format!(
            "{} at {}",
            job.schedule_days
                .as_deref()
                .map(format_days)
                .unwrap_or_default(),
            job.schedule_time.as_deref().unwrap_or("?")
        )
    };
    let last = match job.last_run_status {
        Some(status) => format!(", last run: {status}"),
        None => String::new(),
    };
    format!(
        "#{} \"{}\" [{}] {} ({}){last}",
        job.id, job.name, job.status, schedule, job.timezone
    )
}

fn job_id_from(input: &serde_json::Value) -> Result<i64, ToolResult> {
    input
        .get("job_id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ToolResult::error("missing required parameter: job_id"))
}

pub struct CronListJobsTool {
    cron: CronHandle,
}

impl CronListJobsTool {
    pub fn new(cron: CronHandle) -> Self {
        Self { cron }
    }
}

#[async_trait]
impl Tool for CronListJobsTool {
    fn name(&self) -> &str {
        "cron_list_jobs"
    }

    fn description(&self) -> &str {
        "List your scheduled jobs with their status and schedule. \
         Use before creating or changing jobs to see what already exists."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["active", "paused"],
                    "description": "Optional status filter."
                }
            }
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let status = input
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<JobStatus>().ok());

        match self.cron.list_jobs(status) {
            Ok(jobs) if jobs.is_empty() => ToolResult::success("No scheduled jobs."),
            Ok(jobs) => ToolResult::success(
                jobs.iter().map(render_job).collect::<Vec<_>>().join("\n"),
            ),
            Err(e) => ToolResult::error(format!("cron_list_jobs failed: {e}")),
        }
    }
}

pub struct CronCreateJobTool {
    cron: CronHandle,
}

impl CronCreateJobTool {
    pub fn new(cron: CronHandle) -> Self {
        Self { cron }
    }
}

#[async_trait]
impl Tool for CronCreateJobTool {
    fn name(&self) -> &str {
        "cron_create_job"
    }

    fn description(&self) -> &str {
        "Create a scheduled job that wakes you with instructions at a set time. \
         Recurring jobs take schedule_days (0=Monday..6=Sunday); one-time jobs \
         take run_date (YYYY-MM-DD). Both need schedule_time like '7:00 PM'."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Short job name." },
                "instructions": {
                    "type": "string",
                    "description": "The prompt you will receive when the job fires."
                },
                "schedule_days": {
                    "type": "array",
                    "items": { "type": "integer", "minimum": 0, "maximum": 6 },
                    "description": "Weekdays for recurring jobs, 0=Monday."
                },
                "schedule_time": {
                    "type": "string",
                    "description": "'HH:MM AM/PM' or 24-hour 'HH:MM'."
                },
                "run_date": {
                    "type": "string",
                    "description": "YYYY-MM-DD for a one-time job."
                },
                "timezone": {
                    "type": "string",
                    "description": "IANA timezone (default America/New_York)."
                },
                "description": { "type": "string", "description": "Optional note." }
            },
            "required": ["name", "instructions", "schedule_time"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let mut new: NewCronJob = match serde_json::from_value(input) {
            Ok(n) => n,
            Err(e) => return ToolResult::error(format!("invalid job definition: {e}")),
        };
        new.created_by = "agent".to_string();

        match self.cron.create_job(&new) {
            Ok(job) => ToolResult::success(format!("Created job {}", render_job(&job))),
            Err(e) => ToolResult::error(format!("cron_create_job failed: {e}")),
        }
    }
}

pub struct CronUpdateJobTool {
    cron: CronHandle,
}

impl CronUpdateJobTool {
    pub fn new(cron: CronHandle) -> Self {
        Self { cron }
    }
}

#[async_trait]
impl Tool for CronUpdateJobTool {
    fn name(&self) -> &str {
        "cron_update_job"
    }

    fn description(&self) -> &str {
        "Update an existing scheduled job. Only the fields you pass change. \
         Passing run_date makes the job one-time; passing schedule_days makes \
         it recurring."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "job_id": { "type": "integer" },
                "name": { "type": "string" },
                "instructions": { "type": "string" },
                "schedule_days": {
                    "type": "array",
                    "items": { "type": "integer", "minimum": 0, "maximum": 6 }
                },
                "schedule_time": { "type": "string" },
                "run_date": { "type": "string" },
                "timezone": { "type": "string" },
                "description": { "type": "string" }
            },
            "required": ["job_id"]
        })
    }

    async fn execute(&self, mut input: serde_json::Value) -> ToolResult {
        let id = match job_id_from(&input) {
            Ok(id) => id,
            Err(e) => return e,
        };
        if let Some(obj) = input.as_object_mut() {
            obj.remove("job_id");
        }
        let update: CronJobUpdate = match serde_json::from_value(input) {
            Ok(u) => u,
            Err(e) => return ToolResult::error(format!("invalid update: {e}")),
        };

        match self.cron.update_job(id, &update) {
            Ok(job) => ToolResult::success(format!("Updated job {}", render_job(&job))),
            Err(e) => ToolResult::error(format!("cron_update_job failed: {e}")),
        }
    }
}

pub struct CronDeleteJobTool {
    cron: CronHandle,
}

impl CronDeleteJobTool {
    pub fn new(cron: CronHandle) -> Self {
        Self { cron }
    }
}

#[async_trait]
impl Tool for CronDeleteJobTool {
    fn name(&self) -> &str {
        "cron_delete_job"
    }

    fn description(&self) -> &str {
        "Delete a scheduled job permanently. Prefer cron_pause_job when the \
         job might be needed again."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "job_id": { "type": "integer" } },
            "required": ["job_id"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let id = match job_id_from(&input) {
            Ok(id) => id,
            Err(e) => return e,
        };
        match self.cron.delete_job(id) {
            Ok(()) => ToolResult::success(format!("Deleted job #{id}")),
            Err(e) => ToolResult::error(format!("cron_delete_job failed: {e}")),
        }
    }
}

pub struct CronPauseJobTool {
    cron: CronHandle,
}

impl CronPauseJobTool {
    pub fn new(cron: CronHandle) -> Self {
        Self { cron }
    }
}

#[async_trait]
impl Tool for CronPauseJobTool {
    fn name(&self) -> &str {
        "cron_pause_job"
    }

    fn description(&self) -> &str {
        "Pause a scheduled job so it stops firing until resumed."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "job_id": { "type": "integer" } },
            "required": ["job_id"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let id = match job_id_from(&input) {
            Ok(id) => id,
            Err(e) => return e,
        };
        match self.cron.pause_job(id) {
            Ok(job) => ToolResult::success(format!("Paused job {}", render_job(&job))),
            Err(e) => ToolResult::error(format!("cron_pause_job failed: {e}")),
        }
    }
}

pub struct CronResumeJobTool {
    cron: CronHandle,
}

impl CronResumeJobTool {
    pub fn new(cron: CronHandle) -> Self {
        Self { cron }
    }
}

#[async_trait]
impl Tool for CronResumeJobTool {
    fn name(&self) -> &str {
        "cron_resume_job"
    }

    fn description(&self) -> &str {
        "Resume a paused scheduled job."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "job_id": { "type": "integer" } },
            "required": ["job_id"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let id = match job_id_from(&input) {
            Ok(id) => id,
            Err(e) => return e,
        };
        match self.cron.resume_job(id) {
            Ok(job) => ToolResult::success(format!("Resumed job {}", render_job(&job))),
            Err(e) => ToolResult::error(format!("cron_resume_job failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_store::Store;
    use std::sync::Arc;

    fn handle() -> CronHandle {
        CronHandle::new(Arc::new(Store::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn create_is_attributed_to_the_agent() {
        let cron = handle();
        let tool = CronCreateJobTool::new(cron.clone());
        let r = tool
            .execute(json!({
                "name": "Evening check",
                "instructions": "Review the day",
                "schedule_days": [0, 1, 2, 3, 4],
                "schedule_time": "9:00 PM"
            }))
            .await;
        assert!(!r.is_error, "{}", r.content);

        let jobs = cron.list_jobs(None).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].created_by, "agent");
    }

    #[tokio::test]
    async fn invalid_shape_surfaces_as_tool_error() {
        let tool = CronCreateJobTool::new(handle());
        let r = tool
            .execute(json!({
                "name": "broken",
                "instructions": "x",
                "schedule_time": "9:00 PM"
            }))
            .await;
        assert!(r.is_error, "recurring job without days must fail");
    }

    #[tokio::test]
    async fn pause_resume_round_trip() {
        let cron = handle();
        let create = CronCreateJobTool::new(cron.clone());
        create
            .execute(json!({
                "name": "j",
                "instructions": "x",
                "run_date": "2026-03-10",
                "schedule_time": "8:00 AM"
            }))
            .await;
        let id = cron.list_jobs(None).unwrap()[0].id;

        let r = CronPauseJobTool::new(cron.clone())
            .execute(json!({"job_id": id}))
            .await;
        assert!(r.content.contains("Paused"));
        let r = CronResumeJobTool::new(cron.clone())
            .execute(json!({"job_id": id}))
            .await;
        assert!(r.content.contains("Resumed"));
    }
}

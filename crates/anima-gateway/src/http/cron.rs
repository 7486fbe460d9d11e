//! Cron job CRUD for the dashboard. Shape violations (one-time without a
//! date, recurring without days, missing time) come back as 400.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use anima_store::{cron::COMMON_TIMEZONES, CronJob, CronJobUpdate, JobStatus, NewCronJob, StoreError};

use crate::app::AppState;
use crate::http::chat::{error_response, HandlerError};

fn map_store_error(e: StoreError) -> HandlerError {
    match e {
        StoreError::InvalidSchedule(msg) => error_response(StatusCode::BAD_REQUEST, msg),
        StoreError::JobNotFound { id } => {
            error_response(StatusCode::NOT_FOUND, format!("cron job not found: {id}"))
        }
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// GET /cron/jobs?status=active|paused
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<CronJob>>, HandlerError> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<JobStatus>().map_err(|e| {
            error_response(StatusCode::BAD_REQUEST, e)
        })?),
    };
    state
        .cron
        .list_jobs(status)
        .map(Json)
        .map_err(map_store_error)
}

/// POST /cron/jobs
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewCronJob>,
) -> Result<Json<CronJob>, HandlerError> {
    state.cron.create_job(&new).map(Json).map_err(map_store_error)
}

/// GET /cron/jobs/{id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CronJob>, HandlerError> {
    match state.cron.get_job(id) {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("cron job not found: {id}"),
        )),
        Err(e) => Err(map_store_error(e)),
    }
}

/// PUT /cron/jobs/{id}
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(update): Json<CronJobUpdate>,
) -> Result<Json<CronJob>, HandlerError> {
    state
        .cron
        .update_job(id, &update)
        .map(Json)
        .map_err(map_store_error)
}

/// DELETE /cron/jobs/{id}
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    state.cron.delete_job(id).map_err(map_store_error)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /cron/jobs/{id}/pause
pub async fn pause_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CronJob>, HandlerError> {
    state.cron.pause_job(id).map(Json).map_err(map_store_error)
}

/// POST /cron/jobs/{id}/resume
pub async fn resume_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CronJob>, HandlerError> {
    state.cron.resume_job(id).map(Json).map_err(map_store_error)
}

#[derive(Deserialize, Default)]
pub struct CloneRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// POST /cron/jobs/{id}/clone
pub async fn clone_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Option<Json<CloneRequest>>,
) -> Result<Json<CronJob>, HandlerError> {
    let name = body.and_then(|Json(req)| req.name);
    state
        .cron
        .clone_job(id, name.as_deref())
        .map(Json)
        .map_err(map_store_error)
}

/// GET /cron/timezones — curated (value, label) pairs for the dropdown.
pub async fn list_timezones() -> Json<Vec<serde_json::Value>> {
    Json(
        COMMON_TIMEZONES
            .iter()
            .map(|(value, label)| json!({ "value": value, "label": label }))
            .collect(),
    )
}

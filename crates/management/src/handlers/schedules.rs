use super::ManagementState;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use compliance_platform::Permission;
use uuid::Uuid;

/// GET /api/v1/schedules
#[utoipa::path(
    get,
    path = "/api/v1/schedules",
    tag = "Schedules",
    security(("bearer" = [])),
    params(ScheduleFilter),
    responses((status = 200, description = "Schedules by due date", body = Vec<Schedule>))
)]
pub async fn list_schedules(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Query(filter): Query<ScheduleFilter>,
) -> ApiResult<Json<Vec<Schedule>>> {
    caller.require(Permission::ScheduleRead)?;
    Ok(Json(state.store.list_schedules(caller.org(), &filter)))
}

/// GET /api/v1/schedules/upcoming
#[utoipa::path(
    get,
    path = "/api/v1/schedules/upcoming",
    tag = "Schedules",
    security(("bearer" = [])),
    params(UpcomingQuery),
    responses((status = 200, description = "Active schedules due within the window", body = Vec<Schedule>))
)]
pub async fn upcoming_schedules(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Json<Vec<Schedule>>> {
    caller.require(Permission::ScheduleRead)?;
    let today = Utc::now().date_naive();
    Ok(Json(state.store.upcoming_schedules(caller.org(), today, query.days)))
}

/// GET /api/v1/schedules/overdue
#[utoipa::path(
    get,
    path = "/api/v1/schedules/overdue",
    tag = "Schedules",
    security(("bearer" = [])),
    responses((status = 200, description = "Active schedules past their due date", body = Vec<Schedule>))
)]
pub async fn overdue_schedules(
    State(state): State<ManagementState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<Schedule>>> {
    caller.require(Permission::ScheduleRead)?;
    let today = Utc::now().date_naive();
    Ok(Json(state.store.overdue_schedules(caller.org(), today)))
}

/// GET /api/v1/schedules/stats
#[utoipa::path(
    get,
    path = "/api/v1/schedules/stats",
    tag = "Schedules",
    security(("bearer" = [])),
    responses((status = 200, description = "Schedule statistics", body = ScheduleStats))
)]
pub async fn schedule_stats(State(state): State<ManagementState>, caller: AuthUser) -> ApiResult<Json<ScheduleStats>> {
    caller.require(Permission::ScheduleRead)?;
    Ok(Json(state.store.schedule_stats(caller.org(), Utc::now())))
}

/// GET /api/v1/schedules/:id
#[utoipa::path(
    get,
    path = "/api/v1/schedules/{id}",
    tag = "Schedules",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Schedule id")),
    responses(
        (status = 200, description = "Schedule", body = Schedule),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_schedule(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Schedule>> {
    caller.require(Permission::ScheduleRead)?;
    Ok(Json(state.store.schedule(caller.org(), id)?))
}

/// POST /api/v1/schedules
#[utoipa::path(
    post,
    path = "/api/v1/schedules",
    tag = "Schedules",
    security(("bearer" = [])),
    request_body = CreateScheduleRequest,
    responses(
        (status = 201, description = "Schedule created", body = Schedule),
        (status = 422, description = "Custom frequency without interval", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_schedule(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Json(req): Json<CreateScheduleRequest>,
) -> ApiResult<(StatusCode, Json<Schedule>)> {
    caller.require(Permission::ScheduleWrite)?;
    let schedule = state.store.create_schedule(caller.org(), caller.user_id(), req)?;
    metrics::counter!("management.schedules.created", "frequency" => schedule.frequency.as_str()).increment(1);
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// PUT /api/v1/schedules/:id
#[utoipa::path(
    put,
    path = "/api/v1/schedules/{id}",
    tag = "Schedules",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Schedule id")),
    request_body = UpdateScheduleRequest,
    responses((status = 200, description = "Schedule updated", body = Schedule))
)]
pub async fn update_schedule(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateScheduleRequest>,
) -> ApiResult<Json<Schedule>> {
    caller.require(Permission::ScheduleWrite)?;
    Ok(Json(state.store.update_schedule(caller.org(), caller.user_id(), id, req)?))
}

/// DELETE /api/v1/schedules/:id
#[utoipa::path(
    delete,
    path = "/api/v1/schedules/{id}",
    tag = "Schedules",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Schedule id")),
    responses((status = 204, description = "Schedule deleted"))
)]
pub async fn delete_schedule(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::ScheduleWrite)?;
    state.store.delete_schedule(caller.org(), caller.user_id(), id)?;
    metrics::counter!("management.schedules.deleted").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/schedules/:id/complete
#[utoipa::path(
    post,
    path = "/api/v1/schedules/{id}/complete",
    tag = "Schedules",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Schedule id")),
    request_body = CompleteScheduleRequest,
    responses(
        (status = 200, description = "Completion recorded", body = CompleteScheduleResponse),
        (status = 409, description = "Schedule is inactive", body = crate::error::ErrorResponse),
    )
)]
pub async fn complete_schedule(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<CompleteScheduleRequest>>,
) -> ApiResult<Json<CompleteScheduleResponse>> {
    caller.require(Permission::ScheduleComplete)?;
    let notes = body.and_then(|Json(req)| req.notes);
    let response = state
        .store
        .complete_schedule(caller.org(), caller.user_id(), id, notes, Utc::now())?;
    metrics::counter!(
        "management.schedules.completed",
        "on_time" => if response.completion.on_time { "true" } else { "false" }
    )
    .increment(1);
    Ok(Json(response))
}

/// GET /api/v1/schedules/:id/history
#[utoipa::path(
    get,
    path = "/api/v1/schedules/{id}/history",
    tag = "Schedules",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Schedule id")),
    responses((status = 200, description = "Completions, newest first", body = Vec<ScheduleCompletion>))
)]
pub async fn schedule_history(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ScheduleCompletion>>> {
    caller.require(Permission::ScheduleRead)?;
    Ok(Json(state.store.schedule_history(caller.org(), id)?))
}

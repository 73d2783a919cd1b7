use super::ManagementState;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use compliance_platform::Permission;
use uuid::Uuid;

// ─── Gap Assessments ───────────────────────────────────────────────────────

/// GET /api/v1/assessments
#[utoipa::path(
    get,
    path = "/api/v1/assessments",
    tag = "Gap Assessments",
    security(("bearer" = [])),
    params(AssessmentFilter),
    responses((status = 200, description = "Gap assessments, newest first", body = Vec<GapAssessment>))
)]
pub async fn list_assessments(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Query(filter): Query<AssessmentFilter>,
) -> ApiResult<Json<Vec<GapAssessment>>> {
    caller.require(Permission::AssessmentRead)?;
    Ok(Json(state.store.list_assessments(caller.org(), &filter)))
}

/// GET /api/v1/assessments/stats
#[utoipa::path(
    get,
    path = "/api/v1/assessments/stats",
    tag = "Gap Assessments",
    security(("bearer" = [])),
    params(AssessmentStatsQuery),
    responses((status = 200, description = "Assessment statistics", body = AssessmentStats))
)]
pub async fn assessment_stats(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Query(query): Query<AssessmentStatsQuery>,
) -> ApiResult<Json<AssessmentStats>> {
    caller.require(Permission::AssessmentRead)?;
    Ok(Json(state.store.assessment_stats(caller.org(), query.branch_id, query.standard_id)))
}

/// GET /api/v1/assessments/branch-summary
#[utoipa::path(
    get,
    path = "/api/v1/assessments/branch-summary",
    tag = "Gap Assessments",
    security(("bearer" = [])),
    responses((status = 200, description = "Statistics per branch", body = Vec<BranchAssessmentSummary>))
)]
pub async fn branch_summary(
    State(state): State<ManagementState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<BranchAssessmentSummary>>> {
    caller.require(Permission::AssessmentRead)?;
    Ok(Json(state.store.branch_summary(caller.org())))
}

/// GET /api/v1/assessments/:id
#[utoipa::path(
    get,
    path = "/api/v1/assessments/{id}",
    tag = "Gap Assessments",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Assessment id")),
    responses(
        (status = 200, description = "Gap assessment", body = GapAssessment),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_assessment(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GapAssessment>> {
    caller.require(Permission::AssessmentRead)?;
    Ok(Json(state.store.assessment(caller.org(), id)?))
}

/// POST /api/v1/assessments
#[utoipa::path(
    post,
    path = "/api/v1/assessments",
    tag = "Gap Assessments",
    security(("bearer" = [])),
    request_body = CreateAssessmentRequest,
    responses(
        (status = 201, description = "Assessment recorded", body = GapAssessment),
        (status = 422, description = "Score outside 0-3", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_assessment(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Json(req): Json<CreateAssessmentRequest>,
) -> ApiResult<(StatusCode, Json<GapAssessment>)> {
    caller.require(Permission::AssessmentWrite)?;
    let assessment = state.store.create_assessment(caller.org(), caller.user_id(), req)?;
    metrics::counter!("management.assessments.created").increment(1);
    Ok((StatusCode::CREATED, Json(assessment)))
}

/// PUT /api/v1/assessments/:id
#[utoipa::path(
    put,
    path = "/api/v1/assessments/{id}",
    tag = "Gap Assessments",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Assessment id")),
    request_body = UpdateAssessmentRequest,
    responses((status = 200, description = "Assessment updated", body = GapAssessment))
)]
pub async fn update_assessment(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAssessmentRequest>,
) -> ApiResult<Json<GapAssessment>> {
    caller.require(Permission::AssessmentWrite)?;
    Ok(Json(state.store.update_assessment(caller.org(), caller.user_id(), id, req)?))
}

/// DELETE /api/v1/assessments/:id — Also deletes linked action plans.
#[utoipa::path(
    delete,
    path = "/api/v1/assessments/{id}",
    tag = "Gap Assessments",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Assessment id")),
    responses((status = 204, description = "Assessment deleted"))
)]
pub async fn delete_assessment(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::AssessmentWrite)?;
    state.store.delete_assessment(caller.org(), caller.user_id(), id)?;
    metrics::counter!("management.assessments.deleted").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

// ─── Action Plans ──────────────────────────────────────────────────────────

/// POST /api/v1/assessments/:id/action-plans
#[utoipa::path(
    post,
    path = "/api/v1/assessments/{id}/action-plans",
    tag = "Action Plans",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Gap assessment id")),
    request_body = CreateActionPlanRequest,
    responses((status = 201, description = "Action plan created", body = ActionPlan))
)]
pub async fn create_action_plan(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(assessment_id): Path<Uuid>,
    Json(req): Json<CreateActionPlanRequest>,
) -> ApiResult<(StatusCode, Json<ActionPlan>)> {
    caller.require(Permission::ActionPlanWrite)?;
    let plan = state
        .store
        .create_action_plan(caller.org(), caller.user_id(), assessment_id, req)?;
    metrics::counter!("management.action_plans.created").increment(1);
    Ok((StatusCode::CREATED, Json(plan)))
}

/// GET /api/v1/action-plans
#[utoipa::path(
    get,
    path = "/api/v1/action-plans",
    tag = "Action Plans",
    security(("bearer" = [])),
    params(ActionPlanFilter),
    responses((status = 200, description = "Action plans by due date", body = Vec<ActionPlan>))
)]
pub async fn list_action_plans(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Query(filter): Query<ActionPlanFilter>,
) -> ApiResult<Json<Vec<ActionPlan>>> {
    caller.require(Permission::AssessmentRead)?;
    Ok(Json(state.store.list_action_plans(caller.org(), &filter)))
}

/// GET /api/v1/action-plans/stats
#[utoipa::path(
    get,
    path = "/api/v1/action-plans/stats",
    tag = "Action Plans",
    security(("bearer" = [])),
    responses((status = 200, description = "Action plan statistics", body = ActionPlanStats))
)]
pub async fn action_plan_stats(
    State(state): State<ManagementState>,
    caller: AuthUser,
) -> ApiResult<Json<ActionPlanStats>> {
    caller.require(Permission::AssessmentRead)?;
    Ok(Json(state.store.action_plan_stats(caller.org())))
}

/// GET /api/v1/action-plans/:id
#[utoipa::path(
    get,
    path = "/api/v1/action-plans/{id}",
    tag = "Action Plans",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Action plan id")),
    responses((status = 200, description = "Action plan", body = ActionPlan))
)]
pub async fn get_action_plan(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ActionPlan>> {
    caller.require(Permission::AssessmentRead)?;
    Ok(Json(state.store.action_plan(caller.org(), id)?))
}

/// PUT /api/v1/action-plans/:id
#[utoipa::path(
    put,
    path = "/api/v1/action-plans/{id}",
    tag = "Action Plans",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Action plan id")),
    request_body = UpdateActionPlanRequest,
    responses((status = 200, description = "Action plan updated", body = ActionPlan))
)]
pub async fn update_action_plan(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateActionPlanRequest>,
) -> ApiResult<Json<ActionPlan>> {
    caller.require(Permission::ActionPlanWrite)?;
    Ok(Json(state.store.update_action_plan(caller.org(), caller.user_id(), id, req)?))
}

/// DELETE /api/v1/action-plans/:id
#[utoipa::path(
    delete,
    path = "/api/v1/action-plans/{id}",
    tag = "Action Plans",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Action plan id")),
    responses((status = 204, description = "Action plan deleted"))
)]
pub async fn delete_action_plan(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::ActionPlanWrite)?;
    state.store.delete_action_plan(caller.org(), caller.user_id(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

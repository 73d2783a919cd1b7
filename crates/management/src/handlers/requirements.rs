use super::ManagementState;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use compliance_platform::Permission;
use uuid::Uuid;

// ─── Standards ─────────────────────────────────────────────────────────────

/// GET /api/v1/standards
#[utoipa::path(
    get,
    path = "/api/v1/standards",
    tag = "Requirements",
    security(("bearer" = [])),
    responses((status = 200, description = "Compliance standards with clause counts", body = Vec<ComplianceStandard>))
)]
pub async fn list_standards(
    State(state): State<ManagementState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<ComplianceStandard>>> {
    caller.require(Permission::RequirementRead)?;
    Ok(Json(state.store.list_standards(caller.org())))
}

/// GET /api/v1/standards/:id
#[utoipa::path(
    get,
    path = "/api/v1/standards/{id}",
    tag = "Requirements",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Standard id")),
    responses(
        (status = 200, description = "Standard", body = ComplianceStandard),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_standard(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ComplianceStandard>> {
    caller.require(Permission::RequirementRead)?;
    Ok(Json(state.store.standard(caller.org(), id)?))
}

/// POST /api/v1/standards
#[utoipa::path(
    post,
    path = "/api/v1/standards",
    tag = "Requirements",
    security(("bearer" = [])),
    request_body = CreateStandardRequest,
    responses(
        (status = 201, description = "Standard created", body = ComplianceStandard),
        (status = 409, description = "Code already in use", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_standard(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Json(req): Json<CreateStandardRequest>,
) -> ApiResult<(StatusCode, Json<ComplianceStandard>)> {
    caller.require(Permission::RequirementWrite)?;
    let standard = state.store.create_standard(caller.org(), caller.user_id(), req)?;
    metrics::counter!("management.standards.created").increment(1);
    Ok((StatusCode::CREATED, Json(standard)))
}

/// PUT /api/v1/standards/:id
#[utoipa::path(
    put,
    path = "/api/v1/standards/{id}",
    tag = "Requirements",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Standard id")),
    request_body = UpdateStandardRequest,
    responses((status = 200, description = "Standard updated", body = ComplianceStandard))
)]
pub async fn update_standard(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStandardRequest>,
) -> ApiResult<Json<ComplianceStandard>> {
    caller.require(Permission::RequirementWrite)?;
    Ok(Json(state.store.update_standard(caller.org(), caller.user_id(), id, req)?))
}

/// DELETE /api/v1/standards/:id — Also deletes the standard's clauses.
#[utoipa::path(
    delete,
    path = "/api/v1/standards/{id}",
    tag = "Requirements",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Standard id")),
    responses((status = 204, description = "Standard deleted"))
)]
pub async fn delete_standard(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::RequirementWrite)?;
    state.store.delete_standard(caller.org(), caller.user_id(), id)?;
    metrics::counter!("management.standards.deleted").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

// ─── Clauses ───────────────────────────────────────────────────────────────

/// GET /api/v1/standards/:id/clauses
#[utoipa::path(
    get,
    path = "/api/v1/standards/{id}/clauses",
    tag = "Requirements",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Standard id")),
    responses((status = 200, description = "Clauses of the standard", body = Vec<RequirementClause>))
)]
pub async fn list_clauses(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(standard_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RequirementClause>>> {
    caller.require(Permission::RequirementRead)?;
    Ok(Json(state.store.list_clauses(caller.org(), standard_id)?))
}

/// POST /api/v1/standards/:id/clauses
#[utoipa::path(
    post,
    path = "/api/v1/standards/{id}/clauses",
    tag = "Requirements",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Standard id")),
    request_body = CreateClauseRequest,
    responses((status = 201, description = "Clause created", body = RequirementClause))
)]
pub async fn create_clause(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(standard_id): Path<Uuid>,
    Json(req): Json<CreateClauseRequest>,
) -> ApiResult<(StatusCode, Json<RequirementClause>)> {
    caller.require(Permission::RequirementWrite)?;
    let clause = state
        .store
        .create_clause(caller.org(), caller.user_id(), standard_id, req)?;
    metrics::counter!("management.clauses.created").increment(1);
    Ok((StatusCode::CREATED, Json(clause)))
}

/// GET /api/v1/clauses/:id
#[utoipa::path(
    get,
    path = "/api/v1/clauses/{id}",
    tag = "Requirements",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Clause id")),
    responses((status = 200, description = "Clause", body = RequirementClause))
)]
pub async fn get_clause(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RequirementClause>> {
    caller.require(Permission::RequirementRead)?;
    Ok(Json(state.store.clause(caller.org(), id)?))
}

/// PUT /api/v1/clauses/:id
#[utoipa::path(
    put,
    path = "/api/v1/clauses/{id}",
    tag = "Requirements",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Clause id")),
    request_body = UpdateClauseRequest,
    responses((status = 200, description = "Clause updated", body = RequirementClause))
)]
pub async fn update_clause(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateClauseRequest>,
) -> ApiResult<Json<RequirementClause>> {
    caller.require(Permission::RequirementWrite)?;
    Ok(Json(state.store.update_clause(caller.org(), caller.user_id(), id, req)?))
}

/// DELETE /api/v1/clauses/:id
#[utoipa::path(
    delete,
    path = "/api/v1/clauses/{id}",
    tag = "Requirements",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Clause id")),
    responses((status = 204, description = "Clause deleted"))
)]
pub async fn delete_clause(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::RequirementWrite)?;
    state.store.delete_clause(caller.org(), caller.user_id(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

use super::ManagementState;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use compliance_platform::Permission;
use uuid::Uuid;

/// GET /api/v1/risks
#[utoipa::path(
    get,
    path = "/api/v1/risks",
    tag = "Risks",
    security(("bearer" = [])),
    params(RiskFilter),
    responses((status = 200, description = "Risk register, highest score first", body = Vec<Risk>))
)]
pub async fn list_risks(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Query(filter): Query<RiskFilter>,
) -> ApiResult<Json<Vec<Risk>>> {
    caller.require(Permission::RiskRead)?;
    Ok(Json(state.store.list_risks(caller.org(), &filter)))
}

/// GET /api/v1/risks/stats
#[utoipa::path(
    get,
    path = "/api/v1/risks/stats",
    tag = "Risks",
    security(("bearer" = [])),
    responses((status = 200, description = "Risk statistics", body = RiskStats))
)]
pub async fn risk_stats(State(state): State<ManagementState>, caller: AuthUser) -> ApiResult<Json<RiskStats>> {
    caller.require(Permission::RiskRead)?;
    Ok(Json(state.store.risk_stats(caller.org())))
}

/// GET /api/v1/risks/:id
#[utoipa::path(
    get,
    path = "/api/v1/risks/{id}",
    tag = "Risks",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Risk id")),
    responses(
        (status = 200, description = "Risk", body = Risk),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_risk(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Risk>> {
    caller.require(Permission::RiskRead)?;
    Ok(Json(state.store.risk(caller.org(), id)?))
}

/// POST /api/v1/risks
#[utoipa::path(
    post,
    path = "/api/v1/risks",
    tag = "Risks",
    security(("bearer" = [])),
    request_body = CreateRiskRequest,
    responses(
        (status = 201, description = "Risk registered", body = Risk),
        (status = 422, description = "Likelihood or impact outside 1-5", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_risk(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Json(req): Json<CreateRiskRequest>,
) -> ApiResult<(StatusCode, Json<Risk>)> {
    caller.require(Permission::RiskWrite)?;
    let risk = state.store.create_risk(caller.org(), caller.user_id(), req)?;
    metrics::counter!("management.risks.created", "rating" => format!("{:?}", risk.rating)).increment(1);
    Ok((StatusCode::CREATED, Json(risk)))
}

/// PUT /api/v1/risks/:id
#[utoipa::path(
    put,
    path = "/api/v1/risks/{id}",
    tag = "Risks",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Risk id")),
    request_body = UpdateRiskRequest,
    responses((status = 200, description = "Risk updated and rescored", body = Risk))
)]
pub async fn update_risk(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRiskRequest>,
) -> ApiResult<Json<Risk>> {
    caller.require(Permission::RiskWrite)?;
    Ok(Json(state.store.update_risk(caller.org(), caller.user_id(), id, req)?))
}

/// DELETE /api/v1/risks/:id
#[utoipa::path(
    delete,
    path = "/api/v1/risks/{id}",
    tag = "Risks",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Risk id")),
    responses((status = 204, description = "Risk deleted"))
)]
pub async fn delete_risk(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::RiskWrite)?;
    state.store.delete_risk(caller.org(), caller.user_id(), id)?;
    metrics::counter!("management.risks.deleted").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

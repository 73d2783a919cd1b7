use super::ManagementState;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use compliance_platform::Permission;

/// GET /api/v1/dashboard
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "Dashboard",
    security(("bearer" = [])),
    responses((status = 200, description = "Organization overview", body = DashboardSummary))
)]
pub async fn dashboard(State(state): State<ManagementState>, caller: AuthUser) -> ApiResult<Json<DashboardSummary>> {
    caller.require(Permission::OrganizationRead)?;
    Ok(Json(state.store.dashboard(caller.org(), caller.user_id(), Utc::now())))
}

/// GET /api/v1/audit-log
#[utoipa::path(
    get,
    path = "/api/v1/audit-log",
    tag = "Dashboard",
    security(("bearer" = [])),
    responses((status = 200, description = "Most recent audit entries", body = Vec<AuditLogEntry>))
)]
pub async fn audit_log(State(state): State<ManagementState>, caller: AuthUser) -> ApiResult<Json<Vec<AuditLogEntry>>> {
    caller.require(Permission::AuditRead)?;
    Ok(Json(state.store.audit_log(caller.org())))
}

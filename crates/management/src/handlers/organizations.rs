use super::ManagementState;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use axum::extract::{Path, State};
use axum::Json;
use compliance_core::ComplianceError;
use compliance_platform::Permission;
use uuid::Uuid;

/// GET /api/v1/organizations/:organizationId
#[utoipa::path(
    get,
    path = "/api/v1/organizations/{organizationId}",
    tag = "Organizations",
    security(("bearer" = [])),
    params(("organizationId" = Uuid, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 403, description = "Another organization", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_organization(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(organization_id): Path<Uuid>,
) -> ApiResult<Json<Organization>> {
    caller.require(Permission::OrganizationRead)?;
    if organization_id != caller.org() && !caller.is_platform_admin() {
        return Err(ComplianceError::not_found("Organization").into());
    }
    Ok(Json(state.store.organization(organization_id)?))
}

/// PUT /api/v1/organizations/:organizationId
#[utoipa::path(
    put,
    path = "/api/v1/organizations/{organizationId}",
    tag = "Organizations",
    security(("bearer" = [])),
    params(("organizationId" = Uuid, Path, description = "Organization id")),
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Organization updated", body = Organization),
    )
)]
pub async fn update_organization(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(organization_id): Path<Uuid>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> ApiResult<Json<Organization>> {
    caller.require(Permission::OrganizationManage)?;
    if organization_id != caller.org() && !caller.is_platform_admin() {
        return Err(ComplianceError::not_found("Organization").into());
    }
    Ok(Json(state.store.update_organization(organization_id, caller.user_id(), req)?))
}

/// GET /api/v1/organizations — Every organization (platform operator only).
#[utoipa::path(
    get,
    path = "/api/v1/organizations",
    tag = "Organizations",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All organizations", body = Vec<Organization>),
        (status = 403, description = "Not a platform operator", body = crate::error::ErrorResponse),
    )
)]
pub async fn list_organizations(
    State(state): State<ManagementState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<Organization>>> {
    caller.require(Permission::PlatformAdmin)?;
    Ok(Json(state.store.list_organizations()))
}

/// PUT /api/v1/organizations/:organizationId/status (platform operator only).
#[utoipa::path(
    put,
    path = "/api/v1/organizations/{organizationId}/status",
    tag = "Organizations",
    security(("bearer" = [])),
    params(("organizationId" = Uuid, Path, description = "Organization id")),
    request_body = SetOrganizationStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = Organization),
    )
)]
pub async fn set_organization_status(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(organization_id): Path<Uuid>,
    Json(req): Json<SetOrganizationStatusRequest>,
) -> ApiResult<Json<Organization>> {
    caller.require(Permission::PlatformAdmin)?;
    Ok(Json(state.store.set_organization_status(
        organization_id,
        Some(caller.user_id()),
        req.status,
    )?))
}

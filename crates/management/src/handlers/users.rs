use super::ManagementState;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use compliance_channels::{template_vars, EmailTemplate};
use compliance_platform::auth::{generate_temporary_password, validate_password};
use compliance_platform::Permission;
use uuid::Uuid;

// ─── Users ─────────────────────────────────────────────────────────────────

/// GET /api/v1/users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    security(("bearer" = [])),
    params(UserFilter),
    responses((status = 200, description = "Users of the organization", body = Vec<UserProfile>))
)]
pub async fn list_users(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    caller.require(Permission::UserRead)?;
    Ok(Json(state.store.list_users(caller.org(), &filter)))
}

/// GET /api/v1/users/:id
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserProfile),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_user(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    caller.require(Permission::UserRead)?;
    Ok(Json(state.store.user(caller.org(), id)?.profile()))
}

/// POST /api/v1/users — Create a user. Without a password a temporary one
/// is generated and sent in the welcome email.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    security(("bearer" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_user(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    caller.require(Permission::UserManage)?;
    req.validate()?;
    let org = state.store.organization(caller.org())?;
    if let Some(branch_id) = req.branch_id {
        state.store.branch(org.id, branch_id)?;
    }
    let password = match req.password {
        Some(password) => {
            validate_password(&password)?;
            password
        }
        None => generate_temporary_password(),
    };

    let now = Utc::now();
    let user = state.store.insert_user(UserRecord {
        id: Uuid::new_v4(),
        organization_id: org.id,
        branch_id: req.branch_id,
        email: req.email,
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        phone: req.phone,
        role: req.role,
        password_hash: state.hasher.hash(&password),
        is_active: true,
        last_login_at: None,
        reset_token_hash: None,
        reset_token_expires_at: None,
        created_at: now,
        updated_at: now,
    })?;
    state.store.log_audit(
        org.id,
        Some(caller.user_id()),
        AuditAction::Create,
        "user",
        user.id,
        serde_json::json!({ "email": &user.email, "role": user.role }),
    );

    state
        .mailer
        .send_template(
            &user.email,
            EmailTemplate::Welcome,
            template_vars([
                ("name", user.full_name()),
                ("organization", org.name),
                ("email", user.email.clone()),
                ("temporary_password", password),
                ("login_url", state.mailer.link("login")),
            ]),
        )
        .await;

    metrics::counter!("management.users.created").increment(1);
    Ok((StatusCode::CREATED, Json(user.profile())))
}

/// PUT /api/v1/users/:id
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses((status = 200, description = "User updated", body = UserProfile))
)]
pub async fn update_user(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    caller.require(Permission::UserManage)?;
    Ok(Json(state.store.update_user(caller.org(), caller.user_id(), id, req)?))
}

/// POST /api/v1/users/:id/deactivate
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/deactivate",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated", body = UserProfile),
        (status = 409, description = "Cannot deactivate yourself", body = crate::error::ErrorResponse),
    )
)]
pub async fn deactivate_user(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    caller.require(Permission::UserManage)?;
    Ok(Json(state.store.set_user_active(caller.org(), caller.user_id(), id, false)?))
}

/// POST /api/v1/users/:id/activate
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/activate",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "User activated", body = UserProfile))
)]
pub async fn activate_user(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    caller.require(Permission::UserManage)?;
    Ok(Json(state.store.set_user_active(caller.org(), caller.user_id(), id, true)?))
}

/// DELETE /api/v1/users/:id
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 409, description = "Cannot delete yourself", body = crate::error::ErrorResponse),
    )
)]
pub async fn delete_user(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::UserManage)?;
    state.store.delete_user(caller.org(), caller.user_id(), id)?;
    metrics::counter!("management.users.deleted").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

// ─── Branches ──────────────────────────────────────────────────────────────

/// GET /api/v1/branches
#[utoipa::path(
    get,
    path = "/api/v1/branches",
    tag = "Branches",
    security(("bearer" = [])),
    responses((status = 200, description = "Branches", body = Vec<Branch>))
)]
pub async fn list_branches(State(state): State<ManagementState>, caller: AuthUser) -> ApiResult<Json<Vec<Branch>>> {
    caller.require(Permission::OrganizationRead)?;
    Ok(Json(state.store.list_branches(caller.org())))
}

/// GET /api/v1/branches/:id
#[utoipa::path(
    get,
    path = "/api/v1/branches/{id}",
    tag = "Branches",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Branch id")),
    responses((status = 200, description = "Branch", body = Branch))
)]
pub async fn get_branch(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Branch>> {
    caller.require(Permission::OrganizationRead)?;
    Ok(Json(state.store.branch(caller.org(), id)?))
}

/// POST /api/v1/branches
#[utoipa::path(
    post,
    path = "/api/v1/branches",
    tag = "Branches",
    security(("bearer" = [])),
    request_body = CreateBranchRequest,
    responses(
        (status = 201, description = "Branch created", body = Branch),
        (status = 409, description = "Code already in use", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_branch(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Json(req): Json<CreateBranchRequest>,
) -> ApiResult<(StatusCode, Json<Branch>)> {
    caller.require(Permission::BranchManage)?;
    let branch = state.store.create_branch(caller.org(), caller.user_id(), req)?;
    metrics::counter!("management.branches.created").increment(1);
    Ok((StatusCode::CREATED, Json(branch)))
}

/// PUT /api/v1/branches/:id
#[utoipa::path(
    put,
    path = "/api/v1/branches/{id}",
    tag = "Branches",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Branch id")),
    request_body = UpdateBranchRequest,
    responses((status = 200, description = "Branch updated", body = Branch))
)]
pub async fn update_branch(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBranchRequest>,
) -> ApiResult<Json<Branch>> {
    caller.require(Permission::BranchManage)?;
    Ok(Json(state.store.update_branch(caller.org(), caller.user_id(), id, req)?))
}

/// DELETE /api/v1/branches/:id
#[utoipa::path(
    delete,
    path = "/api/v1/branches/{id}",
    tag = "Branches",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Branch id")),
    responses((status = 204, description = "Branch deleted"))
)]
pub async fn delete_branch(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::BranchManage)?;
    state.store.delete_branch(caller.org(), caller.user_id(), id)?;
    metrics::counter!("management.branches.deleted").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

use super::ManagementState;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use compliance_channels::{template_vars, EmailTemplate};
use compliance_core::{ComplianceError, Role};
use compliance_platform::auth::{generate_secret_token, hash_token, validate_password};
use tracing::info;
use uuid::Uuid;

/// POST /api/v1/auth/register — Create an organization and its first admin.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Organization registered", body = AuthResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse),
        (status = 422, description = "Invalid input", body = crate::error::ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<ManagementState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    validate_password(&req.password)?;
    let now = Utc::now();
    let password_hash = state.hasher.hash(&req.password);
    let (org, user) = state.store.register_organization(
        &req.organization_name,
        &req.email,
        req.phone.clone(),
        req.country.clone(),
        |org| UserRecord {
            id: Uuid::new_v4(),
            organization_id: org.id,
            branch_id: None,
            email: req.email.clone(),
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            phone: req.phone.clone(),
            role: Role::Admin,
            password_hash,
            is_active: true,
            last_login_at: Some(now),
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        },
    )?;
    let subscription = state.billing.start_trial(org.id, now);
    state.store.log_audit(
        org.id,
        Some(user.id),
        AuditAction::Create,
        "organization",
        org.id,
        serde_json::json!({ "name": &org.name, "trialEndsAt": subscription.current_period_end }),
    );

    state
        .mailer
        .send_template(
            &user.email,
            EmailTemplate::Welcome,
            template_vars([
                ("name", user.full_name()),
                ("organization", org.name.clone()),
                ("email", user.email.clone()),
                ("temporary_password", "the password you chose at sign-up".to_string()),
                ("login_url", state.mailer.link("login")),
            ]),
        )
        .await;

    let issued = state.signer.issue(user.id, org.id, user.role, None, &user.email)?;
    info!(organization_id = %org.id, user_id = %user.id, "Organization registered");
    metrics::counter!("management.organizations.registered").increment(1);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user: user.profile(),
            organization: org,
        }),
    ))
}

/// POST /api/v1/auth/login — Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse),
        (status = 403, description = "Account or organization disabled", body = crate::error::ErrorResponse),
    )
)]
pub async fn login(State(state): State<ManagementState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<AuthResponse>> {
    let invalid = || ComplianceError::Unauthorized("invalid email or password".into());
    let user = state.store.find_user_by_email(&req.email).ok_or_else(invalid)?;
    if !state.hasher.verify(&req.password, &user.password_hash) {
        metrics::counter!("auth.login.failed").increment(1);
        return Err(invalid().into());
    }
    if !user.is_active {
        return Err(ComplianceError::Forbidden("account is deactivated".into()).into());
    }
    let org = state.store.organization(user.organization_id)?;
    if !org.status.can_sign_in() && user.role != Role::SuperAdmin {
        return Err(ComplianceError::Forbidden(format!("organization is {:?}", org.status).to_lowercase()).into());
    }

    let now = Utc::now();
    let issued = state
        .signer
        .issue(user.id, org.id, user.role, user.branch_id, &user.email)?;
    state.store.record_login(user.id, now);
    state
        .store
        .log_audit(org.id, Some(user.id), AuditAction::Login, "user", user.id, serde_json::json!({}));
    metrics::counter!("auth.login.succeeded").increment(1);

    let mut profile = user.profile();
    profile.last_login_at = Some(now);
    Ok(Json(AuthResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user: profile,
        organization: org,
    }))
}

/// GET /api/v1/auth/me — Current user and organization.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
    )
)]
pub async fn me(State(state): State<ManagementState>, caller: AuthUser) -> ApiResult<Json<MeResponse>> {
    let user = state.store.user(caller.org(), caller.user_id())?;
    let organization = state.store.organization(caller.org())?;
    Ok(Json(MeResponse {
        user: user.profile(),
        organization,
    }))
}

/// POST /api/v1/auth/change-password
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "Auth",
    security(("bearer" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 422, description = "Wrong current password or weak new password", body = crate::error::ErrorResponse),
    )
)]
pub async fn change_password(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = state.store.user(caller.org(), caller.user_id())?;
    if !state.hasher.verify(&req.current_password, &user.password_hash) {
        return Err(ComplianceError::validation("current password is incorrect").into());
    }
    validate_password(&req.new_password)?;
    state
        .store
        .set_password_hash(caller.org(), user.id, state.hasher.hash(&req.new_password))?;
    state.store.log_audit(
        caller.org(),
        Some(user.id),
        AuditAction::PasswordChange,
        "user",
        user.id,
        serde_json::json!({}),
    );
    Ok(Json(MessageResponse::new("Password changed")))
}

/// POST /api/v1/auth/forgot-password — Always succeeds so that account
/// existence is not disclosed.
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email sent if the account exists", body = MessageResponse),
    )
)]
pub async fn forgot_password(
    State(state): State<ManagementState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Json<MessageResponse> {
    let reply = MessageResponse::new("If an account exists for that email, a reset link has been sent");
    let Some(user) = state.store.find_user_by_email(&req.email).filter(|u| u.is_active) else {
        return Json(reply);
    };

    let ttl_minutes = state.config.auth.reset_token_ttl_minutes;
    let token = generate_secret_token();
    state
        .store
        .set_reset_token(user.id, hash_token(&token), Utc::now() + Duration::minutes(ttl_minutes));
    state
        .mailer
        .send_template(
            &user.email,
            EmailTemplate::PasswordReset,
            template_vars([
                ("name", user.full_name()),
                ("reset_url", state.mailer.link(&format!("reset-password?token={token}"))),
                ("expires_minutes", ttl_minutes.to_string()),
            ]),
        )
        .await;
    info!(user_id = %user.id, "Password reset requested");
    Json(reply)
}

/// POST /api/v1/auth/reset-password
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 422, description = "Invalid or expired token", body = crate::error::ErrorResponse),
    )
)]
pub async fn reset_password(
    State(state): State<ManagementState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    validate_password(&req.new_password)?;
    let user = state
        .store
        .consume_reset_token(&hash_token(req.token.trim()), Utc::now())?;
    state
        .store
        .set_password_hash(user.organization_id, user.id, state.hasher.hash(&req.new_password))?;
    state.store.log_audit(
        user.organization_id,
        Some(user.id),
        AuditAction::PasswordReset,
        "user",
        user.id,
        serde_json::json!({}),
    );
    Ok(Json(MessageResponse::new("Password has been reset")))
}

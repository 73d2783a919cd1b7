//! Bearer token authentication and tenant isolation middleware.
//!
//! `require_bearer` verifies the signed token and stores its [`Claims`] in
//! the request extensions. `tenant_guard` then rejects any request naming
//! an organization other than the caller's in its path, query or JSON body.

use crate::error::{ApiError, ErrorResponse};
use crate::handlers::ManagementState;
use axum::body::{to_bytes, Body};
use axum::extract::{FromRequestParts, RawPathParams, Request, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use compliance_core::{ComplianceError, Role};
use compliance_platform::{has_permission, Claims, Permission, TenantScope};
use tracing::debug;
use uuid::Uuid;

/// Largest JSON body the tenant guard buffers for inspection.
const MAX_INSPECTED_BODY: usize = 2 * 1024 * 1024;

fn unauthorized(error: &str, message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(error, message))).into_response()
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum middleware that requires a valid bearer token.
pub async fn require_bearer(State(state): State<ManagementState>, mut req: Request, next: Next) -> Response {
    let Some(token) = bearer_token(&req) else {
        return unauthorized("missing_auth", "Authorization header with Bearer token required");
    };
    match state.signer.verify(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(_) => {
            metrics::counter!("auth.rejected_tokens").increment(1);
            unauthorized("invalid_token", "Invalid or expired bearer token")
        }
    }
}

/// Axum middleware confining a request to the caller's organization.
/// Runs after [`require_bearer`].
pub async fn tenant_guard(params: Option<RawPathParams>, req: Request, next: Next) -> Response {
    let Some(claims) = req.extensions().get::<Claims>() else {
        return unauthorized("missing_auth", "Authorization header with Bearer token required");
    };
    let scope = TenantScope::from_claims(claims);
    if scope.bypasses_isolation() {
        return next.run(req).await;
    }

    if let Some(params) = &params {
        if let Err(violation) = scope.check_path(params.iter()) {
            return forbidden(violation.to_string());
        }
    }
    if let Err(violation) = scope.check_query(req.uri().query()) {
        return forbidden(violation.to_string());
    }

    let is_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return next.run(req).await;
    }

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_INSPECTED_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ErrorResponse::new("payload_too_large", "Request body is too large")),
            )
                .into_response()
        }
    };
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
        if let Err(violation) = scope.check_body(&value) {
            return forbidden(violation.to_string());
        }
    } else {
        debug!("Unparseable JSON body passed through tenant guard");
    }
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn forbidden(message: String) -> Response {
    metrics::counter!("auth.tenant_violations").increment(1);
    (StatusCode::FORBIDDEN, Json(ErrorResponse::new("tenant_violation", message))).into_response()
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn user_id(&self) -> Uuid {
        self.0.sub
    }

    pub fn org(&self) -> Uuid {
        self.0.org
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn is_platform_admin(&self) -> bool {
        self.0.role == Role::SuperAdmin
    }

    /// Fail with 403 unless the caller's role holds `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if has_permission(self.0.role, permission) {
            Ok(())
        } else {
            Err(ApiError(ComplianceError::Forbidden(format!(
                "role {} lacks permission {permission:?}",
                self.0.role
            ))))
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| ApiError(ComplianceError::Unauthorized("bearer token required".into())))
    }
}

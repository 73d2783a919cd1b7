//! Management API router: mounts all management endpoints under /api/v1.

use crate::auth::{require_bearer, tenant_guard};
use crate::handlers::{
    assessments, auth, dashboard, notifications, organizations, requirements, risks, schedules, users,
    ManagementState,
};
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;

/// Build the management router. Registration, login and password reset are
/// public; every other route requires a bearer token and passes the tenant
/// guard.
pub fn management_router(state: ManagementState) -> Router {
    let public = Router::new()
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/forgot-password", post(auth::forgot_password))
        .route("/api/v1/auth/reset-password", post(auth::reset_password));

    let protected = Router::new()
        // Auth
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/auth/change-password", post(auth::change_password))
        // Organizations
        .route("/api/v1/organizations", get(organizations::list_organizations))
        .route(
            "/api/v1/organizations/:organizationId",
            get(organizations::get_organization).put(organizations::update_organization),
        )
        .route(
            "/api/v1/organizations/:organizationId/status",
            put(organizations::set_organization_status),
        )
        // Users
        .route("/api/v1/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/v1/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/api/v1/users/:id/activate", post(users::activate_user))
        .route("/api/v1/users/:id/deactivate", post(users::deactivate_user))
        // Branches
        .route("/api/v1/branches", get(users::list_branches).post(users::create_branch))
        .route(
            "/api/v1/branches/:id",
            get(users::get_branch).put(users::update_branch).delete(users::delete_branch),
        )
        // Requirements
        .route(
            "/api/v1/standards",
            get(requirements::list_standards).post(requirements::create_standard),
        )
        .route(
            "/api/v1/standards/:id",
            get(requirements::get_standard)
                .put(requirements::update_standard)
                .delete(requirements::delete_standard),
        )
        .route(
            "/api/v1/standards/:id/clauses",
            get(requirements::list_clauses).post(requirements::create_clause),
        )
        .route(
            "/api/v1/clauses/:id",
            get(requirements::get_clause)
                .put(requirements::update_clause)
                .delete(requirements::delete_clause),
        )
        // Gap assessments
        .route(
            "/api/v1/assessments",
            get(assessments::list_assessments).post(assessments::create_assessment),
        )
        .route("/api/v1/assessments/stats", get(assessments::assessment_stats))
        .route("/api/v1/assessments/branch-summary", get(assessments::branch_summary))
        .route(
            "/api/v1/assessments/:id",
            get(assessments::get_assessment)
                .put(assessments::update_assessment)
                .delete(assessments::delete_assessment),
        )
        .route(
            "/api/v1/assessments/:id/action-plans",
            post(assessments::create_action_plan),
        )
        // Action plans
        .route("/api/v1/action-plans", get(assessments::list_action_plans))
        .route("/api/v1/action-plans/stats", get(assessments::action_plan_stats))
        .route(
            "/api/v1/action-plans/:id",
            get(assessments::get_action_plan)
                .put(assessments::update_action_plan)
                .delete(assessments::delete_action_plan),
        )
        // Risks
        .route("/api/v1/risks", get(risks::list_risks).post(risks::create_risk))
        .route("/api/v1/risks/stats", get(risks::risk_stats))
        .route(
            "/api/v1/risks/:id",
            get(risks::get_risk).put(risks::update_risk).delete(risks::delete_risk),
        )
        // Schedules
        .route(
            "/api/v1/schedules",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route("/api/v1/schedules/upcoming", get(schedules::upcoming_schedules))
        .route("/api/v1/schedules/overdue", get(schedules::overdue_schedules))
        .route("/api/v1/schedules/stats", get(schedules::schedule_stats))
        .route(
            "/api/v1/schedules/:id",
            get(schedules::get_schedule)
                .put(schedules::update_schedule)
                .delete(schedules::delete_schedule),
        )
        .route("/api/v1/schedules/:id/complete", post(schedules::complete_schedule))
        .route("/api/v1/schedules/:id/history", get(schedules::schedule_history))
        // Notifications
        .route("/api/v1/notifications", get(notifications::list_notifications))
        .route("/api/v1/notifications/unread-count", get(notifications::unread_count))
        .route("/api/v1/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/v1/notifications/broadcast", post(notifications::broadcast))
        .route("/api/v1/notifications/:id", axum::routing::delete(notifications::delete_notification))
        .route("/api/v1/notifications/:id/read", post(notifications::mark_read))
        // Dashboard / audit
        .route("/api/v1/dashboard", get(dashboard::dashboard))
        .route("/api/v1/audit-log", get(dashboard::audit_log))
        .route_layer(middleware::from_fn(tenant_guard))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    public.merge(protected).with_state(state)
}

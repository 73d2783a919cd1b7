//! OpenAPI specification and Swagger UI configuration.

use compliance_management::handlers::{
    assessments, auth, dashboard, notifications, organizations, requirements, risks, schedules, users,
};
use compliance_management::models as m;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the bearer token scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("HMAC-SHA256")
                        .description(Some("Token returned by /api/v1/auth/login or /api/v1/auth/register."))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ComplianceHub API",
        version = "0.1.0",
        description = "Multi-tenant regulatory compliance management.\n\nTracks standards and clauses, branch gap assessments, action plans, risks and recurring compliance schedules, with subscription billing over M-Pesa, PayPal and Stripe.",
        license(name = "MIT"),
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Registration, login and password management"),
        (name = "Organizations", description = "Tenant profile and platform administration"),
        (name = "Users", description = "Users and branches"),
        (name = "Requirements", description = "Compliance standards and clauses"),
        (name = "Assessments", description = "Gap assessments and action plans"),
        (name = "Risks", description = "Risk register"),
        (name = "Schedules", description = "Recurring compliance tasks"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Dashboard", description = "Overview and audit log"),
        (name = "Billing", description = "Plans, payments, webhooks and subscriptions"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Auth
        auth::register,
        auth::login,
        auth::me,
        auth::change_password,
        auth::forgot_password,
        auth::reset_password,
        // Organizations
        organizations::get_organization,
        organizations::update_organization,
        organizations::list_organizations,
        organizations::set_organization_status,
        // Users / branches
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::deactivate_user,
        users::activate_user,
        users::delete_user,
        users::list_branches,
        users::get_branch,
        users::create_branch,
        users::update_branch,
        users::delete_branch,
        // Requirements
        requirements::list_standards,
        requirements::get_standard,
        requirements::create_standard,
        requirements::update_standard,
        requirements::delete_standard,
        requirements::list_clauses,
        requirements::create_clause,
        requirements::get_clause,
        requirements::update_clause,
        requirements::delete_clause,
        // Assessments / action plans
        assessments::list_assessments,
        assessments::assessment_stats,
        assessments::branch_summary,
        assessments::get_assessment,
        assessments::create_assessment,
        assessments::update_assessment,
        assessments::delete_assessment,
        assessments::create_action_plan,
        assessments::list_action_plans,
        assessments::action_plan_stats,
        assessments::get_action_plan,
        assessments::update_action_plan,
        assessments::delete_action_plan,
        // Risks
        risks::list_risks,
        risks::risk_stats,
        risks::get_risk,
        risks::create_risk,
        risks::update_risk,
        risks::delete_risk,
        // Schedules
        schedules::list_schedules,
        schedules::upcoming_schedules,
        schedules::overdue_schedules,
        schedules::schedule_stats,
        schedules::get_schedule,
        schedules::create_schedule,
        schedules::update_schedule,
        schedules::delete_schedule,
        schedules::complete_schedule,
        schedules::schedule_history,
        // Notifications
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::delete_notification,
        notifications::broadcast,
        // Dashboard
        dashboard::dashboard,
        dashboard::audit_log,
        // Billing
        crate::billing_rest::list_plans,
        crate::billing_rest::initiate_payment,
        crate::billing_rest::list_payments,
        crate::billing_rest::get_payment,
        crate::billing_rest::query_payment,
        crate::billing_rest::mpesa_webhook,
        crate::billing_rest::paypal_webhook,
        crate::billing_rest::stripe_webhook,
        crate::billing_rest::get_subscription,
        crate::billing_rest::cancel_subscription,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Shared types
        compliance_core::Role,
        compliance_core::Priority,
        compliance_core::Frequency,
        compliance_management::ErrorResponse,
        m::MessageResponse,
        // Auth
        m::RegisterRequest,
        m::LoginRequest,
        m::AuthResponse,
        m::MeResponse,
        m::ChangePasswordRequest,
        m::ForgotPasswordRequest,
        m::ResetPasswordRequest,
        // Organizations / users
        m::Organization,
        m::OrganizationStatus,
        m::UpdateOrganizationRequest,
        m::SetOrganizationStatusRequest,
        m::UserProfile,
        m::CreateUserRequest,
        m::UpdateUserRequest,
        m::Branch,
        m::CreateBranchRequest,
        m::UpdateBranchRequest,
        // Requirements
        m::ComplianceStandard,
        m::CreateStandardRequest,
        m::UpdateStandardRequest,
        m::RequirementClause,
        m::CreateClauseRequest,
        m::UpdateClauseRequest,
        // Assessments
        m::GapAssessment,
        m::CreateAssessmentRequest,
        m::UpdateAssessmentRequest,
        m::AssessmentStats,
        m::ImplementationCounts,
        m::GapRiskCounts,
        m::BranchAssessmentSummary,
        m::ActionPlan,
        m::ActionPlanStatus,
        m::ActionPlanStats,
        m::CreateActionPlanRequest,
        m::UpdateActionPlanRequest,
        // Risks
        m::Risk,
        m::RiskCategory,
        m::RiskRating,
        m::RiskStatus,
        m::RiskStats,
        m::RiskRatingCounts,
        m::RiskStatusCounts,
        m::CategoryCount,
        m::CreateRiskRequest,
        m::UpdateRiskRequest,
        // Schedules
        m::Schedule,
        m::ScheduleStatus,
        m::ScheduleCompletion,
        m::ScheduleStats,
        m::CreateScheduleRequest,
        m::UpdateScheduleRequest,
        m::CompleteScheduleRequest,
        m::CompleteScheduleResponse,
        // Notifications / dashboard
        m::Notification,
        m::NotificationKind,
        m::UnreadCount,
        m::BroadcastRequest,
        m::BroadcastResponse,
        m::AuditLogEntry,
        m::AuditAction,
        m::DashboardSummary,
        // Billing
        compliance_billing::PricingPlan,
        compliance_billing::PlanTier,
        compliance_billing::BillingCycle,
        compliance_billing::PaymentProvider,
        compliance_billing::PaymentStatus,
        compliance_billing::Payment,
        compliance_billing::Subscription,
        compliance_billing::SubscriptionStatus,
        compliance_billing::CheckoutResponse,
        crate::payments::InitiatePaymentRequest,
        crate::payments::InitiatePaymentResponse,
        crate::payments::WebhookAck,
        // Operations
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_management_and_billing_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/api/v1/auth/login",
            "/api/v1/assessments/{id}",
            "/api/v1/schedules/{id}/complete",
            "/api/v1/payments/webhooks/stripe",
            "/health",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_openapi_has_bearer_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
        assert!(components.schemas.contains_key("Payment"));
    }
}

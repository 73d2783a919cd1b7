//! Management domain types: organizations, users, requirements, gap
//! assessments, action plans, risks, schedules, notifications, audit log.
//!
//! Wire format is camelCase to match the web client.

use chrono::{DateTime, NaiveDate, Utc};
use compliance_core::{ComplianceError, ComplianceResult, Frequency, Priority, Role};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Highest implementation status / gap risk score.
pub const MAX_GAP_SCORE: u8 = 3;

// ─── Organization ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    Trial,
    Active,
    Suspended,
    Cancelled,
}

impl OrganizationStatus {
    pub fn can_sign_in(self) -> bool {
        matches!(self, OrganizationStatus::Trial | OrganizationStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub status: OrganizationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Branch / User ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub code: String,
    pub location: Option<String>,
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored user row. Never serialized; the API exposes [`UserProfile`].
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            organization_id: self.organization_id,
            branch_id: self.branch_id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            role: self.role,
            is_active: self.is_active,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Requirements ──────────────────────────────────────────────────────────

/// A regulatory framework an organization is assessed against.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceStandard {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub code: String,
    pub regulator: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub is_active: bool,
    /// Filled in on read.
    #[serde(default)]
    pub clause_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementClause {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub standard_id: Uuid,
    pub clause_number: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Gap Assessment ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GapAssessment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub branch_id: Uuid,
    pub clause_id: Uuid,
    /// Standard of the assessed clause, kept for filtering.
    pub standard_id: Uuid,
    /// 0 not implemented, 1 partially, 2 largely, 3 fully implemented.
    pub implementation_status: u8,
    /// 0 none, 1 low, 2 medium, 3 high.
    pub risk_level: u8,
    pub findings: Option<String>,
    pub evidence: Option<String>,
    pub recommendation: Option<String>,
    pub assessed_by: Uuid,
    pub assessment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn implementation_label(status: u8) -> &'static str {
    match status {
        0 => "not_implemented",
        1 => "partially_implemented",
        2 => "largely_implemented",
        _ => "fully_implemented",
    }
}

pub fn risk_label(level: u8) -> &'static str {
    match level {
        0 => "none",
        1 => "low",
        2 => "medium",
        _ => "high",
    }
}

fn validate_gap_score(field: &str, value: u8) -> ComplianceResult<()> {
    if value > MAX_GAP_SCORE {
        return Err(ComplianceError::validation(format!(
            "{field} must be between 0 and {MAX_GAP_SCORE}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationCounts {
    pub not_implemented: u64,
    pub partially_implemented: u64,
    pub largely_implemented: u64,
    pub fully_implemented: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GapRiskCounts {
    pub none: u64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentStats {
    pub total: u64,
    pub implementation: ImplementationCounts,
    pub risk: GapRiskCounts,
    /// Assessments not yet fully implemented.
    pub gap_count: u64,
    pub high_risk_count: u64,
    /// round(Σ implementationStatus / (3 · total) · 100).
    pub compliance_percentage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BranchAssessmentSummary {
    pub branch_id: Uuid,
    pub branch_name: String,
    pub stats: AssessmentStats,
}

// ─── Action Plan ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionPlanStatus {
    NotStarted,
    InProgress,
    Completed,
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub gap_assessment_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub responsible_user_id: Option<Uuid>,
    pub due_date: NaiveDate,
    pub priority: Priority,
    pub status: ActionPlanStatus,
    /// Percent complete, 0–100.
    pub progress: u8,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlanStats {
    pub total: u64,
    pub not_started: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub overdue: u64,
    pub completion_rate: u32,
}

// ─── Risk Register ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Operational,
    Compliance,
    Credit,
    Market,
    Liquidity,
    Strategic,
    Reputational,
    Technology,
}

impl RiskCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Compliance => "compliance",
            Self::Credit => "credit",
            Self::Market => "market",
            Self::Liquidity => "liquidity",
            Self::Strategic => "strategic",
            Self::Reputational => "reputational",
            Self::Technology => "technology",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskRating {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskRating {
    /// Rating band of a likelihood × impact score (1–25).
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=4 => RiskRating::Low,
            5..=9 => RiskRating::Medium,
            10..=16 => RiskRating::High,
            _ => RiskRating::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    Open,
    Mitigating,
    Accepted,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: RiskCategory,
    /// 1–5.
    pub likelihood: u8,
    /// 1–5.
    pub impact: u8,
    pub score: u8,
    pub rating: RiskRating,
    pub mitigation: Option<String>,
    pub owner_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub gap_assessment_id: Option<Uuid>,
    pub status: RiskStatus,
    pub review_date: Option<NaiveDate>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Risk {
    /// Recompute score and rating after likelihood or impact changed.
    pub fn rescore(&mut self) {
        self.score = self.likelihood * self.impact;
        self.rating = RiskRating::from_score(self.score);
    }
}

fn validate_risk_factor(field: &str, value: u8) -> ComplianceResult<()> {
    if !(1..=5).contains(&value) {
        return Err(ComplianceError::validation(format!(
            "{field} must be between 1 and 5"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiskRatingCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiskStatusCounts {
    pub open: u64,
    pub mitigating: u64,
    pub accepted: u64,
    pub closed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: RiskCategory,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiskStats {
    pub total: u64,
    pub by_rating: RiskRatingCounts,
    pub by_status: RiskStatusCounts,
    pub by_category: Vec<CategoryCount>,
    /// Mean score, one decimal place.
    pub average_score: f64,
}

// ─── Schedule ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Completed,
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub custom_interval_days: Option<u32>,
    pub due_date: NaiveDate,
    pub responsible_user_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub clause_id: Option<Uuid>,
    /// Days before the due date to send a reminder.
    pub reminder_days_before: Option<u32>,
    pub status: ScheduleStatus,
    pub is_active: bool,
    pub last_completed_at: Option<DateTime<Utc>>,
    /// Due date a reminder was last sent for.
    pub last_reminder_for: Option<NaiveDate>,
    /// Due date an overdue notice was last sent for.
    pub last_overdue_notice_for: Option<NaiveDate>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCompletion {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub schedule_id: Uuid,
    /// Due date this completion satisfied.
    pub due_date: NaiveDate,
    pub completed_by: Uuid,
    pub completed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub on_time: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteScheduleResponse {
    pub schedule: Schedule,
    pub completion: ScheduleCompletion,
    /// New due date for recurring schedules.
    pub next_due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStats {
    pub total: u64,
    pub active: u64,
    pub pending: u64,
    pub completed: u64,
    pub overdue: u64,
    pub completed_last_30_days: u64,
    /// Share of all completions done on or before the due date.
    pub on_time_rate: u32,
}

// ─── Notification ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ScheduleReminder,
    ScheduleOverdue,
    ActionPlanOverdue,
    AssessmentCreated,
    PaymentReceived,
    SubscriptionExpiring,
    SubscriptionExpired,
    Broadcast,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating notifications from services.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

// ─── Audit Log ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Complete,
    Login,
    PasswordChange,
    PasswordReset,
    StatusChange,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: String,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

// ─── Dashboard ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub assessments: AssessmentStats,
    pub action_plans: ActionPlanStats,
    pub risks: RiskStats,
    pub schedules: ScheduleStats,
    pub users: u64,
    pub branches: u64,
    pub standards: u64,
    pub unread_notifications: u64,
}

// ─── API Request/Response types ────────────────────────────────────────────

fn require_text(field: &str, value: &str) -> ComplianceResult<()> {
    if value.trim().is_empty() {
        return Err(ComplianceError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_email(email: &str) -> ComplianceResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ComplianceError::validation("email is not a valid address")),
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub organization_name: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        require_text("organizationName", &self.organization_name)?;
        require_text("firstName", &self.first_name)?;
        validate_email(&self.email)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
    pub organization: Organization,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: UserProfile,
    pub organization: Organization,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetOrganizationStatusRequest {
    pub status: OrganizationStatus,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBranchRequest {
    pub name: String,
    pub code: String,
    pub location: Option<String>,
    pub manager_id: Option<Uuid>,
}

impl CreateBranchRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        require_text("name", &self.name)?;
        require_text("code", &self.code)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBranchRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub location: Option<String>,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub branch_id: Option<Uuid>,
    pub phone: Option<String>,
    /// Generated and emailed when absent.
    pub password: Option<String>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        require_text("firstName", &self.first_name)?;
        validate_email(&self.email)?;
        if self.role == Role::SuperAdmin {
            return Err(ComplianceError::Forbidden(
                "super_admin cannot be assigned through the organization API".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub branch_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub branch_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStandardRequest {
    pub name: String,
    pub code: String,
    pub regulator: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub effective_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl CreateStandardRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        require_text("name", &self.name)?;
        require_text("code", &self.code)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStandardRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub regulator: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateClauseRequest {
    pub clause_number: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

impl CreateClauseRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        require_text("clauseNumber", &self.clause_number)?;
        require_text("title", &self.title)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClauseRequest {
    pub clause_number: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssessmentRequest {
    pub branch_id: Uuid,
    pub clause_id: Uuid,
    pub implementation_status: u8,
    pub risk_level: u8,
    pub findings: Option<String>,
    pub evidence: Option<String>,
    pub recommendation: Option<String>,
    /// Defaults to today.
    pub assessment_date: Option<NaiveDate>,
}

impl CreateAssessmentRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        validate_gap_score("implementationStatus", self.implementation_status)?;
        validate_gap_score("riskLevel", self.risk_level)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssessmentRequest {
    pub implementation_status: Option<u8>,
    pub risk_level: Option<u8>,
    pub findings: Option<String>,
    pub evidence: Option<String>,
    pub recommendation: Option<String>,
    pub assessment_date: Option<NaiveDate>,
}

impl UpdateAssessmentRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        if let Some(status) = self.implementation_status {
            validate_gap_score("implementationStatus", status)?;
        }
        if let Some(level) = self.risk_level {
            validate_gap_score("riskLevel", level)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AssessmentFilter {
    pub branch_id: Option<Uuid>,
    pub standard_id: Option<Uuid>,
    pub clause_id: Option<Uuid>,
    pub implementation_status: Option<u8>,
    pub risk_level: Option<u8>,
}

impl AssessmentFilter {
    pub fn matches(&self, a: &GapAssessment) -> bool {
        self.branch_id.map_or(true, |id| a.branch_id == id)
            && self.standard_id.map_or(true, |id| a.standard_id == id)
            && self.clause_id.map_or(true, |id| a.clause_id == id)
            && self
                .implementation_status
                .map_or(true, |s| a.implementation_status == s)
            && self.risk_level.map_or(true, |r| a.risk_level == r)
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AssessmentStatsQuery {
    pub branch_id: Option<Uuid>,
    pub standard_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionPlanRequest {
    pub title: String,
    pub description: Option<String>,
    pub responsible_user_id: Option<Uuid>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub priority: Priority,
}

impl CreateActionPlanRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        require_text("title", &self.title)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionPlanRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub responsible_user_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
    pub status: Option<ActionPlanStatus>,
    pub progress: Option<u8>,
}

impl UpdateActionPlanRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        if matches!(self.progress, Some(p) if p > 100) {
            return Err(ComplianceError::validation("progress must be between 0 and 100"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ActionPlanFilter {
    pub gap_assessment_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
    pub status: Option<ActionPlanStatus>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRiskRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: RiskCategory,
    pub likelihood: u8,
    pub impact: u8,
    pub mitigation: Option<String>,
    pub owner_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub gap_assessment_id: Option<Uuid>,
    pub review_date: Option<NaiveDate>,
}

impl CreateRiskRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        require_text("title", &self.title)?;
        validate_risk_factor("likelihood", self.likelihood)?;
        validate_risk_factor("impact", self.impact)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRiskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<RiskCategory>,
    pub likelihood: Option<u8>,
    pub impact: Option<u8>,
    pub mitigation: Option<String>,
    pub owner_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub status: Option<RiskStatus>,
    pub review_date: Option<NaiveDate>,
}

impl UpdateRiskRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        if let Some(l) = self.likelihood {
            validate_risk_factor("likelihood", l)?;
        }
        if let Some(i) = self.impact {
            validate_risk_factor("impact", i)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RiskFilter {
    pub category: Option<RiskCategory>,
    pub status: Option<RiskStatus>,
    pub rating: Option<RiskRating>,
    pub branch_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub title: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub custom_interval_days: Option<u32>,
    pub due_date: NaiveDate,
    pub responsible_user_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub clause_id: Option<Uuid>,
    pub reminder_days_before: Option<u32>,
}

impl CreateScheduleRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        require_text("title", &self.title)?;
        compliance_core::calendar::validate_interval(self.frequency, self.custom_interval_days)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScheduleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<Frequency>,
    pub custom_interval_days: Option<u32>,
    pub due_date: Option<NaiveDate>,
    pub responsible_user_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub clause_id: Option<Uuid>,
    pub reminder_days_before: Option<u32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ScheduleFilter {
    pub status: Option<ScheduleStatus>,
    pub frequency: Option<Frequency>,
    pub responsible_user_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteScheduleRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UpcomingQuery {
    /// Look-ahead window in days (default 30).
    #[serde(default = "default_upcoming_days")]
    pub days: u32,
}

fn default_upcoming_days() -> u32 {
    30
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnreadCount {
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    /// Whole organization when absent.
    pub user_ids: Option<Vec<Uuid>>,
}

impl BroadcastRequest {
    pub fn validate(&self) -> ComplianceResult<()> {
        require_text("title", &self.title)?;
        require_text("message", &self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    pub delivered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_rating_bands() {
        assert_eq!(RiskRating::from_score(1), RiskRating::Low);
        assert_eq!(RiskRating::from_score(4), RiskRating::Low);
        assert_eq!(RiskRating::from_score(5), RiskRating::Medium);
        assert_eq!(RiskRating::from_score(9), RiskRating::Medium);
        assert_eq!(RiskRating::from_score(12), RiskRating::High);
        assert_eq!(RiskRating::from_score(16), RiskRating::High);
        assert_eq!(RiskRating::from_score(20), RiskRating::Critical);
        assert_eq!(RiskRating::from_score(25), RiskRating::Critical);
    }

    #[test]
    fn test_assessment_request_scores_are_bounded() {
        let mut req = CreateAssessmentRequest {
            branch_id: Uuid::new_v4(),
            clause_id: Uuid::new_v4(),
            implementation_status: 3,
            risk_level: 0,
            findings: None,
            evidence: None,
            recommendation: None,
            assessment_date: None,
        };
        assert!(req.validate().is_ok());
        req.implementation_status = 4;
        assert!(req.validate().is_err());

        let update = UpdateAssessmentRequest {
            risk_level: Some(7),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = serde_json::json!({
            "title": "Monthly liquidity report",
            "frequency": "half_yearly",
            "dueDate": "2026-11-30",
            "reminderDaysBefore": 5
        });
        let req: CreateScheduleRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.frequency, Frequency::HalfYearly);
        assert_eq!(req.reminder_days_before, Some(5));
        assert!(req.validate().is_ok());

        let custom = serde_json::json!({
            "title": "Custom",
            "frequency": "custom",
            "dueDate": "2026-11-30"
        });
        let req: CreateScheduleRequest = serde_json::from_value(custom).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("officer@bank.co.ke").is_ok());
        assert!(validate_email("officer").is_err());
        assert!(validate_email("@bank.co.ke").is_err());
        assert!(validate_email("officer@localhost").is_err());
    }
}

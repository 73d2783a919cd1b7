//! In-memory compliance store backed by DashMap.
//!
//! Every query takes the caller's organization id and only ever sees rows
//! of that organization; a row belonging to another organization is
//! reported as not found.

mod assessments;
mod branches;
mod notifications;
mod organizations;
mod requirements;
mod risks;
mod schedules;
mod users;

use crate::models::*;
use chrono::{DateTime, NaiveDate, Utc};
use compliance_core::{ComplianceError, ComplianceResult};
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

pub use assessments::compute_assessment_stats;

/// Audit entries returned per request.
const AUDIT_PAGE: usize = 500;

/// A row owned by one organization.
pub trait Scoped: Clone {
    const KIND: &'static str;
    fn organization_id(&self) -> Uuid;
}

macro_rules! scoped {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(impl Scoped for $ty {
            const KIND: &'static str = $kind;
            fn organization_id(&self) -> Uuid {
                self.organization_id
            }
        })*
    };
}

scoped! {
    UserRecord => "User",
    Branch => "Branch",
    ComplianceStandard => "Standard",
    RequirementClause => "Clause",
    GapAssessment => "Gap assessment",
    ActionPlan => "Action plan",
    Risk => "Risk",
    Schedule => "Schedule",
    ScheduleCompletion => "Schedule completion",
    Notification => "Notification",
}

fn get_scoped<T: Scoped>(map: &DashMap<Uuid, T>, org: Uuid, id: Uuid) -> ComplianceResult<T> {
    map.get(&id)
        .filter(|row| row.organization_id() == org)
        .map(|row| row.value().clone())
        .ok_or_else(|| ComplianceError::not_found(T::KIND))
}

fn list_scoped<T: Scoped>(map: &DashMap<Uuid, T>, org: Uuid, keep: impl Fn(&T) -> bool) -> Vec<T> {
    map.iter()
        .filter(|row| row.organization_id() == org && keep(row.value()))
        .map(|row| row.value().clone())
        .collect()
}

fn count_scoped<T: Scoped>(map: &DashMap<Uuid, T>, org: Uuid) -> u64 {
    map.iter().filter(|row| row.organization_id() == org).count() as u64
}

/// Mutate a row in place. The closure runs under the row's shard lock and
/// must not touch the same map.
fn update_scoped<T: Scoped, R>(
    map: &DashMap<Uuid, T>,
    org: Uuid,
    id: Uuid,
    apply: impl FnOnce(&mut T) -> ComplianceResult<R>,
) -> ComplianceResult<R> {
    let mut row = map
        .get_mut(&id)
        .filter(|row| row.organization_id() == org)
        .ok_or_else(|| ComplianceError::not_found(T::KIND))?;
    apply(row.value_mut())
}

fn remove_scoped<T: Scoped>(map: &DashMap<Uuid, T>, org: Uuid, id: Uuid) -> ComplianceResult<T> {
    map.remove_if(&id, |_, row| row.organization_id() == org)
        .map(|(_, row)| row)
        .ok_or_else(|| ComplianceError::not_found(T::KIND))
}

/// Remove every row for which `matches` holds; returns the count removed.
fn remove_matching<T>(map: &DashMap<Uuid, T>, matches: impl Fn(&T) -> bool) -> usize {
    let mut removed = 0;
    map.retain(|_, row| {
        let keep = !matches(row);
        if !keep {
            removed += 1;
        }
        keep
    });
    removed
}

/// Thread-safe in-memory store for every management resource.
pub struct ComplianceStore {
    organizations: DashMap<Uuid, Organization>,
    users: DashMap<Uuid, UserRecord>,
    /// Lower-cased email → user id; enforces global email uniqueness.
    user_emails: DashMap<String, Uuid>,
    branches: DashMap<Uuid, Branch>,
    standards: DashMap<Uuid, ComplianceStandard>,
    clauses: DashMap<Uuid, RequirementClause>,
    assessments: DashMap<Uuid, GapAssessment>,
    action_plans: DashMap<Uuid, ActionPlan>,
    risks: DashMap<Uuid, Risk>,
    schedules: DashMap<Uuid, Schedule>,
    completions: DashMap<Uuid, ScheduleCompletion>,
    notifications: DashMap<Uuid, Notification>,
    audit_log: DashMap<Uuid, AuditLogEntry>,
}

impl ComplianceStore {
    pub fn new() -> Self {
        info!("Compliance store initialized (in-memory, development mode)");
        Self {
            organizations: DashMap::new(),
            users: DashMap::new(),
            user_emails: DashMap::new(),
            branches: DashMap::new(),
            standards: DashMap::new(),
            clauses: DashMap::new(),
            assessments: DashMap::new(),
            action_plans: DashMap::new(),
            risks: DashMap::new(),
            schedules: DashMap::new(),
            completions: DashMap::new(),
            notifications: DashMap::new(),
            audit_log: DashMap::new(),
        }
    }

    // ─── Audit Log ─────────────────────────────────────────────────────────

    pub fn log_audit(
        &self,
        organization_id: Uuid,
        user_id: Option<Uuid>,
        action: AuditAction,
        resource_type: &str,
        resource_id: impl ToString,
        details: serde_json::Value,
    ) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            organization_id,
            user_id,
            action,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            details,
            timestamp: Utc::now(),
        };
        self.audit_log.insert(entry.id, entry);
    }

    /// Most recent audit entries of an organization, newest first.
    pub fn audit_log(&self, organization_id: Uuid) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> = self
            .audit_log
            .iter()
            .filter(|e| e.organization_id == organization_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(AUDIT_PAGE);
        entries
    }

    // ─── Dashboard ─────────────────────────────────────────────────────────

    pub fn dashboard(&self, organization_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> DashboardSummary {
        DashboardSummary {
            assessments: self.assessment_stats(organization_id, None, None),
            action_plans: self.action_plan_stats(organization_id),
            risks: self.risk_stats(organization_id),
            schedules: self.schedule_stats(organization_id, now),
            users: count_scoped(&self.users, organization_id),
            branches: count_scoped(&self.branches, organization_id),
            standards: count_scoped(&self.standards, organization_id),
            unread_notifications: self.unread_count(organization_id, user_id),
        }
    }
}

impl Default for ComplianceStore {
    fn default() -> Self {
        Self::new()
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Replace `target` when an update supplies a value.
fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Replace an optional field when an update supplies a value.
fn set_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_foreign_rows_are_not_found() {
        let (store, org, admin) = store_with_org();
        let branch = store
            .create_branch(
                org,
                admin,
                CreateBranchRequest {
                    name: "Head Office".into(),
                    code: "HQ".into(),
                    location: None,
                    manager_id: None,
                },
            )
            .unwrap();

        let other = Uuid::new_v4();
        assert!(matches!(
            store.branch(other, branch.id),
            Err(ComplianceError::NotFound(_))
        ));
        assert!(store.delete_branch(other, admin, branch.id).is_err());
        assert!(store.list_branches(other).is_empty());
        assert!(store.branch(org, branch.id).is_ok());
    }

    #[test]
    fn test_writes_are_audited() {
        let (store, org, admin) = store_with_org();
        store
            .create_branch(
                org,
                admin,
                CreateBranchRequest {
                    name: "Westlands".into(),
                    code: "WL".into(),
                    location: Some("Nairobi".into()),
                    manager_id: None,
                },
            )
            .unwrap();
        let log = store.audit_log(org);
        assert!(log.iter().any(|e| e.resource_type == "branch" && e.action == AuditAction::Create));
        assert!(store.audit_log(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_dashboard_on_empty_organization() {
        let (store, org, admin) = store_with_org();
        let summary = store.dashboard(org, admin, Utc::now());
        assert_eq!(summary.users, 1);
        assert_eq!(summary.assessments.total, 0);
        assert_eq!(summary.assessments.compliance_percentage, 0);
        assert_eq!(summary.risks.average_score, 0.0);
        assert_eq!(summary.unread_notifications, 0);
    }
}

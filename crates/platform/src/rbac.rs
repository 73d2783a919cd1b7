//! Role-Based Access Control: a fixed permission matrix per role.

use compliance_core::Role;
use serde::{Deserialize, Serialize};

/// Fine-grained permission for platform resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    OrganizationRead,
    OrganizationManage,
    UserRead,
    UserManage,
    BranchManage,
    RequirementRead,
    RequirementWrite,
    AssessmentRead,
    AssessmentWrite,
    ActionPlanWrite,
    RiskRead,
    RiskWrite,
    ScheduleRead,
    ScheduleWrite,
    ScheduleComplete,
    NotificationBroadcast,
    BillingRead,
    BillingManage,
    AuditRead,
    PlatformAdmin,
}

impl Permission {
    /// All permission variants.
    pub fn all() -> Vec<Permission> {
        vec![
            Permission::OrganizationRead,
            Permission::OrganizationManage,
            Permission::UserRead,
            Permission::UserManage,
            Permission::BranchManage,
            Permission::RequirementRead,
            Permission::RequirementWrite,
            Permission::AssessmentRead,
            Permission::AssessmentWrite,
            Permission::ActionPlanWrite,
            Permission::RiskRead,
            Permission::RiskWrite,
            Permission::ScheduleRead,
            Permission::ScheduleWrite,
            Permission::ScheduleComplete,
            Permission::NotificationBroadcast,
            Permission::BillingRead,
            Permission::BillingManage,
            Permission::AuditRead,
            Permission::PlatformAdmin,
        ]
    }
}

/// Every permission a role holds.
pub fn role_permissions(role: Role) -> Vec<Permission> {
    use Permission::*;
    match role {
        Role::SuperAdmin => Permission::all(),
        Role::Admin => Permission::all()
            .into_iter()
            .filter(|p| *p != PlatformAdmin)
            .collect(),
        Role::ComplianceOfficer => vec![
            OrganizationRead,
            UserRead,
            RequirementRead,
            RequirementWrite,
            AssessmentRead,
            AssessmentWrite,
            ActionPlanWrite,
            RiskRead,
            ScheduleRead,
            ScheduleWrite,
            ScheduleComplete,
        ],
        Role::RiskOfficer => vec![
            OrganizationRead,
            UserRead,
            RequirementRead,
            AssessmentRead,
            ActionPlanWrite,
            RiskRead,
            RiskWrite,
            ScheduleRead,
            ScheduleComplete,
        ],
        Role::BranchManager => vec![
            OrganizationRead,
            UserRead,
            RequirementRead,
            AssessmentRead,
            AssessmentWrite,
            ActionPlanWrite,
            RiskRead,
            ScheduleRead,
            ScheduleComplete,
        ],
        Role::Auditor => vec![
            OrganizationRead,
            UserRead,
            RequirementRead,
            AssessmentRead,
            RiskRead,
            ScheduleRead,
            BillingRead,
            AuditRead,
        ],
        Role::Staff => vec![
            OrganizationRead,
            RequirementRead,
            AssessmentRead,
            RiskRead,
            ScheduleRead,
            ScheduleComplete,
        ],
    }
}

/// Check whether a role holds a permission.
pub fn has_permission(role: Role, permission: Permission) -> bool {
    role_permissions(role).contains(&permission)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_holds_everything_but_platform_admin() {
        for p in Permission::all() {
            assert!(has_permission(Role::SuperAdmin, p));
            assert_eq!(has_permission(Role::Admin, p), p != Permission::PlatformAdmin);
        }
    }

    #[test]
    fn test_restricted_roles() {
        assert!(has_permission(Role::Auditor, Permission::AuditRead));
        assert!(!has_permission(Role::Auditor, Permission::AssessmentWrite));
        assert!(has_permission(Role::RiskOfficer, Permission::RiskWrite));
        assert!(!has_permission(Role::ComplianceOfficer, Permission::RiskWrite));
        assert!(has_permission(Role::Staff, Permission::ScheduleComplete));
        assert!(!has_permission(Role::Staff, Permission::ScheduleWrite));
        assert!(!has_permission(Role::BranchManager, Permission::UserManage));
        for role in [Role::ComplianceOfficer, Role::RiskOfficer, Role::BranchManager, Role::Auditor, Role::Staff] {
            assert!(!has_permission(role, Permission::NotificationBroadcast), "{role:?}");
        }
    }
}

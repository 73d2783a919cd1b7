use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

/// Role of a user within an organization. `SuperAdmin` is the platform
/// operator and is not bound to a single tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    ComplianceOfficer,
    RiskOfficer,
    BranchManager,
    Auditor,
    Staff,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::ComplianceOfficer => "compliance_officer",
            Role::RiskOfficer => "risk_officer",
            Role::BranchManager => "branch_manager",
            Role::Auditor => "auditor",
            Role::Staff => "staff",
        }
    }

    pub fn all() -> [Role; 7] {
        [
            Role::SuperAdmin,
            Role::Admin,
            Role::ComplianceOfficer,
            Role::RiskOfficer,
            Role::BranchManager,
            Role::Auditor,
            Role::Staff,
        ]
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::all()
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// Priority shared by requirement clauses and action plans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Percentage of `part` in `whole`, rounded half away from zero. Zero when
/// `whole` is zero.
pub fn percentage(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

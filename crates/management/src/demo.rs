//! Demo tenant for local development (`--seed-demo`).

use crate::handlers::ManagementState;
use crate::models::*;
use chrono::{Duration, Utc};
use compliance_core::{ComplianceResult, Frequency, Priority, Role};
use tracing::info;
use uuid::Uuid;

pub const DEMO_ADMIN_EMAIL: &str = "admin@demo-bank.example";
pub const DEMO_PASSWORD: &str = "demo-password";

/// Ids of the seeded demo tenant.
#[derive(Debug, Clone)]
pub struct DemoTenant {
    pub organization_id: Uuid,
    pub admin_id: Uuid,
}

/// Create a demo bank with one branch, a standard with clauses, an
/// assessment, an action plan, a risk and two schedules.
pub fn seed_demo(state: &ManagementState) -> ComplianceResult<DemoTenant> {
    let store = &state.store;
    let now = Utc::now();
    let today = now.date_naive();

    let org = store.create_organization("Demo Bank", "compliance@demo-bank.example", None, Some("Kenya".into()));
    state.billing.start_trial(org.id, now);
    let admin = store.insert_user(UserRecord {
        id: Uuid::new_v4(),
        organization_id: org.id,
        branch_id: None,
        email: DEMO_ADMIN_EMAIL.into(),
        first_name: "Demo".into(),
        last_name: "Admin".into(),
        phone: None,
        role: Role::Admin,
        password_hash: state.hasher.hash(DEMO_PASSWORD),
        is_active: true,
        last_login_at: None,
        reset_token_hash: None,
        reset_token_expires_at: None,
        created_at: now,
        updated_at: now,
    })?;
    let actor = admin.id;

    let branch = store.create_branch(
        org.id,
        actor,
        CreateBranchRequest {
            name: "Nairobi Head Office".into(),
            code: "NBO".into(),
            location: Some("Nairobi".into()),
            manager_id: Some(actor),
        },
    )?;
    let standard = store.create_standard(
        org.id,
        actor,
        CreateStandardRequest {
            name: "Prudential Guidelines on Corporate Governance".into(),
            code: "CBK/PG/02".into(),
            regulator: Some("Central Bank of Kenya".into()),
            description: None,
            version: Some("2013".into()),
            effective_date: None,
            is_active: true,
        },
    )?;
    let mut clauses = Vec::new();
    for (number, title, priority) in [
        ("2.1", "Board composition and independence", Priority::High),
        ("2.2", "Board committees", Priority::Medium),
        ("2.3", "Internal audit function", Priority::Critical),
    ] {
        clauses.push(store.create_clause(
            org.id,
            actor,
            standard.id,
            CreateClauseRequest {
                clause_number: number.into(),
                title: title.into(),
                description: None,
                category: Some("governance".into()),
                priority,
            },
        )?);
    }

    let assessment = store.create_assessment(
        org.id,
        actor,
        CreateAssessmentRequest {
            branch_id: branch.id,
            clause_id: clauses[2].id,
            implementation_status: 1,
            risk_level: 3,
            findings: Some("Internal audit reports directly to the CEO".into()),
            evidence: None,
            recommendation: Some("Establish a board audit committee reporting line".into()),
            assessment_date: Some(today),
        },
    )?;
    store.create_action_plan(
        org.id,
        actor,
        assessment.id,
        CreateActionPlanRequest {
            title: "Amend the internal audit charter".into(),
            description: None,
            responsible_user_id: Some(actor),
            due_date: today + Duration::days(30),
            priority: Priority::High,
        },
    )?;
    store.create_risk(
        org.id,
        actor,
        CreateRiskRequest {
            title: "Weak audit independence".into(),
            description: None,
            category: RiskCategory::Compliance,
            likelihood: 3,
            impact: 4,
            mitigation: Some("Charter amendment".into()),
            owner_id: Some(actor),
            branch_id: Some(branch.id),
            gap_assessment_id: Some(assessment.id),
            review_date: Some(today + Duration::days(90)),
        },
    )?;
    for (title, frequency, days) in [
        ("Monthly liquidity return", Frequency::Monthly, 5),
        ("Quarterly board compliance report", Frequency::Quarterly, 40),
    ] {
        store.create_schedule(
            org.id,
            actor,
            CreateScheduleRequest {
                title: title.into(),
                description: None,
                frequency,
                custom_interval_days: None,
                due_date: today + Duration::days(days),
                responsible_user_id: Some(actor),
                branch_id: Some(branch.id),
                clause_id: None,
                reminder_days_before: Some(7),
            },
        )?;
    }

    info!(
        organization_id = %org.id,
        email = DEMO_ADMIN_EMAIL,
        password = DEMO_PASSWORD,
        "Demo tenant seeded"
    );
    Ok(DemoTenant {
        organization_id: org.id,
        admin_id: actor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_billing::BillingEngine;
    use compliance_channels::EmailService;
    use compliance_core::AppConfig;
    use std::sync::Arc;

    #[test]
    fn test_seed_demo_populates_dashboard() {
        let state = ManagementState::new(
            Arc::new(AppConfig::default()),
            Arc::new(BillingEngine::default()),
            Arc::new(EmailService::default()),
        );
        let demo = seed_demo(&state).unwrap();
        let summary = state.store.dashboard(demo.organization_id, demo.admin_id, Utc::now());
        assert_eq!(summary.branches, 1);
        assert_eq!(summary.standards, 1);
        assert_eq!(summary.assessments.total, 1);
        assert_eq!(summary.risks.total, 1);
        assert_eq!(summary.schedules.total, 2);
        assert!(state.billing.subscription(demo.organization_id).is_ok());
    }
}

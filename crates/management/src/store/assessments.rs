use super::{get_scoped, list_scoped, remove_matching, remove_scoped, set, set_opt, today, update_scoped, ComplianceStore};
use crate::models::*;
use chrono::{NaiveDate, Utc};
use compliance_core::types::percentage;
use compliance_core::ComplianceResult;
use tracing::info;
use uuid::Uuid;

/// Aggregate scores over a set of assessments.
pub fn compute_assessment_stats<'a>(assessments: impl IntoIterator<Item = &'a GapAssessment>) -> AssessmentStats {
    let mut stats = AssessmentStats::default();
    let mut status_sum = 0u64;
    for a in assessments {
        stats.total += 1;
        status_sum += a.implementation_status as u64;
        match a.implementation_status {
            0 => stats.implementation.not_implemented += 1,
            1 => stats.implementation.partially_implemented += 1,
            2 => stats.implementation.largely_implemented += 1,
            _ => stats.implementation.fully_implemented += 1,
        }
        match a.risk_level {
            0 => stats.risk.none += 1,
            1 => stats.risk.low += 1,
            2 => stats.risk.medium += 1,
            _ => stats.risk.high += 1,
        }
        if a.implementation_status < MAX_GAP_SCORE {
            stats.gap_count += 1;
        }
        if a.risk_level == MAX_GAP_SCORE {
            stats.high_risk_count += 1;
        }
    }
    stats.compliance_percentage = percentage(status_sum, stats.total * MAX_GAP_SCORE as u64);
    stats
}

impl ComplianceStore {
    // ─── Gap Assessments ───────────────────────────────────────────────────

    pub fn create_assessment(&self, org: Uuid, actor: Uuid, req: CreateAssessmentRequest) -> ComplianceResult<GapAssessment> {
        req.validate()?;
        self.branch(org, req.branch_id)?;
        let clause = self.clause(org, req.clause_id)?;
        let now = Utc::now();
        let assessment = GapAssessment {
            id: Uuid::new_v4(),
            organization_id: org,
            branch_id: req.branch_id,
            clause_id: clause.id,
            standard_id: clause.standard_id,
            implementation_status: req.implementation_status,
            risk_level: req.risk_level,
            findings: req.findings,
            evidence: req.evidence,
            recommendation: req.recommendation,
            assessed_by: actor,
            assessment_date: req.assessment_date.unwrap_or_else(today),
            created_at: now,
            updated_at: now,
        };
        self.assessments.insert(assessment.id, assessment.clone());
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Create,
            "gap_assessment",
            assessment.id,
            serde_json::json!({
                "clauseId": clause.id,
                "implementationStatus": implementation_label(assessment.implementation_status),
                "riskLevel": risk_label(assessment.risk_level),
            }),
        );
        Ok(assessment)
    }

    pub fn assessment(&self, org: Uuid, id: Uuid) -> ComplianceResult<GapAssessment> {
        get_scoped(&self.assessments, org, id)
    }

    pub fn list_assessments(&self, org: Uuid, filter: &AssessmentFilter) -> Vec<GapAssessment> {
        let mut assessments = list_scoped(&self.assessments, org, |a| filter.matches(a));
        assessments.sort_by(|a, b| {
            b.assessment_date
                .cmp(&a.assessment_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        assessments
    }

    pub fn update_assessment(
        &self,
        org: Uuid,
        actor: Uuid,
        id: Uuid,
        req: UpdateAssessmentRequest,
    ) -> ComplianceResult<GapAssessment> {
        req.validate()?;
        let assessment = update_scoped(&self.assessments, org, id, |a| {
            set(&mut a.implementation_status, req.implementation_status);
            set(&mut a.risk_level, req.risk_level);
            set_opt(&mut a.findings, req.findings);
            set_opt(&mut a.evidence, req.evidence);
            set_opt(&mut a.recommendation, req.recommendation);
            set(&mut a.assessment_date, req.assessment_date);
            a.assessed_by = actor;
            a.updated_at = Utc::now();
            Ok(a.clone())
        })?;
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Update,
            "gap_assessment",
            id,
            serde_json::json!({
                "implementationStatus": assessment.implementation_status,
                "riskLevel": assessment.risk_level,
            }),
        );
        Ok(assessment)
    }

    /// Delete an assessment together with its action plans.
    pub fn delete_assessment(&self, org: Uuid, actor: Uuid, id: Uuid) -> ComplianceResult<()> {
        remove_scoped(&self.assessments, org, id)?;
        let removed = remove_matching(&self.action_plans, |p| p.gap_assessment_id == id);
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Delete,
            "gap_assessment",
            id,
            serde_json::json!({ "actionPlansRemoved": removed }),
        );
        Ok(())
    }

    pub fn assessment_stats(&self, org: Uuid, branch_id: Option<Uuid>, standard_id: Option<Uuid>) -> AssessmentStats {
        let filter = AssessmentFilter {
            branch_id,
            standard_id,
            ..Default::default()
        };
        compute_assessment_stats(&list_scoped(&self.assessments, org, |a| filter.matches(a)))
    }

    /// Assessment stats of every branch, including branches not assessed yet.
    pub fn branch_summary(&self, org: Uuid) -> Vec<BranchAssessmentSummary> {
        let assessments = list_scoped(&self.assessments, org, |_| true);
        self.list_branches(org)
            .into_iter()
            .map(|branch| BranchAssessmentSummary {
                stats: compute_assessment_stats(assessments.iter().filter(|a| a.branch_id == branch.id)),
                branch_id: branch.id,
                branch_name: branch.name,
            })
            .collect()
    }

    // ─── Action Plans ──────────────────────────────────────────────────────

    pub fn create_action_plan(
        &self,
        org: Uuid,
        actor: Uuid,
        assessment_id: Uuid,
        req: CreateActionPlanRequest,
    ) -> ComplianceResult<ActionPlan> {
        req.validate()?;
        self.assessment(org, assessment_id)?;
        if let Some(user) = req.responsible_user_id {
            self.user(org, user)?;
        }
        let now = Utc::now();
        let plan = ActionPlan {
            id: Uuid::new_v4(),
            organization_id: org,
            gap_assessment_id: assessment_id,
            title: req.title.trim().to_string(),
            description: req.description,
            responsible_user_id: req.responsible_user_id,
            due_date: req.due_date,
            priority: req.priority,
            status: ActionPlanStatus::NotStarted,
            progress: 0,
            completed_at: None,
            created_by: actor,
            created_at: now,
            updated_at: now,
        };
        self.action_plans.insert(plan.id, plan.clone());
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Create,
            "action_plan",
            plan.id,
            serde_json::json!({ "gapAssessmentId": assessment_id, "dueDate": plan.due_date }),
        );
        Ok(plan)
    }

    pub fn action_plan(&self, org: Uuid, id: Uuid) -> ComplianceResult<ActionPlan> {
        get_scoped(&self.action_plans, org, id)
    }

    pub fn list_action_plans(&self, org: Uuid, filter: &ActionPlanFilter) -> Vec<ActionPlan> {
        let mut plans = list_scoped(&self.action_plans, org, |p| {
            filter.gap_assessment_id.map_or(true, |id| p.gap_assessment_id == id)
                && filter.responsible_user_id.map_or(true, |id| p.responsible_user_id == Some(id))
                && filter.status.map_or(true, |s| p.status == s)
        });
        plans.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        plans
    }

    pub fn update_action_plan(
        &self,
        org: Uuid,
        actor: Uuid,
        id: Uuid,
        req: UpdateActionPlanRequest,
    ) -> ComplianceResult<ActionPlan> {
        req.validate()?;
        if let Some(user) = req.responsible_user_id {
            self.user(org, user)?;
        }
        let now = Utc::now();
        let plan = update_scoped(&self.action_plans, org, id, |p| {
            set(&mut p.title, req.title.map(|t| t.trim().to_string()));
            set_opt(&mut p.description, req.description);
            set_opt(&mut p.responsible_user_id, req.responsible_user_id);
            set(&mut p.due_date, req.due_date);
            set(&mut p.priority, req.priority);
            set(&mut p.progress, req.progress);
            if let Some(status) = req.status {
                p.status = status;
                if status == ActionPlanStatus::Completed {
                    p.progress = 100;
                    p.completed_at.get_or_insert(now);
                } else {
                    p.completed_at = None;
                }
            }
            p.updated_at = now;
            Ok(p.clone())
        })?;
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Update,
            "action_plan",
            id,
            serde_json::json!({ "status": plan.status, "progress": plan.progress }),
        );
        Ok(plan)
    }

    pub fn delete_action_plan(&self, org: Uuid, actor: Uuid, id: Uuid) -> ComplianceResult<()> {
        remove_scoped(&self.action_plans, org, id)?;
        self.log_audit(org, Some(actor), AuditAction::Delete, "action_plan", id, serde_json::json!({}));
        Ok(())
    }

    pub fn action_plan_stats(&self, org: Uuid) -> ActionPlanStats {
        let mut stats = ActionPlanStats::default();
        for plan in list_scoped(&self.action_plans, org, |_| true) {
            stats.total += 1;
            match plan.status {
                ActionPlanStatus::NotStarted => stats.not_started += 1,
                ActionPlanStatus::InProgress => stats.in_progress += 1,
                ActionPlanStatus::Completed => stats.completed += 1,
                ActionPlanStatus::Overdue => stats.overdue += 1,
            }
        }
        stats.completion_rate = percentage(stats.completed, stats.total);
        stats
    }

    /// Mark every unfinished action plan due before `today` as overdue,
    /// across all organizations. Returns the plans that changed.
    pub fn mark_overdue_action_plans(&self, today: NaiveDate) -> Vec<ActionPlan> {
        let mut changed = Vec::new();
        for mut plan in self.action_plans.iter_mut() {
            if plan.due_date < today
                && !matches!(plan.status, ActionPlanStatus::Completed | ActionPlanStatus::Overdue)
            {
                plan.status = ActionPlanStatus::Overdue;
                plan.updated_at = Utc::now();
                changed.push(plan.clone());
            }
        }
        if !changed.is_empty() {
            info!(count = changed.len(), "Action plans marked overdue");
        }
        changed
    }
}

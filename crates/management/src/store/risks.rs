use super::{get_scoped, list_scoped, remove_scoped, set, set_opt, update_scoped, ComplianceStore};
use crate::models::*;
use chrono::Utc;
use compliance_core::ComplianceResult;
use std::collections::BTreeMap;
use uuid::Uuid;

impl ComplianceStore {
    pub fn create_risk(&self, org: Uuid, actor: Uuid, req: CreateRiskRequest) -> ComplianceResult<Risk> {
        req.validate()?;
        if let Some(owner) = req.owner_id {
            self.user(org, owner)?;
        }
        if let Some(branch) = req.branch_id {
            self.branch(org, branch)?;
        }
        if let Some(assessment) = req.gap_assessment_id {
            self.assessment(org, assessment)?;
        }
        let now = Utc::now();
        let mut risk = Risk {
            id: Uuid::new_v4(),
            organization_id: org,
            title: req.title.trim().to_string(),
            description: req.description,
            category: req.category,
            likelihood: req.likelihood,
            impact: req.impact,
            score: 0,
            rating: RiskRating::Low,
            mitigation: req.mitigation,
            owner_id: req.owner_id,
            branch_id: req.branch_id,
            gap_assessment_id: req.gap_assessment_id,
            status: RiskStatus::Open,
            review_date: req.review_date,
            created_by: actor,
            created_at: now,
            updated_at: now,
        };
        risk.rescore();
        self.risks.insert(risk.id, risk.clone());
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Create,
            "risk",
            risk.id,
            serde_json::json!({ "score": risk.score, "rating": risk.rating }),
        );
        Ok(risk)
    }

    pub fn risk(&self, org: Uuid, id: Uuid) -> ComplianceResult<Risk> {
        get_scoped(&self.risks, org, id)
    }

    /// Risks matching the filter, highest score first.
    pub fn list_risks(&self, org: Uuid, filter: &RiskFilter) -> Vec<Risk> {
        let mut risks = list_scoped(&self.risks, org, |r| {
            filter.category.map_or(true, |c| r.category == c)
                && filter.status.map_or(true, |s| r.status == s)
                && filter.rating.map_or(true, |g| r.rating == g)
                && filter.branch_id.map_or(true, |b| r.branch_id == Some(b))
                && filter.owner_id.map_or(true, |o| r.owner_id == Some(o))
        });
        risks.sort_by(|a, b| b.score.cmp(&a.score).then(a.title.cmp(&b.title)));
        risks
    }

    pub fn update_risk(&self, org: Uuid, actor: Uuid, id: Uuid, req: UpdateRiskRequest) -> ComplianceResult<Risk> {
        req.validate()?;
        if let Some(owner) = req.owner_id {
            self.user(org, owner)?;
        }
        if let Some(branch) = req.branch_id {
            self.branch(org, branch)?;
        }
        let risk = update_scoped(&self.risks, org, id, |r| {
            set(&mut r.title, req.title.map(|t| t.trim().to_string()));
            set_opt(&mut r.description, req.description);
            set(&mut r.category, req.category);
            set(&mut r.likelihood, req.likelihood);
            set(&mut r.impact, req.impact);
            set_opt(&mut r.mitigation, req.mitigation);
            set_opt(&mut r.owner_id, req.owner_id);
            set_opt(&mut r.branch_id, req.branch_id);
            set(&mut r.status, req.status);
            set_opt(&mut r.review_date, req.review_date);
            r.rescore();
            r.updated_at = Utc::now();
            Ok(r.clone())
        })?;
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Update,
            "risk",
            id,
            serde_json::json!({ "score": risk.score, "rating": risk.rating, "status": risk.status }),
        );
        Ok(risk)
    }

    pub fn delete_risk(&self, org: Uuid, actor: Uuid, id: Uuid) -> ComplianceResult<()> {
        remove_scoped(&self.risks, org, id)?;
        self.log_audit(org, Some(actor), AuditAction::Delete, "risk", id, serde_json::json!({}));
        Ok(())
    }

    pub fn risk_stats(&self, org: Uuid) -> RiskStats {
        let risks = list_scoped(&self.risks, org, |_| true);
        let mut stats = RiskStats::default();
        let mut by_category: BTreeMap<&'static str, (RiskCategory, u64)> = BTreeMap::new();
        let mut score_sum = 0u64;

        for risk in &risks {
            stats.total += 1;
            score_sum += risk.score as u64;
            match risk.rating {
                RiskRating::Low => stats.by_rating.low += 1,
                RiskRating::Medium => stats.by_rating.medium += 1,
                RiskRating::High => stats.by_rating.high += 1,
                RiskRating::Critical => stats.by_rating.critical += 1,
            }
            match risk.status {
                RiskStatus::Open => stats.by_status.open += 1,
                RiskStatus::Mitigating => stats.by_status.mitigating += 1,
                RiskStatus::Accepted => stats.by_status.accepted += 1,
                RiskStatus::Closed => stats.by_status.closed += 1,
            }
            by_category
                .entry(risk.category.as_str())
                .or_insert((risk.category, 0))
                .1 += 1;
        }

        stats.by_category = by_category
            .into_values()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        if stats.total > 0 {
            let mean = score_sum as f64 / stats.total as f64;
            stats.average_score = (mean * 10.0).round() / 10.0;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use compliance_core::ComplianceError;

    fn risk_req(category: RiskCategory, likelihood: u8, impact: u8) -> CreateRiskRequest {
        CreateRiskRequest {
            title: format!("{category:?} {likelihood}x{impact}"),
            description: None,
            category,
            likelihood,
            impact,
            mitigation: None,
            owner_id: None,
            branch_id: None,
            gap_assessment_id: None,
            review_date: None,
        }
    }

    #[test]
    fn test_score_and_rating_follow_updates() {
        let (store, org, admin) = store_with_org();
        let risk = store.create_risk(org, admin, risk_req(RiskCategory::Credit, 3, 3)).unwrap();
        assert_eq!(risk.score, 9);
        assert_eq!(risk.rating, RiskRating::Medium);

        let updated = store
            .update_risk(
                org,
                admin,
                risk.id,
                UpdateRiskRequest {
                    impact: Some(5),
                    likelihood: Some(4),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.score, 20);
        assert_eq!(updated.rating, RiskRating::Critical);
    }

    #[test]
    fn test_factors_out_of_range_are_rejected() {
        let (store, org, admin) = store_with_org();
        let err = store.create_risk(org, admin, risk_req(RiskCategory::Market, 0, 3)).unwrap_err();
        assert!(matches!(err, ComplianceError::Validation(_)));
        assert!(store.create_risk(org, admin, risk_req(RiskCategory::Market, 2, 6)).is_err());
    }

    #[test]
    fn test_stats_average_and_categories() {
        let (store, org, admin) = store_with_org();
        store.create_risk(org, admin, risk_req(RiskCategory::Credit, 1, 1)).unwrap();
        store.create_risk(org, admin, risk_req(RiskCategory::Credit, 2, 2)).unwrap();
        store.create_risk(org, admin, risk_req(RiskCategory::Technology, 5, 5)).unwrap();

        let stats = store.risk_stats(org);
        assert_eq!(stats.total, 3);
        // (1 + 4 + 25) / 3 = 10.0
        assert_eq!(stats.average_score, 10.0);
        assert_eq!(stats.by_rating.low, 2);
        assert_eq!(stats.by_rating.critical, 1);
        assert_eq!(stats.by_status.open, 3);
        let credit = stats.by_category.iter().find(|c| c.category == RiskCategory::Credit).unwrap();
        assert_eq!(credit.count, 2);

        let listed = store.list_risks(org, &RiskFilter::default());
        assert_eq!(listed[0].score, 25);
    }
}

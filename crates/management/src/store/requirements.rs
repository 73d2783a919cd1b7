use super::{get_scoped, list_scoped, remove_matching, remove_scoped, set, set_opt, update_scoped, ComplianceStore};
use crate::models::*;
use chrono::Utc;
use compliance_core::{ComplianceError, ComplianceResult};
use uuid::Uuid;

impl ComplianceStore {
    fn ensure_standard_code_free(&self, org: Uuid, code: &str, except: Option<Uuid>) -> ComplianceResult<()> {
        let taken = self.standards.iter().any(|s| {
            s.organization_id == org && Some(s.id) != except && s.code.eq_ignore_ascii_case(code.trim())
        });
        if taken {
            return Err(ComplianceError::Conflict(format!("standard code {} is already in use", code.trim())));
        }
        Ok(())
    }

    fn clause_count(&self, standard_id: Uuid) -> u32 {
        self.clauses.iter().filter(|c| c.standard_id == standard_id).count() as u32
    }

    fn with_clause_count(&self, mut standard: ComplianceStandard) -> ComplianceStandard {
        standard.clause_count = self.clause_count(standard.id);
        standard
    }

    // ─── Standards ─────────────────────────────────────────────────────────

    pub fn create_standard(&self, org: Uuid, actor: Uuid, req: CreateStandardRequest) -> ComplianceResult<ComplianceStandard> {
        req.validate()?;
        self.ensure_standard_code_free(org, &req.code, None)?;
        let now = Utc::now();
        let standard = ComplianceStandard {
            id: Uuid::new_v4(),
            organization_id: org,
            name: req.name.trim().to_string(),
            code: req.code.trim().to_string(),
            regulator: req.regulator,
            description: req.description,
            version: req.version,
            effective_date: req.effective_date,
            is_active: req.is_active,
            clause_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.standards.insert(standard.id, standard.clone());
        self.log_audit(org, Some(actor), AuditAction::Create, "standard", standard.id, serde_json::json!({ "code": &standard.code }));
        Ok(standard)
    }

    pub fn standard(&self, org: Uuid, id: Uuid) -> ComplianceResult<ComplianceStandard> {
        get_scoped(&self.standards, org, id).map(|s| self.with_clause_count(s))
    }

    pub fn list_standards(&self, org: Uuid) -> Vec<ComplianceStandard> {
        let mut standards: Vec<ComplianceStandard> = list_scoped(&self.standards, org, |_| true)
            .into_iter()
            .map(|s| self.with_clause_count(s))
            .collect();
        standards.sort_by(|a, b| a.code.cmp(&b.code));
        standards
    }

    pub fn update_standard(
        &self,
        org: Uuid,
        actor: Uuid,
        id: Uuid,
        req: UpdateStandardRequest,
    ) -> ComplianceResult<ComplianceStandard> {
        if let Some(code) = &req.code {
            if code.trim().is_empty() {
                return Err(ComplianceError::validation("code must not be empty"));
            }
            self.ensure_standard_code_free(org, code, Some(id))?;
        }
        let standard = update_scoped(&self.standards, org, id, |s| {
            set(&mut s.name, req.name.map(|n| n.trim().to_string()));
            set(&mut s.code, req.code.map(|c| c.trim().to_string()));
            set_opt(&mut s.regulator, req.regulator);
            set_opt(&mut s.description, req.description);
            set_opt(&mut s.version, req.version);
            set_opt(&mut s.effective_date, req.effective_date);
            set(&mut s.is_active, req.is_active);
            s.updated_at = Utc::now();
            Ok(s.clone())
        })?;
        self.log_audit(org, Some(actor), AuditAction::Update, "standard", id, serde_json::json!({}));
        Ok(self.with_clause_count(standard))
    }

    /// Delete a standard together with its clauses.
    pub fn delete_standard(&self, org: Uuid, actor: Uuid, id: Uuid) -> ComplianceResult<()> {
        let standard = remove_scoped(&self.standards, org, id)?;
        let removed = remove_matching(&self.clauses, |c| c.standard_id == id);
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Delete,
            "standard",
            id,
            serde_json::json!({ "code": standard.code, "clausesRemoved": removed }),
        );
        Ok(())
    }

    // ─── Clauses ───────────────────────────────────────────────────────────

    pub fn create_clause(
        &self,
        org: Uuid,
        actor: Uuid,
        standard_id: Uuid,
        req: CreateClauseRequest,
    ) -> ComplianceResult<RequirementClause> {
        req.validate()?;
        self.standard(org, standard_id)?;
        let now = Utc::now();
        let clause = RequirementClause {
            id: Uuid::new_v4(),
            organization_id: org,
            standard_id,
            clause_number: req.clause_number.trim().to_string(),
            title: req.title.trim().to_string(),
            description: req.description,
            category: req.category,
            priority: req.priority,
            created_at: now,
            updated_at: now,
        };
        self.clauses.insert(clause.id, clause.clone());
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Create,
            "clause",
            clause.id,
            serde_json::json!({ "standardId": standard_id, "clauseNumber": &clause.clause_number }),
        );
        Ok(clause)
    }

    pub fn clause(&self, org: Uuid, id: Uuid) -> ComplianceResult<RequirementClause> {
        get_scoped(&self.clauses, org, id)
    }

    pub fn list_clauses(&self, org: Uuid, standard_id: Uuid) -> ComplianceResult<Vec<RequirementClause>> {
        self.standard(org, standard_id)?;
        let mut clauses = list_scoped(&self.clauses, org, |c| c.standard_id == standard_id);
        clauses.sort_by(|a, b| a.clause_number.cmp(&b.clause_number));
        Ok(clauses)
    }

    pub fn update_clause(&self, org: Uuid, actor: Uuid, id: Uuid, req: UpdateClauseRequest) -> ComplianceResult<RequirementClause> {
        let clause = update_scoped(&self.clauses, org, id, |c| {
            set(&mut c.clause_number, req.clause_number.map(|n| n.trim().to_string()));
            set(&mut c.title, req.title.map(|t| t.trim().to_string()));
            set_opt(&mut c.description, req.description);
            set_opt(&mut c.category, req.category);
            set(&mut c.priority, req.priority);
            c.updated_at = Utc::now();
            Ok(c.clone())
        })?;
        self.log_audit(org, Some(actor), AuditAction::Update, "clause", id, serde_json::json!({}));
        Ok(clause)
    }

    pub fn delete_clause(&self, org: Uuid, actor: Uuid, id: Uuid) -> ComplianceResult<()> {
        remove_scoped(&self.clauses, org, id)?;
        self.log_audit(org, Some(actor), AuditAction::Delete, "clause", id, serde_json::json!({}));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use compliance_core::Priority;

    fn standard_req(code: &str) -> CreateStandardRequest {
        CreateStandardRequest {
            name: "CBK Prudential Guidelines".into(),
            code: code.into(),
            regulator: Some("Central Bank of Kenya".into()),
            description: None,
            version: Some("2013".into()),
            effective_date: None,
            is_active: true,
        }
    }

    fn clause_req(number: &str) -> CreateClauseRequest {
        CreateClauseRequest {
            clause_number: number.into(),
            title: format!("Clause {number}"),
            description: None,
            category: Some("governance".into()),
            priority: Priority::High,
        }
    }

    #[test]
    fn test_clause_count_and_cascade() {
        let (store, org, admin) = store_with_org();
        let standard = store.create_standard(org, admin, standard_req("CBK/PG/02")).unwrap();
        let other = store.create_standard(org, admin, standard_req("CBK/PG/08")).unwrap();
        store.create_clause(org, admin, standard.id, clause_req("2.1")).unwrap();
        store.create_clause(org, admin, standard.id, clause_req("2.2")).unwrap();
        store.create_clause(org, admin, other.id, clause_req("8.1")).unwrap();

        assert_eq!(store.standard(org, standard.id).unwrap().clause_count, 2);
        let listed = store.list_standards(org);
        assert_eq!(listed.iter().map(|s| s.clause_count).sum::<u32>(), 3);

        store.delete_standard(org, admin, standard.id).unwrap();
        assert!(store.list_clauses(org, standard.id).is_err());
        assert_eq!(store.list_clauses(org, other.id).unwrap().len(), 1);
    }

    #[test]
    fn test_standard_code_unique() {
        let (store, org, admin) = store_with_org();
        store.create_standard(org, admin, standard_req("AML")).unwrap();
        assert!(matches!(
            store.create_standard(org, admin, standard_req("aml")),
            Err(ComplianceError::Conflict(_))
        ));
    }

    #[test]
    fn test_clause_needs_standard_in_organization() {
        let (store, org, admin) = store_with_org();
        let other = store.create_organization("Other", "o@x.example", None, None);
        let foreign = store.create_standard(other.id, admin, standard_req("X")).unwrap();
        assert!(matches!(
            store.create_clause(org, admin, foreign.id, clause_req("1")),
            Err(ComplianceError::NotFound(_))
        ));
    }
}

use super::{get_scoped, list_scoped, remove_scoped, set, set_opt, update_scoped, ComplianceStore};
use crate::models::*;
use chrono::Utc;
use compliance_core::{ComplianceError, ComplianceResult};
use uuid::Uuid;

impl ComplianceStore {
    fn ensure_branch_code_free(&self, org: Uuid, code: &str, except: Option<Uuid>) -> ComplianceResult<()> {
        let taken = self.branches.iter().any(|b| {
            b.organization_id == org && Some(b.id) != except && b.code.eq_ignore_ascii_case(code.trim())
        });
        if taken {
            return Err(ComplianceError::Conflict(format!("branch code {} is already in use", code.trim())));
        }
        Ok(())
    }

    pub fn create_branch(&self, org: Uuid, actor: Uuid, req: CreateBranchRequest) -> ComplianceResult<Branch> {
        req.validate()?;
        self.ensure_branch_code_free(org, &req.code, None)?;
        if let Some(manager) = req.manager_id {
            self.user(org, manager)?;
        }
        let now = Utc::now();
        let branch = Branch {
            id: Uuid::new_v4(),
            organization_id: org,
            name: req.name.trim().to_string(),
            code: req.code.trim().to_uppercase(),
            location: req.location,
            manager_id: req.manager_id,
            created_at: now,
            updated_at: now,
        };
        self.branches.insert(branch.id, branch.clone());
        self.log_audit(org, Some(actor), AuditAction::Create, "branch", branch.id, serde_json::json!({ "code": &branch.code }));
        Ok(branch)
    }

    pub fn branch(&self, org: Uuid, id: Uuid) -> ComplianceResult<Branch> {
        get_scoped(&self.branches, org, id)
    }

    pub fn list_branches(&self, org: Uuid) -> Vec<Branch> {
        let mut branches = list_scoped(&self.branches, org, |_| true);
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        branches
    }

    pub fn update_branch(&self, org: Uuid, actor: Uuid, id: Uuid, req: UpdateBranchRequest) -> ComplianceResult<Branch> {
        if let Some(code) = &req.code {
            if code.trim().is_empty() {
                return Err(ComplianceError::validation("code must not be empty"));
            }
            self.ensure_branch_code_free(org, code, Some(id))?;
        }
        if let Some(manager) = req.manager_id {
            self.user(org, manager)?;
        }
        let branch = update_scoped(&self.branches, org, id, |b| {
            set(&mut b.name, req.name.map(|n| n.trim().to_string()));
            set(&mut b.code, req.code.map(|c| c.trim().to_uppercase()));
            set_opt(&mut b.location, req.location);
            set_opt(&mut b.manager_id, req.manager_id);
            b.updated_at = Utc::now();
            Ok(b.clone())
        })?;
        self.log_audit(org, Some(actor), AuditAction::Update, "branch", id, serde_json::json!({}));
        Ok(branch)
    }

    /// Delete a branch and detach its users.
    pub fn delete_branch(&self, org: Uuid, actor: Uuid, id: Uuid) -> ComplianceResult<()> {
        let branch = remove_scoped(&self.branches, org, id)?;
        let mut detached = 0;
        for mut user in self.users.iter_mut() {
            if user.organization_id == org && user.branch_id == Some(id) {
                user.branch_id = None;
                detached += 1;
            }
        }
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Delete,
            "branch",
            id,
            serde_json::json!({ "code": branch.code, "detachedUsers": detached }),
        );
        Ok(())
    }
}

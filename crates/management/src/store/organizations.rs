use super::{set, set_opt, ComplianceStore};
use crate::models::*;
use chrono::Utc;
use compliance_core::{ComplianceError, ComplianceResult};
use tracing::info;
use uuid::Uuid;

impl ComplianceStore {
    /// Create an organization in `Trial` status with a unique slug.
    pub fn create_organization(
        &self,
        name: &str,
        email: &str,
        phone: Option<String>,
        country: Option<String>,
    ) -> Organization {
        let now = Utc::now();
        let base = slugify(name);
        let mut slug = base.clone();
        let mut n = 1;
        while self.organizations.iter().any(|o| o.slug == slug) {
            n += 1;
            slug = format!("{base}-{n}");
        }
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            slug,
            email: email.trim().to_lowercase(),
            phone,
            country,
            address: None,
            status: OrganizationStatus::Trial,
            created_at: now,
            updated_at: now,
        };
        self.organizations.insert(org.id, org.clone());
        info!(organization_id = %org.id, slug = %org.slug, "Organization created");
        org
    }

    /// Create an organization together with its first user. When the user
    /// cannot be inserted (email taken) the organization is discarded.
    pub fn register_organization(
        &self,
        name: &str,
        email: &str,
        phone: Option<String>,
        country: Option<String>,
        first_user: impl FnOnce(&Organization) -> UserRecord,
    ) -> ComplianceResult<(Organization, UserRecord)> {
        let org = self.create_organization(name, email, phone, country);
        match self.insert_user(first_user(&org)) {
            Ok(user) => Ok((org, user)),
            Err(err) => {
                self.organizations.remove(&org.id);
                info!(organization_id = %org.id, "Organization discarded after failed registration");
                Err(err)
            }
        }
    }

    pub fn organization(&self, id: Uuid) -> ComplianceResult<Organization> {
        self.organizations
            .get(&id)
            .map(|o| o.value().clone())
            .ok_or_else(|| ComplianceError::not_found("Organization"))
    }

    pub fn list_organizations(&self) -> Vec<Organization> {
        let mut orgs: Vec<Organization> = self.organizations.iter().map(|o| o.value().clone()).collect();
        orgs.sort_by(|a, b| a.name.cmp(&b.name));
        orgs
    }

    pub fn organization_count(&self) -> usize {
        self.organizations.len()
    }

    pub fn update_organization(
        &self,
        id: Uuid,
        actor: Uuid,
        req: UpdateOrganizationRequest,
    ) -> ComplianceResult<Organization> {
        if matches!(&req.name, Some(name) if name.trim().is_empty()) {
            return Err(ComplianceError::validation("name must not be empty"));
        }
        let org = {
            let mut org = self
                .organizations
                .get_mut(&id)
                .ok_or_else(|| ComplianceError::not_found("Organization"))?;
            set(&mut org.name, req.name.map(|n| n.trim().to_string()));
            set(&mut org.email, req.email.map(|e| e.trim().to_lowercase()));
            set_opt(&mut org.phone, req.phone);
            set_opt(&mut org.country, req.country);
            set_opt(&mut org.address, req.address);
            org.updated_at = Utc::now();
            org.clone()
        };
        self.log_audit(id, Some(actor), AuditAction::Update, "organization", id, serde_json::json!({}));
        Ok(org)
    }

    pub fn set_organization_status(
        &self,
        id: Uuid,
        actor: Option<Uuid>,
        status: OrganizationStatus,
    ) -> ComplianceResult<Organization> {
        let (org, previous) = {
            let mut org = self
                .organizations
                .get_mut(&id)
                .ok_or_else(|| ComplianceError::not_found("Organization"))?;
            let previous = org.status;
            org.status = status;
            org.updated_at = Utc::now();
            (org.clone(), previous)
        };
        if previous != status {
            info!(organization_id = %id, from = ?previous, to = ?status, "Organization status changed");
            self.log_audit(
                id,
                actor,
                AuditAction::StatusChange,
                "organization",
                id,
                serde_json::json!({ "from": previous, "to": status }),
            );
        }
        Ok(org)
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "organization".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugs_are_unique() {
        let store = ComplianceStore::new();
        let a = store.create_organization("Equity Bank (Kenya)", "a@x.example", None, None);
        let b = store.create_organization("Equity Bank Kenya", "b@x.example", None, None);
        assert_eq!(a.slug, "equity-bank-kenya");
        assert_eq!(b.slug, "equity-bank-kenya-2");
        assert_eq!(a.status, OrganizationStatus::Trial);
        assert_eq!(slugify("!!!"), "organization");
    }

    #[test]
    fn test_status_change_is_audited_once() {
        let store = ComplianceStore::new();
        let org = store.create_organization("Bank", "a@x.example", None, None);
        store.set_organization_status(org.id, None, OrganizationStatus::Suspended).unwrap();
        store.set_organization_status(org.id, None, OrganizationStatus::Suspended).unwrap();
        assert_eq!(store.audit_log(org.id).len(), 1);
        assert!(!store.organization(org.id).unwrap().status.can_sign_in());
    }

    fn admin(org: &Organization, email: &str) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::new_v4(),
            organization_id: org.id,
            branch_id: None,
            email: email.into(),
            first_name: "Amina".into(),
            last_name: "Otieno".into(),
            phone: None,
            role: compliance_core::Role::Admin,
            password_hash: "x".into(),
            is_active: true,
            last_login_at: None,
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_failed_registration_leaves_no_organization() {
        let store = ComplianceStore::new();
        let (org, user) = store
            .register_organization("First Bank", "ops@first.example", None, None, |o| admin(o, "ops@first.example"))
            .unwrap();
        assert_eq!(user.organization_id, org.id);
        assert_eq!(store.organization_count(), 1);

        let err = store
            .register_organization("Second Bank", "ops@first.example", None, None, |o| {
                admin(o, "OPS@first.example")
            })
            .unwrap_err();
        assert!(matches!(err, ComplianceError::Conflict(_)));
        assert_eq!(store.organization_count(), 1);
        assert!(store.list_organizations().iter().all(|o| o.name == "First Bank"));
    }
}

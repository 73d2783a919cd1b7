use super::{get_scoped, list_scoped, remove_scoped, set, set_opt, update_scoped, ComplianceStore};
use crate::models::*;
use chrono::{DateTime, Utc};
use compliance_core::{ComplianceError, ComplianceResult, Role};
use dashmap::mapref::entry::Entry;
use tracing::info;
use uuid::Uuid;

impl ComplianceStore {
    /// Insert a user. Emails are unique across all organizations.
    pub fn insert_user(&self, user: UserRecord) -> ComplianceResult<UserRecord> {
        let key = user.email.trim().to_lowercase();
        match self.user_emails.entry(key) {
            Entry::Occupied(_) => {
                return Err(ComplianceError::Conflict(format!(
                    "a user with email {} already exists",
                    user.email
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }
        let mut user = user;
        user.email = user.email.trim().to_lowercase();
        self.users.insert(user.id, user.clone());
        info!(user_id = %user.id, organization_id = %user.organization_id, role = %user.role, "User created");
        Ok(user)
    }

    pub fn user(&self, org: Uuid, id: Uuid) -> ComplianceResult<UserRecord> {
        get_scoped(&self.users, org, id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<UserRecord> {
        let id = *self.user_emails.get(&email.trim().to_lowercase())?;
        self.users.get(&id).map(|u| u.value().clone())
    }

    pub fn list_users(&self, org: Uuid, filter: &UserFilter) -> Vec<UserProfile> {
        let mut users: Vec<UserProfile> = list_scoped(&self.users, org, |u| {
            filter.role.map_or(true, |r| u.role == r)
                && filter.branch_id.map_or(true, |b| u.branch_id == Some(b))
                && filter.is_active.map_or(true, |a| u.is_active == a)
        })
        .iter()
        .map(UserRecord::profile)
        .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        users
    }

    /// Active users holding `role`, e.g. the admins to notify.
    pub fn users_with_role(&self, org: Uuid, role: Role) -> Vec<UserRecord> {
        list_scoped(&self.users, org, |u| u.is_active && u.role == role)
    }

    pub fn active_user_ids(&self, org: Uuid) -> Vec<Uuid> {
        list_scoped(&self.users, org, |u| u.is_active)
            .into_iter()
            .map(|u| u.id)
            .collect()
    }

    pub fn update_user(&self, org: Uuid, actor: Uuid, id: Uuid, req: UpdateUserRequest) -> ComplianceResult<UserProfile> {
        if req.role == Some(Role::SuperAdmin) {
            return Err(ComplianceError::Forbidden(
                "super_admin cannot be assigned through the organization API".into(),
            ));
        }
        if actor == id && req.is_active == Some(false) {
            return Err(ComplianceError::Conflict("you cannot deactivate your own account".into()));
        }
        if let Some(branch_id) = req.branch_id {
            self.branch(org, branch_id)?;
        }
        let profile = update_scoped(&self.users, org, id, |u| {
            set(&mut u.first_name, req.first_name);
            set(&mut u.last_name, req.last_name);
            set_opt(&mut u.phone, req.phone);
            set(&mut u.role, req.role);
            set_opt(&mut u.branch_id, req.branch_id);
            set(&mut u.is_active, req.is_active);
            u.updated_at = Utc::now();
            Ok(u.profile())
        })?;
        self.log_audit(org, Some(actor), AuditAction::Update, "user", id, serde_json::json!({ "role": profile.role }));
        Ok(profile)
    }

    pub fn set_user_active(&self, org: Uuid, actor: Uuid, id: Uuid, active: bool) -> ComplianceResult<UserProfile> {
        self.update_user(
            org,
            actor,
            id,
            UpdateUserRequest {
                is_active: Some(active),
                ..Default::default()
            },
        )
    }

    pub fn delete_user(&self, org: Uuid, actor: Uuid, id: Uuid) -> ComplianceResult<()> {
        if actor == id {
            return Err(ComplianceError::Conflict("you cannot delete your own account".into()));
        }
        let user = remove_scoped(&self.users, org, id)?;
        self.user_emails.remove(&user.email);
        self.log_audit(org, Some(actor), AuditAction::Delete, "user", id, serde_json::json!({ "email": user.email }));
        Ok(())
    }

    pub fn record_login(&self, id: Uuid, at: DateTime<Utc>) {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.last_login_at = Some(at);
        }
    }

    pub fn set_password_hash(&self, org: Uuid, id: Uuid, password_hash: String) -> ComplianceResult<()> {
        update_scoped(&self.users, org, id, |u| {
            u.password_hash = password_hash;
            u.reset_token_hash = None;
            u.reset_token_expires_at = None;
            u.updated_at = Utc::now();
            Ok(())
        })
    }

    pub fn set_reset_token(&self, id: Uuid, token_hash: String, expires_at: DateTime<Utc>) {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.reset_token_hash = Some(token_hash);
            user.reset_token_expires_at = Some(expires_at);
        }
    }

    /// Find and clear the reset token with this hash. Expired tokens are
    /// cleared and rejected.
    pub fn consume_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> ComplianceResult<UserRecord> {
        let invalid = || ComplianceError::validation("reset token is invalid or has expired");
        let mut user = self
            .users
            .iter_mut()
            .find(|u| u.reset_token_hash.as_deref() == Some(token_hash))
            .ok_or_else(invalid)?;
        let expires = user.reset_token_expires_at;
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        match expires {
            Some(expires) if expires > now => Ok(user.clone()),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_email_is_unique_across_organizations() {
        let (store, _org, _admin) = store_with_org();
        let other = Uuid::new_v4();
        let err = store
            .insert_user(new_user(other, "ADMIN@testbank.example", Role::Staff))
            .unwrap_err();
        assert!(matches!(err, ComplianceError::Conflict(_)));
        assert!(store.find_user_by_email(" Admin@TestBank.example ").is_some());
    }

    #[test]
    fn test_admin_cannot_remove_themselves() {
        let (store, org, admin) = store_with_org();
        assert!(matches!(store.delete_user(org, admin, admin), Err(ComplianceError::Conflict(_))));
        assert!(matches!(store.set_user_active(org, admin, admin, false), Err(ComplianceError::Conflict(_))));

        let staff = store.insert_user(new_user(org, "staff@testbank.example", Role::Staff)).unwrap();
        assert!(!store.set_user_active(org, admin, staff.id, false).unwrap().is_active);
        store.delete_user(org, admin, staff.id).unwrap();
        assert!(store.find_user_by_email("staff@testbank.example").is_none());
    }

    #[test]
    fn test_filters() {
        let (store, org, _admin) = store_with_org();
        store.insert_user(new_user(org, "auditor@testbank.example", Role::Auditor)).unwrap();
        let auditors = store.list_users(
            org,
            &UserFilter {
                role: Some(Role::Auditor),
                ..Default::default()
            },
        );
        assert_eq!(auditors.len(), 1);
        assert_eq!(store.list_users(org, &UserFilter::default()).len(), 2);
        assert_eq!(store.users_with_role(org, Role::Admin).len(), 1);
    }

    #[test]
    fn test_reset_token_is_single_use_and_expires() {
        let (store, _org, admin) = store_with_org();
        let now = Utc::now();
        store.set_reset_token(admin, "hash-1".into(), now + Duration::minutes(60));
        assert_eq!(store.consume_reset_token("hash-1", now).unwrap().id, admin);
        assert!(store.consume_reset_token("hash-1", now).is_err());

        store.set_reset_token(admin, "hash-2".into(), now - Duration::minutes(1));
        assert!(store.consume_reset_token("hash-2", now).is_err());
    }
}

//! Multi-tenancy: confine every request to the caller's organization.
//!
//! An organization id may arrive in a path parameter, the query string or
//! the top-level JSON body. Any of them naming a different organization is
//! a violation, except for the platform `SuperAdmin`.

use crate::auth::Claims;
use compliance_core::Role;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Field name checked in path parameters, query strings and JSON bodies.
pub const ORGANIZATION_ID_FIELD: &str = "organizationId";
const ORGANIZATION_ID_ALIAS: &str = "organization_id";

/// Where a conflicting organization id was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizationSource {
    Path,
    Query,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantViolation {
    pub source: OrganizationSource,
    pub requested: String,
}

impl std::fmt::Display for TenantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "organization {} in {:?} does not match the caller's organization",
            self.requested, self.source
        )
    }
}

/// The organization a request is allowed to touch.
#[derive(Debug, Clone, Copy)]
pub struct TenantScope {
    organization_id: Uuid,
    role: Role,
}

impl TenantScope {
    pub fn new(organization_id: Uuid, role: Role) -> Self {
        Self {
            organization_id,
            role,
        }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        Self::new(claims.org, claims.role)
    }

    pub fn organization_id(&self) -> Uuid {
        self.organization_id
    }

    pub fn bypasses_isolation(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// Check a single requested organization id.
    pub fn check(&self, source: OrganizationSource, requested: &str) -> Result<(), TenantViolation> {
        if self.bypasses_isolation() {
            return Ok(());
        }
        match Uuid::parse_str(requested.trim()) {
            Ok(id) if id == self.organization_id => Ok(()),
            _ => {
                warn!(
                    caller_org = %self.organization_id,
                    requested = %requested,
                    source = ?source,
                    "Cross-tenant access rejected"
                );
                Err(TenantViolation {
                    source,
                    requested: requested.to_string(),
                })
            }
        }
    }

    /// Check matched path parameters.
    pub fn check_path<'a, I>(&self, params: I) -> Result<(), TenantViolation>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in params {
            if is_organization_key(key) {
                self.check(OrganizationSource::Path, value)?;
            }
        }
        Ok(())
    }

    /// Check a raw query string (without the leading `?`).
    pub fn check_query(&self, query: Option<&str>) -> Result<(), TenantViolation> {
        let Some(query) = query else {
            return Ok(());
        };
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if is_organization_key(&key) {
                self.check(OrganizationSource::Query, &value)?;
            }
        }
        Ok(())
    }

    /// Check the top-level fields of a JSON body. `null` is ignored.
    pub fn check_body(&self, body: &Value) -> Result<(), TenantViolation> {
        let Some(object) = body.as_object() else {
            return Ok(());
        };
        for (key, value) in object {
            if !is_organization_key(key) {
                continue;
            }
            match value {
                Value::Null => {}
                Value::String(s) => self.check(OrganizationSource::Body, s)?,
                other => self.check(OrganizationSource::Body, &other.to_string())?,
            }
        }
        Ok(())
    }
}

fn is_organization_key(key: &str) -> bool {
    key == ORGANIZATION_ID_FIELD || key == ORGANIZATION_ID_ALIAS
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matching_organization_passes_everywhere() {
        let org = Uuid::new_v4();
        let scope = TenantScope::new(org, Role::Admin);
        let id = org.to_string();

        assert!(scope.check_path([("organizationId", id.as_str())]).is_ok());
        assert!(scope.check_query(Some(&format!("organizationId={id}&page=2"))).is_ok());
        assert!(scope.check_body(&json!({ "organizationId": id, "title": "x" })).is_ok());
        assert!(scope.check_query(None).is_ok());
        assert!(scope.check_body(&json!({ "title": "no org field" })).is_ok());
        assert!(scope.check_body(&json!({ "organizationId": null })).is_ok());
    }

    #[test]
    fn test_foreign_organization_is_rejected() {
        let scope = TenantScope::new(Uuid::new_v4(), Role::ComplianceOfficer);
        let other = Uuid::new_v4().to_string();

        let err = scope.check_path([("organizationId", other.as_str())]).unwrap_err();
        assert_eq!(err.source, OrganizationSource::Path);

        let err = scope
            .check_query(Some(&format!("organization_id={other}")))
            .unwrap_err();
        assert_eq!(err.source, OrganizationSource::Query);

        let err = scope.check_body(&json!({ "organizationId": other })).unwrap_err();
        assert_eq!(err.source, OrganizationSource::Body);

        assert!(scope.check_body(&json!({ "organizationId": "not-a-uuid" })).is_err());
        assert!(scope.check_body(&json!({ "organizationId": 42 })).is_err());
    }

    #[test]
    fn test_super_admin_bypasses_isolation() {
        let scope = TenantScope::new(Uuid::new_v4(), Role::SuperAdmin);
        let other = Uuid::new_v4().to_string();
        assert!(scope.check_body(&json!({ "organizationId": other })).is_ok());
        assert!(scope.check_path([("organizationId", other.as_str())]).is_ok());
    }

    #[test]
    fn test_unrelated_path_params_are_ignored() {
        let scope = TenantScope::new(Uuid::new_v4(), Role::Staff);
        let other = Uuid::new_v4().to_string();
        assert!(scope.check_path([("id", other.as_str())]).is_ok());
    }
}

//! Platform capabilities shared by every API surface: authentication,
//! role-based authorization and tenant isolation.

pub mod auth;
pub mod rbac;
pub mod tenancy;

pub use auth::{Claims, IssuedToken, PasswordHasher, TokenSigner};
pub use rbac::{has_permission, Permission};
pub use tenancy::{TenantScope, TenantViolation};

//! Compliance management backend: organizations, users and branches,
//! requirements, gap assessments, action plans, risks, schedules,
//! notifications and the audit log.
//!
//! Provides the REST API consumed by the web client.
//! Data stored in DashMap behind an organization-scoped query surface.

pub mod auth;
pub mod demo;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod store;

pub use auth::AuthUser;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::ManagementState;
pub use router::management_router;
pub use store::ComplianceStore;

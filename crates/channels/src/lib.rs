//! Outbound notification channels: templated transactional email over a
//! logging transport (development) or the SendGrid v3 API.

pub mod email;
pub mod templates;

pub use email::{DeliveryStatus, EmailService, OutgoingEmail};
pub use templates::{template_vars, EmailTemplate, RenderedEmail};

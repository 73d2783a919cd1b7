#![warn(clippy::unwrap_used)]

pub mod billing_rest;
pub mod payments;
pub mod rest;
pub mod server;
pub mod swagger;

pub use payments::PaymentService;
pub use server::{build_router, ApiServer};
pub use swagger::ApiDoc;

pub mod calendar;
pub mod config;
pub mod error;
pub mod types;

pub use calendar::{calculate_next_due_date, Frequency};
pub use config::AppConfig;
pub use error::{ComplianceError, ComplianceResult};
pub use types::{Priority, Role};

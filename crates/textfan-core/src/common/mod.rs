pub mod chunker;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{HealthReport, JobSnapshot, JobStatus};

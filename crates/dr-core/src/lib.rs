pub mod error;
pub mod job;
pub mod progress;

pub use error::{Error, Result};
pub use job::{Job, JobParams, JobStatus, JobUpdate};

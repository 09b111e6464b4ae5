pub mod entities;
pub mod repository;
pub mod value_objects;

pub use entities::{AnalysisJob, JobStatus};
pub use repository::{JobRepository, JobStatistics, ReclaimOutcome};
pub use value_objects::JobStatusDb;

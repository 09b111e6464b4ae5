/// Analysis job queue
///
/// - Domain: job entity, status and repository trait
/// - Infrastructure: Diesel-based repository with `SKIP LOCKED` claims
/// - Worker: the pipeline loop that drives claimed jobs to an outcome
pub mod domain;
pub mod infrastructure;
pub mod worker;

pub use domain::{
    entities::{AnalysisJob, JobStatus},
    repository::{abandoned_detail, JobRepository, JobStatistics, ReclaimOutcome},
};
pub use infrastructure::JobRepositoryImpl;
pub use worker::{AnalysisWorker, JobOutcome, WorkerSettings, WorkerState, WorkerStatistics};

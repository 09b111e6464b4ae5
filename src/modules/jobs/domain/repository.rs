/// Repository trait for job persistence
///
/// `complete` and `fail` only act on a PROCESSING job; anything else is an
/// `InvalidTransition` (or `NotFound` when the id is unknown).
use crate::modules::analysis::AnalysisResult;
use crate::modules::jobs::domain::entities::AnalysisJob;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Enqueue a new job for a player
    async fn enqueue(&self, subject_handle: &str) -> AppResult<AnalysisJob>;

    /// Atomically move the oldest PENDING job to PROCESSING for `worker_id`.
    /// Returns None if no jobs are available
    async fn claim_next(&self, worker_id: &str) -> AppResult<Option<AnalysisJob>>;

    /// PROCESSING -> COMPLETED with the verdict
    async fn complete(&self, job_id: Uuid, result: &AnalysisResult) -> AppResult<AnalysisJob>;

    /// PROCESSING -> FAILED with a human-readable reason
    async fn fail(&self, job_id: Uuid, error_detail: &str) -> AppResult<AnalysisJob>;

    /// PROCESSING -> PENDING, giving up a claim without an outcome
    async fn release(&self, job_id: Uuid) -> AppResult<()>;

    /// Requeue PROCESSING jobs claimed longer than `older_than` ago. Jobs
    /// already claimed `max_claims` times are failed instead.
    async fn reclaim_stale(&self, older_than: Duration, max_claims: i32) -> AppResult<ReclaimOutcome>;

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<AnalysisJob>>;

    async fn get_statistics(&self) -> AppResult<JobStatistics>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimOutcome {
    pub requeued: usize,
    pub failed: usize,
}

/// Job queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatistics {
    pub pending_count: i64,
    pub processing_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
    pub total_count: i64,
}

/// Detail stored on jobs failed by stale-claim recovery
pub fn abandoned_detail(claim_count: i32) -> String {
    format!("[abandoned] claim expired after {} claim(s) without an outcome", claim_count)
}

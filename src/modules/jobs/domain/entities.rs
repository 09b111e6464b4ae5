/// Domain entities for the analysis job queue
///
/// A job asks for the latest game of one player to be analysed. It moves
/// PENDING -> PROCESSING -> COMPLETED | FAILED; only recovery paths move a
/// PROCESSING job back to PENDING.
use crate::modules::analysis::AnalysisResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Processing => write!(f, "PROCESSING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Job record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: Uuid,
    pub subject_handle: String,
    pub status: JobStatus,
    pub claim_count: i32,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Present iff COMPLETED
    pub result: Option<AnalysisResult>,
    /// Present iff FAILED
    pub error_detail: Option<String>,
}

impl AnalysisJob {
    /// Result and error are mutually exclusive and tied to the terminal state
    pub fn is_consistent(&self) -> bool {
        match self.status {
            JobStatus::Completed => self.result.is_some() && self.error_detail.is_none(),
            JobStatus::Failed => self.result.is_none() && self.error_detail.is_some(),
            JobStatus::Pending | JobStatus::Processing => {
                self.result.is_none() && self.error_detail.is_none()
            }
        }
    }
}

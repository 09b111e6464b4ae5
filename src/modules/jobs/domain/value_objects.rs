/// Value objects for jobs domain
use super::entities::JobStatus;

/// Job status enum matching the `analysis_job_status` database type
#[derive(diesel_derive_enum::DbEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[ExistingTypePath = "crate::schema::sql_types::AnalysisJobStatus"]
pub enum JobStatusDb {
    #[db_rename = "PENDING"]
    Pending,
    #[db_rename = "PROCESSING"]
    Processing,
    #[db_rename = "COMPLETED"]
    Completed,
    #[db_rename = "FAILED"]
    Failed,
}

impl From<JobStatusDb> for JobStatus {
    fn from(status: JobStatusDb) -> Self {
        match status {
            JobStatusDb::Pending => JobStatus::Pending,
            JobStatusDb::Processing => JobStatus::Processing,
            JobStatusDb::Completed => JobStatus::Completed,
            JobStatusDb::Failed => JobStatus::Failed,
        }
    }
}

impl From<JobStatus> for JobStatusDb {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => JobStatusDb::Pending,
            JobStatus::Processing => JobStatusDb::Processing,
            JobStatus::Completed => JobStatusDb::Completed,
            JobStatus::Failed => JobStatusDb::Failed,
        }
    }
}

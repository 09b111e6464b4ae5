/// Diesel models for the analysis_jobs table
use crate::modules::analysis::AnalysisResult;
use crate::modules::jobs::domain::entities::AnalysisJob;
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::schema::analysis_jobs;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Diesel model for inserting new jobs
#[derive(Insertable, Debug)]
#[diesel(table_name = analysis_jobs)]
pub struct NewAnalysisJob<'a> {
    pub subject_handle: &'a str,
}

/// Diesel model for querying existing jobs
#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = analysis_jobs)]
pub struct AnalysisJobModel {
    pub id: Uuid,
    pub subject_handle: String,
    pub status: JobStatusDb,
    pub claim_count: i32,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<JsonValue>,
    pub error_detail: Option<String>,
}

impl AnalysisJobModel {
    /// Convert to domain AnalysisJob
    pub fn into_domain(self) -> AppResult<AnalysisJob> {
        let result = self
            .result
            .map(serde_json::from_value::<AnalysisResult>)
            .transpose()
            .map_err(|e| {
                AppError::SerializationError(format!("Stored result of job {} is unreadable: {}", self.id, e))
            })?;

        Ok(AnalysisJob {
            id: self.id,
            subject_handle: self.subject_handle,
            status: self.status.into(),
            claim_count: self.claim_count,
            created_at: self.created_at,
            claimed_at: self.claimed_at,
            claimed_by: self.claimed_by,
            completed_at: self.completed_at,
            result,
            error_detail: self.error_detail,
        })
    }
}

/// Row of the per-status count query
#[derive(QueryableByName, Debug)]
pub struct StatusCount {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub status: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub count: i64,
}

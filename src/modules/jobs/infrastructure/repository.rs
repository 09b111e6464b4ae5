/// Diesel-based implementation of JobRepository
///
/// Claims use `UPDATE ... WHERE id = (SELECT ... FOR UPDATE SKIP LOCKED)` so
/// concurrent workers never receive the same job. Every terminal write is
/// guarded by `status = 'PROCESSING'`; a write that matches no row is
/// diagnosed afterwards as `NotFound` or `InvalidTransition`. Diesel calls
/// block, so each one runs on the blocking thread pool.
use crate::modules::analysis::AnalysisResult;
use crate::modules::jobs::domain::entities::{AnalysisJob, JobStatus};
use crate::modules::jobs::domain::repository::{
    abandoned_detail, JobRepository, JobStatistics, ReclaimOutcome,
};
use crate::modules::jobs::infrastructure::models::{AnalysisJobModel, NewAnalysisJob, StatusCount};
use crate::schema::analysis_jobs;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::DbPool;
use crate::shared::utils::logger::{LogContext, TimedOperation};
use crate::shared::utils::validation::Validator;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types;
use std::time::Duration;
use tokio::task;
use uuid::Uuid;

const RETURNING_COLUMNS: &str = "RETURNING id, subject_handle, status, claim_count, created_at, \
                                 claimed_at, claimed_by, completed_at, result, error_detail";

pub struct JobRepositoryImpl {
    pool: DbPool,
}

impl JobRepositoryImpl {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run `op` on a pooled connection without holding up the async runtime
    async fn with_conn<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();

        task::spawn_blocking(move || -> AppResult<T> {
            let mut conn = pool.get().map_err(|e| {
                AppError::PersistenceFailure(format!("Failed to get connection: {}", e))
            })?;
            op(&mut *conn)
        })
        .await
        .map_err(|e| AppError::PersistenceFailure(format!("Database task failed: {}", e)))?
    }

    fn find(conn: &mut PgConnection, job_id: Uuid) -> AppResult<Option<AnalysisJobModel>> {
        analysis_jobs::table
            .find(job_id)
            .select(AnalysisJobModel::as_select())
            .first(conn)
            .optional()
            .map_err(|e| AppError::PersistenceFailure(format!("Failed to load job {}: {}", job_id, e)))
    }

    /// Explain why a guarded update touched no row
    fn rejected_transition(conn: &mut PgConnection, job_id: Uuid, to: JobStatus) -> AppError {
        match Self::find(conn, job_id) {
            Ok(Some(job)) => AppError::InvalidTransition {
                job_id,
                from: JobStatus::from(job.status).to_string(),
                to: to.to_string(),
            },
            Ok(None) => AppError::NotFound(format!("Job {} not found", job_id)),
            Err(e) => e,
        }
    }

    /// Turn the outcome of a guarded update into the updated job or the
    /// reason nothing changed
    fn resolve_transition(
        conn: &mut PgConnection,
        job_id: Uuid,
        to: JobStatus,
        updated: QueryResult<AnalysisJobModel>,
    ) -> AppResult<AnalysisJob> {
        let updated = updated.optional().map_err(|e| {
            AppError::PersistenceFailure(format!("Failed to mark job {} as {}: {}", job_id, to, e))
        })?;

        match updated {
            Some(job) => job.into_domain(),
            None => Err(Self::rejected_transition(conn, job_id, to)),
        }
    }

    /// Fail every expired claim that has used up its claims, one row at a
    /// time so each gets its own detail
    fn fail_abandoned(conn: &mut PgConnection, age_secs: f64, max_claims: i32) -> QueryResult<usize> {
        let abandoned: Vec<AnalysisJobModel> = diesel::sql_query(
            "SELECT id, subject_handle, status, claim_count, created_at,
                    claimed_at, claimed_by, completed_at, result, error_detail
             FROM analysis_jobs
             WHERE status = 'PROCESSING'
               AND claimed_at < NOW() - make_interval(secs => $1)
               AND claim_count >= $2
             FOR UPDATE SKIP LOCKED",
        )
        .bind::<sql_types::Double, _>(age_secs)
        .bind::<sql_types::Integer, _>(max_claims)
        .load(conn)?;

        for job in &abandoned {
            diesel::sql_query(
                "UPDATE analysis_jobs
                 SET status = 'FAILED', completed_at = NOW(), error_detail = $2
                 WHERE id = $1",
            )
            .bind::<sql_types::Uuid, _>(job.id)
            .bind::<sql_types::Text, _>(abandoned_detail(job.claim_count))
            .execute(conn)?;
        }

        Ok(abandoned.len())
    }
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    async fn enqueue(&self, subject_handle: &str) -> AppResult<AnalysisJob> {
        Validator::validate_subject_handle(subject_handle)?;
        let subject_handle = subject_handle.to_string();

        self.with_conn(move |conn| {
            let inserted: AnalysisJobModel = diesel::insert_into(analysis_jobs::table)
                .values(&NewAnalysisJob {
                    subject_handle: &subject_handle,
                })
                .returning(AnalysisJobModel::as_returning())
                .get_result(conn)
                .map_err(|e| AppError::PersistenceFailure(format!("Failed to enqueue job: {}", e)))?;

            inserted.into_domain()
        })
        .await
    }

    async fn claim_next(&self, worker_id: &str) -> AppResult<Option<AnalysisJob>> {
        let timer = TimedOperation::new("claim_next");
        let worker_id = worker_id.to_string();

        let claimed: Option<AnalysisJobModel> = self
            .with_conn(move |conn| {
                diesel::sql_query(format!(
                    r#"
                    UPDATE analysis_jobs
                    SET status = 'PROCESSING',
                        claimed_at = NOW(),
                        claimed_by = $1,
                        claim_count = claim_count + 1
                    WHERE id = (
                        SELECT id
                        FROM analysis_jobs
                        WHERE status = 'PENDING'
                        ORDER BY created_at ASC, id ASC
                        LIMIT 1
                        FOR UPDATE SKIP LOCKED
                    )
                    {}
                    "#,
                    RETURNING_COLUMNS
                ))
                .bind::<sql_types::Text, _>(worker_id)
                .get_result(conn)
                .optional()
                .map_err(|e| AppError::PersistenceFailure(format!("Failed to claim job: {}", e)))
            })
            .await?;

        LogContext::db_operation("claim_next", "analysis_jobs", Some(timer.elapsed_ms()));
        claimed.map(AnalysisJobModel::into_domain).transpose()
    }

    async fn complete(&self, job_id: Uuid, result: &AnalysisResult) -> AppResult<AnalysisJob> {
        let document = serde_json::to_value(result)?;

        self.with_conn(move |conn| {
            let updated: QueryResult<AnalysisJobModel> = diesel::sql_query(format!(
                "UPDATE analysis_jobs
                 SET status = 'COMPLETED', result = $2, completed_at = NOW()
                 WHERE id = $1 AND status = 'PROCESSING'
                 {}",
                RETURNING_COLUMNS
            ))
            .bind::<sql_types::Uuid, _>(job_id)
            .bind::<sql_types::Jsonb, _>(document)
            .get_result(conn);

            Self::resolve_transition(conn, job_id, JobStatus::Completed, updated)
        })
        .await
    }

    async fn fail(&self, job_id: Uuid, error_detail: &str) -> AppResult<AnalysisJob> {
        let error_detail = error_detail.to_string();

        self.with_conn(move |conn| {
            let updated: QueryResult<AnalysisJobModel> = diesel::sql_query(format!(
                "UPDATE analysis_jobs
                 SET status = 'FAILED', error_detail = $2, completed_at = NOW()
                 WHERE id = $1 AND status = 'PROCESSING'
                 {}",
                RETURNING_COLUMNS
            ))
            .bind::<sql_types::Uuid, _>(job_id)
            .bind::<sql_types::Text, _>(error_detail)
            .get_result(conn);

            Self::resolve_transition(conn, job_id, JobStatus::Failed, updated)
        })
        .await
    }

    async fn release(&self, job_id: Uuid) -> AppResult<()> {
        self.with_conn(move |conn| {
            let updated: QueryResult<AnalysisJobModel> = diesel::sql_query(format!(
                "UPDATE analysis_jobs
                 SET status = 'PENDING', claimed_at = NULL, claimed_by = NULL
                 WHERE id = $1 AND status = 'PROCESSING'
                 {}",
                RETURNING_COLUMNS
            ))
            .bind::<sql_types::Uuid, _>(job_id)
            .get_result(conn);

            Self::resolve_transition(conn, job_id, JobStatus::Pending, updated).map(|_| ())
        })
        .await
    }

    async fn reclaim_stale(&self, older_than: Duration, max_claims: i32) -> AppResult<ReclaimOutcome> {
        let age_secs = older_than.as_secs_f64();

        self.with_conn(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                // Jobs that keep losing their worker stop being requeued
                let failed = Self::fail_abandoned(conn, age_secs, max_claims)?;

                let requeued = diesel::sql_query(
                    "UPDATE analysis_jobs
                     SET status = 'PENDING', claimed_at = NULL, claimed_by = NULL
                     WHERE status = 'PROCESSING'
                       AND claimed_at < NOW() - make_interval(secs => $1)",
                )
                .bind::<sql_types::Double, _>(age_secs)
                .execute(conn)?;

                Ok(ReclaimOutcome { requeued, failed })
            })
            .map_err(|e| AppError::PersistenceFailure(format!("Failed to reclaim stale jobs: {}", e)))
        })
        .await
    }

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<AnalysisJob>> {
        self.with_conn(move |conn| {
            Self::find(conn, job_id)?
                .map(AnalysisJobModel::into_domain)
                .transpose()
        })
        .await
    }

    async fn get_statistics(&self) -> AppResult<JobStatistics> {
        let rows: Vec<StatusCount> = self
            .with_conn(|conn| {
                diesel::sql_query(
                    "SELECT status::text AS status, COUNT(*) AS count
                     FROM analysis_jobs
                     GROUP BY status",
                )
                .load(conn)
                .map_err(|e| AppError::PersistenceFailure(format!("Failed to count jobs: {}", e)))
            })
            .await?;

        let mut stats = JobStatistics::default();
        for row in rows {
            match row.status.parse::<JobStatus>() {
                Ok(JobStatus::Pending) => stats.pending_count = row.count,
                Ok(JobStatus::Processing) => stats.processing_count = row.count,
                Ok(JobStatus::Completed) => stats.completed_count = row.count,
                Ok(JobStatus::Failed) => stats.failed_count = row.count,
                Err(e) => return Err(AppError::PersistenceFailure(e)),
            }
            stats.total_count += row.count;
        }

        Ok(stats)
    }
}

/// In-memory collaborators for driving the pipeline without Postgres,
/// chess.com or a real engine
use async_trait::async_trait;
use blunder_worker_lib::modules::analysis::AnalysisResult;
use blunder_worker_lib::modules::engine::{EngineFactory, EvaluationPoint, Evaluator, Score};
use blunder_worker_lib::modules::games::domain::pgn::parse_pgn;
use blunder_worker_lib::modules::games::{GameRecord, GameSource};
use blunder_worker_lib::modules::jobs::{
    abandoned_detail, AnalysisJob, JobRepository, JobStatistics, JobStatus, ReclaimOutcome,
};
use blunder_worker_lib::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ================================================================================================
// JOB STORE
// ================================================================================================

/// Job store with the same transition rules as the Postgres one
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: Mutex<Vec<AnalysisJob>>,
    /// When set, `complete` and `fail` report a persistence failure
    pub fail_writes: AtomicBool,
}

impl InMemoryJobRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self, job_id: Uuid) -> AnalysisJob {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|job| job.id == job_id)
            .cloned()
            .expect("job exists")
    }

    /// Seed a job that some worker claimed at `claimed_at`
    pub fn insert_claimed(&self, handle: &str, claimed_at: DateTime<Utc>, claim_count: i32) -> Uuid {
        let job = AnalysisJob {
            id: Uuid::new_v4(),
            subject_handle: handle.to_string(),
            status: JobStatus::Processing,
            claim_count,
            created_at: claimed_at,
            claimed_at: Some(claimed_at),
            claimed_by: Some("worker-gone".to_string()),
            completed_at: None,
            result: None,
            error_detail: None,
        };
        let id = job.id;
        self.jobs.lock().unwrap().push(job);
        id
    }

    fn finish(
        &self,
        job_id: Uuid,
        to: JobStatus,
        apply: impl FnOnce(&mut AnalysisJob),
    ) -> AppResult<AnalysisJob> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

        if job.status != JobStatus::Processing {
            return Err(AppError::InvalidTransition {
                job_id,
                from: job.status.to_string(),
                to: to.to_string(),
            });
        }

        job.status = to;
        apply(job);
        Ok(job.clone())
    }

    fn write_guard(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(AppError::PersistenceFailure("connection reset by peer".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn enqueue(&self, subject_handle: &str) -> AppResult<AnalysisJob> {
        let job = AnalysisJob {
            id: Uuid::new_v4(),
            subject_handle: subject_handle.to_string(),
            status: JobStatus::Pending,
            claim_count: 0,
            created_at: Utc::now(),
            claimed_at: None,
            claimed_by: None,
            completed_at: None,
            result: None,
            error_detail: None,
        };
        self.jobs.lock().unwrap().push(job.clone());
        Ok(job)
    }

    async fn claim_next(&self, worker_id: &str) -> AppResult<Option<AnalysisJob>> {
        let mut jobs = self.jobs.lock().unwrap();
        // Insertion order doubles as creation order
        let Some(job) = jobs.iter_mut().find(|job| job.status == JobStatus::Pending) else {
            return Ok(None);
        };

        job.status = JobStatus::Processing;
        job.claimed_at = Some(Utc::now());
        job.claimed_by = Some(worker_id.to_string());
        job.claim_count += 1;
        Ok(Some(job.clone()))
    }

    async fn complete(&self, job_id: Uuid, result: &AnalysisResult) -> AppResult<AnalysisJob> {
        self.write_guard()?;
        self.finish(job_id, JobStatus::Completed, |job| {
            job.result = Some(result.clone());
            job.completed_at = Some(Utc::now());
        })
    }

    async fn fail(&self, job_id: Uuid, error_detail: &str) -> AppResult<AnalysisJob> {
        self.write_guard()?;
        self.finish(job_id, JobStatus::Failed, |job| {
            job.error_detail = Some(error_detail.to_string());
            job.completed_at = Some(Utc::now());
        })
    }

    async fn release(&self, job_id: Uuid) -> AppResult<()> {
        self.finish(job_id, JobStatus::Pending, |job| {
            job.claimed_at = None;
            job.claimed_by = None;
        })
        .map(|_| ())
    }

    async fn reclaim_stale(&self, older_than: Duration, max_claims: i32) -> AppResult<ReclaimOutcome> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or_default();
        let mut outcome = ReclaimOutcome::default();

        for job in self.jobs.lock().unwrap().iter_mut() {
            let expired = job.status == JobStatus::Processing
                && job.claimed_at.map_or(false, |at| at < cutoff);
            if !expired {
                continue;
            }

            if job.claim_count >= max_claims {
                job.status = JobStatus::Failed;
                job.error_detail = Some(abandoned_detail(job.claim_count));
                job.completed_at = Some(Utc::now());
                outcome.failed += 1;
            } else {
                job.status = JobStatus::Pending;
                job.claimed_at = None;
                job.claimed_by = None;
                outcome.requeued += 1;
            }
        }

        Ok(outcome)
    }

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<AnalysisJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|job| job.id == job_id)
            .cloned())
    }

    async fn get_statistics(&self) -> AppResult<JobStatistics> {
        let mut stats = JobStatistics::default();
        for job in self.jobs.lock().unwrap().iter() {
            match job.status {
                JobStatus::Pending => stats.pending_count += 1,
                JobStatus::Processing => stats.processing_count += 1,
                JobStatus::Completed => stats.completed_count += 1,
                JobStatus::Failed => stats.failed_count += 1,
            }
            stats.total_count += 1;
        }
        Ok(stats)
    }
}

// ================================================================================================
// GAME SOURCE
// ================================================================================================

/// Answers `latest_game` from a queue of canned responses; the last one repeats
pub struct ScriptedGameSource {
    responses: Mutex<VecDeque<AppResult<GameRecord>>>,
    pub calls: AtomicUsize,
}

impl ScriptedGameSource {
    pub fn new(responses: Vec<AppResult<GameRecord>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn returning(game: GameRecord) -> Arc<Self> {
        Self::new(vec![Ok(game)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GameSource for ScriptedGameSource {
    async fn latest_game(&self, _subject_handle: &str) -> AppResult<GameRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front().expect("non-empty")
        } else {
            responses
                .front()
                .cloned()
                .unwrap_or_else(|| Err(AppError::NotFound("no scripted game".to_string())))
        }
    }
}

/// Never answers; for exercising shutdown while a stage is in flight
pub struct HangingGameSource {
    pub calls: AtomicUsize,
}

impl HangingGameSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GameSource for HangingGameSource {
    async fn latest_game(&self, _subject_handle: &str) -> AppResult<GameRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// A game replayed from `movetext`
pub fn game(movetext: &str) -> GameRecord {
    GameRecord {
        url: "https://www.chess.com/game/live/42".to_string(),
        played_at: Utc::now(),
        white: "hikaru".to_string(),
        black: "magnuscarlsen".to_string(),
        time_class: Some("blitz".to_string()),
        pgn: movetext.to_string(),
        moves: parse_pgn(movetext).expect("valid movetext").moves,
    }
}

// ================================================================================================
// ENGINE
// ================================================================================================

/// Every engine it starts replays the same score list, one score per position
pub struct ScriptedEngineFactory {
    scores: Vec<Score>,
    /// Evaluations fail on every engine when set
    pub broken: bool,
    pub starts: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
    pub evaluated: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEngineFactory {
    pub fn new(scores: Vec<Score>) -> Arc<Self> {
        Arc::new(Self::build(scores, false))
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), true))
    }

    fn build(scores: Vec<Score>, broken: bool) -> Self {
        Self {
            scores,
            broken,
            starts: Arc::new(AtomicUsize::new(0)),
            shutdowns: Arc::new(AtomicUsize::new(0)),
            evaluated: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineFactory for ScriptedEngineFactory {
    async fn start(&self) -> AppResult<Box<dyn Evaluator>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            scores: self.scores.clone(),
            broken: self.broken,
            calls: 0,
            shutdowns: Arc::clone(&self.shutdowns),
            evaluated: Arc::clone(&self.evaluated),
        }))
    }
}

struct ScriptedEngine {
    scores: Vec<Score>,
    broken: bool,
    calls: usize,
    shutdowns: Arc<AtomicUsize>,
    evaluated: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Evaluator for ScriptedEngine {
    async fn evaluate(&mut self, ply_index: usize, position_fen: &str) -> AppResult<EvaluationPoint> {
        if self.broken {
            return Err(AppError::EngineFailure("engine exited unexpectedly".to_string()));
        }

        let score = *self
            .scores
            .get(self.calls)
            .ok_or_else(|| AppError::EngineFailure(format!("no scripted score for ply {}", ply_index)))?;
        self.calls += 1;
        self.evaluated.lock().unwrap().push(position_fen.to_string());

        Ok(EvaluationPoint {
            ply_index,
            position_fen: position_fen.to_string(),
            score,
            suggested_move: Some(format!("best{}", ply_index)),
        })
    }

    async fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

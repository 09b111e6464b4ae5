/// Pipeline loop that claims analysis jobs and drives them to an outcome
///
/// The loop is an explicit state machine. `step` advances one state at a time
/// so tests can drive each transition with fake collaborators; `run` just
/// keeps stepping until shutdown.
use crate::modules::analysis::{AnalysisResult, BlunderDetector};
use crate::modules::engine::domain::EngineFactory;
use crate::modules::games::domain::{GameRecord, GameSource, MoveSequence};
use crate::modules::jobs::domain::entities::AnalysisJob;
use crate::modules::jobs::domain::repository::JobRepository;
use crate::modules::notifications::{AnalysisNotification, Notifier};
use crate::shared::config::WorkerConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::{LogContext, TimedOperation};
use crate::shared::utils::retry::{RetryPolicy, RetryUtil};
use crate::shared::utils::validation::Validator;
use crate::{log_debug, log_error, log_info, log_warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const MAX_RECLAIM_INTERVAL: Duration = Duration::from_secs(60);

/// Where the worker is in handling a job
#[derive(Debug, Clone)]
pub enum WorkerState {
    Idle,
    Claiming,
    Fetching {
        job: AnalysisJob,
    },
    Analyzing {
        job: AnalysisJob,
        game: GameRecord,
    },
    Persisting {
        job: AnalysisJob,
        outcome: JobOutcome,
        game: Option<GameRecord>,
    },
    Notifying {
        job: AnalysisJob,
        result: AnalysisResult,
        game: GameRecord,
    },
    /// Waiting out the poll interval or a loop-level backoff
    Sleeping(Duration),
    Stopped,
}

impl WorkerState {
    /// True while a claimed job has not reached its outcome yet
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            WorkerState::Fetching { .. }
                | WorkerState::Analyzing { .. }
                | WorkerState::Persisting { .. }
                | WorkerState::Notifying { .. }
        )
    }

    pub fn job(&self) -> Option<&AnalysisJob> {
        match self {
            WorkerState::Fetching { job }
            | WorkerState::Analyzing { job, .. }
            | WorkerState::Persisting { job, .. }
            | WorkerState::Notifying { job, .. } => Some(job),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Claiming => "claiming",
            WorkerState::Fetching { .. } => "fetching",
            WorkerState::Analyzing { .. } => "analyzing",
            WorkerState::Persisting { .. } => "persisting",
            WorkerState::Notifying { .. } => "notifying",
            WorkerState::Sleeping(_) => "sleeping",
            WorkerState::Stopped => "stopped",
        }
    }
}

/// What gets written back for a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(AnalysisResult),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub worker_id: String,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    /// `None` disables stale-claim recovery
    pub claim_timeout: Option<Duration>,
    pub max_claims: i32,
}

impl WorkerSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            worker_id: config.worker_id.clone(),
            poll_interval: config.poll_interval,
            retry: config.retry.clone(),
            claim_timeout: config.claim_timeout,
            max_claims: config.max_claims,
        }
    }

    /// How often idle workers look for expired claims
    fn reclaim_interval(&self) -> Option<Duration> {
        self.claim_timeout
            .map(|timeout| timeout.min(MAX_RECLAIM_INTERVAL))
    }
}

pub struct AnalysisWorker {
    jobs: Arc<dyn JobRepository>,
    games: Arc<dyn GameSource>,
    engines: Arc<dyn EngineFactory>,
    detector: BlunderDetector,
    notifier: Option<Arc<dyn Notifier>>,
    settings: WorkerSettings,
    cancel: CancellationToken,
    consecutive_failures: u32,
    last_reclaim: Option<Instant>,
}

impl AnalysisWorker {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        games: Arc<dyn GameSource>,
        engines: Arc<dyn EngineFactory>,
        detector: BlunderDetector,
        notifier: Option<Arc<dyn Notifier>>,
        settings: WorkerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            jobs,
            games,
            engines,
            detector,
            notifier,
            settings,
            cancel,
            consecutive_failures: 0,
            last_reclaim: None,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.settings.worker_id
    }

    /// Keep stepping until the cancellation token fires. A job held at that
    /// point is released back to PENDING.
    pub async fn run(mut self) {
        log_info!(
            "Worker {} started (poll every {:?}, threshold {}cp)",
            self.settings.worker_id,
            self.settings.poll_interval,
            self.detector.threshold_cp()
        );

        let mut state = WorkerState::Idle;
        while !matches!(state, WorkerState::Stopped) {
            state = self.step(state).await;
        }

        log_info!("Worker {} stopped", self.settings.worker_id);
    }

    /// Advance the pipeline by one state
    pub async fn step(&mut self, state: WorkerState) -> WorkerState {
        match state {
            WorkerState::Idle => {
                if self.cancel.is_cancelled() {
                    return WorkerState::Stopped;
                }
                if self.reclaim_due() {
                    self.recover_stale().await;
                }
                WorkerState::Claiming
            }
            WorkerState::Claiming => match self.claim().await {
                Ok(Some(job)) => WorkerState::Fetching { job },
                Ok(None) => WorkerState::Sleeping(self.settings.poll_interval),
                Err(e) => {
                    log_error!("Failed to claim a job: {}", e);
                    WorkerState::Sleeping(self.loop_backoff())
                }
            },
            WorkerState::Fetching { job } => self.fetch(job).await,
            WorkerState::Analyzing { job, game } => self.analyze(job, game).await,
            WorkerState::Persisting { job, outcome, game } => self.persist(job, outcome, game).await,
            WorkerState::Notifying { job, result, game } => {
                self.notify(&job, &result, &game).await;
                WorkerState::Idle
            }
            WorkerState::Sleeping(delay) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
                WorkerState::Idle
            }
            WorkerState::Stopped => WorkerState::Stopped,
        }
    }

    /// Claim and fully handle at most one job, returning its final record.
    ///
    /// Used by dev mode; `Ok(None)` means the queue was empty.
    pub async fn process_next_job(&mut self) -> AppResult<Option<AnalysisJob>> {
        let Some(job) = self.claim().await? else {
            return Ok(None);
        };

        let job_id = job.id;
        let mut state = WorkerState::Fetching { job };
        while state.is_busy() {
            state = self.step(state).await;
        }

        self.jobs.get_by_id(job_id).await
    }

    /// Requeue (or fail) jobs whose claim expired without an outcome
    pub async fn recover_stale(&mut self) {
        let Some(timeout) = self.settings.claim_timeout else {
            return;
        };
        self.last_reclaim = Some(Instant::now());

        match self.jobs.reclaim_stale(timeout, self.settings.max_claims).await {
            Ok(outcome) if outcome.requeued > 0 || outcome.failed > 0 => log_warn!(
                "Stale-claim recovery: {} job(s) requeued, {} job(s) failed after {} claims",
                outcome.requeued,
                outcome.failed,
                self.settings.max_claims
            ),
            Ok(_) => log_debug!("Stale-claim recovery found nothing older than {:?}", timeout),
            Err(e) => log_error!("Stale-claim recovery failed: {}", e),
        }
    }

    fn reclaim_due(&self) -> bool {
        match (self.settings.reclaim_interval(), self.last_reclaim) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(every), Some(at)) => at.elapsed() >= every,
        }
    }

    fn loop_backoff(&mut self) -> Duration {
        let delay = self
            .settings
            .retry
            .calculate_delay(self.consecutive_failures, None);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        delay
    }

    async fn claim(&mut self) -> AppResult<Option<AnalysisJob>> {
        let claimed = self.jobs.claim_next(&self.settings.worker_id).await?;
        self.consecutive_failures = 0;

        if let Some(job) = &claimed {
            log_info!(
                "Claimed job {} for '{}' (claim #{})",
                job.id,
                job.subject_handle,
                job.claim_count
            );
        }
        Ok(claimed)
    }

    async fn fetch(&mut self, job: AnalysisJob) -> WorkerState {
        LogContext::stage(&job.id, "fetching");
        let handle = job.subject_handle.as_str();
        let games = self.games.as_ref();

        let fetched = RetryUtil::with_retry(
            move || async move {
                Validator::validate_subject_handle(handle)?;
                games.latest_game(handle).await
            },
            &self.settings.retry,
            "fetch latest game",
            &self.cancel,
        )
        .await;

        match fetched {
            Ok(game) => {
                log_debug!(
                    "Job {}: {} vs {} ({} plies) from {}",
                    job.id,
                    game.white,
                    game.black,
                    game.moves.len(),
                    game.url
                );
                WorkerState::Analyzing { job, game }
            }
            Err(failure) if failure.is_cancelled() => self.wind_down(&job).await,
            Err(failure) => {
                log_warn!("Job {}: game fetch failed: {}", job.id, failure.detail());
                WorkerState::Persisting {
                    job,
                    outcome: JobOutcome::Failed(failure.detail()),
                    game: None,
                }
            }
        }
    }

    async fn analyze(&mut self, job: AnalysisJob, game: GameRecord) -> WorkerState {
        LogContext::stage(&job.id, "analyzing");
        let timer = TimedOperation::new("analysis");
        let engines = self.engines.as_ref();
        let detector = &self.detector;
        let moves = &game.moves;

        let analysed = RetryUtil::with_retry(
            || analyze_once(engines, detector, moves),
            &self.settings.retry,
            "engine analysis",
            &self.cancel,
        )
        .await;

        match analysed {
            Ok(result) => {
                timer.finish_with_info(&format!("job {}, {} plies", job.id, game.moves.len()));
                WorkerState::Persisting {
                    job,
                    outcome: JobOutcome::Completed(result),
                    game: Some(game),
                }
            }
            Err(failure) if failure.is_cancelled() => self.wind_down(&job).await,
            Err(failure) => {
                log_warn!("Job {}: analysis failed: {}", job.id, failure.detail());
                WorkerState::Persisting {
                    job,
                    outcome: JobOutcome::Failed(failure.detail()),
                    game: Some(game),
                }
            }
        }
    }

    async fn persist(
        &mut self,
        job: AnalysisJob,
        outcome: JobOutcome,
        game: Option<GameRecord>,
    ) -> WorkerState {
        LogContext::stage(&job.id, "persisting");
        let written = match &outcome {
            JobOutcome::Completed(result) => self.jobs.complete(job.id, result).await,
            JobOutcome::Failed(detail) => self.jobs.fail(job.id, detail).await,
        };

        let record = match written {
            Ok(record) => record,
            Err(e @ AppError::InvalidTransition { .. }) => {
                log_error!("Bug: job {} could not be finalised: {}", job.id, e);
                return WorkerState::Idle;
            }
            Err(e) => {
                let delay = self.loop_backoff();
                log_error!(
                    "Job {}: outcome not persisted ({}); leaving it for stale-claim recovery, backing off {:?}",
                    job.id,
                    e,
                    delay
                );
                return WorkerState::Sleeping(delay);
            }
        };

        self.consecutive_failures = 0;
        log_info!("Job {} finished as {}", record.id, record.status);

        match (outcome, game) {
            (JobOutcome::Completed(result), Some(game)) if self.notifier.is_some() => {
                WorkerState::Notifying {
                    job: record,
                    result,
                    game,
                }
            }
            _ => WorkerState::Idle,
        }
    }

    async fn notify(&self, job: &AnalysisJob, result: &AnalysisResult, game: &GameRecord) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        LogContext::stage(&job.id, "notifying");

        let notification = AnalysisNotification::new(job.id, &job.subject_handle, result, Some(game));
        if let Err(e) = notifier.notify(&notification).await {
            log_warn!("Job {}: notification failed (ignored): {}", job.id, e);
        }
    }

    /// Give the held job back before stopping
    async fn wind_down(&mut self, job: &AnalysisJob) -> WorkerState {
        log_info!("Shutdown requested, releasing job {}", job.id);
        if let Err(e) = self.jobs.release(job.id).await {
            log_warn!(
                "Could not release job {} ({}); stale-claim recovery will requeue it",
                job.id,
                e
            );
        }
        WorkerState::Stopped
    }

    /// Statistics about the worker and job queue
    pub async fn get_statistics(&self) -> AppResult<WorkerStatistics> {
        let job_stats = self.jobs.get_statistics().await?;

        Ok(WorkerStatistics {
            worker_id: self.settings.worker_id.clone(),
            is_running: !self.cancel.is_cancelled(),
            pending_jobs: job_stats.pending_count,
            processing_jobs: job_stats.processing_count,
            completed_jobs: job_stats.completed_count,
            failed_jobs: job_stats.failed_count,
            total_jobs: job_stats.total_count,
        })
    }
}

/// One analysis attempt on a fresh engine, shut down whatever happens
async fn analyze_once(
    engines: &dyn EngineFactory,
    detector: &BlunderDetector,
    moves: &MoveSequence,
) -> AppResult<AnalysisResult> {
    if moves.len() < 2 {
        return Ok(AnalysisResult::NoBlunder);
    }

    let mut engine = engines.start().await?;
    let result = detector.detect(moves, engine.as_mut()).await;
    engine.shutdown().await;
    result
}

/// Worker statistics for monitoring
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkerStatistics {
    pub worker_id: String,
    pub is_running: bool,
    pub pending_jobs: i64,
    pub processing_jobs: i64,
    pub completed_jobs: i64,
    pub failed_jobs: i64,
    pub total_jobs: i64,
}

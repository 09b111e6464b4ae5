/// UCI engine subprocess adapter
///
/// One `UciEngine` wraps one child process and is owned by exactly one job
/// attempt. The child is spawned with `kill_on_drop`, so dropping the handle
/// (cancellation, panic) terminates it even when `shutdown` never runs.
use crate::modules::engine::domain::{EngineFactory, EvaluationPoint, Evaluator, Score};
use crate::modules::engine::infrastructure::uci::{parse_line, UciLine};
use crate::shared::config::{EngineConfig, SearchLimit};
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

const QUIT_GRACE: Duration = Duration::from_secs(2);

pub struct UciEngine {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    search: SearchLimit,
    response_timeout: Duration,
}

impl UciEngine {
    /// Spawn the binary and complete the UCI handshake
    pub async fn spawn(config: &EngineConfig) -> AppResult<Self> {
        let mut child = Command::new(&config.binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::EngineFailure(format!(
                    "Failed to start engine at {}: {}",
                    config.binary_path.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::EngineFailure("engine stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::EngineFailure("engine stdout unavailable".to_string()))?;

        let mut engine = Self {
            child: Some(child),
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            search: config.search,
            response_timeout: config.response_timeout,
        };

        if let Err(e) = engine.handshake(config).await {
            engine.shutdown().await;
            return Err(e);
        }

        debug!("Engine started: {}", config.binary_path.display());
        Ok(engine)
    }

    async fn handshake(&mut self, config: &EngineConfig) -> AppResult<()> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;

        if let Some(threads) = config.threads {
            self.send(&format!("setoption name Threads value {}", threads)).await?;
        }
        if let Some(hash) = config.hash_mb {
            self.send(&format!("setoption name Hash value {}", hash)).await?;
        }

        self.send("ucinewgame").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    async fn send(&mut self, command: &str) -> AppResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AppError::EngineFailure("engine already shut down".to_string()))?;

        stdin
            .write_all(format!("{}\n", command).as_bytes())
            .await
            .map_err(|e| AppError::EngineFailure(format!("Failed to write to engine: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| AppError::EngineFailure(format!("Failed to write to engine: {}", e)))
    }

    async fn read_line(&mut self) -> AppResult<String> {
        match self.stdout.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(AppError::EngineFailure("engine exited unexpectedly".to_string())),
            Err(e) => Err(AppError::EngineFailure(format!("Failed to read from engine: {}", e))),
        }
    }

    async fn read_until(&mut self, token: &str) -> AppResult<()> {
        loop {
            if self.read_line().await?.trim() == token {
                return Ok(());
            }
        }
    }

    async fn wait_for(&mut self, token: &str) -> AppResult<()> {
        let timeout = self.response_timeout;
        tokio::time::timeout(timeout, self.read_until(token))
            .await
            .map_err(|_| {
                AppError::EngineFailure(format!("engine did not answer '{}' within {:?}", token, timeout))
            })?
    }

    /// Read search output until `bestmove`, keeping the last exact score
    async fn read_search(&mut self) -> AppResult<(Score, Option<String>)> {
        let mut score = None;

        loop {
            let line = self.read_line().await?;
            match parse_line(&line) {
                UciLine::Score(s) => score = Some(s),
                UciLine::BestMove(best) => {
                    return match score {
                        Some(score) => Ok((score, best)),
                        // Terminal position reported without any info line
                        None if best.is_none() => Ok((Score::Mate(0), None)),
                        None => Err(AppError::EngineFailure(
                            "engine returned bestmove without a score".to_string(),
                        )),
                    };
                }
                UciLine::Other => {}
            }
        }
    }
}

#[async_trait]
impl Evaluator for UciEngine {
    async fn evaluate(&mut self, ply_index: usize, position_fen: &str) -> AppResult<EvaluationPoint> {
        let go = self.search.go_command();
        self.send(&format!("position fen {}", position_fen)).await?;
        self.send(&go).await?;

        let timeout = self.response_timeout;
        let (score, suggested_move) = tokio::time::timeout(timeout, self.read_search())
            .await
            .map_err(|_| {
                AppError::EngineFailure(format!("engine timed out after {:?} at ply {}", timeout, ply_index))
            })??;

        Ok(EvaluationPoint {
            ply_index,
            position_fen: position_fen.to_string(),
            score,
            suggested_move,
        })
    }

    async fn shutdown(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.write_all(b"quit\n").await;
            let _ = stdin.flush().await;
        }

        match tokio::time::timeout(QUIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!("Engine exited with {}", status),
            Ok(Err(e)) => warn!("Failed to wait for engine exit: {}", e),
            Err(_) => {
                warn!("Engine ignored quit, killing it");
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill engine: {}", e);
                }
            }
        }
    }
}

/// Starts a `UciEngine` from configuration
pub struct UciEngineFactory {
    config: EngineConfig,
}

impl UciEngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn binary_path(&self) -> &PathBuf {
        &self.config.binary_path
    }
}

#[async_trait]
impl EngineFactory for UciEngineFactory {
    async fn start(&self) -> AppResult<Box<dyn Evaluator>> {
        let engine = UciEngine::spawn(&self.config).await?;
        Ok(Box::new(engine))
    }
}

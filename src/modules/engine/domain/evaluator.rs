use super::score::Score;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One engine assessment of one position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationPoint {
    /// 0 is the position before the first move
    pub ply_index: usize,
    pub position_fen: String,
    pub score: Score,
    /// UCI move; `None` when the side to move has no legal move
    pub suggested_move: Option<String>,
}

/// A running engine bound to one job attempt
#[async_trait]
pub trait Evaluator: Send {
    async fn evaluate(&mut self, ply_index: usize, position_fen: &str) -> AppResult<EvaluationPoint>;

    /// Release the engine. Safe to call more than once.
    async fn shutdown(&mut self);
}

/// Starts a fresh engine for every job attempt
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn start(&self) -> AppResult<Box<dyn Evaluator>>;
}

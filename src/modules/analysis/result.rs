use serde::{Deserialize, Serialize};

/// The decisive swing of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlunderReport {
    /// 1-based ply of the decisive move
    pub ply: usize,
    /// Position immediately before the decisive move
    pub fen: String,
    /// Move played, UCI
    pub blunder_move: String,
    pub blunder_san: String,
    /// Engine suggestion at `fen`, UCI
    pub best_move: Option<String>,
    /// Mover-perspective centipawns before and after the move
    pub evaluation_before: i32,
    pub evaluation_after: i32,
    /// `evaluation_after - evaluation_before`
    pub swing: i32,
    /// The move turned a centipawn evaluation into a forced mate
    pub mate_transition: bool,
}

/// Verdict persisted on a completed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum AnalysisResult {
    Blunder(BlunderReport),
    NoBlunder,
}

impl AnalysisResult {
    pub fn blunder(&self) -> Option<&BlunderReport> {
        match self {
            AnalysisResult::Blunder(report) => Some(report),
            AnalysisResult::NoBlunder => None,
        }
    }
}

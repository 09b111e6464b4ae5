//! Decisive-swing detection
//!
//! Every position of the main line is scored once. Engine scores are from the
//! side to move, so for ply `i` the mover's view before the move is
//! `score(i-1)` and after it is `-score(i)`.

use super::result::{AnalysisResult, BlunderReport};
use crate::log_debug;
use crate::modules::engine::domain::{EvaluationPoint, Evaluator};
use crate::modules::games::domain::MoveSequence;
use crate::shared::errors::AppResult;

pub const DEFAULT_THRESHOLD_CP: i32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Swing {
    /// 1-based ply
    ply: usize,
    before: i32,
    after: i32,
    delta: i32,
    mate_transition: bool,
}

impl Swing {
    fn between(ply: usize, prev: &EvaluationPoint, next: &EvaluationPoint) -> Self {
        let before = prev.score.to_centipawns();
        let after = -next.score.to_centipawns();
        Self {
            ply,
            before,
            after,
            delta: after - before,
            mate_transition: !prev.score.is_mate() && next.score.is_mate(),
        }
    }

    fn breaches(&self, threshold_cp: i32) -> bool {
        self.mate_transition || self.delta.abs() > threshold_cp
    }

    /// Mate transitions outrank plain swings, then magnitude decides
    fn rank(&self) -> (bool, i32) {
        (self.mate_transition, self.delta.abs())
    }
}

#[derive(Debug, Clone)]
pub struct BlunderDetector {
    threshold_cp: i32,
}

impl Default for BlunderDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_CP)
    }
}

impl BlunderDetector {
    pub fn new(threshold_cp: i32) -> Self {
        Self { threshold_cp }
    }

    pub fn threshold_cp(&self) -> i32 {
        self.threshold_cp
    }

    /// Score every position and report the decisive ply, if any.
    ///
    /// Sequences shorter than two plies are `NoBlunder` without touching the
    /// engine. Any engine error aborts the whole detection.
    pub async fn detect(
        &self,
        moves: &MoveSequence,
        evaluator: &mut dyn Evaluator,
    ) -> AppResult<AnalysisResult> {
        if moves.len() < 2 {
            return Ok(AnalysisResult::NoBlunder);
        }

        let mut points = Vec::with_capacity(moves.len() + 1);
        points.push(evaluator.evaluate(0, &moves.initial_fen).await?);
        for played in &moves.plies {
            points.push(evaluator.evaluate(played.ply, &played.fen_after).await?);
        }

        let decisive = self.decisive_swing(&points);

        let Some(swing) = decisive else {
            log_debug!("No swing above {}cp in {} plies", self.threshold_cp, moves.len());
            return Ok(AnalysisResult::NoBlunder);
        };

        let played = &moves.plies[swing.ply - 1];
        Ok(AnalysisResult::Blunder(BlunderReport {
            ply: swing.ply,
            fen: played.fen_before.clone(),
            blunder_move: played.uci.clone(),
            blunder_san: played.san.clone(),
            best_move: points[swing.ply - 1].suggested_move.clone(),
            evaluation_before: swing.before,
            evaluation_after: swing.after,
            swing: swing.delta,
            mate_transition: swing.mate_transition,
        }))
    }

    fn decisive_swing(&self, points: &[EvaluationPoint]) -> Option<Swing> {
        points
            .windows(2)
            .enumerate()
            .map(|(idx, pair)| Swing::between(idx + 1, &pair[0], &pair[1]))
            .filter(|swing| swing.breaches(self.threshold_cp))
            // Strictly greater keeps the earliest ply on exact ties
            .fold(None, |best: Option<Swing>, swing| match best {
                Some(current) if current.rank() >= swing.rank() => Some(current),
                _ => Some(swing),
            })
    }
}

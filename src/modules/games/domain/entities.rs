/// Game entities
///
/// A `GameRecord` lives only for the duration of one job; nothing here is
/// persisted.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One half-move as played, with the positions around it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedMove {
    /// 1-based ply number
    pub ply: usize,
    pub san: String,
    pub uci: String,
    pub fen_before: String,
    pub fen_after: String,
}

/// Ordered plies of a game's main line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSequence {
    pub initial_fen: String,
    pub plies: Vec<PlayedMove>,
}

impl MoveSequence {
    pub fn len(&self) -> usize {
        self.plies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plies.is_empty()
    }

    /// FEN of the position after `ply_index` plies (0 = initial position)
    pub fn fen_at(&self, ply_index: usize) -> Option<&str> {
        if ply_index == 0 {
            Some(&self.initial_fen)
        } else {
            self.plies.get(ply_index - 1).map(|p| p.fen_after.as_str())
        }
    }

    /// Space-separated SAN moves, for logs and summaries
    pub fn san_line(&self) -> String {
        self.plies
            .iter()
            .map(|p| p.san.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub url: String,
    pub played_at: DateTime<Utc>,
    pub white: String,
    pub black: String,
    pub time_class: Option<String>,
    pub pgn: String,
    pub moves: MoveSequence,
}

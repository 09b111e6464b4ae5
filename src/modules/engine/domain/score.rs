use serde::{Deserialize, Serialize};

/// Centipawn value assigned to a forced mate before subtracting its distance
pub const MATE_VALUE: i32 = 10_000;

/// Engine assessment from the side to move's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    /// Centipawns
    Cp(i32),
    /// Moves to mate; positive when the side to move mates, negative when it
    /// gets mated, zero when it is already checkmated
    Mate(i32),
}

impl Score {
    /// Collapse to a single centipawn scale so deltas can be compared.
    /// Shorter mates score further from zero.
    pub fn to_centipawns(self) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate(0) => -MATE_VALUE,
            Score::Mate(n) if n > 0 => MATE_VALUE - n,
            Score::Mate(n) => -MATE_VALUE - n,
        }
    }

    pub fn is_mate(self) -> bool {
        matches!(self, Score::Mate(_))
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "{:+.2}", *cp as f64 / 100.0),
            Score::Mate(n) => write!(f, "#{}", n),
        }
    }
}

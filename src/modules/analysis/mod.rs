/// Blunder detection over a replayed game
pub mod detector;
pub mod result;

pub use detector::{BlunderDetector, DEFAULT_THRESHOLD_CP};
pub use result::{AnalysisResult, BlunderReport};

pub mod evaluator;
pub mod score;

pub use evaluator::{EngineFactory, EvaluationPoint, Evaluator};
pub use score::{Score, MATE_VALUE};

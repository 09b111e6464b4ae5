/// Engine adapter
///
/// - Domain: scores, evaluation points and the `Evaluator`/`EngineFactory` seams
/// - Infrastructure: UCI subprocess implementation
pub mod domain;
pub mod infrastructure;

pub use domain::{EngineFactory, EvaluationPoint, Evaluator, Score};
pub use infrastructure::{UciEngine, UciEngineFactory};

pub mod process;
pub mod uci;

pub use process::{UciEngine, UciEngineFactory};

pub mod entities;
pub mod pgn;
pub mod source;

pub use entities::{GameRecord, MoveSequence, PlayedMove};
pub use source::GameSource;

/// Game source
///
/// Resolves a player's most recent completed game from the public archive
/// and replays it into a move sequence with positions.
pub mod domain;
pub mod infrastructure;

pub use domain::{GameRecord, GameSource, MoveSequence, PlayedMove};
pub use infrastructure::ChessComClient;

use super::entities::GameRecord;
use crate::shared::errors::AppResult;
use async_trait::async_trait;

/// Resolves a player's most recent completed game
///
/// Implementations perform fresh lookups on every call and never retry;
/// failures carry enough classification for the caller to decide.
#[async_trait]
pub trait GameSource: Send + Sync {
    async fn latest_game(&self, subject_handle: &str) -> AppResult<GameRecord>;
}

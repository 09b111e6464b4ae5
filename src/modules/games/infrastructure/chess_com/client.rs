use super::dto::{ArchivesResponse, ChessComGame, MonthlyGamesResponse};
use crate::log_debug;
use crate::modules::games::domain::pgn::parse_pgn;
use crate::modules::games::domain::{GameRecord, GameSource};
use crate::modules::games::infrastructure::http_client::PacedHttpClient;
use crate::shared::config::ArchiveConfig;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::DateTime;

/// chess.com asks clients to keep requests serial; two per second leaves headroom
const REQUESTS_PER_SECOND: f64 = 2.0;
const BURST: u32 = 2;

pub struct ChessComClient {
    http: PacedHttpClient,
    base_url: String,
}

impl ChessComClient {
    pub fn new(config: &ArchiveConfig) -> AppResult<Self> {
        Ok(Self {
            http: PacedHttpClient::new(
                "Chess.com",
                &config.user_agent,
                config.request_timeout,
                REQUESTS_PER_SECOND,
                BURST,
            )?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_archives(&self, handle: &str) -> AppResult<Vec<String>> {
        let url = format!(
            "{}/player/{}/games/archives",
            self.base_url,
            urlencoding::encode(&handle.to_lowercase())
        );

        let response: ArchivesResponse = self.http.get_json(&url).await.map_err(|e| match e {
            AppError::NotFound(_) => AppError::NotFound(format!("Player '{}' not found", handle)),
            other => other,
        })?;
        Ok(response.archives)
    }
}

/// `(year, month)` from a bucket URL ending in `/YYYY/MM`
fn bucket_month(url: &str) -> Option<(i32, u32)> {
    let mut segments = url.trim_end_matches('/').rsplit('/');
    let month: u32 = segments.next()?.parse().ok()?;
    let year: i32 = segments.next()?.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// Most recent bucket by its date suffix; list order breaks ties and covers
/// URLs without one
pub fn latest_bucket(archives: &[String]) -> Option<&str> {
    archives
        .iter()
        .enumerate()
        .max_by_key(|(idx, url)| (bucket_month(url), *idx))
        .map(|(_, url)| url.as_str())
}

/// Latest eligible game of a bucket by end time
pub fn latest_eligible(games: Vec<ChessComGame>) -> Option<ChessComGame> {
    games
        .into_iter()
        .filter(ChessComGame::is_eligible)
        .max_by_key(|game| game.end_time)
}

fn to_game_record(game: ChessComGame) -> AppResult<GameRecord> {
    let pgn = game.pgn.unwrap_or_default();
    let end_time = game.end_time.unwrap_or_default();
    let parsed = parse_pgn(&pgn)?;

    let played_at = DateTime::from_timestamp(end_time, 0)
        .ok_or_else(|| AppError::MalformedGame(format!("Invalid end_time {}", end_time)))?;

    let white = game
        .white
        .map(|p| p.username)
        .or_else(|| parsed.header("White").map(str::to_string))
        .unwrap_or_default();
    let black = game
        .black
        .map(|p| p.username)
        .or_else(|| parsed.header("Black").map(str::to_string))
        .unwrap_or_default();

    Ok(GameRecord {
        url: game.url,
        played_at,
        white,
        black,
        time_class: game.time_class,
        pgn,
        moves: parsed.moves,
    })
}

#[async_trait]
impl GameSource for ChessComClient {
    async fn latest_game(&self, subject_handle: &str) -> AppResult<GameRecord> {
        let archives = self.fetch_archives(subject_handle).await?;
        let bucket = latest_bucket(&archives).ok_or_else(|| {
            AppError::NotFound(format!("No game archives for '{}'", subject_handle))
        })?;

        log_debug!("Fetching {} games from {}", subject_handle, bucket);
        let month: MonthlyGamesResponse = self.http.get_json(bucket).await?;
        let total = month.games.len();

        let game = latest_eligible(month.games).ok_or_else(|| {
            AppError::NotFound(format!(
                "No completed standard game for '{}' in latest archive ({} games checked)",
                subject_handle, total
            ))
        })?;

        to_game_record(game)
    }
}

use crate::modules::analysis::AnalysisResult;
use crate::modules::games::GameRecord;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Which side the analysed player had
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    White,
    Black,
}

impl PlayerColor {
    /// Side to move in a FEN position
    pub fn to_move(fen: &str) -> Option<Self> {
        match fen.split_whitespace().nth(1)? {
            "w" => Some(PlayerColor::White),
            "b" => Some(PlayerColor::Black),
            _ => None,
        }
    }
}

/// Summary of the game behind a completed job
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub url: String,
    pub white: String,
    pub black: String,
    pub played_at: chrono::DateTime<chrono::Utc>,
    pub time_class: Option<String>,
    pub moves: String,
    pub pgn: String,
}

impl From<&GameRecord> for GameSummary {
    fn from(game: &GameRecord) -> Self {
        Self {
            url: game.url.clone(),
            white: game.white.clone(),
            black: game.black.clone(),
            played_at: game.played_at,
            time_class: game.time_class.clone(),
            moves: game.moves.san_line(),
            pgn: game.pgn.clone(),
        }
    }
}

/// Payload handed to notifiers once a job completes
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisNotification {
    pub job_id: Uuid,
    pub subject_handle: String,
    pub result: AnalysisResult,
    pub game: Option<GameSummary>,
}

impl AnalysisNotification {
    pub fn new(
        job_id: Uuid,
        subject_handle: &str,
        result: &AnalysisResult,
        game: Option<&GameRecord>,
    ) -> Self {
        Self {
            job_id,
            subject_handle: subject_handle.to_string(),
            result: result.clone(),
            game: game.map(GameSummary::from),
        }
    }

    /// Side the subject played, when the game says so
    pub fn subject_color(&self) -> Option<PlayerColor> {
        let game = self.game.as_ref()?;
        if game.black.eq_ignore_ascii_case(&self.subject_handle) {
            Some(PlayerColor::Black)
        } else if game.white.eq_ignore_ascii_case(&self.subject_handle) {
            Some(PlayerColor::White)
        } else {
            None
        }
    }

    /// Side that played the decisive move
    pub fn blunder_color(&self) -> Option<PlayerColor> {
        match &self.result {
            AnalysisResult::Blunder(report) => PlayerColor::to_move(&report.fen),
            AnalysisResult::NoBlunder => None,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self.result {
            AnalysisResult::Blunder(_) => "BLUNDER_FOUND",
            AnalysisResult::NoBlunder => "NO_BLUNDER",
        }
    }
}

/// Fire-and-forget side effect after a job completes. Errors are reported to
/// the caller, which logs them and moves on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &AnalysisNotification) -> AppResult<()>;
}

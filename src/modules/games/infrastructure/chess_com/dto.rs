use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivesResponse {
    #[serde(default)]
    pub archives: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyGamesResponse {
    #[serde(default)]
    pub games: Vec<ChessComGame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChessComGame {
    #[serde(default)]
    pub url: String,
    pub pgn: Option<String>,
    pub end_time: Option<i64>,
    pub rules: Option<String>,
    pub time_class: Option<String>,
    pub white: Option<ChessComPlayer>,
    pub black: Option<ChessComPlayer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChessComPlayer {
    pub username: String,
    pub rating: Option<i32>,
    pub result: Option<String>,
}

impl ChessComGame {
    /// Finished standard chess with a move record
    pub fn is_eligible(&self) -> bool {
        let standard = self.rules.as_deref().map_or(true, |rules| rules == "chess");
        let has_pgn = self.pgn.as_deref().is_some_and(|pgn| !pgn.trim().is_empty());
        standard && has_pgn && self.end_time.is_some()
    }
}

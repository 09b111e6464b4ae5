//! PGN main-line replay
//!
//! Tag pairs are read with a regex; the movetext is stripped of comments,
//! variations and NAGs, then replayed SAN by SAN so every ply carries the
//! positions before and after it.

use super::entities::{MoveSequence, PlayedMove};
use crate::shared::errors::{AppError, AppResult};
use regex::Regex;
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct ParsedPgn {
    pub headers: HashMap<String, String>,
    pub moves: MoveSequence,
}

impl ParsedPgn {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r#"^\s*\[([A-Za-z0-9_]+)\s+"((?:[^"\\]|\\.)*)"\s*\]\s*$"#)
            .expect("valid header regex")
    })
}

fn move_number_regex() -> &'static Regex {
    static MOVE_NUMBER: OnceLock<Regex> = OnceLock::new();
    MOVE_NUMBER.get_or_init(|| Regex::new(r"^\d+\.+").expect("valid move number regex"))
}

pub fn fen_of(pos: &Chess) -> String {
    Fen(pos.clone().into_setup(EnPassantMode::Legal)).to_string()
}

pub fn position_from_fen(fen: &str) -> AppResult<Chess> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|e| AppError::MalformedGame(format!("Invalid FEN '{}': {}", fen, e)))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| AppError::MalformedGame(format!("Illegal position '{}': {}", fen, e)))
}

pub fn parse_pgn(pgn: &str) -> AppResult<ParsedPgn> {
    let mut headers = HashMap::new();
    let mut movetext = String::new();

    for line in pgn.lines() {
        if let Some(caps) = header_regex().captures(line) {
            headers.insert(caps[1].to_string(), caps[2].replace("\\\"", "\""));
        } else if !line.trim_start().starts_with('[') && !line.trim_start().starts_with('%') {
            movetext.push_str(line);
            movetext.push('\n');
        }
    }

    let mut pos = match headers.get("FEN") {
        Some(fen) => position_from_fen(fen)?,
        None => Chess::default(),
    };
    let initial_fen = fen_of(&pos);

    let mut plies = Vec::new();
    for token in tokenize_movetext(&movetext)? {
        let san_text = token.trim_end_matches(['!', '?']);
        let san: SanPlus = san_text.parse().map_err(|_| {
            AppError::MalformedGame(format!("Unreadable move '{}' at ply {}", token, plies.len() + 1))
        })?;

        let mv = san.san.to_move(&pos).map_err(|_| {
            AppError::MalformedGame(format!("Illegal move '{}' at ply {}", san_text, plies.len() + 1))
        })?;

        let fen_before = fen_of(&pos);
        let uci = mv.to_uci(CastlingMode::Standard).to_string();
        pos.play_unchecked(&mv);

        plies.push(PlayedMove {
            ply: plies.len() + 1,
            san: san_text.to_string(),
            uci,
            fen_before,
            fen_after: fen_of(&pos),
        });
    }

    Ok(ParsedPgn {
        headers,
        moves: MoveSequence { initial_fen, plies },
    })
}

/// SAN tokens of the main line, in order
fn tokenize_movetext(movetext: &str) -> AppResult<Vec<String>> {
    let mut cleaned = String::with_capacity(movetext.len());
    let mut variation_depth = 0usize;
    let mut chars = movetext.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                // Brace comments do not nest
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(AppError::MalformedGame("Unterminated comment".to_string()));
                }
                cleaned.push(' ');
            }
            ';' => {
                let _ = chars.by_ref().find(|c| *c == '\n');
                cleaned.push(' ');
            }
            '(' => {
                variation_depth += 1;
                cleaned.push(' ');
            }
            ')' => {
                variation_depth = variation_depth.checked_sub(1).ok_or_else(|| {
                    AppError::MalformedGame("Unbalanced variation parentheses".to_string())
                })?;
                cleaned.push(' ');
            }
            _ if variation_depth > 0 => {}
            _ => cleaned.push(c),
        }
    }

    if variation_depth > 0 {
        return Err(AppError::MalformedGame("Unterminated variation".to_string()));
    }

    let tokens = cleaned
        .split_whitespace()
        .map(|token| move_number_regex().replace(token, "").into_owned())
        .filter(|token| !token.is_empty())
        .filter(|token| !token.starts_with('$'))
        .filter(|token| !matches!(token.as_str(), "1-0" | "0-1" | "1/2-1/2" | "*"))
        .collect();

    Ok(tokens)
}

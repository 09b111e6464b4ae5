//! Parsing of the UCI lines the adapter cares about

use crate::modules::engine::domain::Score;

/// A line of engine output relevant to one search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciLine {
    /// `info ... score cp|mate N ...` without a bound qualifier
    Score(Score),
    /// `bestmove <move>`; `None` for `bestmove (none)` / `0000`
    BestMove(Option<String>),
    Other,
}

pub fn parse_line(line: &str) -> UciLine {
    let mut tokens = line.split_whitespace();

    match tokens.next() {
        Some("info") => parse_info(tokens).map(UciLine::Score).unwrap_or(UciLine::Other),
        Some("bestmove") => match tokens.next() {
            Some("(none)") | Some("0000") | None => UciLine::BestMove(None),
            Some(mv) => UciLine::BestMove(Some(mv.to_string())),
        },
        _ => UciLine::Other,
    }
}

fn parse_info<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<Score> {
    let mut score = None;
    let mut bounded = false;

    while let Some(token) = tokens.next() {
        match token {
            "score" => {
                let kind = tokens.next()?;
                let value: i32 = tokens.next()?.parse().ok()?;
                score = match kind {
                    "cp" => Some(Score::Cp(value)),
                    "mate" => Some(Score::Mate(value)),
                    _ => None,
                };
            }
            "lowerbound" | "upperbound" => bounded = true,
            // Everything after `pv` is a move list; `string` is free text
            "pv" | "string" => break,
            _ => {}
        }
    }

    if bounded {
        None
    } else {
        score
    }
}

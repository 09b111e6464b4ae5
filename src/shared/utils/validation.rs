use regex::Regex;
use std::sync::OnceLock;

use crate::shared::errors::AppError;

fn handle_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"))
}

pub struct Validator;

impl Validator {
    /// Archive handles are 3-25 characters of letters, digits, `_` or `-`
    pub fn validate_subject_handle(handle: &str) -> Result<(), AppError> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(AppError::InvalidInput(
                "Subject handle cannot be empty".to_string(),
            ));
        }
        if handle.len() < 3 || handle.len() > 25 {
            return Err(AppError::InvalidInput(format!(
                "Subject handle '{}' must be 3-25 characters",
                handle
            )));
        }
        if !handle_pattern().is_match(handle) {
            return Err(AppError::InvalidInput(format!(
                "Subject handle '{}' contains invalid characters",
                handle
            )));
        }
        Ok(())
    }

    pub fn validate_threshold(threshold_cp: i32) -> Result<(), AppError> {
        if threshold_cp <= 0 {
            return Err(AppError::ConfigError(
                "Blunder threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

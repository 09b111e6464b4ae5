use crate::log_info;
use crate::modules::analysis::AnalysisResult;
use crate::modules::notifications::domain::{AnalysisNotification, Notifier, PlayerColor};
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const RESEND_API_BASE: &str = "https://api.resend.com";

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: Vec<&'a str>,
    subject: String,
    html: String,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

/// Sends the analysis summary through the Resend e-mail API
pub struct ResendEmailNotifier {
    client: Client,
    api_base: String,
    api_key: String,
    from: String,
    to: String,
}

impl ResendEmailNotifier {
    pub fn new(api_key: &str, from: &str, to: &str, timeout: Duration) -> AppResult<Self> {
        Self::with_api_base(RESEND_API_BASE, api_key, from, to, timeout)
    }

    pub fn with_api_base(
        api_base: &str,
        api_key: &str,
        from: &str,
        to: &str,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build e-mail client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Put the date into the sender's display name:
/// `Blunder Report <r@x.com>` becomes `Blunder Report ♟ Oct 19 <r@x.com>`.
/// Bare addresses are left alone.
pub fn dated_sender(from: &str, date: NaiveDate) -> String {
    match (from.find('<'), from.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = from[..open].trim();
            let address = &from[open + 1..close];
            format!("{} ♟ {} <{}>", name, date.format("%b %d"), address)
        }
        _ => from.to_string(),
    }
}

pub fn subject_line(notification: &AnalysisNotification) -> String {
    format!(
        "Chess Analysis for {}: {}",
        notification.subject_handle,
        notification.status_label()
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_html(notification: &AnalysisNotification) -> String {
    let handle = escape_html(&notification.subject_handle);
    let mut body = String::new();

    match &notification.result {
        AnalysisResult::Blunder(report) => {
            let mover = match (notification.blunder_color(), notification.subject_color()) {
                (Some(played), Some(subject)) if played == subject => "Your move",
                (Some(_), Some(_)) => "Opponent's move",
                _ => "Decisive move",
            };
            body.push_str(&format!(
                "<h1 style=\"color:#9381ff\">Blunder Alert</h1>\
                 <p>Analysis for <strong>{}</strong>: a critical moment was found at ply {}.</p>",
                handle, report.ply
            ));
            body.push_str(&format!(
                "<table>\
                 <tr><td>{}</td><td style=\"color:#ef4444\"><code>{} ({})</code></td></tr>\
                 <tr><td>Best move</td><td style=\"color:#10b981\"><code>{}</code></td></tr>\
                 <tr><td>Evaluation</td><td>{:+} &rarr; {:+} cp</td></tr>\
                 </table>\
                 <p>Position: <code>{}</code></p>",
                mover,
                escape_html(&report.blunder_san),
                escape_html(&report.blunder_move),
                escape_html(report.best_move.as_deref().unwrap_or("none")),
                report.evaluation_before,
                report.evaluation_after,
                escape_html(&report.fen),
            ));
        }
        AnalysisResult::NoBlunder => {
            body.push_str(&format!(
                "<h1 style=\"color:#10b981\">Great Game!</h1>\
                 <p>Analysis for <strong>{}</strong>: no significant blunders were detected by the engine.</p>",
                handle
            ));
        }
    }

    if let Some(game) = &notification.game {
        let side = match notification.subject_color() {
            Some(PlayerColor::White) => " (you had White)",
            Some(PlayerColor::Black) => " (you had Black)",
            None => "",
        };
        body.push_str(&format!(
            "<p>{} vs {}{}: <a href=\"{}\">view game</a></p><p><small>{}</small></p>",
            escape_html(&game.white),
            escape_html(&game.black),
            side,
            escape_html(&game.url),
            escape_html(&game.moves),
        ));
    }

    format!(
        "<html><body style=\"font-family:Roboto,Helvetica,Arial,sans-serif\">{}</body></html>",
        body
    )
}

#[async_trait]
impl Notifier for ResendEmailNotifier {
    async fn notify(&self, notification: &AnalysisNotification) -> AppResult<()> {
        let request = SendEmailRequest {
            from: dated_sender(&self.from, chrono::Utc::now().date_naive()),
            to: vec![self.to.as_str()],
            subject: subject_line(notification),
            html: render_html(notification),
        };

        let response = self
            .client
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::NotificationError(format!("E-mail request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::NotificationError(format!(
                "E-mail API returned HTTP {}: {}",
                status, detail
            )));
        }

        let sent: SendEmailResponse = response.json().await.map_err(|e| {
            AppError::NotificationError(format!("Unreadable e-mail API response: {}", e))
        })?;

        log_info!(
            "E-mail sent to {} for job {} (id {})",
            self.to,
            notification.job_id,
            sent.id.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }
}

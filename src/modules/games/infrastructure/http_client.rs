//! Paced HTTP client for the game archive
//!
//! Requests are spaced by a token bucket and bounded by a timeout. Every call
//! is a single attempt: 429s come back as `RateLimited` with the server's hint
//! so the worker can decide when to try again.

use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use reqwest::{Client, Response, StatusCode};
use std::num::NonZeroU32;
use std::time::Duration;

type DirectRateLimiter = GovernorRateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
    governor::middleware::NoOpMiddleware,
>;

/// Information extracted from rate-limited responses
#[derive(Debug, Clone, Default)]
pub struct RateLimitInfo {
    /// From `Retry-After` (seconds form)
    pub retry_after: Option<Duration>,
    /// Time until `X-RateLimit-Reset` (unix timestamp)
    pub reset_time: Option<Duration>,
}

impl RateLimitInfo {
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let header_u64 = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
        };

        let reset_time = header_u64("x-ratelimit-reset").map(|timestamp| {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            Duration::from_secs(timestamp.saturating_sub(now))
        });

        Self {
            retry_after: header_u64("retry-after").map(Duration::from_secs),
            reset_time,
        }
    }

    /// Retry-After wins over the reset timestamp
    pub fn recommended_delay(&self) -> Option<Duration> {
        self.retry_after.or(self.reset_time)
    }
}

pub struct PacedHttpClient {
    client: Client,
    rate_limiter: DirectRateLimiter,
    service_name: String,
}

impl PacedHttpClient {
    pub fn new(
        service_name: &str,
        user_agent: &str,
        timeout: Duration,
        requests_per_second: f64,
        burst_size: u32,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limiter: Self::create_rate_limiter(requests_per_second, burst_size)?,
            service_name: service_name.to_string(),
        })
    }

    fn create_rate_limiter(requests_per_second: f64, burst_size: u32) -> AppResult<DirectRateLimiter> {
        if requests_per_second <= 0.0 {
            return Err(AppError::ConfigError(
                "requests_per_second must be positive".to_string(),
            ));
        }

        let period = Duration::from_secs_f64(1.0 / requests_per_second);
        let burst = NonZeroU32::new(burst_size.max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .ok_or_else(|| AppError::ConfigError("rate limit period must be non-zero".to_string()))?
            .allow_burst(burst);

        Ok(GovernorRateLimiter::direct(quota))
    }

    /// GET `url` and decode a JSON body
    pub async fn get_json<T>(&self, url: &str) -> AppResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.rate_limiter.until_ready().await;

        let start = std::time::Instant::now();
        LogContext::api_call(&self.service_name, url, "", None);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        LogContext::api_call(
            &self.service_name,
            url,
            status.as_str(),
            Some(start.elapsed().as_millis() as u64),
        );

        let response = self.check_status(url, response)?;
        self.parse_response(response).await
    }

    fn check_status(&self, url: &str, response: Response) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let info = RateLimitInfo::from_headers(response.headers());
                Err(AppError::RateLimited {
                    message: format!("{} returned HTTP 429", self.service_name),
                    retry_after: info.recommended_delay(),
                })
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(AppError::NotFound(format!(
                "{} has no resource at {}",
                self.service_name, url
            ))),
            s if s.is_server_error() => Err(AppError::UpstreamUnavailable(format!(
                "{} returned HTTP {}",
                self.service_name, s
            ))),
            s => Err(AppError::ApiError(format!(
                "{} returned HTTP {}",
                self.service_name, s
            ))),
        }
    }

    async fn parse_response<T>(&self, response: Response) -> AppResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response_text = response.text().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!(
                "Failed to read {} response: {}",
                self.service_name, e
            ))
        })?;

        serde_json::from_str(&response_text).map_err(|e| {
            AppError::SerializationError(format!(
                "Failed to parse {} response: {}. Response: {}",
                self.service_name,
                e,
                truncate(&response_text, 200)
            ))
        })
    }

}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

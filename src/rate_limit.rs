use crate::discord_api::ApiResponse;
use std::time::Duration;

/// Added on top of every server-supplied wait.
pub const SAFETY_MARGIN: Duration = Duration::from_millis(500);

const DEFAULT_RETRY_AFTER_SECS: f64 = 5.0;
const DEFAULT_REMAINING: i64 = 5;
/// Longest wait honored from a single header.
const MAX_WAIT_SECS: f64 = 3600.0;

/// Rate-limit metadata read from one response.
///
/// State is per response only; nothing is carried between fetches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitHeaders {
    pub retry_after: f64,
    pub remaining: i64,
    pub reset_after: f64,
}

impl RateLimitHeaders {
    pub fn from_response(response: &ApiResponse) -> Self {
        Self {
            retry_after: parse_secs(response.header("Retry-After"))
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            remaining: response
                .header("X-RateLimit-Remaining")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_REMAINING),
            reset_after: parse_secs(response.header("X-RateLimit-Reset-After")).unwrap_or(0.0),
        }
    }

    /// Wait before retrying a 429.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_after) + SAFETY_MARGIN
    }

    /// Wait before the next request when the bucket is nearly empty.
    pub fn preemptive_delay(&self) -> Option<Duration> {
        (self.remaining <= 1).then(|| Duration::from_secs_f64(self.reset_after) + SAFETY_MARGIN)
    }
}

fn parse_secs(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.min(MAX_WAIT_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(headers: &[(&str, &str)]) -> ApiResponse {
        ApiResponse {
            status: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            body: String::new(),
        }
    }

    #[test]
    fn test_retry_after() {
        let limits = RateLimitHeaders::from_response(&response(&[("Retry-After", "2")]));
        assert_eq!(limits.retry_delay(), Duration::from_millis(2500));

        let limits = RateLimitHeaders::from_response(&response(&[("Retry-After", "0.25")]));
        assert_eq!(limits.retry_delay(), Duration::from_millis(750));
    }

    #[test]
    fn test_retry_after_defaults() {
        let missing = RateLimitHeaders::from_response(&response(&[]));
        assert_eq!(missing.retry_delay(), Duration::from_millis(5500));

        let garbage = RateLimitHeaders::from_response(&response(&[("Retry-After", "later")]));
        assert_eq!(garbage.retry_delay(), Duration::from_millis(5500));

        let negative = RateLimitHeaders::from_response(&response(&[("Retry-After", "-3")]));
        assert_eq!(negative.retry_delay(), Duration::from_millis(5500));
    }

    #[test]
    fn test_preemptive_delay() {
        let plenty = RateLimitHeaders::from_response(&response(&[
            ("X-RateLimit-Remaining", "4"),
            ("X-RateLimit-Reset-After", "1.5"),
        ]));
        assert_eq!(plenty.preemptive_delay(), None);

        let last = RateLimitHeaders::from_response(&response(&[
            ("X-RateLimit-Remaining", "1"),
            ("X-RateLimit-Reset-After", "1.5"),
        ]));
        assert_eq!(last.preemptive_delay(), Some(Duration::from_secs(2)));

        let empty = RateLimitHeaders::from_response(&response(&[("X-RateLimit-Remaining", "0")]));
        assert_eq!(empty.preemptive_delay(), Some(SAFETY_MARGIN));

        // No headers at all: assume quota is fine
        assert_eq!(RateLimitHeaders::from_response(&response(&[])).preemptive_delay(), None);
    }

    #[test]
    fn test_oversized_waits_are_capped() {
        let cap = Duration::from_secs(3600) + SAFETY_MARGIN;

        let retry = RateLimitHeaders::from_response(&response(&[("Retry-After", "1e20")]));
        assert_eq!(retry.retry_delay(), cap);

        let reset = RateLimitHeaders::from_response(&response(&[
            ("X-RateLimit-Remaining", "0"),
            ("X-RateLimit-Reset-After", "1e300"),
        ]));
        assert_eq!(reset.preemptive_delay(), Some(cap));
    }
}

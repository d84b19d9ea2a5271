//! JSON POST with retry and exponential backoff.
//!
//! - HTTP 2xx → parsed JSON body
//! - HTTP 429 or 5xx → retry
//! - Other HTTP errors → fail immediately
//! - Network errors and timeouts → retry
//!
//! Delays double after each failed attempt (`base`, `2 × base`, ...), capped
//! at `32 × base`.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 1).min(5))
    }
}

pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
    policy: RetryPolicy,
    service: &str,
) -> Result<serde_json::Value> {
    let mut last_err: Option<anyhow::Error> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            let reason = last_err.as_ref().map(|e| format!("{:#}", e)).unwrap_or_default();
            warn!(
                service,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %reason,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", service, status, body_text));
                    continue;
                }
                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", service)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10);
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(9), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/thing"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/thing"))
            .and(header("authorization", "Bearer k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let url = format!("{}/v1/thing", server.uri());
        let value = post_json(&reqwest::Client::new(), &url, "k", &serde_json::json!({}), fast(1), "Test")
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/v1/thing", server.uri());
        let err = post_json(&reqwest::Client::new(), &url, "k", &serde_json::json!({}), fast(3), "Test")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn test_retries_exhausted_reports_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let url = format!("{}/v1/thing", server.uri());
        let err = post_json(&reqwest::Client::new(), &url, "k", &serde_json::json!({}), fast(2), "Test")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}

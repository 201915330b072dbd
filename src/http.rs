//! Shared request loop for the hosted model providers.

use anyhow::{bail, Result};
use reqwest::{RequestBuilder, Response};
use std::time::Duration;
use tracing::warn;

/// Send the request built by `build`, retrying up to `max_retries` times.
///
/// HTTP 429, 5xx and transport errors are retried with exponential
/// backoff (1s, 2s, 4s, ... capped at 32s). Any other non-success status
/// fails immediately with the response body in the message.
pub(crate) async fn send_with_retry<F>(
    service: &str,
    max_retries: u32,
    build: F,
) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            warn!(service, attempt, delay_secs = delay.as_secs(), "retrying request");
            tokio::time::sleep(delay).await;
        }

        let response = match build().send().await {
            Ok(response) => response,
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} request failed: {}", service, e));
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            last_err = Some(anyhow::anyhow!("{} API error {}: {}", service, status, body));
            continue;
        }
        bail!("{} API error {}: {}", service, status, body);
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", service)))
}

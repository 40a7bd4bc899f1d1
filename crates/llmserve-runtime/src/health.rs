//! Readiness checks against the engine's `/health` endpoint.

use std::time::Duration;

use llmserve_core::EngineError;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Single readiness probe.
///
/// llama-server answers 503 while the model is still loading, so only a
/// 2xx counts as ready.
pub async fn check_health(client: &reqwest::Client, base_url: &str) -> Result<(), EngineError> {
    let url = format!("{base_url}/health");
    let response = client
        .get(&url)
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
        .map_err(|e| EngineError::Unavailable(format!("{url}: {e}")))?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(EngineError::Unavailable(format!(
            "{url} returned status {status}"
        )))
    }
}

/// `None` when the timeout is too large to represent: poll without a deadline.
fn deadline_after(now: Instant, timeout: Duration) -> Option<Instant> {
    now.checked_add(timeout)
}

/// Wait for the engine to report ready.
///
/// Polls `/health` until it succeeds or `timeout` elapses. The last probe
/// error is returned on timeout.
pub async fn wait_for_health(
    client: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> Result<(), EngineError> {
    info!(endpoint = %base_url, timeout_secs = timeout.as_secs(), "Waiting for inference engine");

    let deadline = deadline_after(Instant::now(), timeout);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match check_health(client, base_url).await {
            Ok(()) => {
                info!(endpoint = %base_url, attempt, "Inference engine is ready");
                return Ok(());
            }
            Err(e) if deadline.is_some_and(|d| Instant::now() + POLL_INTERVAL >= d) => {
                return Err(EngineError::Unavailable(format!(
                    "engine not ready after {}s: {e}",
                    timeout.as_secs()
                )));
            }
            Err(e) => {
                debug!(attempt, error = %e, "Engine not ready, retrying");
            }
        }

        sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_timeout_has_no_deadline() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, Duration::MAX), None);
        assert_eq!(
            deadline_after(now, Duration::from_secs(u64::MAX)),
            None
        );
        assert_eq!(
            deadline_after(now, Duration::from_secs(5)),
            Some(now + Duration::from_secs(5))
        );
    }

    #[tokio::test]
    async fn test_unreachable_engine_times_out() {
        let client = reqwest::Client::new();
        // Port 9 (discard) on loopback refuses connections
        let err = wait_for_health(&client, "http://127.0.0.1:9", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }
}

//! Model calls with timeout and retry.
//!
//! Every remote call in the pipeline goes through [`call_model`], so the
//! timeout and backoff policy lives in one place. All prompt text lives in
//! [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! Retries are off by default (`max_retries = 0`). When enabled, the wait
//! before attempt `n` is `retry_backoff_ms * 2^(n-1)`: with a 500 ms base and
//! 3 retries that is 500 ms → 1 s → 2 s. Each attempt gets its own
//! `api_timeout_secs` budget.

use crate::config::ExtractionConfig;
use crate::error::ServiceError;
use crate::model::{GenerationRequest, GenerativeModel};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A successful call: the generated text and the retries it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub retries: u32,
}

/// Run one generation request, retrying transient failures.
///
/// `label` identifies the call in logs (e.g. "Page 3").
pub async fn call_model(
    model: &dyn GenerativeModel,
    request: &GenerationRequest,
    config: &ExtractionConfig,
    label: &str,
) -> Result<ModelReply, (ServiceError, u32)> {
    let budget = Duration::from_secs(config.api_timeout_secs);
    let mut last_err = ServiceError::EmptyResponse;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "{}: {} retry {}/{} after {}ms",
                label, request.task, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = match timeout(budget, model.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        match outcome {
            Ok(text) => {
                debug!(
                    "{}: {} via {} returned {} chars",
                    label,
                    request.task,
                    model.name(),
                    text.len()
                );
                return Ok(ModelReply {
                    text,
                    retries: attempt,
                });
            }
            Err(e) => {
                warn!("{}: {} attempt {} failed: {}", label, request.task, attempt + 1, e);
                last_err = e;
            }
        }
    }

    Err((last_err, config.max_retries))
}

/// Delay before retry `attempt` (1-based), saturating instead of overflowing.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

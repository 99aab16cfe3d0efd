//! Bounded retry for transient remote failures.
//!
//! The provider rejects bursts of calls with throttling errors that are
//! safe to repeat, while everything else (validation failures, missing
//! resources, permission problems) is not. Retrying is therefore gated on
//! a classifier: only errors the classifier accepts are retried, with a
//! fixed delay between attempts and a hard attempt budget.
//!
//! # Example
//!
//! ```ignore
//! use ballast::retry::{retry_throttled, RetryConfig};
//!
//! let attrs = retry_throttled(&RetryConfig::default(), "DescribeLoadBalancer", || async {
//!     api.describe_load_balancer("lb-42").await
//! })
//! .await?;
//! ```

use std::time::Duration;

use tracing::{error, warn};

use crate::error::Error;

/// Configuration for retrying classified transient failures
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempt budget, counting the first call.
    ///
    /// The operation is always attempted at least once; a budget of 0
    /// behaves like 1.
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    /// Create a config with a maximum number of attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }
}

/// Execute an async operation, retrying failures the classifier accepts.
///
/// Errors the classifier rejects propagate immediately on the first
/// attempt. When the budget runs out, the last observed error is returned.
///
/// # Arguments
/// * `config` - Attempt budget and inter-attempt delay
/// * `operation_name` - Name for logging purposes
/// * `classify` - Returns `true` for errors worth retrying
/// * `operation` - The async operation to retry
pub async fn retry_if<F, Fut, T, E, C>(
    config: &RetryConfig,
    operation_name: &str,
    classify: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    C: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !classify(&e) => return Err(e),
            Err(e) => {
                if attempt >= config.max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Retryable operation failed after exhausting attempt budget"
                    );
                    return Err(e);
                }

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = config.delay.as_millis(),
                    "Retryable failure, trying again"
                );

                tokio::time::sleep(config.delay).await;
            }
        }
    }
}

/// Execute an async remote call, retrying only provider throttling errors.
///
/// This is the retry wrapper every remote call in this crate goes through;
/// see [`Error::is_throttled`] for what counts as throttling.
pub async fn retry_throttled<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    retry_if(config, operation_name, Error::is_throttled, operation).await
}

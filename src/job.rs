//! Waiting on asynchronous provider work
//!
//! Mutating provider calls often return before the work is done, handing
//! back a job id instead. [`wait_for_job`] polls that job to a terminal
//! state under a deadline. The same polling skeleton is exposed as
//! [`poll_until`] for waits that watch resource status rather than a job,
//! such as a load balancer leaving `provisioning`.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::api::CloudApi;
use crate::error::Error;
use crate::Result;

/// Default seconds between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default overall deadline for one wait
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(120);

/// Interval and deadline for one polling wait
#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Delay between polls
    pub interval: Duration,
    /// Overall deadline; the wait fails once this much time has passed
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollConfig {
    /// Create a poll config from an interval and a deadline
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Poll until `probe` produces a value or the deadline passes.
///
/// `probe` returns `Ok(Some(value))` when the awaited condition holds,
/// `Ok(None)` to keep waiting, and `Err` for a failed poll. Poll errors do
/// not abort the wait; they are logged and the next poll proceeds, with
/// the deadline still bounding the total time. The probe always runs at
/// least once, even with a zero timeout.
///
/// On timeout the error names `subject` (a job or resource id) and the
/// operation the wait belongs to.
pub async fn poll_until<T, F, Fut>(
    operation: &str,
    subject: &str,
    poll: &PollConfig,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();

    loop {
        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                debug!(
                    operation = %operation,
                    subject = %subject,
                    "Not complete yet, will poll again"
                );
            }
            Err(e) => {
                warn!(
                    operation = %operation,
                    subject = %subject,
                    error = %e,
                    "Status poll failed, will poll again"
                );
            }
        }

        if start.elapsed() >= poll.timeout {
            return Err(Error::job_timed_out(subject, operation, start.elapsed()));
        }

        tokio::time::sleep(poll.interval).await;
    }
}

/// Wait for an asynchronous provider job to finish.
///
/// Completes when the job reaches a terminal state: success returns
/// `Ok(())`, terminal failure returns [`Error::JobFailed`] immediately.
/// If no terminal state is observed before the deadline, the wait fails
/// with [`Error::JobTimedOut`].
pub async fn wait_for_job<A>(
    api: &A,
    operation: &str,
    job_id: &str,
    poll: &PollConfig,
) -> Result<()>
where
    A: CloudApi + ?Sized,
{
    let status = poll_until(operation, job_id, poll, move || async move {
        let status = api.get_job_status(job_id).await?;
        Ok(status.terminal.then_some(status))
    })
    .await?;

    if status.succeeded {
        debug!(operation = %operation, job = %job_id, "Job finished");
        Ok(())
    } else {
        Err(Error::job_failed(job_id, operation))
    }
}

/// Wait for a job when the mutating call actually started one.
///
/// Calls that complete synchronously return no job id; those are already
/// done and there is nothing to wait for.
pub async fn wait_if_started<A>(
    api: &A,
    operation: &str,
    job_id: Option<&str>,
    poll: &PollConfig,
) -> Result<()>
where
    A: CloudApi + ?Sized,
{
    match job_id {
        Some(id) => wait_for_job(api, operation, id, poll).await,
        None => Ok(()),
    }
}

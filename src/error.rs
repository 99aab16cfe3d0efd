//! Error types for ballast operations
//!
//! Every variant carries the context a caller needs to act on it: the
//! remote operation name, the request id the provider echoed back, the job
//! id a wait was bound to, or the full candidate list of an ambiguous
//! match.

use std::time::Duration;

use thiserror::Error;

use crate::model::ResourceKind;

/// Marker the provider embeds in rate-limit rejections.
///
/// Classification is a substring match so code families such as
/// `Throttling.User` are caught as well.
pub const THROTTLE_MARKER: &str = "Throttling";

/// Main error type for ballast operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An identity string did not decode into a key.
    ///
    /// Call sites that classify remote resources recover from this locally
    /// by treating the resource as user-managed; only direct codec callers
    /// see it surface.
    #[error("malformed identity {value:?}: {reason}")]
    MalformedIdentity {
        /// The string that failed to decode
        value: String,
        /// What was wrong with it
        reason: String,
    },

    /// An explicit-id lookup found nothing.
    #[error("{kind} {id:?} not found")]
    NotFound {
        /// Kind of resource that was looked up
        kind: ResourceKind,
        /// The remote id that matched nothing
        id: String,
    },

    /// More than one remote resource matched a tag or name query.
    ///
    /// Never auto-resolved; the conflicting resources must be removed or
    /// re-tagged by hand.
    #[error("ambiguous {kind} match for {query}: candidates {candidates:?}")]
    AmbiguousResource {
        /// Kind of resource that was queried
        kind: ResourceKind,
        /// Human-readable description of the query that matched
        query: String,
        /// Remote ids of every candidate, sorted
        candidates: Vec<String>,
    },

    /// A remote call failed.
    ///
    /// Wraps the provider's error code and message together with the
    /// operation name and the echoed request id, so a failure can be
    /// correlated on both sides.
    #[error("{operation} failed [{code}] (request {request_id}): {message}")]
    Api {
        /// Name of the remote operation that failed
        operation: String,
        /// Provider error code
        code: String,
        /// Provider error message
        message: String,
        /// Provider request id for cross-referencing
        request_id: String,
    },

    /// An asynchronous job reached a terminal failure state.
    #[error("job {job_id} submitted by {operation} failed")]
    JobFailed {
        /// Id of the failed job
        job_id: String,
        /// Operation that submitted the job
        operation: String,
    },

    /// An asynchronous job or status wait did not finish in time.
    #[error("job {job_id} submitted by {operation} timed out after {waited:?}")]
    JobTimedOut {
        /// Id of the job (or resource) that was being waited on
        job_id: String,
        /// Operation that started the wait
        operation: String,
        /// How long the waiter observed it before giving up
        waited: Duration,
    },

    /// One or more fanned-out sub-operations failed.
    ///
    /// Every underlying error is preserved together with the index of the
    /// item it belongs to, sorted by index.
    #[error("{} fanned-out operation(s) failed: {}", .failures.len(), format_failures(.failures))]
    Aggregate {
        /// `(item index, error)` pairs for every failed sub-operation
        failures: Vec<(usize, Error)>,
    },

    /// The fan-out was invoked with a concurrency ceiling of zero.
    #[error("invalid concurrency limit {limit}: the ceiling must be at least 1")]
    InvalidConcurrencyLimit {
        /// The rejected limit
        limit: usize,
    },

    /// A model or configuration was rejected before any remote call.
    #[error("validation error: {message}")]
    Validation {
        /// Description of what is invalid
        message: String,
    },
}

fn format_failures(failures: &[(usize, Error)]) -> String {
    failures
        .iter()
        .map(|(index, error)| format!("[{index}] {error}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a remote-call error with full provider context
    pub fn api(
        operation: impl Into<String>,
        code: impl Into<String>,
        request_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Api {
            operation: operation.into(),
            code: code.into(),
            message: message.into(),
            request_id: request_id.into(),
        }
    }

    /// Create a not-found error for an explicit-id lookup miss
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create an ambiguous-match error; candidate ids are sorted for
    /// deterministic output
    pub fn ambiguous(
        kind: ResourceKind,
        query: impl Into<String>,
        mut candidates: Vec<String>,
    ) -> Self {
        candidates.sort();
        Self::AmbiguousResource {
            kind,
            query: query.into(),
            candidates,
        }
    }

    /// Create a malformed-identity error
    pub fn malformed_identity(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentity {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a job-failed error
    pub fn job_failed(job_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::JobFailed {
            job_id: job_id.into(),
            operation: operation.into(),
        }
    }

    /// Create a job-timed-out error
    pub fn job_timed_out(
        job_id: impl Into<String>,
        operation: impl Into<String>,
        waited: Duration,
    ) -> Self {
        Self::JobTimedOut {
            job_id: job_id.into(),
            operation: operation.into(),
            waited,
        }
    }

    /// Create an aggregate error from indexed failures, sorted by index
    pub fn aggregate(mut failures: Vec<(usize, Error)>) -> Self {
        failures.sort_by_key(|(index, _)| *index);
        Self::Aggregate { failures }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Whether this error is a provider rate-limit rejection.
    ///
    /// Only this class of remote failure is retried transparently; every
    /// other error propagates on the first attempt.
    pub fn is_throttled(&self) -> bool {
        match self {
            Error::Api { code, message, .. } => {
                code.contains(THROTTLE_MARKER) || message.contains(THROTTLE_MARKER)
            }
            _ => false,
        }
    }

    /// Whether this error is an explicit-id lookup miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

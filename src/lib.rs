//! Ballast - declarative load balancer convergence for a remote cloud provider
//!
//! Ballast takes a desired load balancer model (a service's listeners and
//! backends) and drives the provider's actual state toward it. Every pass
//! is a full reconciliation: find or create the load balancer, ensure one
//! server group per listener port, converge the listeners, then prune
//! what the model no longer wants. Running the same pass twice is safe;
//! a converged pass performs no mutations.
//!
//! Ownership is carried in the provider's own name and description
//! strings, so a pass can always tell its resources from resources a
//! human created by hand. User-managed resources are adopted when tagged
//! for us, and are otherwise never modified or deleted.
//!
//! # Modules
//!
//! - [`model`] - Desired and observed resource models
//! - [`identity`] - Ownership keys encoded in remote name strings
//! - [`api`] - Typed provider surface ([`api::CloudApi`])
//! - [`retry`] - Bounded retry for throttled calls
//! - [`paging`] - Cursor pagination draining
//! - [`fanout`] - Bounded parallel execution with indexed failures
//! - [`job`] - Polling for asynchronous provider jobs
//! - [`locator`] - Load balancer discovery (id, tag, then name)
//! - [`converge`] - The convergence passes themselves
//! - [`config`] - Tuning knobs for a [`Converger`]
//! - [`error`] - Error types for the crate

#![deny(missing_docs)]

pub mod api;
pub mod config;
pub mod converge;
pub mod error;
pub mod fanout;
pub mod identity;
pub mod job;
pub mod locator;
pub mod model;
pub mod paging;
pub mod retry;

pub use config::ConvergerConfig;
pub use converge::Converger;
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

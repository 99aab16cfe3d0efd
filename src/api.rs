//! The remote provider surface this crate converges against
//!
//! [`CloudApi`] is the single seam between convergence logic and the
//! provider SDK. Every call is typed for its purpose; nothing in the crate
//! inspects runtime types to decide what a response means. Implementations
//! translate provider wire formats into these structs and surface failures
//! as [`crate::error::Error::Api`] with the provider's code, message and
//! request id attached.
//!
//! All calls are issued as-is: retry, pagination draining and job waiting
//! live in the callers, not in implementations.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::model::{AddressKind, Backend, HealthCheck, LifecycleStatus, Protocol, Tag};
use crate::paging::{Page, PageCursor};
use crate::Result;

/// Outcome of a create call that may continue as an asynchronous job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    /// Provider id of the new resource
    pub id: String,
    /// Job to wait on before the resource is usable, when the provider
    /// finishes the work asynchronously
    pub job_id: Option<String>,
}

/// Point-in-time status of an asynchronous provider job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Whether the job has stopped making progress
    pub terminal: bool,
    /// Whether it stopped in success; meaningless while `terminal` is false
    pub succeeded: bool,
}

impl JobStatus {
    /// A job still in progress
    pub fn running() -> Self {
        Self {
            terminal: false,
            succeeded: false,
        }
    }

    /// A job that finished successfully
    pub fn succeeded() -> Self {
        Self {
            terminal: true,
            succeeded: true,
        }
    }

    /// A job that reached a terminal failure state
    pub fn failed() -> Self {
        Self {
            terminal: true,
            succeeded: false,
        }
    }
}

/// One load balancer in a listing response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSummary {
    /// Provider id
    pub id: String,
    /// Remote resource name
    pub name: String,
}

/// Full attributes of one load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerAttributes {
    /// Provider id
    pub id: String,
    /// Remote resource name
    pub name: String,
    /// Allocated address, once assigned
    pub address: Option<String>,
    /// Internet-facing or internal address
    pub address_kind: AddressKind,
    /// Bandwidth cap in Mbit/s
    pub bandwidth_mbit: Option<u32>,
    /// Provider lifecycle status
    pub status: LifecycleStatus,
}

/// Input for creating a load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    /// Remote resource name
    pub name: String,
    /// Internet-facing or internal address
    pub address_kind: AddressKind,
    /// Bandwidth cap in Mbit/s, or the provider default when `None`
    pub bandwidth_mbit: Option<u32>,
}

/// Mutable load balancer attributes for an update call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerUpdate {
    /// New bandwidth cap in Mbit/s
    pub bandwidth_mbit: Option<u32>,
}

/// Desired shape of one listener, used for both create and update calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerSpec {
    /// Frontend port; identifies the listener within its load balancer
    pub port: u16,
    /// Listener protocol
    pub protocol: Protocol,
    /// Description string; carries the ownership key
    pub description: String,
    /// Health check settings, or the provider default when `None`
    pub health_check: Option<HealthCheck>,
    /// Server group the listener forwards to
    pub server_group_id: Option<String>,
}

/// One listener as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerAttributes {
    /// Frontend port
    pub port: u16,
    /// Listener protocol
    pub protocol: Protocol,
    /// Description string; may carry an ownership key
    pub description: String,
    /// Health check settings
    pub health_check: Option<HealthCheck>,
    /// Server group the listener forwards to
    pub server_group_id: Option<String>,
}

/// Input for creating a server group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroupSpec {
    /// Remote resource name; carries the ownership key
    pub name: String,
}

/// One server group in a listing response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroupSummary {
    /// Provider id
    pub id: String,
    /// Remote resource name
    pub name: String,
}

/// Full attributes of one server group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroupAttributes {
    /// Provider id
    pub id: String,
    /// Remote resource name
    pub name: String,
    /// Currently attached backends
    pub backends: Vec<Backend>,
}

/// Typed client surface of the load balancer provider.
///
/// Implemented once per real provider SDK and mocked in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// List load balancers carrying every one of the given tags
    async fn list_load_balancers_by_tag(
        &self,
        tags: &[Tag],
        cursor: PageCursor,
    ) -> Result<Page<LoadBalancerSummary>>;

    /// List load balancers matching a name query.
    ///
    /// Providers may match loosely (prefix or substring); callers filter
    /// for exact equality themselves.
    async fn list_load_balancers_by_name(
        &self,
        name: &str,
        cursor: PageCursor,
    ) -> Result<Page<LoadBalancerSummary>>;

    /// Fetch full attributes of one load balancer by id
    async fn describe_load_balancer(&self, id: &str) -> Result<LoadBalancerAttributes>;

    /// Create a load balancer
    async fn create_load_balancer(&self, spec: &LoadBalancerSpec) -> Result<Created>;

    /// Update mutable attributes of a load balancer
    async fn update_load_balancer(
        &self,
        id: &str,
        update: &LoadBalancerUpdate,
    ) -> Result<Option<String>>;

    /// Delete a load balancer; the provider cascades its listeners
    async fn delete_load_balancer(&self, id: &str) -> Result<Option<String>>;

    /// Attach tags to a load balancer, leaving unrelated tags in place
    async fn tag_load_balancer(&self, id: &str, tags: &[Tag]) -> Result<()>;

    /// List all tags on a load balancer
    async fn list_load_balancer_tags(&self, id: &str) -> Result<Vec<Tag>>;

    /// List listeners of a load balancer
    async fn list_listeners(
        &self,
        lb_id: &str,
        cursor: PageCursor,
    ) -> Result<Page<ListenerAttributes>>;

    /// Create a listener on a load balancer
    async fn create_listener(&self, lb_id: &str, spec: &ListenerSpec) -> Result<Option<String>>;

    /// Update the listener on `spec.port` to match `spec`
    async fn update_listener(&self, lb_id: &str, spec: &ListenerSpec) -> Result<Option<String>>;

    /// Delete the listener on the given port
    async fn delete_listener(&self, lb_id: &str, port: u16) -> Result<Option<String>>;

    /// List server groups of a load balancer
    async fn list_server_groups(
        &self,
        lb_id: &str,
        cursor: PageCursor,
    ) -> Result<Page<ServerGroupSummary>>;

    /// Fetch full attributes of one server group by id
    async fn describe_server_group(&self, id: &str) -> Result<ServerGroupAttributes>;

    /// Create an empty server group on a load balancer
    async fn create_server_group(&self, lb_id: &str, spec: &ServerGroupSpec) -> Result<Created>;

    /// Replace a server group's backend attachments wholesale
    async fn set_server_group_backends(
        &self,
        id: &str,
        backends: &[Backend],
    ) -> Result<Option<String>>;

    /// Delete a server group
    async fn delete_server_group(&self, id: &str) -> Result<Option<String>>;

    /// Fetch the current status of an asynchronous job
    async fn get_job_status(&self, job_id: &str) -> Result<JobStatus>;
}

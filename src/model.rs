//! Domain types shared across the crate
//!
//! Two families live here. The desired-state models
//! ([`LoadBalancerModel`] and what hangs off it) describe what a caller
//! wants to exist; they are plain data, typically deserialized from a
//! manifest. The observed types ([`RemoteLoadBalancer`],
//! [`RemoteListener`], [`RemoteServerGroup`]) describe what a convergence
//! pass actually found remotely, including whether each resource is one of
//! ours or user-managed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::identity::{ListenerKey, LoadBalancerKey, ServerGroupKey};

/// Kinds of remote resources this crate manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    /// A load balancer instance
    LoadBalancer,
    /// A listener on a load balancer port
    Listener,
    /// A server group holding backend attachments
    ServerGroup,
    /// An asynchronous provider job
    Job,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::LoadBalancer => write!(f, "load balancer"),
            ResourceKind::Listener => write!(f, "listener"),
            ResourceKind::ServerGroup => write!(f, "server group"),
            ResourceKind::Job => write!(f, "job"),
        }
    }
}

/// Transport protocol of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain TCP pass-through
    Tcp,
    /// UDP pass-through
    Udp,
    /// Layer-7 HTTP
    Http,
    /// Layer-7 HTTPS termination
    Https,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Tcp
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(Error::validation(format!("unknown protocol: {other}"))),
        }
    }
}

/// Whether a load balancer is reachable from the internet or only from
/// inside the provider network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    /// Public address, internet-facing
    Internet,
    /// Private address, reachable inside the provider network only
    Intranet,
}

impl Default for AddressKind {
    fn default() -> Self {
        AddressKind::Internet
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKind::Internet => write!(f, "internet"),
            AddressKind::Intranet => write!(f, "intranet"),
        }
    }
}

/// Lifecycle status reported by the provider for a load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    /// Still being created, not yet usable
    Provisioning,
    /// Fully operational
    Active,
    /// Exists but is administratively stopped
    Inactive,
    /// A status string this crate does not model
    Unknown(String),
}

impl LifecycleStatus {
    /// Map a raw provider status string onto the modeled states.
    ///
    /// Anything unrecognized is kept verbatim in [`LifecycleStatus::Unknown`]
    /// rather than being guessed at.
    pub fn from_remote(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "provisioning" => LifecycleStatus::Provisioning,
            "active" => LifecycleStatus::Active,
            "inactive" => LifecycleStatus::Inactive,
            _ => LifecycleStatus::Unknown(raw.to_string()),
        }
    }

    /// Whether the resource is still being created
    pub fn is_provisioning(&self) -> bool {
        matches!(self, LifecycleStatus::Provisioning)
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleStatus::Provisioning => write!(f, "provisioning"),
            LifecycleStatus::Active => write!(f, "active"),
            LifecycleStatus::Inactive => write!(f, "inactive"),
            LifecycleStatus::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

/// A key/value tag attached to a remote resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

impl Tag {
    /// Create a tag from a key and value
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The service a load balancer fronts, identified by name and namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRef {
    /// Service name
    pub name: String,
    /// Namespace the service lives in
    pub namespace: String,
}

impl ServiceRef {
    /// Create a service reference
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// The `namespace/name` form used in tags and log lines
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Health check settings for a listener's backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    /// Seconds between probes
    pub interval_secs: u32,
    /// Consecutive successes before a backend counts as healthy
    pub healthy_threshold: u32,
    /// Consecutive failures before a backend counts as unhealthy
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            healthy_threshold: 3,
            unhealthy_threshold: 3,
        }
    }
}

fn default_backend_weight() -> u32 {
    100
}

/// A single backend server attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    /// Provider id of the backend server
    pub server_id: String,
    /// Port traffic is forwarded to on the server
    pub port: u16,
    /// Relative traffic weight
    #[serde(default = "default_backend_weight")]
    pub weight: u32,
}

impl Backend {
    /// Create a backend attachment with the default weight
    pub fn new(server_id: impl Into<String>, port: u16) -> Self {
        Self {
            server_id: server_id.into(),
            port,
            weight: default_backend_weight(),
        }
    }
}

/// Desired state of one listener port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerModel {
    /// Frontend port the listener accepts traffic on
    pub port: u16,
    /// Listener protocol
    #[serde(default)]
    pub protocol: Protocol,
    /// Health check settings, or the provider default when `None`
    #[serde(default)]
    pub health_check: Option<HealthCheck>,
    /// Backends that should receive this listener's traffic
    #[serde(default)]
    pub backends: Vec<Backend>,
}

/// Desired state of a load balancer and everything attached to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerModel {
    /// The service this load balancer fronts
    pub service: ServiceRef,
    /// Explicit remote id of a pre-existing load balancer to reuse.
    ///
    /// When set, the instance is treated as user-managed: its own
    /// attributes are never modified and it is never deleted, but
    /// listeners and server groups are still converged on it.
    #[serde(default)]
    pub remote_id: Option<String>,
    /// Internet-facing or internal address
    #[serde(default)]
    pub address_kind: AddressKind,
    /// Bandwidth cap in Mbit/s, or the provider default when `None`
    #[serde(default)]
    pub bandwidth_mbit: Option<u32>,
    /// Extra tags to apply on top of the ownership tags
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Listeners that should exist on this load balancer
    #[serde(default)]
    pub listeners: Vec<ListenerModel>,
}

/// A load balancer as observed remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLoadBalancer {
    /// Provider id
    pub id: String,
    /// Remote resource name
    pub name: String,
    /// Allocated address, once the provider has assigned one
    pub address: Option<String>,
    /// Internet-facing or internal address
    pub address_kind: AddressKind,
    /// Bandwidth cap in Mbit/s as reported by the provider
    pub bandwidth_mbit: Option<u32>,
    /// Provider lifecycle status
    pub status: LifecycleStatus,
    /// Whether this instance is owned by someone else.
    ///
    /// User-managed instances are read-only at the instance level: their
    /// attributes and tags are left alone and they are never deleted.
    pub user_managed: bool,
    /// Ownership key decoded from the resource name, when one was present
    pub key: Option<LoadBalancerKey>,
}

/// A listener as observed remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteListener {
    /// Frontend port
    pub port: u16,
    /// Listener protocol
    pub protocol: Protocol,
    /// Health check settings as reported by the provider
    pub health_check: Option<HealthCheck>,
    /// Server group the listener forwards to, when attached
    pub server_group_id: Option<String>,
    /// Whether this listener belongs to someone else
    pub user_managed: bool,
    /// Ownership key decoded from the listener description, when present
    pub key: Option<ListenerKey>,
}

/// A server group as observed remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteServerGroup {
    /// Provider id
    pub id: String,
    /// Remote resource name
    pub name: String,
    /// Currently attached backends
    pub backends: Vec<Backend>,
    /// Whether this group belongs to someone else
    pub user_managed: bool,
    /// Ownership key decoded from the group name, when present
    pub key: Option<ServerGroupKey>,
}

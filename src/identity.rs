//! Ownership keys encoded into remote resource names and descriptions
//!
//! The provider has no native concept of "this load balancer belongs to
//! service X in cluster Y", so ownership is carried inside the remote
//! string fields themselves:
//!
//! - load balancer name: `<prefix>.<service>.<namespace>.<cluster>`
//! - listener description: `<prefix>.<port>.<protocol>.<service>.<namespace>.<cluster>`
//! - server group name: `<prefix>.<port>.<protocol>.<service>.<namespace>.<cluster>`
//!
//! Decoding is purely syntactic: field count, expected prefix, and (for
//! listeners only) a numeric port. Field values are not escaped, so a
//! value containing the separator produces a string that later fails to
//! decode; callers treat such resources as user-managed rather than
//! erroring out.

use crate::error::Error;
use crate::model::{Protocol, ServiceRef};
use crate::Result;

/// Prefix used when none is configured
pub const DEFAULT_KEY_PREFIX: &str = "k8s";

/// Separator between key fields
pub const KEY_SEPARATOR: char = '.';

const LOAD_BALANCER_KEY_FIELDS: usize = 4;
const LISTENER_KEY_FIELDS: usize = 6;
const SERVER_GROUP_KEY_FIELDS: usize = 6;

/// Ownership key carried in a load balancer name
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerKey {
    /// Configured key prefix
    pub prefix: String,
    /// Service name
    pub service: String,
    /// Service namespace
    pub namespace: String,
    /// Cluster the service lives in
    pub cluster_id: String,
}

impl LoadBalancerKey {
    /// Whether this key belongs to the given service in the given cluster.
    ///
    /// All three fields must match exactly; the prefix plays no part in
    /// ownership.
    pub fn belongs_to(&self, service: &ServiceRef, cluster_id: &str) -> bool {
        self.service == service.name
            && self.namespace == service.namespace
            && self.cluster_id == cluster_id
    }
}

/// Ownership key carried in a listener description
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerKey {
    /// Configured key prefix
    pub prefix: String,
    /// Frontend port, parsed during decoding
    pub port: u16,
    /// Protocol field, kept verbatim
    pub protocol: String,
    /// Service name
    pub service: String,
    /// Service namespace
    pub namespace: String,
    /// Cluster the service lives in
    pub cluster_id: String,
}

impl ListenerKey {
    /// Whether this key belongs to the given service in the given cluster
    pub fn belongs_to(&self, service: &ServiceRef, cluster_id: &str) -> bool {
        self.service == service.name
            && self.namespace == service.namespace
            && self.cluster_id == cluster_id
    }
}

/// Ownership key carried in a server group name.
///
/// Unlike [`ListenerKey`], the port field is kept as an uninterpreted
/// string; server group names with non-numeric port fields still decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroupKey {
    /// Configured key prefix
    pub prefix: String,
    /// Port field, kept verbatim
    pub group_port: String,
    /// Protocol field, kept verbatim
    pub protocol: String,
    /// Service name
    pub service: String,
    /// Service namespace
    pub namespace: String,
    /// Cluster the service lives in
    pub cluster_id: String,
}

impl ServerGroupKey {
    /// Whether this key belongs to the given service in the given cluster
    pub fn belongs_to(&self, service: &ServiceRef, cluster_id: &str) -> bool {
        self.service == service.name
            && self.namespace == service.namespace
            && self.cluster_id == cluster_id
    }
}

/// Encodes and decodes ownership keys against a configured prefix
#[derive(Debug, Clone)]
pub struct IdentityCodec {
    prefix: String,
}

impl Default for IdentityCodec {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl IdentityCodec {
    /// Create a codec with the given prefix; an empty prefix falls back to
    /// [`DEFAULT_KEY_PREFIX`]
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.is_empty() {
            DEFAULT_KEY_PREFIX.to_string()
        } else {
            prefix
        };
        Self { prefix }
    }

    /// The prefix this codec expects on every decoded key
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the key for a service's load balancer
    pub fn load_balancer_key(&self, service: &ServiceRef, cluster_id: &str) -> LoadBalancerKey {
        LoadBalancerKey {
            prefix: self.prefix.clone(),
            service: service.name.clone(),
            namespace: service.namespace.clone(),
            cluster_id: cluster_id.to_string(),
        }
    }

    /// Build the key for one listener port of a service
    pub fn listener_key(
        &self,
        port: u16,
        protocol: Protocol,
        service: &ServiceRef,
        cluster_id: &str,
    ) -> ListenerKey {
        ListenerKey {
            prefix: self.prefix.clone(),
            port,
            protocol: protocol.to_string(),
            service: service.name.clone(),
            namespace: service.namespace.clone(),
            cluster_id: cluster_id.to_string(),
        }
    }

    /// Build the key for the server group backing one listener port
    pub fn server_group_key(
        &self,
        port: u16,
        protocol: Protocol,
        service: &ServiceRef,
        cluster_id: &str,
    ) -> ServerGroupKey {
        ServerGroupKey {
            prefix: self.prefix.clone(),
            group_port: port.to_string(),
            protocol: protocol.to_string(),
            service: service.name.clone(),
            namespace: service.namespace.clone(),
            cluster_id: cluster_id.to_string(),
        }
    }

    /// Encode a load balancer key into the remote name string
    pub fn encode_load_balancer(&self, key: &LoadBalancerKey) -> String {
        [
            self.effective_prefix(&key.prefix),
            key.service.as_str(),
            key.namespace.as_str(),
            key.cluster_id.as_str(),
        ]
        .join(&KEY_SEPARATOR.to_string())
    }

    /// Encode a listener key into the remote description string
    pub fn encode_listener(&self, key: &ListenerKey) -> String {
        let port = key.port.to_string();
        [
            self.effective_prefix(&key.prefix),
            port.as_str(),
            key.protocol.as_str(),
            key.service.as_str(),
            key.namespace.as_str(),
            key.cluster_id.as_str(),
        ]
        .join(&KEY_SEPARATOR.to_string())
    }

    /// Encode a server group key into the remote name string
    pub fn encode_server_group(&self, key: &ServerGroupKey) -> String {
        [
            self.effective_prefix(&key.prefix),
            key.group_port.as_str(),
            key.protocol.as_str(),
            key.service.as_str(),
            key.namespace.as_str(),
            key.cluster_id.as_str(),
        ]
        .join(&KEY_SEPARATOR.to_string())
    }

    /// Decode a load balancer name into its key
    pub fn decode_load_balancer(&self, value: &str) -> Result<LoadBalancerKey> {
        let fields = self.split_fields(value, LOAD_BALANCER_KEY_FIELDS)?;
        Ok(LoadBalancerKey {
            prefix: fields[0].to_string(),
            service: fields[1].to_string(),
            namespace: fields[2].to_string(),
            cluster_id: fields[3].to_string(),
        })
    }

    /// Decode a listener description into its key
    pub fn decode_listener(&self, value: &str) -> Result<ListenerKey> {
        let fields = self.split_fields(value, LISTENER_KEY_FIELDS)?;
        let port = fields[1].parse::<u16>().map_err(|_| {
            Error::malformed_identity(
                value,
                format!("port {:?} is not a valid port number", fields[1]),
            )
        })?;
        Ok(ListenerKey {
            prefix: fields[0].to_string(),
            port,
            protocol: fields[2].to_string(),
            service: fields[3].to_string(),
            namespace: fields[4].to_string(),
            cluster_id: fields[5].to_string(),
        })
    }

    /// Decode a server group name into its key
    pub fn decode_server_group(&self, value: &str) -> Result<ServerGroupKey> {
        let fields = self.split_fields(value, SERVER_GROUP_KEY_FIELDS)?;
        Ok(ServerGroupKey {
            prefix: fields[0].to_string(),
            group_port: fields[1].to_string(),
            protocol: fields[2].to_string(),
            service: fields[3].to_string(),
            namespace: fields[4].to_string(),
            cluster_id: fields[5].to_string(),
        })
    }

    fn effective_prefix<'a>(&'a self, key_prefix: &'a str) -> &'a str {
        if key_prefix.is_empty() {
            &self.prefix
        } else {
            key_prefix
        }
    }

    fn split_fields<'a>(&self, value: &'a str, expected: usize) -> Result<Vec<&'a str>> {
        let fields: Vec<&str> = value.split(KEY_SEPARATOR).collect();
        if fields.len() != expected {
            return Err(Error::malformed_identity(
                value,
                format!(
                    "expected {expected} fields separated by {KEY_SEPARATOR:?}, found {}",
                    fields.len()
                ),
            ));
        }
        if fields[0] != self.prefix {
            return Err(Error::malformed_identity(
                value,
                format!(
                    "prefix {:?} does not match expected {:?}",
                    fields[0], self.prefix
                ),
            ));
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ServiceRef {
        ServiceRef::new("web", "default")
    }

    #[test]
    fn listener_key_round_trips() {
        let codec = IdentityCodec::new("acme");
        let key = codec.listener_key(8443, Protocol::Https, &service(), "cluster-1");
        let encoded = codec.encode_listener(&key);
        assert_eq!(encoded, "acme.8443.https.web.default.cluster-1");
        let decoded = codec.decode_listener(&encoded).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn server_group_key_round_trips() {
        let codec = IdentityCodec::default();
        let key = codec.server_group_key(80, Protocol::Tcp, &service(), "c1");
        let encoded = codec.encode_server_group(&key);
        assert_eq!(encoded, "k8s.80.tcp.web.default.c1");
        let decoded = codec.decode_server_group(&encoded).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn load_balancer_key_round_trips() {
        let codec = IdentityCodec::default();
        let key = codec.load_balancer_key(&service(), "c1");
        let encoded = codec.encode_load_balancer(&key);
        assert_eq!(encoded, "k8s.web.default.c1");
        let decoded = codec.decode_load_balancer(&encoded).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        let codec = IdentityCodec::default();
        let err = codec.decode_listener("k8s.80.tcp.web.default").unwrap_err();
        match err {
            Error::MalformedIdentity { reason, .. } => {
                assert!(reason.contains("expected 6 fields"));
                assert!(reason.contains("found 5"));
            }
            other => panic!("expected MalformedIdentity, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_unexpected_prefix() {
        let codec = IdentityCodec::new("acme");
        let err = codec
            .decode_listener("k8s.80.tcp.web.default.c1")
            .unwrap_err();
        match err {
            Error::MalformedIdentity { reason, .. } => {
                assert!(reason.contains("\"k8s\""));
                assert!(reason.contains("\"acme\""));
            }
            other => panic!("expected MalformedIdentity, got {other:?}"),
        }
    }

    #[test]
    fn listener_port_must_be_numeric_but_server_group_port_is_verbatim() {
        let codec = IdentityCodec::default();
        let raw = "k8s.http.tcp.web.default.c1";

        let err = codec.decode_listener(raw).unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity { .. }));

        let key = codec.decode_server_group(raw).unwrap();
        assert_eq!(key.group_port, "http");
    }

    #[test]
    fn empty_prefix_falls_back_to_default() {
        let codec = IdentityCodec::new("");
        assert_eq!(codec.prefix(), DEFAULT_KEY_PREFIX);

        let key = LoadBalancerKey {
            prefix: String::new(),
            service: "web".to_string(),
            namespace: "default".to_string(),
            cluster_id: "c1".to_string(),
        };
        assert_eq!(codec.encode_load_balancer(&key), "k8s.web.default.c1");
    }

    #[test]
    fn ownership_requires_exact_triple_match() {
        let codec = IdentityCodec::default();
        let key = codec.listener_key(80, Protocol::Tcp, &service(), "c1");

        assert!(key.belongs_to(&service(), "c1"));
        assert!(!key.belongs_to(&ServiceRef::new("web", "other"), "c1"));
        assert!(!key.belongs_to(&service(), "c2"));
        assert!(!key.belongs_to(&ServiceRef::new("api", "default"), "c1"));
    }

    #[test]
    fn separator_inside_a_field_is_not_escaped() {
        // Known limitation: a service named with a dot produces a string
        // that no longer decodes as 4 fields.
        let codec = IdentityCodec::default();
        let key = codec.load_balancer_key(&ServiceRef::new("web.v2", "default"), "c1");
        let encoded = codec.encode_load_balancer(&key);
        assert!(codec.decode_load_balancer(&encoded).is_err());
    }
}

//! Convergence configuration
//!
//! One [`ConvergerConfig`] is built by the embedding operator and shared
//! by every convergence pass. The defaults are tuned for a provider with
//! per-account rate limits: a modest fan-out ceiling, patient polling for
//! load balancer provisioning, and a bounded throttling retry budget.

use std::time::Duration;

use crate::error::Error;
use crate::job::PollConfig;
use crate::model::{ServiceRef, Tag};
use crate::paging::DEFAULT_PAGE_SIZE;
use crate::retry::RetryConfig;
use crate::Result;

/// Tag key naming the cluster that owns a load balancer
pub const TAG_CLUSTER: &str = "ballast.io/cluster";

/// Tag key naming the `namespace/name` of the owning service
pub const TAG_SERVICE: &str = "ballast.io/service";

/// Default ceiling for concurrent per-item remote calls
pub const DEFAULT_FANOUT_LIMIT: usize = 8;

/// Settings shared by all convergence passes
#[derive(Clone, Debug)]
pub struct ConvergerConfig {
    /// Id of the cluster this converger acts for; required, must be
    /// non-empty
    pub cluster_id: String,
    /// Prefix for ownership keys; empty means the built-in default
    pub key_prefix: String,
    /// Extra tags attached to every managed load balancer, on top of the
    /// ownership tags
    pub default_tags: Vec<Tag>,
    /// Ceiling for concurrent per-item remote calls
    pub fanout_limit: usize,
    /// Retry budget for throttled remote calls
    pub retry: RetryConfig,
    /// Polling for load balancer jobs and provisioning waits
    pub load_balancer_poll: PollConfig,
    /// Polling for server group and listener jobs
    pub server_group_poll: PollConfig,
    /// Page size for provider listings
    pub page_size: u32,
}

impl Default for ConvergerConfig {
    fn default() -> Self {
        Self {
            cluster_id: String::new(),
            key_prefix: String::new(),
            default_tags: Vec::new(),
            fanout_limit: DEFAULT_FANOUT_LIMIT,
            retry: RetryConfig::default(),
            load_balancer_poll: PollConfig::new(
                Duration::from_secs(5),
                Duration::from_secs(300),
            ),
            server_group_poll: PollConfig::new(Duration::from_secs(2), Duration::from_secs(60)),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ConvergerConfig {
    /// Default configuration for the given cluster
    pub fn for_cluster(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            ..Default::default()
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.cluster_id.is_empty() {
            return Err(Error::validation("cluster_id must not be empty"));
        }
        if self.fanout_limit == 0 {
            return Err(Error::InvalidConcurrencyLimit {
                limit: self.fanout_limit,
            });
        }
        if self.page_size == 0 {
            return Err(Error::validation("page_size must be at least 1"));
        }
        Ok(())
    }

    /// The two tags that identify a service's load balancer.
    ///
    /// These are both searched on and applied; `default_tags` are applied
    /// but never searched, so changing them later cannot orphan existing
    /// load balancers.
    pub fn ownership_tags(&self, service: &ServiceRef) -> Vec<Tag> {
        vec![
            Tag::new(TAG_CLUSTER, &self.cluster_id),
            Tag::new(TAG_SERVICE, service.qualified()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_once_a_cluster_id_is_set() {
        let config = ConvergerConfig::for_cluster("cluster-1");
        config.validate().unwrap();
        assert_eq!(config.fanout_limit, DEFAULT_FANOUT_LIMIT);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.load_balancer_poll.timeout, Duration::from_secs(300));
        assert_eq!(config.server_group_poll.timeout, Duration::from_secs(60));
    }

    #[test]
    fn empty_cluster_id_is_rejected() {
        let config = ConvergerConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_fanout_limit_is_rejected() {
        let config = ConvergerConfig {
            fanout_limit: 0,
            ..ConvergerConfig::for_cluster("c1")
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConcurrencyLimit { limit: 0 }));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let config = ConvergerConfig {
            page_size: 0,
            ..ConvergerConfig::for_cluster("c1")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn ownership_tags_identify_cluster_and_service() {
        let config = ConvergerConfig::for_cluster("cluster-1");
        let tags = config.ownership_tags(&ServiceRef::new("web", "default"));
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0], Tag::new(TAG_CLUSTER, "cluster-1"));
        assert_eq!(tags[1], Tag::new(TAG_SERVICE, "default/web"));
    }
}

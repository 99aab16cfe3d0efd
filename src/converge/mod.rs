//! Convergence of desired models onto the provider
//!
//! [`Converger`] is the crate's entry point. One [`Converger::apply`] call
//! drives remote state for a service's load balancer to match its model:
//! the instance itself, then server groups, then listeners, so listeners
//! only ever reference groups that already exist; orphaned groups are
//! pruned last, after no listener points at them. Nothing observed
//! remotely is cached between passes; every pass re-resolves identity from
//! scratch.
//!
//! User-managed load balancers (explicit remote id, or an unrecognized
//! name) get listeners and server groups converged onto them, but their
//! own attributes are never touched and they are never deleted.

mod listener;
mod load_balancer;
mod server_group;

use std::collections::HashSet;

use tracing::{debug, info};

use crate::api::CloudApi;
use crate::config::ConvergerConfig;
use crate::error::Error;
use crate::identity::IdentityCodec;
use crate::locator::Locator;
use crate::model::{LoadBalancerModel, RemoteLoadBalancer};
use crate::retry::retry_throttled;
use crate::Result;

/// Converges load balancer models against one provider account
#[derive(Debug)]
pub struct Converger<A: CloudApi> {
    pub(crate) api: A,
    pub(crate) codec: IdentityCodec,
    pub(crate) config: ConvergerConfig,
}

impl<A: CloudApi> Converger<A> {
    /// Create a converger over a provider client.
    ///
    /// Fails if the configuration is unusable, for example an empty
    /// cluster id.
    pub fn new(api: A, config: ConvergerConfig) -> Result<Self> {
        config.validate()?;
        let codec = IdentityCodec::new(config.key_prefix.as_str());
        Ok(Self { api, codec, config })
    }

    /// The configuration this converger runs with
    pub fn config(&self) -> &ConvergerConfig {
        &self.config
    }

    fn locator(&self) -> Locator<'_, A> {
        Locator::new(&self.api, &self.codec, &self.config)
    }

    /// Locate the remote load balancer for a model without changing
    /// anything; `None` means it does not exist yet
    pub async fn describe(&self, model: &LoadBalancerModel) -> Result<Option<RemoteLoadBalancer>> {
        self.locator().find(model).await
    }

    /// Drive remote state to match the model.
    ///
    /// Creates the load balancer if absent, reconciles its attributes and
    /// tags if managed, then converges server groups and listeners. The
    /// returned load balancer carries freshly described attributes,
    /// including the allocated address.
    pub async fn apply(&self, model: &LoadBalancerModel) -> Result<RemoteLoadBalancer> {
        validate_model(model)?;
        info!(service = %model.service.qualified(), "Converging load balancer");

        let lb = match self.locator().find(model).await? {
            None => load_balancer::create(self, model).await?,
            Some(found) => load_balancer::ensure_current(self, found, model).await?,
        };

        let groups = server_group::ensure(self, &lb, model).await?;
        listener::converge(self, &lb, model, &groups).await?;
        server_group::prune(self, &lb, model, &groups).await?;

        let refreshed = self.refresh(lb).await?;
        info!(
            lb = %refreshed.id,
            address = %refreshed.address.as_deref().unwrap_or("-"),
            status = %refreshed.status,
            "Convergence complete"
        );
        Ok(refreshed)
    }

    /// Remove everything the model owns remotely.
    ///
    /// Owned listeners and server groups are always deleted. The load
    /// balancer itself is deleted only when it is ours; a user-managed
    /// instance is left standing. Deleting a model that was never applied
    /// succeeds without any mutation.
    pub async fn delete(&self, model: &LoadBalancerModel) -> Result<()> {
        info!(service = %model.service.qualified(), "Deleting load balancer state");

        let Some(lb) = self.locator().find(model).await? else {
            debug!(
                service = %model.service.qualified(),
                "No remote load balancer found, nothing to delete"
            );
            return Ok(());
        };

        listener::cleanup(self, &lb, model).await?;
        server_group::cleanup(self, &lb, model).await?;

        if lb.user_managed {
            info!(
                lb = %lb.id,
                "Removed owned resources, kept the user-managed load balancer"
            );
            return Ok(());
        }
        load_balancer::delete(self, &lb).await
    }

    async fn refresh(&self, lb: RemoteLoadBalancer) -> Result<RemoteLoadBalancer> {
        let attrs = retry_throttled(&self.config.retry, "DescribeLoadBalancer", {
            let id = lb.id.as_str();
            move || async move { self.api.describe_load_balancer(id).await }
        })
        .await?;

        Ok(RemoteLoadBalancer {
            id: attrs.id,
            name: attrs.name,
            address: attrs.address,
            address_kind: attrs.address_kind,
            bandwidth_mbit: attrs.bandwidth_mbit,
            status: attrs.status,
            ..lb
        })
    }
}

/// Reject models that cannot be converged before any remote call is made
fn validate_model(model: &LoadBalancerModel) -> Result<()> {
    if model.service.name.is_empty() {
        return Err(Error::validation("service name must not be empty"));
    }
    if model.service.namespace.is_empty() {
        return Err(Error::validation("service namespace must not be empty"));
    }

    let mut ports = HashSet::new();
    for listener in &model.listeners {
        if listener.port == 0 {
            return Err(Error::validation("listener port must not be 0"));
        }
        if !ports.insert(listener.port) {
            return Err(Error::validation(format!(
                "duplicate listener port {}",
                listener.port
            )));
        }
        for backend in &listener.backends {
            if backend.server_id.is_empty() {
                return Err(Error::validation(format!(
                    "listener {} has a backend with an empty server id",
                    listener.port
                )));
            }
            if backend.port == 0 {
                return Err(Error::validation(format!(
                    "listener {} has a backend with port 0",
                    listener.port
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockCloudApi;
    use crate::model::{Backend, ListenerModel, Protocol, ServiceRef};

    fn model_with_listeners(listeners: Vec<ListenerModel>) -> LoadBalancerModel {
        LoadBalancerModel {
            service: ServiceRef::new("web", "default"),
            remote_id: None,
            address_kind: Default::default(),
            bandwidth_mbit: None,
            tags: Vec::new(),
            listeners,
        }
    }

    fn listener(port: u16) -> ListenerModel {
        ListenerModel {
            port,
            protocol: Protocol::Tcp,
            health_check: None,
            backends: vec![Backend::new("i-1", 8080)],
        }
    }

    #[test]
    fn valid_model_passes_validation() {
        let model = model_with_listeners(vec![listener(80), listener(443)]);
        validate_model(&model).unwrap();
    }

    #[test]
    fn duplicate_listener_ports_are_rejected() {
        let model = model_with_listeners(vec![listener(80), listener(80)]);
        let err = validate_model(&model).unwrap_err();
        assert!(err.to_string().contains("duplicate listener port 80"));
    }

    #[test]
    fn zero_ports_and_empty_server_ids_are_rejected() {
        assert!(validate_model(&model_with_listeners(vec![listener(0)])).is_err());

        let mut bad_backend = listener(80);
        bad_backend.backends[0].server_id.clear();
        assert!(validate_model(&model_with_listeners(vec![bad_backend])).is_err());

        let mut bad_port = listener(80);
        bad_port.backends[0].port = 0;
        assert!(validate_model(&model_with_listeners(vec![bad_port])).is_err());
    }

    #[test]
    fn empty_service_identity_is_rejected() {
        let mut model = model_with_listeners(vec![listener(80)]);
        model.service.name.clear();
        assert!(validate_model(&model).is_err());
    }

    #[test]
    fn converger_refuses_unusable_configuration() {
        let api = MockCloudApi::new();
        let err = Converger::new(api, ConvergerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn converger_codec_uses_the_configured_prefix() {
        let api = MockCloudApi::new();
        let mut config = ConvergerConfig::for_cluster("c1");
        config.key_prefix = "acme".to_string();
        let converger = Converger::new(api, config).unwrap();
        assert_eq!(converger.codec.prefix(), "acme");
    }
}

//! Locating a service's load balancer remotely
//!
//! Resolution tries three strategies in order and stops at the first hit:
//!
//! 1. the explicit remote id from the model, fetched directly
//! 2. the ownership tags, listed and matched
//! 3. the encoded ownership name, listed and matched exactly
//!
//! Ambiguity is never guessed away: two candidates under one tag or name
//! query fail the pass with [`Error::AmbiguousResource`]. A tag or name
//! match still provisioning is waited on before being returned, so callers
//! always see a fully populated load balancer.

use tracing::{debug, info};

use crate::api::{CloudApi, LoadBalancerAttributes, LoadBalancerSummary};
use crate::config::ConvergerConfig;
use crate::error::Error;
use crate::identity::IdentityCodec;
use crate::job::poll_until;
use crate::model::{LoadBalancerModel, RemoteLoadBalancer, ResourceKind, Tag};
use crate::paging::collect_all;
use crate::retry::retry_throttled;
use crate::Result;

/// Resolves desired models to remote load balancers
pub struct Locator<'a, A: CloudApi + ?Sized> {
    api: &'a A,
    codec: &'a IdentityCodec,
    config: &'a ConvergerConfig,
}

impl<'a, A: CloudApi + ?Sized> Locator<'a, A> {
    /// Create a locator over the given provider client
    pub fn new(api: &'a A, codec: &'a IdentityCodec, config: &'a ConvergerConfig) -> Self {
        Self { api, codec, config }
    }

    /// Find the remote load balancer for a model, or `None` if it does not
    /// exist yet.
    ///
    /// An explicit remote id is authoritative: any fetch error for it,
    /// including not-found, propagates as-is rather than falling through
    /// to the next strategy.
    pub async fn find(&self, model: &LoadBalancerModel) -> Result<Option<RemoteLoadBalancer>> {
        if let Some(id) = &model.remote_id {
            debug!(
                lb = %id,
                service = %model.service.qualified(),
                "Resolving load balancer by explicit id"
            );
            let attrs = self.describe(id).await?;
            return Ok(Some(self.classify(attrs, model, false)));
        }

        if let Some(found) = self.find_by_tag(model).await? {
            return Ok(Some(found));
        }

        self.find_by_name(model).await
    }

    async fn find_by_tag(&self, model: &LoadBalancerModel) -> Result<Option<RemoteLoadBalancer>> {
        let tags = self.config.ownership_tags(&model.service);
        let tags_ref: &[Tag] = &tags;

        let matches: Vec<LoadBalancerSummary> =
            collect_all(self.config.page_size, move |cursor| async move {
                retry_throttled(&self.config.retry, "ListLoadBalancersByTag", move || {
                    let cursor = cursor.clone();
                    async move { self.api.list_load_balancers_by_tag(tags_ref, cursor).await }
                })
                .await
            })
            .await?;

        match matches.as_slice() {
            [] => {
                debug!(
                    service = %model.service.qualified(),
                    "No load balancer carries the ownership tags, trying name lookup"
                );
                Ok(None)
            }
            [only] => self.adopt(&only.id, model, true).await.map(Some),
            many => Err(Error::ambiguous(
                ResourceKind::LoadBalancer,
                format!("tags {}", format_tags(tags_ref)),
                many.iter().map(|summary| summary.id.clone()).collect(),
            )),
        }
    }

    async fn find_by_name(&self, model: &LoadBalancerModel) -> Result<Option<RemoteLoadBalancer>> {
        let key = self
            .codec
            .load_balancer_key(&model.service, &self.config.cluster_id);
        let expected = self.codec.encode_load_balancer(&key);
        let expected_ref: &str = &expected;

        let listed: Vec<LoadBalancerSummary> =
            collect_all(self.config.page_size, move |cursor| async move {
                retry_throttled(&self.config.retry, "ListLoadBalancersByName", move || {
                    let cursor = cursor.clone();
                    async move {
                        self.api
                            .list_load_balancers_by_name(expected_ref, cursor)
                            .await
                    }
                })
                .await
            })
            .await?;

        // Providers may match names loosely; only exact equality counts.
        let matches: Vec<LoadBalancerSummary> = listed
            .into_iter()
            .filter(|summary| summary.name == expected)
            .collect();

        match matches.as_slice() {
            [] => {
                debug!(
                    service = %model.service.qualified(),
                    name = %expected,
                    "No load balancer matches the expected name, treating as absent"
                );
                Ok(None)
            }
            [only] => self.adopt(&only.id, model, false).await.map(Some),
            many => Err(Error::ambiguous(
                ResourceKind::LoadBalancer,
                format!("name {expected}"),
                many.iter().map(|summary| summary.id.clone()).collect(),
            )),
        }
    }

    /// Fetch full attributes for a matched resource, waiting out a
    /// non-terminal provisioning status first.
    async fn adopt(
        &self,
        id: &str,
        model: &LoadBalancerModel,
        matched_by_tag: bool,
    ) -> Result<RemoteLoadBalancer> {
        let mut attrs = self.describe(id).await?;

        if attrs.status.is_provisioning() {
            info!(
                lb = %id,
                service = %model.service.qualified(),
                "Matched load balancer is still provisioning, waiting for it to settle"
            );
            attrs = poll_until(
                "AdoptLoadBalancer",
                id,
                &self.config.load_balancer_poll,
                move || async move {
                    let attrs = self.api.describe_load_balancer(id).await?;
                    Ok((!attrs.status.is_provisioning()).then_some(attrs))
                },
            )
            .await?;
        }

        Ok(self.classify(attrs, model, matched_by_tag))
    }

    async fn describe(&self, id: &str) -> Result<LoadBalancerAttributes> {
        retry_throttled(&self.config.retry, "DescribeLoadBalancer", move || {
            async move { self.api.describe_load_balancer(id).await }
        })
        .await
    }

    /// Decide whether a found load balancer is ours.
    ///
    /// A tag match is ours by definition; otherwise ownership is read from
    /// the name: it must decode under the configured prefix and belong to
    /// this service and cluster. Anything else is user-managed.
    fn classify(
        &self,
        attrs: LoadBalancerAttributes,
        model: &LoadBalancerModel,
        matched_by_tag: bool,
    ) -> RemoteLoadBalancer {
        let key = self.codec.decode_load_balancer(&attrs.name).ok();
        let owned = matched_by_tag
            || key
                .as_ref()
                .is_some_and(|key| key.belongs_to(&model.service, &self.config.cluster_id));

        RemoteLoadBalancer {
            id: attrs.id,
            name: attrs.name,
            address: attrs.address,
            address_kind: attrs.address_kind,
            bandwidth_mbit: attrs.bandwidth_mbit,
            status: attrs.status,
            user_managed: !owned,
            key,
        }
    }
}

fn format_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| format!("{}={}", tag.key, tag.value))
        .collect::<Vec<_>>()
        .join(",")
}

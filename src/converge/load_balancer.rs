//! Load balancer instance lifecycle
//!
//! Creation waits out both the returned job (when the provider starts
//! one) and the provisioning status before anything else is converged on
//! the instance, so later steps never race a half-created load balancer.
//! Attribute reconciliation only ever touches managed instances, and only
//! the attributes the provider can change in place.

use tracing::{debug, info};

use crate::api::{CloudApi, LoadBalancerSpec, LoadBalancerUpdate};
use crate::error::Error;
use crate::job::{poll_until, wait_if_started};
use crate::model::{LoadBalancerModel, RemoteLoadBalancer, Tag};
use crate::retry::retry_throttled;
use crate::Result;

use super::Converger;

/// Create the load balancer for a model and wait until it is usable
pub(crate) async fn create<A: CloudApi>(
    cx: &Converger<A>,
    model: &LoadBalancerModel,
) -> Result<RemoteLoadBalancer> {
    let key = cx
        .codec
        .load_balancer_key(&model.service, &cx.config.cluster_id);
    let name = cx.codec.encode_load_balancer(&key);
    info!(
        service = %model.service.qualified(),
        name = %name,
        "Creating load balancer"
    );

    let spec = LoadBalancerSpec {
        name,
        address_kind: model.address_kind,
        bandwidth_mbit: model.bandwidth_mbit,
    };
    let created = retry_throttled(&cx.config.retry, "CreateLoadBalancer", {
        let spec = &spec;
        move || async move { cx.api.create_load_balancer(spec).await }
    })
    .await?;

    wait_if_started(
        &cx.api,
        "CreateLoadBalancer",
        created.job_id.as_deref(),
        &cx.config.load_balancer_poll,
    )
    .await?;

    let attrs = poll_until(
        "CreateLoadBalancer",
        &created.id,
        &cx.config.load_balancer_poll,
        {
            let id = created.id.as_str();
            move || async move {
                let attrs = cx.api.describe_load_balancer(id).await?;
                Ok((!attrs.status.is_provisioning()).then_some(attrs))
            }
        },
    )
    .await?;

    let tags = desired_tags(cx, model);
    apply_tags(cx, &created.id, &tags).await?;

    info!(lb = %created.id, "Load balancer created");
    Ok(RemoteLoadBalancer {
        id: attrs.id,
        name: attrs.name,
        address: attrs.address,
        address_kind: attrs.address_kind,
        bandwidth_mbit: attrs.bandwidth_mbit,
        status: attrs.status,
        user_managed: false,
        key: Some(key),
    })
}

/// Reconcile instance attributes and tags of an already-located load
/// balancer.
///
/// User-managed instances are returned untouched. Address kind cannot be
/// changed in place, so a mismatch is a validation failure rather than a
/// silent recreate.
pub(crate) async fn ensure_current<A: CloudApi>(
    cx: &Converger<A>,
    mut lb: RemoteLoadBalancer,
    model: &LoadBalancerModel,
) -> Result<RemoteLoadBalancer> {
    if lb.user_managed {
        debug!(
            lb = %lb.id,
            "Load balancer is user-managed, leaving instance attributes alone"
        );
        return Ok(lb);
    }

    if lb.address_kind != model.address_kind {
        return Err(Error::validation(format!(
            "load balancer {} has address kind {} but the model wants {}; \
             delete and recreate to change it",
            lb.id, lb.address_kind, model.address_kind
        )));
    }

    if let Some(wanted) = model.bandwidth_mbit {
        if lb.bandwidth_mbit != Some(wanted) {
            info!(
                lb = %lb.id,
                bandwidth_mbit = wanted,
                "Updating load balancer bandwidth"
            );
            let update = LoadBalancerUpdate {
                bandwidth_mbit: Some(wanted),
            };
            let job = retry_throttled(&cx.config.retry, "UpdateLoadBalancer", {
                let id = lb.id.as_str();
                let update = &update;
                move || async move { cx.api.update_load_balancer(id, update).await }
            })
            .await?;
            wait_if_started(
                &cx.api,
                "UpdateLoadBalancer",
                job.as_deref(),
                &cx.config.load_balancer_poll,
            )
            .await?;
            lb.bandwidth_mbit = Some(wanted);
        }
    }

    ensure_tags(cx, &lb.id, model).await?;
    Ok(lb)
}

/// Delete a managed load balancer; the provider cascades its listeners
pub(crate) async fn delete<A: CloudApi>(cx: &Converger<A>, lb: &RemoteLoadBalancer) -> Result<()> {
    info!(lb = %lb.id, name = %lb.name, "Deleting load balancer");

    let job = match retry_throttled(&cx.config.retry, "DeleteLoadBalancer", {
        let id = lb.id.as_str();
        move || async move { cx.api.delete_load_balancer(id).await }
    })
    .await
    {
        Ok(job) => job,
        Err(e) if e.is_not_found() => {
            debug!(lb = %lb.id, "Load balancer already gone");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    wait_if_started(
        &cx.api,
        "DeleteLoadBalancer",
        job.as_deref(),
        &cx.config.load_balancer_poll,
    )
    .await
}

async fn ensure_tags<A: CloudApi>(
    cx: &Converger<A>,
    id: &str,
    model: &LoadBalancerModel,
) -> Result<()> {
    let current = retry_throttled(&cx.config.retry, "ListLoadBalancerTags", move || {
        async move { cx.api.list_load_balancer_tags(id).await }
    })
    .await?;

    let missing: Vec<Tag> = desired_tags(cx, model)
        .into_iter()
        .filter(|tag| !current.contains(tag))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    debug!(lb = %id, count = missing.len(), "Attaching missing tags");
    apply_tags(cx, id, &missing).await
}

async fn apply_tags<A: CloudApi>(cx: &Converger<A>, id: &str, tags: &[Tag]) -> Result<()> {
    retry_throttled(&cx.config.retry, "TagLoadBalancer", move || async move {
        cx.api.tag_load_balancer(id, tags).await
    })
    .await
}

/// Ownership tags, then configured default tags, then the model's own
fn desired_tags<A: CloudApi>(cx: &Converger<A>, model: &LoadBalancerModel) -> Vec<Tag> {
    let mut tags = cx.config.ownership_tags(&model.service);
    tags.extend(cx.config.default_tags.iter().cloned());
    tags.extend(model.tags.iter().cloned());
    tags
}

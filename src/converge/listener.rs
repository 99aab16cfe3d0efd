//! Listener convergence
//!
//! Listeners are keyed by frontend port. A pass first computes a plan
//! against the observed state, then executes every action in parallel.
//! Ports held by listeners we do not own are reported and left alone; a
//! protocol change cannot be applied in place, so the listener is
//! deleted and recreated.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::api::{CloudApi, ListenerAttributes, ListenerSpec};
use crate::fanout::fan_out;
use crate::job::wait_if_started;
use crate::model::{LoadBalancerModel, RemoteListener, RemoteLoadBalancer};
use crate::paging::collect_all;
use crate::retry::retry_throttled;
use crate::Result;

use super::Converger;

/// One mutation the executor will issue against the provider
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListenerAction {
    Create(ListenerSpec),
    /// Delete then create; protocol cannot change in place
    Recreate(ListenerSpec),
    Update(ListenerSpec),
    Delete {
        port: u16,
    },
}

struct ListenerPlan {
    actions: Vec<ListenerAction>,
    /// Desired ports held by listeners we do not own
    occupied_ports: Vec<u16>,
}

/// Bring the load balancer's listeners in line with the model.
///
/// `groups` maps each desired port to the server group the listener
/// must forward to; [`super::server_group::ensure`] produced it earlier
/// in the pass.
pub(crate) async fn converge<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    model: &LoadBalancerModel,
    groups: &HashMap<u16, String>,
) -> Result<()> {
    let existing = list_classified(cx, lb, model).await?;
    let desired = desired_specs(cx, model, groups);
    let plan = plan(&existing, &desired);

    for &port in &plan.occupied_ports {
        warn!(
            lb = %lb.id,
            port = port,
            "Port is held by a listener we do not own, skipping"
        );
    }

    if plan.actions.is_empty() {
        debug!(lb = %lb.id, "Listeners already converged");
        return Ok(());
    }

    info!(
        lb = %lb.id,
        actions = plan.actions.len(),
        "Converging listeners"
    );
    fan_out(plan.actions, cx.config.fanout_limit, |_index, action| {
        apply_action(cx, lb, action)
    })
    .await?;
    Ok(())
}

/// Delete every owned listener; used on the delete path before the
/// server groups they reference are removed
pub(crate) async fn cleanup<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    model: &LoadBalancerModel,
) -> Result<()> {
    let existing = list_classified(cx, lb, model).await?;
    let victims: Vec<u16> = existing
        .iter()
        .filter(|listener| !listener.user_managed)
        .map(|listener| listener.port)
        .collect();
    if victims.is_empty() {
        return Ok(());
    }

    info!(lb = %lb.id, count = victims.len(), "Deleting owned listeners");
    fan_out(victims, cx.config.fanout_limit, |_index, port| {
        delete(cx, lb, port)
    })
    .await?;
    Ok(())
}

fn plan(existing: &[RemoteListener], desired: &[ListenerSpec]) -> ListenerPlan {
    let by_port: HashMap<u16, &RemoteListener> =
        existing.iter().map(|listener| (listener.port, listener)).collect();
    let desired_ports: HashSet<u16> = desired.iter().map(|spec| spec.port).collect();

    let mut actions = Vec::new();
    let mut occupied_ports = Vec::new();

    for spec in desired {
        match by_port.get(&spec.port) {
            None => actions.push(ListenerAction::Create(spec.clone())),
            Some(current) if current.user_managed => occupied_ports.push(spec.port),
            Some(current) if current.protocol != spec.protocol => {
                actions.push(ListenerAction::Recreate(spec.clone()));
            }
            Some(current) if needs_update(current, spec) => {
                actions.push(ListenerAction::Update(spec.clone()));
            }
            Some(_) => {}
        }
    }

    for listener in existing {
        if !listener.user_managed && !desired_ports.contains(&listener.port) {
            actions.push(ListenerAction::Delete {
                port: listener.port,
            });
        }
    }

    ListenerPlan {
        actions,
        occupied_ports,
    }
}

fn needs_update(current: &RemoteListener, spec: &ListenerSpec) -> bool {
    if current.server_group_id != spec.server_group_id {
        return true;
    }
    // A model without a health check means the provider default; we do
    // not fight whatever is configured remotely.
    match &spec.health_check {
        Some(desired) => current.health_check.as_ref() != Some(desired),
        None => false,
    }
}

fn desired_specs<A: CloudApi>(
    cx: &Converger<A>,
    model: &LoadBalancerModel,
    groups: &HashMap<u16, String>,
) -> Vec<ListenerSpec> {
    model
        .listeners
        .iter()
        .map(|listener| {
            let key = cx.codec.listener_key(
                listener.port,
                listener.protocol,
                &model.service,
                &cx.config.cluster_id,
            );
            ListenerSpec {
                port: listener.port,
                protocol: listener.protocol,
                description: cx.codec.encode_listener(&key),
                health_check: listener.health_check.clone(),
                server_group_id: groups.get(&listener.port).cloned(),
            }
        })
        .collect()
}

async fn apply_action<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    action: ListenerAction,
) -> Result<()> {
    match action {
        ListenerAction::Create(spec) => create(cx, lb, &spec).await,
        ListenerAction::Recreate(spec) => {
            info!(
                lb = %lb.id,
                port = spec.port,
                protocol = %spec.protocol,
                "Recreating listener for a protocol change"
            );
            delete(cx, lb, spec.port).await?;
            create(cx, lb, &spec).await
        }
        ListenerAction::Update(spec) => {
            info!(lb = %lb.id, port = spec.port, "Updating listener");
            let job = retry_throttled(&cx.config.retry, "UpdateListener", {
                let lb_id = lb.id.as_str();
                let spec = &spec;
                move || async move { cx.api.update_listener(lb_id, spec).await }
            })
            .await?;
            wait_if_started(
                &cx.api,
                "UpdateListener",
                job.as_deref(),
                &cx.config.load_balancer_poll,
            )
            .await
        }
        ListenerAction::Delete { port } => delete(cx, lb, port).await,
    }
}

async fn create<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    spec: &ListenerSpec,
) -> Result<()> {
    info!(
        lb = %lb.id,
        port = spec.port,
        protocol = %spec.protocol,
        "Creating listener"
    );
    let job = retry_throttled(&cx.config.retry, "CreateListener", {
        let lb_id = lb.id.as_str();
        move || async move { cx.api.create_listener(lb_id, spec).await }
    })
    .await?;
    wait_if_started(
        &cx.api,
        "CreateListener",
        job.as_deref(),
        &cx.config.load_balancer_poll,
    )
    .await
}

async fn delete<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    port: u16,
) -> Result<()> {
    info!(lb = %lb.id, port = port, "Deleting listener");
    let job = match retry_throttled(&cx.config.retry, "DeleteListener", {
        let lb_id = lb.id.as_str();
        move || async move { cx.api.delete_listener(lb_id, port).await }
    })
    .await
    {
        Ok(job) => job,
        Err(e) if e.is_not_found() => {
            debug!(lb = %lb.id, port = port, "Listener already gone");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    wait_if_started(
        &cx.api,
        "DeleteListener",
        job.as_deref(),
        &cx.config.load_balancer_poll,
    )
    .await
}

async fn list_classified<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    model: &LoadBalancerModel,
) -> Result<Vec<RemoteListener>> {
    let attrs: Vec<ListenerAttributes> = collect_all(cx.config.page_size, {
        let lb_id = lb.id.as_str();
        move |cursor| async move {
            retry_throttled(&cx.config.retry, "ListListeners", move || {
                let cursor = cursor.clone();
                async move { cx.api.list_listeners(lb_id, cursor).await }
            })
            .await
        }
    })
    .await?;

    Ok(attrs
        .into_iter()
        .map(|attrs| classify(cx, model, attrs))
        .collect())
}

/// Read ownership off the description string.
///
/// A description that does not decode, or decodes to some other
/// service's key, marks the listener as user managed.
fn classify<A: CloudApi>(
    cx: &Converger<A>,
    model: &LoadBalancerModel,
    attrs: ListenerAttributes,
) -> RemoteListener {
    let key = cx.codec.decode_listener(&attrs.description).ok();
    let owned = key
        .as_ref()
        .is_some_and(|key| key.belongs_to(&model.service, &cx.config.cluster_id));

    RemoteListener {
        port: attrs.port,
        protocol: attrs.protocol,
        health_check: attrs.health_check,
        server_group_id: attrs.server_group_id,
        user_managed: !owned,
        key,
    }
}

//! Server group convergence
//!
//! Every desired listener port gets exactly one server group named with
//! its ownership key. Groups are ensured before listeners are converged
//! (listeners reference groups by id) and pruned only afterwards, once no
//! listener can still point at an orphan. Pruning keeps exactly the
//! chosen group per port, so leftover duplicates from an interrupted pass
//! are removed too.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::api::{CloudApi, ServerGroupSpec, ServerGroupSummary};
use crate::fanout::fan_out;
use crate::identity::ServerGroupKey;
use crate::job::wait_if_started;
use crate::model::{
    Backend, ListenerModel, LoadBalancerModel, RemoteLoadBalancer, RemoteServerGroup,
};
use crate::paging::collect_all;
use crate::retry::retry_throttled;
use crate::Result;

use super::Converger;

/// Ensure one server group per desired listener port, with its backends
/// in sync; returns the chosen group id per port
pub(crate) async fn ensure<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    model: &LoadBalancerModel,
) -> Result<HashMap<u16, String>> {
    let owned = list_owned(cx, lb, model).await?;

    let mut by_slot: HashMap<(String, String), RemoteServerGroup> = HashMap::new();
    for group in owned {
        let slot = match &group.key {
            Some(key) => (key.group_port.clone(), key.protocol.clone()),
            None => continue,
        };
        by_slot.entry(slot).or_insert(group);
    }

    let work_items: Vec<(ListenerModel, Option<RemoteServerGroup>)> = model
        .listeners
        .iter()
        .map(|listener| {
            let slot = (listener.port.to_string(), listener.protocol.to_string());
            (listener.clone(), by_slot.remove(&slot))
        })
        .collect();

    let entries = fan_out(
        work_items,
        cx.config.fanout_limit,
        |_index, (listener, existing)| ensure_one(cx, lb, model, listener, existing),
    )
    .await?;

    Ok(entries.into_iter().collect())
}

/// Delete every owned server group whose id was not chosen this pass
pub(crate) async fn prune<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    model: &LoadBalancerModel,
    keep: &HashMap<u16, String>,
) -> Result<()> {
    let owned = list_owned(cx, lb, model).await?;
    let keep_ids: HashSet<String> = keep.values().cloned().collect();

    let victims: Vec<RemoteServerGroup> = owned
        .into_iter()
        .filter(|group| !keep_ids.contains(&group.id))
        .collect();
    if victims.is_empty() {
        return Ok(());
    }

    info!(
        lb = %lb.id,
        count = victims.len(),
        "Pruning server groups no listener uses anymore"
    );
    fan_out(victims, cx.config.fanout_limit, |_index, group| {
        delete_group(cx, group)
    })
    .await?;
    Ok(())
}

/// Delete every owned server group; used on the delete path after the
/// owned listeners are gone
pub(crate) async fn cleanup<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    model: &LoadBalancerModel,
) -> Result<()> {
    prune(cx, lb, model, &HashMap::new()).await
}

async fn ensure_one<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    model: &LoadBalancerModel,
    listener: ListenerModel,
    existing: Option<RemoteServerGroup>,
) -> Result<(u16, String)> {
    let key = cx.codec.server_group_key(
        listener.port,
        listener.protocol,
        &model.service,
        &cx.config.cluster_id,
    );
    let name = cx.codec.encode_server_group(&key);

    let (id, current) = match existing {
        Some(group) => (group.id, Some(group.backends)),
        None => {
            info!(lb = %lb.id, name = %name, "Creating server group");
            let spec = ServerGroupSpec { name: name.clone() };
            let created = retry_throttled(&cx.config.retry, "CreateServerGroup", {
                let lb_id = lb.id.as_str();
                let spec = &spec;
                move || async move { cx.api.create_server_group(lb_id, spec).await }
            })
            .await?;
            wait_if_started(
                &cx.api,
                "CreateServerGroup",
                created.job_id.as_deref(),
                &cx.config.server_group_poll,
            )
            .await?;
            (created.id, None)
        }
    };

    let desired = normalized(&listener.backends);
    let in_sync = match &current {
        Some(current) => normalized(current) == desired,
        None => desired.is_empty(),
    };

    if !in_sync {
        debug!(
            group = %id,
            backends = desired.len(),
            "Replacing server group backends"
        );
        let job = retry_throttled(&cx.config.retry, "SetServerGroupBackends", {
            let group_id = id.as_str();
            let backends: &[Backend] = &listener.backends;
            move || async move { cx.api.set_server_group_backends(group_id, backends).await }
        })
        .await?;
        wait_if_started(
            &cx.api,
            "SetServerGroupBackends",
            job.as_deref(),
            &cx.config.server_group_poll,
        )
        .await?;
    }

    Ok((listener.port, id))
}

async fn delete_group<A: CloudApi>(cx: &Converger<A>, group: RemoteServerGroup) -> Result<()> {
    info!(group = %group.id, name = %group.name, "Deleting server group");

    let job = match retry_throttled(&cx.config.retry, "DeleteServerGroup", {
        let id = group.id.as_str();
        move || async move { cx.api.delete_server_group(id).await }
    })
    .await
    {
        Ok(job) => job,
        Err(e) if e.is_not_found() => {
            debug!(group = %group.id, "Server group already gone");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    wait_if_started(
        &cx.api,
        "DeleteServerGroup",
        job.as_deref(),
        &cx.config.server_group_poll,
    )
    .await
}

/// List this load balancer's server groups and keep only the ones whose
/// name decodes to a key of ours, fully described.
///
/// Foreign groups never appear in the result; nothing downstream can
/// touch what it cannot see.
async fn list_owned<A: CloudApi>(
    cx: &Converger<A>,
    lb: &RemoteLoadBalancer,
    model: &LoadBalancerModel,
) -> Result<Vec<RemoteServerGroup>> {
    let summaries: Vec<ServerGroupSummary> = collect_all(cx.config.page_size, {
        let lb_id = lb.id.as_str();
        move |cursor| async move {
            retry_throttled(&cx.config.retry, "ListServerGroups", move || {
                let cursor = cursor.clone();
                async move { cx.api.list_server_groups(lb_id, cursor).await }
            })
            .await
        }
    })
    .await?;

    let ours: Vec<(ServerGroupSummary, ServerGroupKey)> = summaries
        .into_iter()
        .filter_map(|summary| {
            let key = cx.codec.decode_server_group(&summary.name).ok()?;
            key.belongs_to(&model.service, &cx.config.cluster_id)
                .then(|| (summary, key))
        })
        .collect();

    fan_out(ours, cx.config.fanout_limit, |_index, (summary, key)| {
        describe_owned(cx, summary, key)
    })
    .await
}

async fn describe_owned<A: CloudApi>(
    cx: &Converger<A>,
    summary: ServerGroupSummary,
    key: ServerGroupKey,
) -> Result<RemoteServerGroup> {
    let attrs = retry_throttled(&cx.config.retry, "DescribeServerGroup", {
        let id = summary.id.as_str();
        move || async move { cx.api.describe_server_group(id).await }
    })
    .await?;

    Ok(RemoteServerGroup {
        id: attrs.id,
        name: attrs.name,
        backends: attrs.backends,
        user_managed: false,
        key: Some(key),
    })
}

fn normalized(backends: &[Backend]) -> Vec<Backend> {
    let mut sorted = backends.to_vec();
    sorted.sort_by(|a, b| {
        (a.server_id.as_str(), a.port)
            .cmp(&(b.server_id.as_str(), b.port))
    });
    sorted
}

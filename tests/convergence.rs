//! End-to-end convergence tests against an in-memory provider
//!
//! These tests tell the story of a service's load balancer over its whole
//! life: first apply, repeated no-op applies, model edits, adoption of
//! hand-made resources, and deletion. The provider is a faithful little
//! in-memory clone of the real one: paginated listings, asynchronous
//! jobs, throttling injection, and not-found errors, so every pass runs
//! the same code paths it would against the wire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use ballast::api::{
    CloudApi, Created, JobStatus, ListenerAttributes, ListenerSpec, LoadBalancerAttributes,
    LoadBalancerSpec, LoadBalancerSummary, LoadBalancerUpdate, ServerGroupAttributes,
    ServerGroupSpec, ServerGroupSummary,
};
use ballast::error::Error;
use ballast::job::PollConfig;
use ballast::model::{
    AddressKind, Backend, LifecycleStatus, ListenerModel, LoadBalancerModel, Protocol,
    ResourceKind, ServiceRef, Tag,
};
use ballast::paging::{Page, PageCursor};
use ballast::retry::RetryConfig;
use ballast::{Converger, ConvergerConfig, Result};

// =============================================================================
// In-memory provider
// =============================================================================

const MUTATIONS: &[&str] = &[
    "CreateLoadBalancer",
    "UpdateLoadBalancer",
    "DeleteLoadBalancer",
    "TagLoadBalancer",
    "CreateListener",
    "UpdateListener",
    "DeleteListener",
    "CreateServerGroup",
    "SetServerGroupBackends",
    "DeleteServerGroup",
];

#[derive(Clone)]
struct FakeGroup {
    id: String,
    name: String,
    backends: Vec<Backend>,
}

#[derive(Clone)]
struct FakeLb {
    id: String,
    name: String,
    address: Option<String>,
    address_kind: AddressKind,
    bandwidth_mbit: Option<u32>,
    status: LifecycleStatus,
    tags: Vec<Tag>,
    listeners: Vec<ListenerAttributes>,
    groups: Vec<FakeGroup>,
}

struct FakeJob {
    polls_left: u32,
    fail: bool,
}

#[derive(Default)]
struct State {
    load_balancers: Vec<FakeLb>,
    jobs: HashMap<String, FakeJob>,
    calls: Vec<&'static str>,
    throttles: HashMap<&'static str, u32>,
    next_id: u32,
    job_seq: u32,
    job_polls: u32,
    fail_next_job: bool,
}

#[derive(Clone)]
struct FakeCloud {
    state: Arc<Mutex<State>>,
}

impl FakeCloud {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                job_polls: 1,
                ..Default::default()
            })),
        }
    }

    /// Record the call and fail it with a throttling rejection while the
    /// injected budget for its operation lasts
    fn enter(&self, op: &'static str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op);
        let request_id = format!("req-{}", state.calls.len());
        if let Some(left) = state.throttles.get_mut(op) {
            if *left > 0 {
                *left -= 1;
                return Err(Error::api(op, "Throttling.User", request_id, "request rate exceeded"));
            }
        }
        Ok(state)
    }

    fn throttle(&self, op: &'static str, failures: u32) {
        self.state.lock().unwrap().throttles.insert(op, failures);
    }

    fn fail_next_job(&self) {
        self.state.lock().unwrap().fail_next_job = true;
    }

    fn reset_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn calls_of(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| **call == op)
            .count()
    }

    fn mutations(&self) -> Vec<&'static str> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| MUTATIONS.contains(call))
            .copied()
            .collect()
    }

    fn with_state<R>(&self, inspect: impl FnOnce(&State) -> R) -> R {
        inspect(&self.state.lock().unwrap())
    }

    fn seed_load_balancer(&self, name: &str, tags: Vec<Tag>) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let next_id = state.next_id;
        let id = format!("lb-{}", next_id);
        state.load_balancers.push(FakeLb {
            id: id.clone(),
            name: name.to_string(),
            address: Some(format!("203.0.113.{}", next_id)),
            address_kind: AddressKind::Internet,
            bandwidth_mbit: Some(100),
            status: LifecycleStatus::Active,
            tags,
            listeners: Vec::new(),
            groups: Vec::new(),
        });
        id
    }

    fn seed_listener(&self, lb_id: &str, port: u16, description: &str) {
        let mut state = self.state.lock().unwrap();
        let lb = state
            .load_balancers
            .iter_mut()
            .find(|lb| lb.id == lb_id)
            .expect("seeding a listener on an unknown load balancer");
        lb.listeners.push(ListenerAttributes {
            port,
            protocol: Protocol::Tcp,
            description: description.to_string(),
            health_check: None,
            server_group_id: None,
        });
    }
}

fn new_job(state: &mut State) -> Option<String> {
    state.job_seq += 1;
    let id = format!("job-{}", state.job_seq);
    let fail = std::mem::take(&mut state.fail_next_job);
    state.jobs.insert(
        id.clone(),
        FakeJob {
            polls_left: state.job_polls,
            fail,
        },
    );
    Some(id)
}

fn page_of<T: Clone>(items: &[T], cursor: &PageCursor) -> Page<T> {
    let start: usize = cursor.token.parse().unwrap_or(0);
    let start = start.min(items.len());
    let end = items.len().min(start + cursor.page_size as usize);
    let slice = items[start..end].to_vec();
    if end < items.len() {
        Page::new(slice, end.to_string())
    } else {
        Page::last(slice)
    }
}

fn lb_attrs(lb: &FakeLb) -> LoadBalancerAttributes {
    LoadBalancerAttributes {
        id: lb.id.clone(),
        name: lb.name.clone(),
        address: lb.address.clone(),
        address_kind: lb.address_kind,
        bandwidth_mbit: lb.bandwidth_mbit,
        status: lb.status.clone(),
    }
}

impl State {
    fn lb(&self, id: &str) -> Result<&FakeLb> {
        self.load_balancers
            .iter()
            .find(|lb| lb.id == id)
            .ok_or_else(|| Error::not_found(ResourceKind::LoadBalancer, id))
    }

    fn lb_mut(&mut self, id: &str) -> Result<&mut FakeLb> {
        self.load_balancers
            .iter_mut()
            .find(|lb| lb.id == id)
            .ok_or_else(|| Error::not_found(ResourceKind::LoadBalancer, id))
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn list_load_balancers_by_tag(
        &self,
        tags: &[Tag],
        cursor: PageCursor,
    ) -> Result<Page<LoadBalancerSummary>> {
        let state = self.enter("ListLoadBalancersByTag")?;
        let matches: Vec<LoadBalancerSummary> = state
            .load_balancers
            .iter()
            .filter(|lb| tags.iter().all(|tag| lb.tags.contains(tag)))
            .map(|lb| LoadBalancerSummary {
                id: lb.id.clone(),
                name: lb.name.clone(),
            })
            .collect();
        Ok(page_of(&matches, &cursor))
    }

    async fn list_load_balancers_by_name(
        &self,
        name: &str,
        cursor: PageCursor,
    ) -> Result<Page<LoadBalancerSummary>> {
        let state = self.enter("ListLoadBalancersByName")?;
        // The real provider matches loosely; prefix semantics here force
        // callers to filter for exact equality.
        let matches: Vec<LoadBalancerSummary> = state
            .load_balancers
            .iter()
            .filter(|lb| lb.name.starts_with(name))
            .map(|lb| LoadBalancerSummary {
                id: lb.id.clone(),
                name: lb.name.clone(),
            })
            .collect();
        Ok(page_of(&matches, &cursor))
    }

    async fn describe_load_balancer(&self, id: &str) -> Result<LoadBalancerAttributes> {
        let state = self.enter("DescribeLoadBalancer")?;
        state.lb(id).map(lb_attrs)
    }

    async fn create_load_balancer(&self, spec: &LoadBalancerSpec) -> Result<Created> {
        let mut state = self.enter("CreateLoadBalancer")?;
        state.next_id += 1;
        let id = format!("lb-{}", state.next_id);
        let address = format!("203.0.113.{}", state.next_id);
        state.load_balancers.push(FakeLb {
            id: id.clone(),
            name: spec.name.clone(),
            address: Some(address),
            address_kind: spec.address_kind,
            bandwidth_mbit: spec.bandwidth_mbit,
            status: LifecycleStatus::Active,
            tags: Vec::new(),
            listeners: Vec::new(),
            groups: Vec::new(),
        });
        let job_id = new_job(&mut state);
        Ok(Created { id, job_id })
    }

    async fn update_load_balancer(
        &self,
        id: &str,
        update: &LoadBalancerUpdate,
    ) -> Result<Option<String>> {
        let mut state = self.enter("UpdateLoadBalancer")?;
        let lb = state.lb_mut(id)?;
        if update.bandwidth_mbit.is_some() {
            lb.bandwidth_mbit = update.bandwidth_mbit;
        }
        Ok(None)
    }

    async fn delete_load_balancer(&self, id: &str) -> Result<Option<String>> {
        let mut state = self.enter("DeleteLoadBalancer")?;
        state.lb(id)?;
        state.load_balancers.retain(|lb| lb.id != id);
        Ok(new_job(&mut state))
    }

    async fn tag_load_balancer(&self, id: &str, tags: &[Tag]) -> Result<()> {
        let mut state = self.enter("TagLoadBalancer")?;
        let lb = state.lb_mut(id)?;
        for tag in tags {
            if !lb.tags.contains(tag) {
                lb.tags.push(tag.clone());
            }
        }
        Ok(())
    }

    async fn list_load_balancer_tags(&self, id: &str) -> Result<Vec<Tag>> {
        let state = self.enter("ListLoadBalancerTags")?;
        Ok(state.lb(id)?.tags.clone())
    }

    async fn list_listeners(
        &self,
        lb_id: &str,
        cursor: PageCursor,
    ) -> Result<Page<ListenerAttributes>> {
        let state = self.enter("ListListeners")?;
        Ok(page_of(&state.lb(lb_id)?.listeners, &cursor))
    }

    async fn create_listener(&self, lb_id: &str, spec: &ListenerSpec) -> Result<Option<String>> {
        let mut state = self.enter("CreateListener")?;
        let lb = state.lb_mut(lb_id)?;
        if lb.listeners.iter().any(|listener| listener.port == spec.port) {
            return Err(Error::api(
                "CreateListener",
                "ListenerAlreadyExists",
                "req-0",
                format!("port {} already has a listener", spec.port),
            ));
        }
        lb.listeners.push(ListenerAttributes {
            port: spec.port,
            protocol: spec.protocol,
            description: spec.description.clone(),
            health_check: spec.health_check.clone(),
            server_group_id: spec.server_group_id.clone(),
        });
        Ok(None)
    }

    async fn update_listener(&self, lb_id: &str, spec: &ListenerSpec) -> Result<Option<String>> {
        let mut state = self.enter("UpdateListener")?;
        let lb = state.lb_mut(lb_id)?;
        let listener = lb
            .listeners
            .iter_mut()
            .find(|listener| listener.port == spec.port)
            .ok_or_else(|| Error::not_found(ResourceKind::Listener, spec.port.to_string()))?;
        listener.protocol = spec.protocol;
        listener.description = spec.description.clone();
        listener.health_check = spec.health_check.clone();
        listener.server_group_id = spec.server_group_id.clone();
        Ok(None)
    }

    async fn delete_listener(&self, lb_id: &str, port: u16) -> Result<Option<String>> {
        let mut state = self.enter("DeleteListener")?;
        let lb = state.lb_mut(lb_id)?;
        if !lb.listeners.iter().any(|listener| listener.port == port) {
            return Err(Error::not_found(ResourceKind::Listener, port.to_string()));
        }
        lb.listeners.retain(|listener| listener.port != port);
        Ok(None)
    }

    async fn list_server_groups(
        &self,
        lb_id: &str,
        cursor: PageCursor,
    ) -> Result<Page<ServerGroupSummary>> {
        let state = self.enter("ListServerGroups")?;
        let summaries: Vec<ServerGroupSummary> = state
            .lb(lb_id)?
            .groups
            .iter()
            .map(|group| ServerGroupSummary {
                id: group.id.clone(),
                name: group.name.clone(),
            })
            .collect();
        Ok(page_of(&summaries, &cursor))
    }

    async fn describe_server_group(&self, id: &str) -> Result<ServerGroupAttributes> {
        let state = self.enter("DescribeServerGroup")?;
        state
            .load_balancers
            .iter()
            .flat_map(|lb| lb.groups.iter())
            .find(|group| group.id == id)
            .map(|group| ServerGroupAttributes {
                id: group.id.clone(),
                name: group.name.clone(),
                backends: group.backends.clone(),
            })
            .ok_or_else(|| Error::not_found(ResourceKind::ServerGroup, id))
    }

    async fn create_server_group(&self, lb_id: &str, spec: &ServerGroupSpec) -> Result<Created> {
        let mut state = self.enter("CreateServerGroup")?;
        state.next_id += 1;
        let id = format!("sg-{}", state.next_id);
        let name = spec.name.clone();
        state.lb_mut(lb_id)?.groups.push(FakeGroup {
            id: id.clone(),
            name,
            backends: Vec::new(),
        });
        let job_id = new_job(&mut state);
        Ok(Created { id, job_id })
    }

    async fn set_server_group_backends(
        &self,
        id: &str,
        backends: &[Backend],
    ) -> Result<Option<String>> {
        let mut state = self.enter("SetServerGroupBackends")?;
        let group = state
            .load_balancers
            .iter_mut()
            .flat_map(|lb| lb.groups.iter_mut())
            .find(|group| group.id == id)
            .ok_or_else(|| Error::not_found(ResourceKind::ServerGroup, id))?;
        group.backends = backends.to_vec();
        Ok(None)
    }

    async fn delete_server_group(&self, id: &str) -> Result<Option<String>> {
        let mut state = self.enter("DeleteServerGroup")?;
        let lb = state
            .load_balancers
            .iter_mut()
            .find(|lb| lb.groups.iter().any(|group| group.id == id))
            .ok_or_else(|| Error::not_found(ResourceKind::ServerGroup, id))?;
        lb.groups.retain(|group| group.id != id);
        Ok(None)
    }

    async fn get_job_status(&self, job_id: &str) -> Result<JobStatus> {
        let mut state = self.enter("GetJobStatus")?;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::not_found(ResourceKind::Job, job_id))?;
        if job.polls_left > 0 {
            job.polls_left -= 1;
            return Ok(JobStatus::running());
        }
        if job.fail {
            return Ok(JobStatus::failed());
        }
        Ok(JobStatus::succeeded())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Small pages and tight timings so every pass exercises pagination and
/// polling without slowing the suite down
fn test_config() -> ConvergerConfig {
    let mut config = ConvergerConfig::for_cluster("c1");
    config.page_size = 2;
    config.fanout_limit = 4;
    config.retry = RetryConfig {
        max_attempts: 5,
        delay: Duration::from_millis(1),
    };
    config.load_balancer_poll = PollConfig::new(Duration::from_millis(1), Duration::from_millis(500));
    config.server_group_poll = PollConfig::new(Duration::from_millis(1), Duration::from_millis(500));
    config
}

fn converger(cloud: &FakeCloud) -> Converger<FakeCloud> {
    Converger::new(cloud.clone(), test_config()).unwrap()
}

fn web_model() -> LoadBalancerModel {
    LoadBalancerModel {
        service: ServiceRef::new("web", "default"),
        remote_id: None,
        address_kind: AddressKind::Internet,
        bandwidth_mbit: None,
        tags: Vec::new(),
        listeners: vec![
            ListenerModel {
                port: 80,
                protocol: Protocol::Tcp,
                health_check: None,
                backends: vec![Backend::new("i-1", 8080), Backend::new("i-2", 8080)],
            },
            ListenerModel {
                port: 443,
                protocol: Protocol::Tcp,
                health_check: None,
                backends: vec![Backend::new("i-1", 8443)],
            },
        ],
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn fresh_service_gets_the_full_stack() {
    let cloud = FakeCloud::new();
    let cx = converger(&cloud);

    let lb = cx.apply(&web_model()).await.unwrap();

    assert_eq!(lb.name, "k8s.web.default.c1");
    assert!(!lb.user_managed);
    assert!(lb.address.is_some());
    assert_eq!(lb.status, LifecycleStatus::Active);

    cloud.with_state(|state| {
        assert_eq!(state.load_balancers.len(), 1);
        let remote = &state.load_balancers[0];

        assert!(remote.tags.contains(&Tag::new("ballast.io/cluster", "c1")));
        assert!(remote.tags.contains(&Tag::new("ballast.io/service", "default/web")));

        assert_eq!(remote.listeners.len(), 2);
        let http = remote.listeners.iter().find(|l| l.port == 80).unwrap();
        assert_eq!(http.description, "k8s.80.tcp.web.default.c1");

        assert_eq!(remote.groups.len(), 2);
        let group = remote
            .groups
            .iter()
            .find(|g| g.name == "k8s.80.tcp.web.default.c1")
            .unwrap();
        assert_eq!(group.backends.len(), 2);
        assert_eq!(http.server_group_id.as_deref(), Some(group.id.as_str()));
    });

    // The create came back with a job; the pass must have polled it.
    assert!(cloud.calls_of("GetJobStatus") > 0);
}

#[tokio::test]
async fn second_apply_performs_no_mutations() {
    let cloud = FakeCloud::new();
    let cx = converger(&cloud);

    cx.apply(&web_model()).await.unwrap();
    cloud.reset_calls();

    cx.apply(&web_model()).await.unwrap();

    assert_eq!(cloud.mutations(), Vec::<&str>::new());
}

#[tokio::test]
async fn model_changes_converge_incrementally() {
    let cloud = FakeCloud::new();
    let cx = converger(&cloud);

    let first = cx.apply(&web_model()).await.unwrap();
    cloud.reset_calls();

    // Drop 443, add 9090, and point 80 at a new backend set.
    let mut model = web_model();
    model.listeners.remove(1);
    model.listeners[0].backends = vec![Backend::new("i-3", 8080)];
    model.listeners.push(ListenerModel {
        port: 9090,
        protocol: Protocol::Tcp,
        health_check: None,
        backends: vec![Backend::new("i-3", 9090)],
    });

    let second = cx.apply(&model).await.unwrap();
    assert_eq!(second.id, first.id, "the instance itself must survive model edits");
    assert_eq!(cloud.calls_of("CreateLoadBalancer"), 0);

    cloud.with_state(|state| {
        let remote = &state.load_balancers[0];

        let mut ports: Vec<u16> = remote.listeners.iter().map(|l| l.port).collect();
        ports.sort_unstable();
        assert_eq!(ports, vec![80, 9090]);

        let mut group_names: Vec<&str> =
            remote.groups.iter().map(|g| g.name.as_str()).collect();
        group_names.sort_unstable();
        assert_eq!(
            group_names,
            vec!["k8s.80.tcp.web.default.c1", "k8s.9090.tcp.web.default.c1"]
        );

        let http_group = remote
            .groups
            .iter()
            .find(|g| g.name == "k8s.80.tcp.web.default.c1")
            .unwrap();
        assert_eq!(http_group.backends, vec![Backend::new("i-3", 8080)]);
    });

    let mutations = cloud.mutations();
    assert!(mutations.contains(&"DeleteListener"));
    assert!(mutations.contains(&"DeleteServerGroup"));
    assert!(mutations.contains(&"CreateListener"));
    assert!(mutations.contains(&"SetServerGroupBackends"));
}

#[tokio::test]
async fn throttled_calls_are_retried_until_they_pass() {
    let cloud = FakeCloud::new();
    cloud.throttle("CreateLoadBalancer", 2);
    let cx = converger(&cloud);

    cx.apply(&web_model()).await.unwrap();

    assert_eq!(cloud.calls_of("CreateLoadBalancer"), 3);
    cloud.with_state(|state| assert_eq!(state.load_balancers.len(), 1));
}

#[tokio::test]
async fn untagged_load_balancer_with_our_name_is_adopted_and_tagged() {
    let cloud = FakeCloud::new();
    let seeded = cloud.seed_load_balancer("k8s.web.default.c1", Vec::new());
    let cx = converger(&cloud);

    let lb = cx.apply(&web_model()).await.unwrap();

    assert_eq!(lb.id, seeded);
    assert!(!lb.user_managed);
    assert_eq!(cloud.calls_of("CreateLoadBalancer"), 0);
    cloud.with_state(|state| {
        let remote = &state.load_balancers[0];
        assert!(remote.tags.contains(&Tag::new("ballast.io/cluster", "c1")));
        assert_eq!(remote.listeners.len(), 2);
    });
}

#[tokio::test]
async fn user_managed_instance_is_converged_but_never_touched_itself() {
    let cloud = FakeCloud::new();
    let seeded = cloud.seed_load_balancer("legacy-edge", Vec::new());
    cloud.seed_listener(&seeded, 8080, "hand made, keep out");

    let mut model = web_model();
    model.remote_id = Some(seeded.clone());
    model.listeners.truncate(1);
    model.bandwidth_mbit = Some(500);

    let cx = converger(&cloud);
    let lb = cx.apply(&model).await.unwrap();
    assert!(lb.user_managed);

    // Listeners and groups were converged onto it, the instance itself
    // was not modified.
    assert_eq!(cloud.calls_of("UpdateLoadBalancer"), 0);
    assert_eq!(cloud.calls_of("TagLoadBalancer"), 0);
    cloud.with_state(|state| {
        let remote = &state.load_balancers[0];
        assert_eq!(remote.bandwidth_mbit, Some(100));
        assert!(remote.listeners.iter().any(|l| l.port == 80));
        assert!(remote.listeners.iter().any(|l| l.port == 8080));
        assert_eq!(remote.groups.len(), 1);
    });

    // Deleting the model removes what we own and keeps the rest.
    cx.delete(&model).await.unwrap();
    assert_eq!(cloud.calls_of("DeleteLoadBalancer"), 0);
    cloud.with_state(|state| {
        assert_eq!(state.load_balancers.len(), 1);
        let remote = &state.load_balancers[0];
        assert!(!remote.listeners.iter().any(|l| l.port == 80));
        assert!(remote.listeners.iter().any(|l| l.port == 8080));
        assert!(remote.groups.is_empty());
    });
}

#[tokio::test]
async fn delete_removes_the_whole_owned_stack() {
    let cloud = FakeCloud::new();
    let cx = converger(&cloud);

    let model = web_model();
    cx.apply(&model).await.unwrap();
    cx.delete(&model).await.unwrap();

    cloud.with_state(|state| assert!(state.load_balancers.is_empty()));
}

#[tokio::test]
async fn deleting_what_was_never_applied_changes_nothing() {
    let cloud = FakeCloud::new();
    let cx = converger(&cloud);

    cx.delete(&web_model()).await.unwrap();

    assert_eq!(cloud.mutations(), Vec::<&str>::new());
}

#[tokio::test]
async fn duplicate_ownership_tags_fail_the_pass_before_any_mutation() {
    let cloud = FakeCloud::new();
    let tags = vec![
        Tag::new("ballast.io/cluster", "c1"),
        Tag::new("ballast.io/service", "default/web"),
    ];
    cloud.seed_load_balancer("k8s.web.default.c1", tags.clone());
    cloud.seed_load_balancer("k8s.web.default.c1", tags);

    let cx = converger(&cloud);
    let err = cx.apply(&web_model()).await.unwrap_err();

    assert!(matches!(err, Error::AmbiguousResource { .. }));
    assert_eq!(cloud.mutations(), Vec::<&str>::new());
}

#[tokio::test]
async fn listener_listing_is_drained_across_pages() {
    let cloud = FakeCloud::new();
    let seeded = cloud.seed_load_balancer("legacy-edge", Vec::new());
    for port in [8081, 8082, 8083, 8084, 8085] {
        cloud.seed_listener(&seeded, port, "hand made");
    }

    let mut model = web_model();
    model.remote_id = Some(seeded);
    model.listeners.truncate(1);

    let cx = converger(&cloud);
    cx.apply(&model).await.unwrap();

    // Five foreign listeners across three pages, all of them survive.
    cloud.with_state(|state| {
        assert_eq!(state.load_balancers[0].listeners.len(), 6);
    });
}

#[tokio::test]
async fn failed_provider_job_fails_the_pass() {
    let cloud = FakeCloud::new();
    cloud.fail_next_job();
    let cx = converger(&cloud);

    let err = cx.apply(&web_model()).await.unwrap_err();

    match err {
        Error::JobFailed { operation, .. } => assert_eq!(operation, "CreateLoadBalancer"),
        other => panic!("expected JobFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn bandwidth_change_is_applied_in_place() {
    let cloud = FakeCloud::new();
    let cx = converger(&cloud);

    let mut model = web_model();
    model.bandwidth_mbit = Some(100);
    let first = cx.apply(&model).await.unwrap();
    cloud.reset_calls();

    model.bandwidth_mbit = Some(200);
    let second = cx.apply(&model).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.bandwidth_mbit, Some(200));
    assert_eq!(cloud.calls_of("UpdateLoadBalancer"), 1);
    assert_eq!(cloud.calls_of("CreateLoadBalancer"), 0);
}

//! Scripted in-memory host application that records every call

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use minikube_e2e::{HostApp, HostError, ResourceKind, ResourceState};

/// Host operations, for scripting faults and counting calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    WelcomePage,
    RecordingName,
    OpenCliToolsSettings,
    EnsureCliInstalled,
    OpenExtensions,
    ExtensionIsInstalled,
    InstallExtension,
    RemoveExtension,
    CreateCluster,
    DeleteCluster,
    ResourceState,
    Close,
}

/// A recorded call with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    WelcomePage {
        skip_onboarding: bool,
    },
    RecordingName(String),
    OpenCliToolsSettings,
    EnsureCliInstalled(String),
    OpenExtensions,
    ExtensionIsInstalled(String),
    InstallExtension(String),
    RemoveExtension {
        name: String,
        label: String,
    },
    CreateCluster {
        name: String,
        interactive: bool,
        timeout: Duration,
        driver: Option<String>,
    },
    DeleteCluster {
        resource_name: String,
        node_name: String,
        cluster_name: String,
    },
    ResourceState {
        kind: ResourceKind,
        name: String,
    },
    Close,
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Self::WelcomePage { .. } => Op::WelcomePage,
            Self::RecordingName(_) => Op::RecordingName,
            Self::OpenCliToolsSettings => Op::OpenCliToolsSettings,
            Self::EnsureCliInstalled(_) => Op::EnsureCliInstalled,
            Self::OpenExtensions => Op::OpenExtensions,
            Self::ExtensionIsInstalled(_) => Op::ExtensionIsInstalled,
            Self::InstallExtension(_) => Op::InstallExtension,
            Self::RemoveExtension { .. } => Op::RemoveExtension,
            Self::CreateCluster { .. } => Op::CreateCluster,
            Self::DeleteCluster { .. } => Op::DeleteCluster,
            Self::ResourceState { .. } => Op::ResourceState,
            Self::Close => Op::Close,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    installed_extensions: HashSet<String>,
    /// Installed-state checks left before a fresh install becomes visible
    pending_visibility: usize,
    clusters: HashSet<String>,
    resource_states: HashMap<(ResourceKind, String), VecDeque<Option<ResourceState>>>,
}

/// Host application double for scenario tests
///
/// Behaves like a healthy host by default: installs succeed at once, clusters
/// are created instantly and the node of a created cluster reports RUNNING.
/// Builder methods script delays, faults and state sequences.
#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<State>,
    failing: HashSet<Op>,
    panicking: HashSet<Op>,
    hanging: HashSet<Op>,
    delays: HashMap<Op, Duration>,
    visible_after_checks: usize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The operation returns a host error
    pub fn failing(mut self, op: Op) -> Self {
        self.failing.insert(op);
        self
    }

    pub fn panicking(mut self, op: Op) -> Self {
        self.panicking.insert(op);
        self
    }

    /// The operation never completes
    pub fn hanging(mut self, op: Op) -> Self {
        self.hanging.insert(op);
        self
    }

    /// The operation takes `delay` before answering
    pub fn taking(mut self, op: Op, delay: Duration) -> Self {
        self.delays.insert(op, delay);
        self
    }

    pub fn with_extension_installed(self, label: &str) -> Self {
        self.lock().installed_extensions.insert(label.to_string());
        self
    }

    /// A freshly installed extension only shows up after `checks`
    /// installed-state queries
    pub fn with_extension_visible_after(mut self, checks: usize) -> Self {
        self.visible_after_checks = checks;
        self
    }

    /// Successive observations of a resource; the last one repeats
    pub fn with_resource_states<I>(self, kind: ResourceKind, name: &str, states: I) -> Self
    where
        I: IntoIterator<Item = Option<ResourceState>>,
    {
        self.lock()
            .resource_states
            .insert((kind, name.to_string()), states.into_iter().collect());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().calls.iter().map(Call::op).collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|call| call.op() == op).count()
    }

    /// Calls of the given operations, in order
    pub fn calls_of(&self, ops: &[Op]) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|call| ops.contains(&call.op()))
            .cloned()
            .collect()
    }

    pub fn extension_installed(&self, label: &str) -> bool {
        self.lock().installed_extensions.contains(label)
    }

    pub fn cluster_exists(&self, name: &str) -> bool {
        self.lock().clusters.contains(name)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // a panicking op poisons nothing: the guard is never held across one
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records the call and plays the scripted behaviour for its operation
    async fn enter(&self, call: Call) -> Result<(), HostError> {
        let op = call.op();
        self.lock().calls.push(call);

        if let Some(delay) = self.delays.get(&op) {
            tokio::time::sleep(*delay).await;
        }
        if self.hanging.contains(&op) {
            std::future::pending::<()>().await;
        }
        if self.panicking.contains(&op) {
            panic!("scripted panic in {op:?}");
        }
        if self.failing.contains(&op) {
            return Err(HostError::operation(op_name(op), "scripted failure"));
        }
        Ok(())
    }
}

fn op_name(op: Op) -> &'static str {
    match op {
        Op::WelcomePage => "welcome-page",
        Op::RecordingName => "recording-name",
        Op::OpenCliToolsSettings => "open-settings",
        Op::EnsureCliInstalled => "ensure-cli",
        Op::OpenExtensions => "open-extensions",
        Op::ExtensionIsInstalled => "extension-installed",
        Op::InstallExtension => "install-extension",
        Op::RemoveExtension => "remove-extension",
        Op::CreateCluster => "create-cluster",
        Op::DeleteCluster => "delete-cluster",
        Op::ResourceState => "resource-state",
        Op::Close => "close",
    }
}

impl HostApp for FakeHost {
    async fn handle_welcome_page(&self, skip_onboarding: bool) -> Result<(), HostError> {
        self.enter(Call::WelcomePage { skip_onboarding }).await
    }

    async fn set_recording_name(&self, name: &str) -> Result<(), HostError> {
        self.enter(Call::RecordingName(name.to_string())).await
    }

    async fn open_cli_tools_settings(&self) -> Result<(), HostError> {
        self.enter(Call::OpenCliToolsSettings).await
    }

    async fn ensure_cli_installed(&self, tool: &str) -> Result<(), HostError> {
        self.enter(Call::EnsureCliInstalled(tool.to_string())).await
    }

    async fn open_extensions(&self) -> Result<(), HostError> {
        self.enter(Call::OpenExtensions).await
    }

    async fn extension_is_installed(&self, label: &str) -> Result<bool, HostError> {
        self.enter(Call::ExtensionIsInstalled(label.to_string()))
            .await?;
        let mut state = self.lock();
        if !state.installed_extensions.contains(label) {
            return Ok(false);
        }
        if state.pending_visibility > 0 {
            state.pending_visibility -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn install_extension_from_oci_image(&self, reference: &str) -> Result<(), HostError> {
        self.enter(Call::InstallExtension(reference.to_string()))
            .await?;
        let mut state = self.lock();
        state
            .installed_extensions
            .insert(minikube_e2e::EXTENSION_LABEL.to_string());
        state.pending_visibility = self.visible_after_checks;
        Ok(())
    }

    async fn remove_extension(&self, name: &str, label: &str) -> Result<(), HostError> {
        self.enter(Call::RemoveExtension {
            name: name.to_string(),
            label: label.to_string(),
        })
        .await?;
        self.lock().installed_extensions.remove(label);
        Ok(())
    }

    async fn create_cluster(
        &self,
        name: &str,
        interactive: bool,
        timeout: Duration,
        driver: Option<&str>,
    ) -> Result<(), HostError> {
        self.enter(Call::CreateCluster {
            name: name.to_string(),
            interactive,
            timeout,
            driver: driver.map(str::to_string),
        })
        .await?;
        let mut state = self.lock();
        if !state.clusters.insert(name.to_string()) {
            return Err(HostError::operation(
                "create-cluster",
                format!("cluster {name} already exists"),
            ));
        }
        Ok(())
    }

    async fn delete_cluster(
        &self,
        resource_name: &str,
        node_name: &str,
        cluster_name: &str,
    ) -> Result<(), HostError> {
        self.enter(Call::DeleteCluster {
            resource_name: resource_name.to_string(),
            node_name: node_name.to_string(),
            cluster_name: cluster_name.to_string(),
        })
        .await?;
        self.lock().clusters.remove(cluster_name);
        Ok(())
    }

    async fn resource_state(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<ResourceState>, HostError> {
        self.enter(Call::ResourceState {
            kind,
            name: name.to_string(),
        })
        .await?;
        let mut state = self.lock();
        if let Some(states) = state.resource_states.get_mut(&(kind, name.to_string())) {
            let observed = if states.len() > 1 {
                states.pop_front().flatten()
            } else {
                states.front().cloned().flatten()
            };
            return Ok(observed);
        }
        let running = kind == ResourceKind::Nodes && state.clusters.contains(name);
        Ok(running.then_some(ResourceState::Running))
    }

    async fn close(&self) -> Result<(), HostError> {
        self.enter(Call::Close).await
    }
}

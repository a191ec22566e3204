//! Contract of the host application under test
//!
//! Everything the scenario does to the desktop application goes through
//! [`HostApp`]. Implementations perform the UI automation; the scenario only
//! sequences the calls and bounds them in time.

use std::future::Future;
use std::time::Duration;

use crate::error::HostError;

/// Operations the scenario consumes from the host application.
///
/// Every operation may suspend for as long as the UI needs; callers impose
/// their own time budgets.
#[allow(async_fn_in_trait)]
pub trait HostApp {
    /// One-time onboarding dismissal.
    async fn handle_welcome_page(&self, skip_onboarding: bool) -> Result<(), HostError>;

    /// Names the video/trace recording of this run.
    async fn set_recording_name(&self, name: &str) -> Result<(), HostError>;

    /// Navigates to the settings surface and opens the CLI tools tab.
    async fn open_cli_tools_settings(&self) -> Result<(), HostError>;

    /// Installs `tool` into the managed tool registry unless it is already
    /// there. Blocks until installed.
    async fn ensure_cli_installed(&self, tool: &str) -> Result<(), HostError>;

    async fn open_extensions(&self) -> Result<(), HostError>;

    async fn extension_is_installed(&self, label: &str) -> Result<bool, HostError>;

    async fn install_extension_from_oci_image(&self, reference: &str) -> Result<(), HostError>;

    /// Locates the installed extension by `name` and `label` and removes it.
    async fn remove_extension(&self, name: &str, label: &str) -> Result<(), HostError>;

    /// Drives the cluster creation flow. `driver` is only given on the
    /// non-interactive path; an empty driver means the host default.
    async fn create_cluster(
        &self,
        name: &str,
        interactive: bool,
        timeout: Duration,
        driver: Option<&str>,
    ) -> Result<(), HostError>;

    async fn delete_cluster(
        &self,
        resource_name: &str,
        node_name: &str,
        cluster_name: &str,
    ) -> Result<(), HostError>;

    /// Current state of a resource as shown in the resource listing, `None`
    /// when the resource is not listed.
    async fn resource_state(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<ResourceState>, HostError>;

    /// Releases the runner and its recording context.
    async fn close(&self) -> Result<(), HostError>;
}

impl<T: HostApp> HostApp for &T {
    async fn handle_welcome_page(&self, skip_onboarding: bool) -> Result<(), HostError> {
        (**self).handle_welcome_page(skip_onboarding).await
    }

    async fn set_recording_name(&self, name: &str) -> Result<(), HostError> {
        (**self).set_recording_name(name).await
    }

    async fn open_cli_tools_settings(&self) -> Result<(), HostError> {
        (**self).open_cli_tools_settings().await
    }

    async fn ensure_cli_installed(&self, tool: &str) -> Result<(), HostError> {
        (**self).ensure_cli_installed(tool).await
    }

    async fn open_extensions(&self) -> Result<(), HostError> {
        (**self).open_extensions().await
    }

    async fn extension_is_installed(&self, label: &str) -> Result<bool, HostError> {
        (**self).extension_is_installed(label).await
    }

    async fn install_extension_from_oci_image(&self, reference: &str) -> Result<(), HostError> {
        (**self).install_extension_from_oci_image(reference).await
    }

    async fn remove_extension(&self, name: &str, label: &str) -> Result<(), HostError> {
        (**self).remove_extension(name, label).await
    }

    async fn create_cluster(
        &self,
        name: &str,
        interactive: bool,
        timeout: Duration,
        driver: Option<&str>,
    ) -> Result<(), HostError> {
        (**self)
            .create_cluster(name, interactive, timeout, driver)
            .await
    }

    async fn delete_cluster(
        &self,
        resource_name: &str,
        node_name: &str,
        cluster_name: &str,
    ) -> Result<(), HostError> {
        (**self)
            .delete_cluster(resource_name, node_name, cluster_name)
            .await
    }

    async fn resource_state(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<ResourceState>, HostError> {
        (**self).resource_state(kind, name).await
    }

    async fn close(&self) -> Result<(), HostError> {
        (**self).close().await
    }
}

/// Runs one host call within `budget`; running out of time is reported as
/// [`HostError::Unresponsive`].
pub async fn bounded<T, F>(operation: &'static str, budget: Duration, call: F) -> Result<T, HostError>
where
    F: Future<Output = Result<T, HostError>>,
{
    tokio::time::timeout(budget, call)
        .await
        .unwrap_or(Err(HostError::Unresponsive {
            operation,
            after: budget,
        }))
}

/// Resource listings of the host application's Kubernetes view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Nodes,
    Deployments,
    Services,
    IngressesRoutes,
    Pods,
    PersistentVolumeClaims,
    ConfigMapsSecrets,
    Jobs,
    CronJobs,
}

impl ResourceKind {
    /// Label of the listing in the host application's navigation.
    pub fn label(self) -> &'static str {
        match self {
            Self::Nodes => "Nodes",
            Self::Deployments => "Deployments",
            Self::Services => "Services",
            Self::IngressesRoutes => "Ingresses & Routes",
            Self::Pods => "Pods",
            Self::PersistentVolumeClaims => "Persistent Volume Claims",
            Self::ConfigMapsSecrets => "ConfigMaps & Secrets",
            Self::Jobs => "Jobs",
            Self::CronJobs => "CronJobs",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle status reported for a provisioned object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Running,
    Starting,
    Stopped,
    Deleting,
    Degraded,
    /// Anything the host reports that has no variant of its own.
    Other(String),
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Running => "RUNNING",
            Self::Starting => "STARTING",
            Self::Stopped => "STOPPED",
            Self::Deleting => "DELETING",
            Self::Degraded => "DEGRADED",
            Self::Other(state) => state,
        })
    }
}

impl std::str::FromStr for ResourceState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = s.trim();
        Ok(match state.to_ascii_uppercase().as_str() {
            "RUNNING" => Self::Running,
            "STARTING" => Self::Starting,
            "STOPPED" => Self::Stopped,
            "DELETING" => Self::Deleting,
            "DEGRADED" => Self::Degraded,
            _ => Self::Other(state.to_string()),
        })
    }
}

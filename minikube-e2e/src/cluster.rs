//! Cluster creation and deletion through the host application

use chrono::{DateTime, Utc};

use crate::config::{OsFamily, ScenarioConfig};
use crate::error::{ClusterError, HostError};
use crate::host::HostApp;

/// How the creation flow is driven, chosen once per scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningStrategy {
    /// Local runs; the flow may wait on a human confirmation.
    Interactive,
    /// CI on Linux. An empty driver means the host default.
    NonInteractive { driver: String },
}

impl ProvisioningStrategy {
    pub fn select(config: &ScenarioConfig) -> Self {
        if config.platform.ci && config.platform.os == OsFamily::Linux {
            Self::NonInteractive {
                driver: config.driver.clone().unwrap_or_default(),
            }
        } else {
            Self::Interactive
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }

    pub fn driver(&self) -> Option<&str> {
        match self {
            Self::Interactive => None,
            Self::NonInteractive { driver } => Some(driver),
        }
    }
}

/// A cluster this run asked the host to create.
///
/// The handle exists from the moment creation is attempted, so a cluster
/// whose creation timed out half way is still deleted on teardown.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClusterHandle {
    pub name: String,
    pub node_name: String,
    pub resource_name: String,
    pub created_at: DateTime<Utc>,
    pub driver: Option<String>,
    /// Creation returned successfully.
    pub confirmed: bool,
}

impl ClusterHandle {
    pub fn requested(config: &ScenarioConfig, strategy: &ProvisioningStrategy) -> Self {
        Self {
            name: config.cluster_name.clone(),
            node_name: config.node_name.clone(),
            resource_name: config.resource_name.clone(),
            created_at: Utc::now(),
            driver: strategy.driver().map(str::to_string),
            confirmed: false,
        }
    }
}

/// Drives the creation flow for `handle`, bounded by `config.creation_timeout`.
///
/// Running out of time is reported as [`ClusterError::TimedOut`], distinct
/// from the host turning the request down.
pub async fn create<H: HostApp>(
    host: &H,
    handle: &mut ClusterHandle,
    strategy: &ProvisioningStrategy,
    config: &ScenarioConfig,
) -> Result<(), ClusterError> {
    let timeout = config.creation_timeout;
    tracing::info!(
        cluster = %handle.name,
        interactive = strategy.is_interactive(),
        driver = ?strategy.driver(),
        ?timeout,
        "creating cluster"
    );

    let creation = host.create_cluster(
        &handle.name,
        strategy.is_interactive(),
        timeout,
        strategy.driver(),
    );
    let outcome = tokio::time::timeout(timeout, creation).await;
    match outcome {
        Ok(Ok(())) => {
            handle.created_at = Utc::now();
            handle.confirmed = true;
            tracing::info!(cluster = %handle.name, "cluster created");
            Ok(())
        }
        Ok(Err(source)) => Err(ClusterError::Rejected {
            name: handle.name.clone(),
            source,
        }),
        Err(_) => Err(ClusterError::TimedOut {
            name: handle.name.clone(),
            after: timeout,
        }),
    }
}

/// Deletes the resource, node and cluster triple recorded at creation.
pub async fn delete<H: HostApp>(host: &H, handle: &ClusterHandle) -> Result<(), ClusterError> {
    tracing::info!(
        resource = %handle.resource_name,
        node = %handle.node_name,
        cluster = %handle.name,
        confirmed = handle.confirmed,
        "deleting cluster"
    );

    host.delete_cluster(&handle.resource_name, &handle.node_name, &handle.name)
        .await
        .map_err(|source: HostError| ClusterError::DeleteFailed {
            name: handle.name.clone(),
            source,
        })?;

    tracing::info!(cluster = %handle.name, "cluster deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformFacts;

    fn config(ci: bool, os: OsFamily, driver: Option<&str>) -> ScenarioConfig {
        ScenarioConfig {
            driver: driver.map(str::to_string),
            platform: PlatformFacts {
                os,
                ci,
                tool_preinstalled: false,
            },
            ..ScenarioConfig::default()
        }
    }

    #[test]
    fn ci_on_linux_is_non_interactive_with_configured_driver() {
        let strategy = ProvisioningStrategy::select(&config(true, OsFamily::Linux, Some("podman")));
        assert_eq!(
            strategy,
            ProvisioningStrategy::NonInteractive {
                driver: "podman".to_string()
            }
        );
        assert_eq!(strategy.driver(), Some("podman"));
        assert!(!strategy.is_interactive());
    }

    #[test]
    fn ci_on_linux_without_driver_passes_empty_string() {
        let strategy = ProvisioningStrategy::select(&config(true, OsFamily::Linux, None));
        assert_eq!(strategy.driver(), Some(""));
    }

    #[test]
    fn everything_else_is_interactive_without_driver() {
        for (ci, os) in [
            (false, OsFamily::Linux),
            (true, OsFamily::Windows),
            (true, OsFamily::MacOs),
            (false, OsFamily::MacOs),
        ] {
            let strategy = ProvisioningStrategy::select(&config(ci, os, Some("docker")));
            assert_eq!(strategy, ProvisioningStrategy::Interactive, "{ci} {os:?}");
            assert_eq!(strategy.driver(), None);
        }
    }

    #[test]
    fn requested_handle_carries_names_and_driver() {
        let config = config(true, OsFamily::Linux, Some("docker"))
            .with_cluster_name("e2e")
            .unwrap();
        let strategy = ProvisioningStrategy::select(&config);
        let handle = ClusterHandle::requested(&config, &strategy);

        assert_eq!(handle.name, "e2e");
        assert_eq!(handle.node_name, "e2e");
        assert_eq!(handle.resource_name, "e2e");
        assert_eq!(handle.driver.as_deref(), Some("docker"));
        assert!(!handle.confirmed);
    }
}

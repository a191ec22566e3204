//! End-to-end Kubernetes scenario for the minikube extension
//!
//! Provisions a local cluster through the host application, asserts that the
//! cluster's node becomes observable and healthy, and tears everything down
//! again, including the extension that was installed to provide the tooling.
//!
//! The host application is consumed through the [`HostApp`] contract; the
//! [`driver`] module implements it on top of an external UI-automation driver.

#![deny(unused_extern_crates)]
#![deny(unused_crate_dependencies)]
#![deny(unsafe_code)]

// used by the binary only
use clap as _;
use clap_verbosity_flag as _;
use eyre as _;
use tracing_subscriber as _;

#[cfg(test)]
use minikube_e2e_test_utils as _;

pub mod cli_tool;
pub mod cluster;
pub mod config;
pub mod driver;
pub mod error;
pub mod extension;
pub mod host;
pub mod report;
pub mod resource;
pub mod scenario;
pub mod wait;

pub use cluster::{ClusterHandle, ProvisioningStrategy};
pub use config::{ExtensionSpec, OsFamily, PlatformFacts, ScenarioConfig};
pub use driver::DriverHost;
pub use error::{
    AssertionFailure, ClusterError, ConfigError, ExtensionError, HostError, SetupFailure,
    TeardownError, TeardownFailure, TeardownStep, ToolError,
};
pub use extension::ExtensionRecord;
pub use host::{HostApp, ResourceKind, ResourceState};
pub use report::{AssertionOutcome, Phase, ScenarioReport, Verdict};
pub use resource::ResourceStateQuery;
pub use scenario::ScenarioRunner;
pub use wait::{Poll, WaitError, await_condition};

/// Cluster, node and resource name used when nothing else is configured.
pub const DEFAULT_CLUSTER_NAME: &str = "minikube";
/// CLI tool the host application must have in its tool registry.
pub const CLI_TOOL_NAME: &str = "Minikube";
pub const EXTENSION_NAME: &str = "minikube";
pub const EXTENSION_LABEL: &str = "podman-desktop.minikube";
pub const DEFAULT_EXTENSION_IMAGE: &str =
    "ghcr.io/podman-desktop/podman-desktop-extension-minikube:nightly";
pub const RECORDING_NAME: &str = "minikube-kubernetes-e2e";
pub const SCENARIO_TITLE: &str = "Kubernetes resources End-to-End test";
pub const SCENARIO_TAG: &str = "@k8s_e2e";

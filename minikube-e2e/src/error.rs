//! Failure taxonomy of a scenario run
//!
//! Each phase owns its own failure type so the final report can tell apart a
//! scenario that never got to assert ([`SetupFailure`]), an assertion that
//! failed ([`AssertionFailure`]) and cleanup that left resources behind
//! ([`TeardownFailure`]).

use std::time::Duration;

use crate::host::{ResourceKind, ResourceState};

/// Malformed configuration input, raised before SETUP begins.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a boolean (expected true, false, 1, 0, yes or no)")]
    InvalidBool { var: &'static str, value: String },
    #[error("{var}={value:?} is not a positive number of milliseconds")]
    InvalidDuration { var: &'static str, value: String },
    #[error("{var}={value:?} is not an image reference: {reason}")]
    InvalidImage {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("{value:?} is not a valid {field} name: {reason}")]
    InvalidName {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// A host application operation did not do what was asked.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("{operation} failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} gave an unexpected answer: {answer:?}")]
    UnexpectedAnswer {
        operation: &'static str,
        answer: String,
    },
    #[error("{operation} did not answer within {after:?}")]
    Unresponsive {
        operation: &'static str,
        after: Duration,
    },
    #[error("could not launch host driver {program:?}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl HostError {
    pub fn operation(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("could not open the CLI tools settings")]
    Navigation(#[source] HostError),
    #[error("installing {tool} failed")]
    Install {
        tool: String,
        #[source]
        source: HostError,
    },
    #[error("installing {tool} did not finish within {after:?}")]
    TimedOut { tool: String, after: Duration },
}

#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("extension {label} is already installed")]
    AlreadyInstalled { label: String },
    #[error("extension {label} did not show up as installed within {after:?}")]
    InstallTimedOut { label: String, after: Duration },
    #[error("extension {label}: {step} failed")]
    Host {
        label: String,
        step: &'static str,
        #[source]
        source: HostError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("cluster {name} was not created within {after:?}")]
    TimedOut { name: String, after: Duration },
    #[error("cluster {name} creation was rejected")]
    Rejected {
        name: String,
        #[source]
        source: HostError,
    },
    #[error("cluster {name} could not be deleted")]
    DeleteFailed {
        name: String,
        #[source]
        source: HostError,
    },
}

/// The scenario never got to assert.
#[derive(Debug, thiserror::Error)]
pub enum SetupFailure {
    #[error("{step} failed during initialisation")]
    Init {
        step: &'static str,
        #[source]
        source: HostError,
    },
    #[error("CLI tool installation failed")]
    CliTool(#[from] ToolError),
    #[error("extension installation failed")]
    Extension(#[from] ExtensionError),
    #[error("cluster creation failed")]
    Cluster(#[from] ClusterError),
    #[error("{phase} panicked: {message}")]
    Panicked { phase: &'static str, message: String },
}

/// One assertion of the RUN phase failed.
#[derive(Debug, thiserror::Error)]
pub enum AssertionFailure {
    #[error(
        "{kind} {name} did not reach state {expected} within {after:?} (last observed: {})",
        .last_observed.as_ref().map_or_else(|| "nothing".to_string(), |state| state.to_string())
    )]
    StateMismatch {
        kind: ResourceKind,
        name: String,
        expected: ResourceState,
        last_observed: Option<ResourceState>,
        after: Duration,
    },
    #[error("could not read the state of {kind} {name}")]
    Probe {
        kind: ResourceKind,
        name: String,
        #[source]
        source: HostError,
    },
    #[error("assertion panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeardownStep {
    DeleteCluster,
    RemoveExtension,
    ReleaseContext,
}

impl std::fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::DeleteCluster => "delete cluster",
            Self::RemoveExtension => "remove extension",
            Self::ReleaseContext => "release context",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Extension(#[from] ExtensionError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("panicked: {0}")]
    Panicked(String),
}

/// A cleanup step failed; resources may have been left behind.
#[derive(Debug, thiserror::Error)]
#[error("teardown step `{step}` failed")]
pub struct TeardownFailure {
    pub step: TeardownStep,
    #[source]
    pub cause: TeardownError,
}

/// Renders an error followed by all of its sources, `outer: inner: root`.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

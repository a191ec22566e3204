//! Setup, assertions and guaranteed teardown of one scenario
//!
//! [`ScenarioRunner::run`] consumes the runner and walks
//! `INIT → SETUP → RUN → TEARDOWN → DONE`, entering each phase at most once.
//! TEARDOWN runs no matter how INIT, SETUP or RUN ended, panics included,
//! and every cleanup step is attempted even if an earlier one failed.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::cluster::{self, ClusterHandle, ProvisioningStrategy};
use crate::config::ScenarioConfig;
use crate::error::{
    AssertionFailure, SetupFailure, TeardownError, TeardownFailure, TeardownStep,
};
use crate::extension::{self, ExtensionRecord};
use crate::host::{self, HostApp, ResourceKind, ResourceState};
use crate::report::{AssertionOutcome, Phase, ScenarioReport};
use crate::resource::{self, ResourceStateQuery};
use crate::wait::Poll;
use crate::{cli_tool, error};

pub struct ScenarioRunner<H> {
    host: H,
    config: ScenarioConfig,
    title: String,
    tag: String,
    assertions: Vec<ResourceStateQuery>,
}

/// Resources this run is responsible for cleaning up.
#[derive(Debug, Default)]
struct Provisioned {
    cluster: Option<ClusterHandle>,
    extension: Option<ExtensionRecord>,
}

impl<H: HostApp> ScenarioRunner<H> {
    /// A runner asserting that the cluster's node comes up running.
    pub fn new(host: H, config: ScenarioConfig) -> Self {
        let node_running =
            ResourceStateQuery::new(ResourceKind::Nodes, &config.node_name, ResourceState::Running);
        Self {
            host,
            config,
            title: crate::SCENARIO_TITLE.to_string(),
            tag: crate::SCENARIO_TAG.to_string(),
            assertions: vec![node_running],
        }
    }

    /// Registers one more assertion for the RUN phase.
    pub fn assert_state(mut self, query: ResourceStateQuery) -> Self {
        self.assertions.push(query);
        self
    }

    pub async fn run(self) -> ScenarioReport {
        let mut report = ScenarioReport::new(&self.title, &self.tag);
        let mut provisioned = Provisioned::default();

        report.enter(Phase::Init);
        let mut prepared = guard("init", self.init()).await;

        if prepared.is_ok() {
            report.enter(Phase::Setup);
            prepared = guard("setup", self.setup(&mut provisioned)).await;
        }

        match prepared {
            Ok(()) => {
                report.enter(Phase::Run);
                report.assertions = self.run_assertions().await;
            }
            Err(failure) => {
                tracing::error!(
                    error = %error::error_chain(&failure),
                    "setup failed, skipping assertions"
                );
                report.setup_failure = Some(failure);
            }
        }

        report.enter(Phase::Teardown);
        report.cluster = provisioned.cluster.clone();
        report.extension = provisioned.extension.clone();
        report.teardown_failures = self.teardown(provisioned).await;

        report.enter(Phase::Done);
        tracing::info!(verdict = ?report.verdict(), "scenario finished");
        report
    }

    /// Quick UI steps, each bounded by `config.step_timeout`.
    async fn init(&self) -> Result<(), SetupFailure> {
        let budget = self.config.step_timeout;
        host::bounded(
            "recording-name",
            budget,
            self.host.set_recording_name(&self.config.recording_name),
        )
        .await
        .map_err(|source| SetupFailure::Init {
            step: "naming the recording",
            source,
        })?;
        host::bounded("welcome-page", budget, self.host.handle_welcome_page(true))
            .await
            .map_err(|source| SetupFailure::Init {
                step: "dismissing the welcome page",
                source,
            })
    }

    async fn setup(&self, provisioned: &mut Provisioned) -> Result<(), SetupFailure> {
        let config = &self.config;
        let strategy = ProvisioningStrategy::select(config);
        tracing::info!(?strategy, platform = ?config.platform, "selected provisioning strategy");

        match config.extension_to_install() {
            Some(spec) => {
                let poll = Poll::new(config.poll_interval, config.install_timeout);
                extension::install(&self.host, spec, &mut provisioned.extension, poll).await?;
            }
            None => tracing::info!("extension installation skipped"),
        }

        if config.installs_cli_tool() {
            cli_tool::ensure_installed(&self.host, &config.cli_tool, config.install_timeout)
                .await?;
        } else {
            tracing::info!(tool = %config.cli_tool, "CLI tool installation skipped");
        }

        let handle = provisioned
            .cluster
            .insert(ClusterHandle::requested(config, &strategy));
        cluster::create(&self.host, handle, &strategy, config).await?;
        Ok(())
    }

    /// Each assertion runs regardless of how the previous ones ended.
    async fn run_assertions(&self) -> Vec<AssertionOutcome> {
        let poll = Poll::new(self.config.poll_interval, self.config.assertion_timeout);
        let mut outcomes = Vec::with_capacity(self.assertions.len());

        for query in &self.assertions {
            let result = AssertUnwindSafe(resource::check_state(&self.host, query, poll))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(AssertionFailure::Panicked(panic_message(panic))));

            if let Err(failure) = &result {
                tracing::error!(%query, error = %error::error_chain(failure), "assertion failed");
            }
            outcomes.push(AssertionOutcome {
                query: query.clone(),
                result,
            });
        }
        outcomes
    }

    /// Cluster first, then the extension, then the runner context. A failing
    /// step never prevents the next one.
    async fn teardown(&self, provisioned: Provisioned) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();

        if let Some(handle) = &provisioned.cluster {
            let step = async {
                cluster::delete(&self.host, handle)
                    .await
                    .map_err(TeardownError::from)
            };
            failures.extend(self.cleanup(TeardownStep::DeleteCluster, step).await);
        }

        if let Some(record) = &provisioned.extension {
            let step = async {
                extension::remove(&self.host, record)
                    .await
                    .map_err(TeardownError::from)
            };
            failures.extend(self.cleanup(TeardownStep::RemoveExtension, step).await);
        }

        let step = async { self.host.close().await.map_err(TeardownError::from) };
        failures.extend(self.cleanup(TeardownStep::ReleaseContext, step).await);

        failures
    }

    async fn cleanup<F>(&self, step: TeardownStep, action: F) -> Option<TeardownFailure>
    where
        F: Future<Output = Result<(), TeardownError>>,
    {
        let budget = self.config.teardown_timeout;
        let outcome = tokio::time::timeout(budget, AssertUnwindSafe(action).catch_unwind()).await;

        let cause = match outcome {
            Ok(Ok(Ok(()))) => return None,
            Ok(Ok(Err(cause))) => cause,
            Ok(Err(panic)) => TeardownError::Panicked(panic_message(panic)),
            Err(_) => TeardownError::TimedOut(budget),
        };

        let failure = TeardownFailure { step, cause };
        tracing::warn!(%step, error = %error::error_chain(&failure), "cleanup step failed");
        Some(failure)
    }
}

/// Runs a phase, turning a panic into that phase's failure.
async fn guard<F>(phase: &'static str, action: F) -> Result<(), SetupFailure>
where
    F: Future<Output = Result<(), SetupFailure>>,
{
    AssertUnwindSafe(action)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(SetupFailure::Panicked {
                phase,
                message: panic_message(panic),
            })
        })
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

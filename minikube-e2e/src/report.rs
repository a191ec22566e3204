//! What happened during a scenario run
//!
//! The report keeps the three operational signals apart: the scenario never
//! got to assert, an assertion failed, or cleanup left resources behind.

use colored::Colorize;
use serde::Serialize;

use crate::cluster::ClusterHandle;
use crate::error::{AssertionFailure, SetupFailure, TeardownFailure, error_chain};
use crate::extension::ExtensionRecord;
use crate::host::ResourceState;
use crate::resource::ResourceStateQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Init,
    Setup,
    Run,
    Teardown,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Passed,
    /// The scenario never got to assert.
    SetupFailed,
    AssertionsFailed,
}

#[derive(Debug)]
pub struct AssertionOutcome {
    pub query: ResourceStateQuery,
    pub result: Result<ResourceState, AssertionFailure>,
}

impl AssertionOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub struct ScenarioReport {
    pub title: String,
    pub tag: String,
    /// Phases in the order they were entered.
    pub phases: Vec<Phase>,
    pub setup_failure: Option<SetupFailure>,
    pub assertions: Vec<AssertionOutcome>,
    pub teardown_failures: Vec<TeardownFailure>,
    pub cluster: Option<ClusterHandle>,
    pub extension: Option<ExtensionRecord>,
}

impl ScenarioReport {
    pub fn new(title: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tag: tag.into(),
            phases: Vec::new(),
            setup_failure: None,
            assertions: Vec::new(),
            teardown_failures: Vec::new(),
            cluster: None,
            extension: None,
        }
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        tracing::info!(?phase, scenario = %self.title, "entering phase");
        self.phases.push(phase);
    }

    /// Determined by setup and assertions only; teardown failures are
    /// reported separately.
    pub fn verdict(&self) -> Verdict {
        if self.setup_failure.is_some() {
            Verdict::SetupFailed
        } else if self.assertions.iter().all(AssertionOutcome::passed) {
            Verdict::Passed
        } else {
            Verdict::AssertionsFailed
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict() == Verdict::Passed
    }

    pub fn left_resources_behind(&self) -> bool {
        !self.teardown_failures.is_empty()
    }

    pub fn entered(&self, phase: Phase) -> usize {
        self.phases.iter().filter(|p| **p == phase).count()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            title: self.title.clone(),
            tag: self.tag.clone(),
            verdict: self.verdict(),
            left_resources_behind: self.left_resources_behind(),
            phases: self.phases.clone(),
            setup_failure: self.setup_failure.as_ref().map(|e| error_chain(e)),
            assertions: self
                .assertions
                .iter()
                .map(|outcome| AssertionSummary {
                    kind: outcome.query.kind.to_string(),
                    name: outcome.query.name.clone(),
                    expected: outcome.query.expected.to_string(),
                    passed: outcome.passed(),
                    failure: outcome.result.as_ref().err().map(|e| error_chain(e)),
                })
                .collect(),
            teardown_failures: self
                .teardown_failures
                .iter()
                .map(|e| error_chain(e))
                .collect(),
            cluster: self.cluster.clone(),
            extension: self.extension.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.summary())
    }

    /// Human readable summary for the terminal.
    pub fn render(&self) -> String {
        let mut out = format!("{} {}\n", self.title.bold(), self.tag.dimmed());

        if let Some(failure) = &self.setup_failure {
            out.push_str(&format!(
                "  {} setup: {}\n",
                "✗".red(),
                error_chain(failure)
            ));
            out.push_str(&format!("  {} assertions not run\n", "-".yellow()));
        }
        for outcome in &self.assertions {
            match &outcome.result {
                Ok(_) => out.push_str(&format!("  {} {}\n", "✓".green(), outcome.query)),
                Err(e) => out.push_str(&format!(
                    "  {} {}: {}\n",
                    "✗".red(),
                    outcome.query,
                    error_chain(e)
                )),
            }
        }
        for failure in &self.teardown_failures {
            out.push_str(&format!(
                "  {} cleanup: {}\n",
                "!".yellow(),
                error_chain(failure)
            ));
        }

        let verdict = match self.verdict() {
            Verdict::Passed => "PASSED".green().bold(),
            Verdict::SetupFailed => "SETUP FAILED".red().bold(),
            Verdict::AssertionsFailed => "FAILED".red().bold(),
        };
        out.push_str(&format!("{verdict}"));
        if self.left_resources_behind() {
            out.push_str(&format!(" {}", "(cleanup left resources behind)".yellow()));
        }
        out.push('\n');
        out
    }
}

/// Serialisable form of a [`ScenarioReport`].
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub title: String,
    pub tag: String,
    pub verdict: Verdict,
    pub left_resources_behind: bool,
    pub phases: Vec<Phase>,
    pub setup_failure: Option<String>,
    pub assertions: Vec<AssertionSummary>,
    pub teardown_failures: Vec<String>,
    pub cluster: Option<ClusterHandle>,
    pub extension: Option<ExtensionRecord>,
}

#[derive(Debug, Serialize)]
pub struct AssertionSummary {
    pub kind: String,
    pub name: String,
    pub expected: String,
    pub passed: bool,
    pub failure: Option<String>,
}

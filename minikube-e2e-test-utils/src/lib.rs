//! Testing utilities for minikube-e2e scenarios
//!
//! This crate takes the drudgery out of scenario tests:
//! - A scripted host application that records every call
//! - Configurations for the CI/local variants the scenario supports
//! - Short time budgets so paused-clock tests stay readable

use std::time::Duration;

use minikube_e2e::{OsFamily, PlatformFacts, ScenarioConfig};

pub mod fake_host;

pub use fake_host::{Call, FakeHost, Op};

/// Configuration variants seen in the wild
pub struct TestConfig;

impl TestConfig {
    /// Developer machine: interactive creation, extension and CLI tool installed
    pub fn local() -> ScenarioConfig {
        Self::with_platform(PlatformFacts {
            os: OsFamily::MacOs,
            ci: false,
            tool_preinstalled: false,
        })
    }

    /// GitHub Actions on Linux with the given driver
    pub fn ci_linux(driver: &str) -> ScenarioConfig {
        ScenarioConfig {
            driver: Some(driver.to_string()),
            ..Self::with_platform(PlatformFacts {
                os: OsFamily::Linux,
                ci: true,
                tool_preinstalled: false,
            })
        }
    }

    /// Extension preinstalled by the pipeline, nothing to install
    pub fn skip_install(base: ScenarioConfig) -> ScenarioConfig {
        ScenarioConfig {
            skip_extension_install: true,
            ..base
        }
    }

    fn with_platform(platform: PlatformFacts) -> ScenarioConfig {
        ScenarioConfig {
            platform,
            creation_timeout: Duration::from_millis(300_000),
            teardown_timeout: Duration::from_secs(90),
            install_timeout: Duration::from_secs(60),
            assertion_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            step_timeout: Duration::from_secs(30),
            ..ScenarioConfig::default()
        }
    }
}

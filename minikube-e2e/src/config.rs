//! Scenario configuration resolved once from the process environment

use std::time::Duration;

use crate::error::ConfigError;

pub const SKIP_EXTENSION_INSTALL_VAR: &str = "SKIP_EXTENSION_INSTALL";
pub const DRIVER_VAR: &str = "MINIKUBE_DRIVER_GHA";
pub const EXTENSION_IMAGE_VAR: &str = "EXTENSION_OCI_IMAGE";
pub const TOOL_PREINSTALLED_VAR: &str = "MINIKUBE_PREINSTALLED";
pub const CREATION_TIMEOUT_VAR: &str = "CLUSTER_CREATION_TIMEOUT_MS";
pub const TEARDOWN_TIMEOUT_VAR: &str = "TEARDOWN_TIMEOUT_MS";
pub const GITHUB_ACTIONS_VAR: &str = "GITHUB_ACTIONS";
pub const CI_VAR: &str = "CI";
pub const RUNNER_OS_VAR: &str = "RUNNER_OS";

const DEFAULT_CREATION_TIMEOUT: Duration = Duration::from_millis(300_000);
const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_millis(90_000);
const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(180);
const DEFAULT_ASSERTION_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    Windows,
    MacOs,
    Other,
}

impl OsFamily {
    /// The OS this binary was compiled for.
    pub fn host() -> Self {
        Self::parse(std::env::consts::OS)
    }

    /// Accepts both `RUNNER_OS` spellings (`Linux`, `macOS`) and
    /// `std::env::consts::OS` ones (`linux`, `macos`).
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            "macos" | "darwin" => Self::MacOs,
            _ => Self::Other,
        }
    }
}

/// Facts about where the scenario runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformFacts {
    pub os: OsFamily,
    pub ci: bool,
    /// Designated pipeline runner that ships the CLI tool already.
    pub tool_preinstalled: bool,
}

impl PlatformFacts {
    /// Whether the CLI tool can be assumed to be present without installing it.
    pub fn cli_tool_bundled(&self) -> bool {
        self.tool_preinstalled || (self.ci && self.os == OsFamily::Windows)
    }
}

/// The extension installed to provide cluster tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSpec {
    pub name: String,
    pub label: String,
    pub image: String,
}

/// Immutable configuration of one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub cluster_name: String,
    pub node_name: String,
    pub resource_name: String,
    pub cli_tool: String,
    pub recording_name: String,
    pub creation_timeout: Duration,
    /// Budget of every individual cleanup step.
    pub teardown_timeout: Duration,
    /// Budget for CLI tool installation and for the extension to show up.
    pub install_timeout: Duration,
    pub assertion_timeout: Duration,
    pub poll_interval: Duration,
    /// Budget of a single quick UI step, such as naming the recording.
    pub step_timeout: Duration,
    /// Only consulted on the non-interactive provisioning path.
    pub driver: Option<String>,
    /// `None` disables the extension lifecycle entirely.
    pub extension: Option<ExtensionSpec>,
    pub skip_extension_install: bool,
    pub platform: PlatformFacts,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            cluster_name: crate::DEFAULT_CLUSTER_NAME.to_string(),
            node_name: crate::DEFAULT_CLUSTER_NAME.to_string(),
            resource_name: crate::DEFAULT_CLUSTER_NAME.to_string(),
            cli_tool: crate::CLI_TOOL_NAME.to_string(),
            recording_name: crate::RECORDING_NAME.to_string(),
            creation_timeout: DEFAULT_CREATION_TIMEOUT,
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
            assertion_timeout: DEFAULT_ASSERTION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            driver: None,
            extension: Some(ExtensionSpec {
                name: crate::EXTENSION_NAME.to_string(),
                label: crate::EXTENSION_LABEL.to_string(),
                image: crate::DEFAULT_EXTENSION_IMAGE.to_string(),
            }),
            skip_extension_install: false,
            platform: PlatformFacts {
                os: OsFamily::host(),
                ci: false,
                tool_preinstalled: false,
            },
        }
    }
}

impl ScenarioConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|var| std::env::var(var).ok())
    }

    /// Resolve from any variable lookup; absent variables fall back to the
    /// compiled-in defaults.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.skip_extension_install =
            parse_bool(SKIP_EXTENSION_INSTALL_VAR, lookup(SKIP_EXTENSION_INSTALL_VAR))?
                .unwrap_or(false);
        config.driver = lookup(DRIVER_VAR).map(|driver| driver.trim().to_string());

        if let Some(image) = lookup(EXTENSION_IMAGE_VAR) {
            let image = image.trim();
            config.extension = if image.is_empty() {
                None
            } else {
                validate_image(EXTENSION_IMAGE_VAR, image)?;
                config.extension.map(|extension| ExtensionSpec {
                    image: image.to_string(),
                    ..extension
                })
            };
        }

        if let Some(timeout) = parse_millis(CREATION_TIMEOUT_VAR, lookup(CREATION_TIMEOUT_VAR))? {
            config.creation_timeout = timeout;
        }
        if let Some(timeout) = parse_millis(TEARDOWN_TIMEOUT_VAR, lookup(TEARDOWN_TIMEOUT_VAR))? {
            config.teardown_timeout = timeout;
        }

        // GitHub Actions sets GITHUB_ACTIONS=true; other CI systems set CI,
        // sometimes to their own name
        let ci = is_set(lookup(GITHUB_ACTIONS_VAR)) || is_set(lookup(CI_VAR));
        config.platform = PlatformFacts {
            os: lookup(RUNNER_OS_VAR)
                .filter(|os| !os.trim().is_empty())
                .map_or_else(OsFamily::host, |os| OsFamily::parse(&os)),
            ci,
            tool_preinstalled: parse_bool(TOOL_PREINSTALLED_VAR, lookup(TOOL_PREINSTALLED_VAR))?
                .unwrap_or(false),
        };

        tracing::debug!(?config, "resolved scenario configuration");
        Ok(config)
    }

    /// Use `name` for the cluster, its node and its resource entry.
    pub fn with_cluster_name(mut self, name: &str) -> Result<Self, ConfigError> {
        validate_name("cluster", name)?;
        self.cluster_name = name.to_string();
        self.node_name = name.to_string();
        self.resource_name = name.to_string();
        Ok(self)
    }

    /// The extension to install, unless installation is skipped or no image
    /// is configured.
    pub fn extension_to_install(&self) -> Option<&ExtensionSpec> {
        if self.skip_extension_install {
            return None;
        }
        self.extension.as_ref()
    }

    pub fn installs_cli_tool(&self) -> bool {
        !self.skip_extension_install && !self.platform.cli_tool_bundled()
    }
}

fn parse_bool(var: &'static str, value: Option<String>) -> Result<Option<bool>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidBool { var, value }),
    }
}

/// Presence check for CI markers: any non-empty value except an explicit
/// false.
fn is_set(value: Option<String>) -> bool {
    value.is_some_and(|value| {
        !matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "" | "false" | "0" | "no"
        )
    })
}

fn parse_millis(var: &'static str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.trim().is_empty() {
        return Ok(None);
    }
    match value.trim().parse::<u64>() {
        Ok(millis) if millis > 0 => Ok(Some(Duration::from_millis(millis))),
        _ => Err(ConfigError::InvalidDuration { var, value }),
    }
}

/// `registry/repository[:tag][@digest]`
fn validate_image(var: &'static str, image: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidImage {
        var,
        value: image.to_string(),
        reason,
    };

    if image.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }

    let (name, digest) = match image.split_once('@') {
        Some((name, digest)) => (name, Some(digest)),
        None => (image, None),
    };
    if let Some(digest) = digest {
        let Some((algorithm, hex)) = digest.split_once(':') else {
            return Err(invalid("digest must be algorithm:hex"));
        };
        if algorithm.is_empty() || hex.is_empty() {
            return Err(invalid("digest must be algorithm:hex"));
        }
    }

    // a ':' after the last '/' separates the tag, earlier ones are registry ports
    let last_segment_start = name.rfind('/').map_or(0, |i| i + 1);
    let (repository, tag) = match name[last_segment_start..].rfind(':') {
        Some(i) => (
            &name[..last_segment_start + i],
            Some(&name[last_segment_start + i + 1..]),
        ),
        None => (name, None),
    };

    if repository.is_empty() || repository.starts_with('/') || repository.ends_with('/') {
        return Err(invalid("missing repository"));
    }
    let mut components = repository.split('/');
    if components.clone().any(str::is_empty) {
        return Err(invalid("empty path component"));
    }
    if let Some((_, port)) = components.next().and_then(|host| host.split_once(':')) {
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("invalid registry port"));
        }
    }
    if components.any(|component| component.contains(':')) {
        return Err(invalid("':' is only allowed before a tag or a registry port"));
    }
    if let Some(tag) = tag {
        let valid_tag = !tag.is_empty()
            && tag.len() <= 128
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if !valid_tag {
            return Err(invalid("invalid tag"));
        }
    }
    Ok(())
}

fn validate_name(field: &'static str, name: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidName {
        field,
        value: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid("only lowercase letters, digits and '-' are allowed"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must start and end with a letter or digit"));
    }
    Ok(())
}

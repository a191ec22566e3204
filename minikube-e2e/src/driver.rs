//! Host application driven through an external UI-automation executable
//!
//! Every [`HostApp`] operation becomes one invocation of the driver:
//! `<driver> <operation> <args…>`. Exit status 0 means the operation
//! succeeded; queries print their answer on stdout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::HostError;
use crate::host::{HostApp, ResourceKind, ResourceState};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Operations that wait on installations; callers bound them more tightly.
const LONG_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Fluent builder for driver invocations
#[derive(Debug, Clone)]
pub struct DriverCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl DriverCommand {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Argument passed before the operation name on every invocation
    pub fn arg<S: AsRef<str>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Set timeout for command execution
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `<driver> <operation> <args…>`; the child is killed if the call
    /// is abandoned or runs out of time.
    pub async fn execute<I, S>(
        &self,
        operation: &'static str,
        args: I,
    ) -> Result<CommandOutput, HostError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd.arg(operation);
        for arg in args {
            cmd.arg(arg.as_ref());
        }
        cmd.stdin(std::process::Stdio::null());
        cmd.kill_on_drop(true);

        tracing::debug!(program = ?self.program, operation, "invoking host driver");
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(output) => output.map_err(|source| HostError::Launch {
                program: self.program.display().to_string(),
                source,
            })?,
            Err(_) => {
                return Err(HostError::Unresponsive {
                    operation,
                    after: self.timeout,
                });
            }
        };

        let output = CommandOutput::from_output(output);
        tracing::trace!(operation, ?output, "host driver finished");
        Ok(output)
    }
}

/// Output from a driver invocation
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn from_output(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            exit_code: output.status.code(),
        }
    }

    pub fn expect_success(self, operation: &'static str) -> Result<Self, HostError> {
        if self.success {
            return Ok(self);
        }
        let detail = match self.stderr.trim() {
            "" => self.stdout.trim(),
            stderr => stderr,
        };
        Err(HostError::operation(
            operation,
            format!("exit code {:?}: {detail}", self.exit_code),
        ))
    }

    /// Last non-empty stdout line, which carries a query's answer.
    pub fn answer(&self) -> &str {
        self.stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .unwrap_or("")
    }

    pub fn answer_bool(&self, operation: &'static str) -> Result<bool, HostError> {
        match self.answer().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(HostError::UnexpectedAnswer {
                operation,
                answer: other.to_string(),
            }),
        }
    }
}

/// [`HostApp`] backed by a [`DriverCommand`].
#[derive(Debug, Clone)]
pub struct DriverHost {
    command: DriverCommand,
}

impl DriverHost {
    pub fn new(command: DriverCommand) -> Self {
        Self { command }
    }

    async fn run<I, S>(&self, operation: &'static str, args: I) -> Result<CommandOutput, HostError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .execute(operation, args)
            .await?
            .expect_success(operation)
    }

    async fn run_long<I, S>(
        &self,
        operation: &'static str,
        timeout: Duration,
        args: I,
    ) -> Result<CommandOutput, HostError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .clone()
            .timeout(timeout)
            .execute(operation, args)
            .await?
            .expect_success(operation)
    }
}

impl HostApp for DriverHost {
    async fn handle_welcome_page(&self, skip_onboarding: bool) -> Result<(), HostError> {
        let flag = if skip_onboarding {
            "--skip-onboarding"
        } else {
            "--keep-onboarding"
        };
        self.run("welcome-page", [flag]).await.map(drop)
    }

    async fn set_recording_name(&self, name: &str) -> Result<(), HostError> {
        self.run("recording-name", [name]).await.map(drop)
    }

    async fn open_cli_tools_settings(&self) -> Result<(), HostError> {
        self.run("open-settings", ["cli-tools"]).await.map(drop)
    }

    async fn ensure_cli_installed(&self, tool: &str) -> Result<(), HostError> {
        self.run_long("ensure-cli", LONG_TIMEOUT, [tool])
            .await
            .map(drop)
    }

    async fn open_extensions(&self) -> Result<(), HostError> {
        self.run("open-extensions", None::<&str>).await.map(drop)
    }

    async fn extension_is_installed(&self, label: &str) -> Result<bool, HostError> {
        const OPERATION: &str = "extension-installed";
        self.run(OPERATION, [label]).await?.answer_bool(OPERATION)
    }

    async fn install_extension_from_oci_image(&self, reference: &str) -> Result<(), HostError> {
        self.run_long("install-extension", LONG_TIMEOUT, [reference])
            .await
            .map(drop)
    }

    async fn remove_extension(&self, name: &str, label: &str) -> Result<(), HostError> {
        self.run("remove-extension", [name, label]).await.map(drop)
    }

    async fn create_cluster(
        &self,
        name: &str,
        interactive: bool,
        timeout: Duration,
        driver: Option<&str>,
    ) -> Result<(), HostError> {
        let mut args = vec![
            name.to_string(),
            if interactive {
                "--interactive".to_string()
            } else {
                "--non-interactive".to_string()
            },
            "--timeout-ms".to_string(),
            timeout.as_millis().to_string(),
        ];
        if let Some(driver) = driver {
            args.push("--driver".to_string());
            args.push(driver.to_string());
        }
        self.run_long("create-cluster", timeout, args)
            .await
            .map(drop)
    }

    async fn delete_cluster(
        &self,
        resource_name: &str,
        node_name: &str,
        cluster_name: &str,
    ) -> Result<(), HostError> {
        self.run_long(
            "delete-cluster",
            LONG_TIMEOUT,
            [resource_name, node_name, cluster_name],
        )
        .await
        .map(drop)
    }

    async fn resource_state(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<ResourceState>, HostError> {
        let output = self.run("resource-state", [kind.label(), name]).await?;
        Ok(match output.answer() {
            "" => None,
            state => state.parse().ok(),
        })
    }

    async fn close(&self) -> Result<(), HostError> {
        self.run("close", None::<&str>).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stdout: &str, stderr: &str, success: bool) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            success,
            exit_code: Some(if success { 0 } else { 1 }),
        }
    }

    #[test]
    fn answer_is_last_non_empty_line() {
        let out = output("opening extensions page\ntrue\n\n", "", true);
        assert_eq!(out.answer(), "true");
        assert!(out.answer_bool("extension-installed").unwrap());
    }

    #[test]
    fn garbage_boolean_answer_is_rejected() {
        let out = output("installed!\n", "", true);
        assert!(matches!(
            out.answer_bool("extension-installed"),
            Err(HostError::UnexpectedAnswer { .. })
        ));
    }

    #[test]
    fn failure_prefers_stderr() {
        let err = output("some progress", "cluster already exists", false)
            .expect_success("create-cluster")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "create-cluster failed: exit code Some(1): cluster already exists"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_driver_is_a_launch_error() {
        let host = DriverHost::new(DriverCommand::new("/nonexistent/minikube-e2e-driver"));
        assert!(matches!(host.close().await, Err(HostError::Launch { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn driver_arguments_and_answers() {
        // `sh -c <script> <operation> <args…>`: $0 is the operation
        let host = DriverHost::new(
            DriverCommand::new("sh")
                .arg("-c")
                .arg(r#"if [ "$0" = resource-state ]; then echo "$1/$2"; echo RUNNING; fi"#),
        );

        let state = host
            .resource_state(ResourceKind::Nodes, "minikube")
            .await
            .unwrap();
        assert_eq!(state, Some(ResourceState::Running));
        host.close().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unresponsive_driver_times_out() {
        let host = DriverHost::new(
            DriverCommand::new("sh")
                .arg("-c")
                .arg("sleep 5")
                .timeout(Duration::from_millis(100)),
        );
        assert!(matches!(
            host.open_extensions().await,
            Err(HostError::Unresponsive { operation: "open-extensions", .. })
        ));
    }
}

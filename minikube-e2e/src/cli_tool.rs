//! Makes sure the cluster CLI tool is in the host application's tool registry

use std::time::Duration;

use crate::error::ToolError;
use crate::host::HostApp;

/// Idempotent: the host treats an already installed tool as a no-op. Whether
/// to call this at all is the caller's policy decision. Does not retry.
///
/// Navigation and installation share the `timeout` budget.
pub async fn ensure_installed<H: HostApp>(
    host: &H,
    tool: &str,
    timeout: Duration,
) -> Result<(), ToolError> {
    tracing::info!(tool, ?timeout, "ensuring CLI tool is installed");

    let installing = async {
        if let Err(source) = host.open_cli_tools_settings().await {
            return Err(ToolError::Navigation(source));
        }
        host.ensure_cli_installed(tool)
            .await
            .map_err(|source| ToolError::Install {
                tool: tool.to_string(),
                source,
            })
    };

    match tokio::time::timeout(timeout, installing).await {
        Ok(result) => {
            result?;
            tracing::info!(tool, "CLI tool is installed");
            Ok(())
        }
        Err(_) => Err(ToolError::TimedOut {
            tool: tool.to_string(),
            after: timeout,
        }),
    }
}

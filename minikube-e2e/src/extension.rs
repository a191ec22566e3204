//! Installs the cluster-tooling extension and removes it again
//!
//! [`install`] records an [`ExtensionRecord`] as soon as it asks the host to
//! install, before knowing whether that worked. Whoever holds the record must
//! pass it to [`remove`] before the run ends, so the host's extension set is
//! left as it was found.

use crate::config::ExtensionSpec;
use crate::error::{ExtensionError, HostError};
use crate::host::HostApp;
use crate::wait::{Poll, WaitError, await_condition};

/// An extension this run asked the host to install.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExtensionRecord {
    pub name: String,
    pub label: String,
    pub image: String,
    /// The extension showed up as installed.
    pub confirmed: bool,
}

impl ExtensionRecord {
    pub fn requested(spec: &ExtensionSpec) -> Self {
        Self {
            name: spec.name.clone(),
            label: spec.label.clone(),
            image: spec.image.clone(),
            confirmed: false,
        }
    }
}

/// Installs `spec` from its OCI image and waits for it to show up as
/// installed, all within `poll.timeout`.
///
/// The extension must not be installed beforehand: a run that did not
/// install it must not remove it either. `installed` is filled right before
/// the install is triggered and stays filled whatever happens next.
pub async fn install<H: HostApp>(
    host: &H,
    spec: &ExtensionSpec,
    installed: &mut Option<ExtensionRecord>,
    poll: Poll,
) -> Result<(), ExtensionError> {
    let label = spec.label.as_str();
    tracing::info!(label, image = %spec.image, budget = ?poll.timeout, "installing extension");

    match tokio::time::timeout(poll.timeout, install_unbounded(host, spec, installed, poll)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ExtensionError::InstallTimedOut {
                label: label.to_string(),
                after: poll.timeout,
            });
        }
    }

    tracing::info!(label, "extension installed");
    Ok(())
}

async fn install_unbounded<H: HostApp>(
    host: &H,
    spec: &ExtensionSpec,
    installed: &mut Option<ExtensionRecord>,
    poll: Poll,
) -> Result<(), ExtensionError> {
    let label = spec.label.as_str();
    host.open_extensions()
        .await
        .map_err(host_failure(label, "opening the extensions page"))?;

    if host
        .extension_is_installed(label)
        .await
        .map_err(host_failure(label, "checking installed extensions"))?
    {
        return Err(ExtensionError::AlreadyInstalled {
            label: label.to_string(),
        });
    }

    let record = installed.insert(ExtensionRecord::requested(spec));
    host.install_extension_from_oci_image(&spec.image)
        .await
        .map_err(host_failure(label, "installing from image"))?;

    match await_condition(
        move || host.extension_is_installed(label),
        |visible| *visible,
        poll,
    )
    .await
    {
        Ok(_) => {
            record.confirmed = true;
            Ok(())
        }
        Err(WaitError::Probe(source)) => {
            Err(host_failure(label, "checking installed extensions")(source))
        }
        Err(WaitError::TimedOut { after, .. }) => Err(ExtensionError::InstallTimedOut {
            label: label.to_string(),
            after,
        }),
    }
}

/// Removes an extension recorded by [`install`].
///
/// A confirmed extension that is no longer listed is already gone. An
/// unconfirmed one may still be landing, so removal is asked for anyway.
pub async fn remove<H: HostApp>(host: &H, record: &ExtensionRecord) -> Result<(), ExtensionError> {
    let label = record.label.as_str();
    tracing::info!(name = %record.name, label, confirmed = record.confirmed, "removing extension");
    host.open_extensions()
        .await
        .map_err(host_failure(label, "opening the extensions page"))?;

    let listed = host
        .extension_is_installed(label)
        .await
        .map_err(host_failure(label, "checking installed extensions"))?;
    if !listed {
        if record.confirmed {
            tracing::warn!(label, "extension is already gone");
            return Ok(());
        }
        tracing::warn!(label, "installation was never confirmed, removing anyway");
    }

    host.remove_extension(&record.name, label)
        .await
        .map_err(host_failure(label, "removing"))?;

    tracing::info!(label, "extension removed");
    Ok(())
}

fn host_failure(label: &str, step: &'static str) -> impl FnOnce(HostError) -> ExtensionError {
    let label = label.to_string();
    move |source| ExtensionError::Host {
        label,
        step,
        source,
    }
}

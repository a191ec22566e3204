//! Assertions on the host application's resource view

use crate::error::AssertionFailure;
use crate::host::{HostApp, ResourceKind, ResourceState};
use crate::wait::{Poll, WaitError, await_condition};

/// Which resource must reach which state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStateQuery {
    pub kind: ResourceKind,
    pub name: String,
    pub expected: ResourceState,
}

impl ResourceStateQuery {
    pub fn new(kind: ResourceKind, name: impl Into<String>, expected: ResourceState) -> Self {
        Self {
            kind,
            name: name.into(),
            expected,
        }
    }
}

impl std::fmt::Display for ResourceStateQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} is {}", self.kind, self.name, self.expected)
    }
}

/// Polls the resource listing until `query.name` reports `query.expected`.
///
/// One call is one logical assertion. A resource missing from the listing is
/// treated like one in the wrong state.
pub async fn check_state<H: HostApp>(
    host: &H,
    query: &ResourceStateQuery,
    poll: Poll,
) -> Result<ResourceState, AssertionFailure> {
    let kind = query.kind;
    let name = query.name.as_str();
    tracing::info!(%kind, name, expected = %query.expected, "checking resource state");

    let observed = await_condition(
        move || async move {
            let state = host.resource_state(kind, name).await;
            tracing::debug!(%kind, name, ?state, "observed resource state");
            state
        },
        |state| state.as_ref() == Some(&query.expected),
        poll,
    )
    .await;

    match observed {
        Ok(state) => {
            tracing::info!(%kind, name, expected = %query.expected, "resource reached expected state");
            Ok(state.unwrap_or_else(|| query.expected.clone()))
        }
        Err(WaitError::TimedOut { last, after }) => Err(AssertionFailure::StateMismatch {
            kind,
            name: name.to_string(),
            expected: query.expected.clone(),
            last_observed: last.flatten(),
            after,
        }),
        Err(WaitError::Probe(source)) => Err(AssertionFailure::Probe {
            kind,
            name: name.to_string(),
            source,
        }),
    }
}

/// Tests for the individual provisioning steps against a scripted host
/// Extension lifecycle, CLI tool installation, cluster creation and
/// resource state assertions

use std::time::Duration;

use minikube_e2e::*;
use minikube_e2e_test_utils::*;

fn poll() -> Poll {
    Poll::new(Duration::from_millis(500), Duration::from_secs(5))
}

fn minikube_extension() -> ExtensionSpec {
    TestConfig::local()
        .extension
        .expect("local configuration installs the extension")
}

#[tokio::test(start_paused = true)]
async fn test_install_waits_until_extension_is_visible() {
    let host = FakeHost::new().with_extension_visible_after(3);
    let mut installed = None;

    minikube_e2e::extension::install(&host, &minikube_extension(), &mut installed, poll())
        .await
        .expect("extension installs");

    let record = installed.expect("install is recorded");
    assert_eq!(record.label, EXTENSION_LABEL);
    assert_eq!(record.name, EXTENSION_NAME);
    assert!(record.confirmed);
    // precondition check, then three misses and one hit
    assert_eq!(host.count(Op::ExtensionIsInstalled), 5);
    assert!(host.extension_installed(EXTENSION_LABEL));
}

#[tokio::test(start_paused = true)]
async fn test_install_times_out_when_extension_never_shows_up() {
    let host = FakeHost::new().with_extension_visible_after(usize::MAX);
    let mut installed = None;

    let err = minikube_e2e::extension::install(&host, &minikube_extension(), &mut installed, poll())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExtensionError::InstallTimedOut { ref label, after }
            if label == EXTENSION_LABEL && after >= Duration::from_secs(5)
    ));
    // the install was triggered, so it must be cleaned up
    assert!(installed.is_some_and(|record| !record.confirmed));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_install_is_bounded() {
    let host = FakeHost::new().hanging(Op::InstallExtension);
    let mut installed = None;

    let err = minikube_e2e::extension::install(&host, &minikube_extension(), &mut installed, poll())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExtensionError::InstallTimedOut { after, .. } if after == Duration::from_secs(5)
    ));
    assert!(installed.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_install_refuses_preinstalled_extension() {
    let host = FakeHost::new().with_extension_installed(EXTENSION_LABEL);
    let mut installed = None;

    let err = minikube_e2e::extension::install(&host, &minikube_extension(), &mut installed, poll())
        .await
        .unwrap_err();

    assert!(matches!(err, ExtensionError::AlreadyInstalled { .. }));
    assert!(installed.is_none());
    assert_eq!(host.count(Op::InstallExtension), 0);
}

#[tokio::test(start_paused = true)]
async fn test_remove_restores_extension_set() {
    let host = FakeHost::new();
    let mut installed = None;
    minikube_e2e::extension::install(&host, &minikube_extension(), &mut installed, poll())
        .await
        .unwrap();
    let record = installed.unwrap();

    minikube_e2e::extension::remove(&host, &record)
        .await
        .expect("extension is removed");

    assert!(!host.extension_installed(EXTENSION_LABEL));
    assert_eq!(
        host.calls_of(&[Op::RemoveExtension]),
        vec![Call::RemoveExtension {
            name: EXTENSION_NAME.to_string(),
            label: EXTENSION_LABEL.to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_remove_of_vanished_extension_is_not_an_error() {
    let host = FakeHost::new();
    let record = ExtensionRecord {
        confirmed: true,
        ..ExtensionRecord::requested(&minikube_extension())
    };

    minikube_e2e::extension::remove(&host, &record)
        .await
        .expect("nothing to remove");
    assert_eq!(host.count(Op::RemoveExtension), 0);
}

#[tokio::test(start_paused = true)]
async fn test_remove_of_unconfirmed_extension_is_always_attempted() {
    // installed, but the catalog does not list it yet
    let host = FakeHost::new().with_extension_visible_after(usize::MAX);
    let mut installed = None;
    minikube_e2e::extension::install(&host, &minikube_extension(), &mut installed, poll())
        .await
        .unwrap_err();
    let record = installed.unwrap();

    minikube_e2e::extension::remove(&host, &record)
        .await
        .expect("extension is removed");

    assert_eq!(host.count(Op::RemoveExtension), 1);
    assert!(!host.extension_installed(EXTENSION_LABEL));
}

#[tokio::test(start_paused = true)]
async fn test_cli_tool_install_is_bounded() {
    let host = FakeHost::new().taking(Op::EnsureCliInstalled, Duration::from_secs(61));

    let err = minikube_e2e::cli_tool::ensure_installed(&host, CLI_TOOL_NAME, Duration::from_secs(60))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ToolError::TimedOut { ref tool, after } if tool == "Minikube" && after == Duration::from_secs(60)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cli_tool_navigation_shares_the_budget() {
    let host = FakeHost::new().hanging(Op::OpenCliToolsSettings);

    let err = minikube_e2e::cli_tool::ensure_installed(&host, CLI_TOOL_NAME, Duration::from_secs(60))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::TimedOut { .. }));
    assert_eq!(host.count(Op::EnsureCliInstalled), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cli_tool_failures_are_distinguished() {
    let host = FakeHost::new().failing(Op::OpenCliToolsSettings);
    let err = minikube_e2e::cli_tool::ensure_installed(&host, CLI_TOOL_NAME, Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Navigation(_)));
    assert_eq!(host.count(Op::EnsureCliInstalled), 0);

    let host = FakeHost::new().failing(Op::EnsureCliInstalled);
    let err = minikube_e2e::cli_tool::ensure_installed(&host, CLI_TOOL_NAME, Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Install { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_cli_tool_install_is_idempotent() {
    let host = FakeHost::new();
    for _ in 0..2 {
        minikube_e2e::cli_tool::ensure_installed(&host, CLI_TOOL_NAME, Duration::from_secs(60))
            .await
            .expect("tool is installed");
    }
    assert_eq!(host.count(Op::EnsureCliInstalled), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cluster_creation_rejected_vs_timed_out() {
    let config = TestConfig::local();
    let strategy = ProvisioningStrategy::select(&config);

    // a cluster with that name already exists on the host
    let host = FakeHost::new();
    let mut first = ClusterHandle::requested(&config, &strategy);
    minikube_e2e::cluster::create(&host, &mut first, &strategy, &config)
        .await
        .expect("first creation succeeds");
    assert!(first.confirmed);

    let mut second = ClusterHandle::requested(&config, &strategy);
    let err = minikube_e2e::cluster::create(&host, &mut second, &strategy, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::Rejected { .. }));
    assert!(!second.confirmed);

    let host = FakeHost::new().hanging(Op::CreateCluster);
    let mut handle = ClusterHandle::requested(&config, &strategy);
    let err = minikube_e2e::cluster::create(&host, &mut handle, &strategy, &config)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClusterError::TimedOut { after, .. } if after == Duration::from_millis(300_000)
    ));
    assert!(!handle.confirmed);
}

#[tokio::test(start_paused = true)]
async fn test_cluster_creation_within_budget_succeeds() {
    let config = TestConfig::local();
    let strategy = ProvisioningStrategy::select(&config);
    let host = FakeHost::new().taking(Op::CreateCluster, Duration::from_millis(299_000));

    let mut handle = ClusterHandle::requested(&config, &strategy);
    minikube_e2e::cluster::create(&host, &mut handle, &strategy, &config)
        .await
        .expect("creation finishes inside the budget");
    assert!(host.cluster_exists("minikube"));

    minikube_e2e::cluster::delete(&host, &handle)
        .await
        .expect("cluster is deleted");
    assert!(!host.cluster_exists("minikube"));
}

#[tokio::test(start_paused = true)]
async fn test_check_state_waits_for_expected_state() {
    let host = FakeHost::new().with_resource_states(
        ResourceKind::Nodes,
        "minikube",
        [None, Some(ResourceState::Starting), Some(ResourceState::Running)],
    );
    let query = ResourceStateQuery::new(ResourceKind::Nodes, "minikube", ResourceState::Running);

    let state = minikube_e2e::resource::check_state(&host, &query, poll())
        .await
        .expect("node comes up");

    assert_eq!(state, ResourceState::Running);
    assert_eq!(host.count(Op::ResourceState), 3);
}

#[tokio::test(start_paused = true)]
async fn test_check_state_is_idempotent() {
    let running = FakeHost::new().with_resource_states(
        ResourceKind::Pods,
        "coredns",
        [Some(ResourceState::Running)],
    );
    let stopped = FakeHost::new().with_resource_states(
        ResourceKind::Pods,
        "coredns",
        [Some(ResourceState::Stopped)],
    );
    let query = ResourceStateQuery::new(ResourceKind::Pods, "coredns", ResourceState::Running);

    for _ in 0..2 {
        let state = minikube_e2e::resource::check_state(&running, &query, poll()).await;
        assert_eq!(state.unwrap(), ResourceState::Running);

        let state = minikube_e2e::resource::check_state(&stopped, &query, poll()).await;
        assert!(matches!(
            state,
            Err(AssertionFailure::StateMismatch {
                last_observed: Some(ResourceState::Stopped),
                ..
            })
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn test_missing_resource_is_a_mismatch() {
    let host = FakeHost::new();
    let query = ResourceStateQuery::new(ResourceKind::Nodes, "minikube", ResourceState::Running);

    let err = minikube_e2e::resource::check_state(&host, &query, poll())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AssertionFailure::StateMismatch {
            last_observed: None,
            ..
        }
    ));
    assert!(err.to_string().contains("last observed: nothing"));
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_resource_view_is_a_probe_failure() {
    let host = FakeHost::new().failing(Op::ResourceState);
    let query = ResourceStateQuery::new(ResourceKind::Nodes, "minikube", ResourceState::Running);

    let err = minikube_e2e::resource::check_state(&host, &query, poll())
        .await
        .unwrap_err();

    assert!(matches!(err, AssertionFailure::Probe { kind: ResourceKind::Nodes, .. }));
    assert_eq!(host.count(Op::ResourceState), 1);
}

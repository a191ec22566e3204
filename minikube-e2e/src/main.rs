use eyre::WrapErr;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();

    // RUST_LOG overrides the level picked with -v/-q
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(cli.verbose.log_level_filter().to_string().to_lowercase())
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config =
        minikube_e2e::ScenarioConfig::from_env().wrap_err("invalid scenario configuration")?;
    if let Some(name) = &cli.cluster_name {
        config = config
            .with_cluster_name(name)
            .wrap_err("invalid --cluster-name")?;
    }

    match cli.command.unwrap_or(Command::Run { report: None }) {
        Command::ShowConfig => {
            show_config(&config);
            Ok(())
        }
        Command::Run { report } => {
            let command = cli
                .host_driver_args
                .iter()
                .fold(minikube_e2e::driver::DriverCommand::new(&cli.host_driver), |command, arg| {
                    command.arg(arg)
                });
            let host = minikube_e2e::DriverHost::new(command);

            tracing::info!(driver = ?cli.host_driver, cluster = %config.cluster_name, "starting scenario");
            let outcome = minikube_e2e::ScenarioRunner::new(host, config).run().await;

            print!("{}", outcome.render());
            if let Some(path) = report {
                let json = outcome.to_json().wrap_err("failed to serialise report")?;
                std::fs::write(&path, json)
                    .wrap_err_with(|| format!("failed to write report to {}", path.display()))?;
                tracing::info!(path = ?path, "report written");
            }

            if !outcome.passed() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn show_config(config: &minikube_e2e::ScenarioConfig) {
    let strategy = minikube_e2e::ProvisioningStrategy::select(config);

    println!("cluster:            {}", config.cluster_name);
    println!("node:               {}", config.node_name);
    println!("resource:           {}", config.resource_name);
    println!("platform:           {:?}", config.platform);
    println!("strategy:           {strategy:?}");
    println!("creation timeout:   {:?}", config.creation_timeout);
    println!("teardown timeout:   {:?}", config.teardown_timeout);
    match config.extension_to_install() {
        Some(extension) => println!("extension:          {} ({})", extension.label, extension.image),
        None => println!("extension:          not installed"),
    }
    println!(
        "CLI tool:           {} ({})",
        config.cli_tool,
        if config.installs_cli_tool() {
            "installed by the scenario"
        } else {
            "expected to be present"
        }
    );
}

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// UI-automation driver executable that performs the host application operations
    #[arg(
        long,
        global = true,
        env = "E2E_HOST_DRIVER",
        default_value = "podman-desktop-e2e-driver"
    )]
    host_driver: std::path::PathBuf,

    /// Argument passed to the host driver before the operation name, e.g. a
    /// script path when the driver is an interpreter
    #[arg(long = "host-driver-arg", global = true, allow_hyphen_values = true)]
    host_driver_args: Vec<String>,

    /// Name of the cluster, its node and its resource entry
    #[arg(long, global = true)]
    cluster_name: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    #[clap(about = "Provision the cluster, assert it is healthy and tear everything down")]
    Run {
        /// Write a JSON report to this path
        #[arg(long)]
        report: Option<std::path::PathBuf>,
    },
    #[clap(about = "Print the resolved configuration and provisioning strategy")]
    ShowConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn host_driver_args_are_passed_in_order() {
        let cli = Cli::try_parse_from([
            "minikube-e2e",
            "--host-driver",
            "node",
            "--host-driver-arg",
            "driver.js",
            "--host-driver-arg",
            "--headless",
            "run",
        ])
        .unwrap();

        assert_eq!(cli.host_driver, std::path::PathBuf::from("node"));
        assert_eq!(cli.host_driver_args, ["driver.js", "--headless"]);
        assert!(matches!(cli.command, Some(Command::Run { report: None })));
    }
}

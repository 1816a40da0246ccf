mod config;
mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{Args as ClapArgs, Parser, Subcommand};

use kubedeck_k8s::KnownKind;
use kubedeck_query::{Hooks, LogQuery, NamespaceSelector, OperatorInput, QueryState, ResourceKind};

/// Kubedeck - typed, cached access to a Kubernetes cluster and its operators
#[derive(Parser, Debug)]
#[command(name = "kubedeck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (TOML); defaults are used when it does not exist
    #[arg(long, env = "KUBEDECK_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Namespace to operate in (`_all` for every namespace)
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Operate across all namespaces
    #[arg(short = 'A', long, global = true, conflicts_with = "namespace")]
    all_namespaces: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List resources of a kind, or show one as JSON
    Get {
        /// Kind, plural or short name, e.g. `configmaps`, `cm`, `ds`
        kind: String,
        name: Option<String>,
    },

    /// Delete a resource by name
    Delete { kind: String, name: String },

    /// Print the logs of a pod
    Logs {
        pod: String,

        /// Only the last N lines
        #[arg(long, value_name = "N")]
        tail: Option<i64>,

        #[arg(short, long)]
        container: Option<String>,
    },

    /// List operators and their phase
    Operators,

    /// Install an operator
    Install(LifecycleArgs),

    /// Uninstall an operator
    Uninstall(LifecycleArgs),

    /// Show cluster health
    Health,

    /// Print a resource list every time it refreshes
    Watch {
        kind: String,

        /// Stop after N refreshes (0 runs until interrupted)
        #[arg(long, default_value = "0")]
        count: usize,

        /// Seconds between refreshes
        #[arg(long, default_value = "5")]
        interval: u64,
    },
}

#[derive(ClapArgs, Debug)]
struct LifecycleArgs {
    name: String,

    /// Wait for the operator to settle
    #[arg(long)]
    wait: bool,

    /// How long the service waits when --wait is set
    #[arg(long, value_name = "MS", requires = "wait")]
    timeout_ms: Option<u64>,
}

impl LifecycleArgs {
    fn input(&self) -> OperatorInput {
        let input = OperatorInput::from(self.name.as_str());
        if self.wait {
            input.wait(self.timeout_ms)
        } else {
            input
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn cli_namespace(args: &Args) -> Result<Option<NamespaceSelector>> {
    if args.all_namespaces {
        return Ok(Some(NamespaceSelector::AllNamespaces));
    }
    args.namespace
        .as_deref()
        .map(|ns| {
            ns.parse::<NamespaceSelector>()
                .with_context(|| format!("Invalid namespace '{}'", ns))
        })
        .transpose()
}

fn find_kind(name: &str) -> Result<ResourceKind> {
    KnownKind::find(name)
        .map(|known| known.kind)
        .with_context(|| format!("Unknown resource kind '{}'", name))
}

/// Data of a settled query, or its error
fn into_result<T>(state: QueryState<T>) -> Result<Arc<T>> {
    match (state.data, state.error) {
        (Some(data), _) => Ok(data),
        (None, Some(err)) => Err(anyhow::Error::from(err)),
        (None, None) => Err(anyhow!("no data received")),
    }
}

async fn run(args: Args) -> Result<()> {
    let config = config::load(args.config.as_deref())?;
    let preferred = config::preferred_namespace(&config, cli_namespace(&args)?)?;
    let hooks = Hooks::from_config(&config, preferred).context("Failed to set up the API client")?;

    match args.command {
        Command::Get { kind, name } => {
            let kind = find_kind(&kind)?;
            match name {
                Some(name) => {
                    let mut query = hooks.get_kind(kind, &name, None);
                    let object = into_result(query.settled().await)?;
                    println!("{}", serde_json::to_string_pretty(&*object)?);
                }
                None => {
                    let mut query = hooks.list_kind(kind, None);
                    let list = into_result(query.settled().await)?;
                    print!("{}", render::resource_table(&list, show_namespace(&hooks, &kind), Utc::now()));
                }
            }
        }

        Command::Delete { kind, name } => {
            let kind = find_kind(&kind)?;
            hooks
                .delete_kind(kind)
                .mutate(name.as_str())
                .await
                .map_err(anyhow::Error::from)?;
            println!("{} \"{}\" deleted", kind.kind.to_lowercase(), name);
        }

        Command::Logs { pod, tail, container } => {
            let query = LogQuery {
                tail_lines: tail,
                container,
                ..Default::default()
            };
            let mut logs = hooks.pod_logs(&pod, None, query);
            print!("{}", into_result(logs.settled().await)?);
        }

        Command::Operators => {
            let mut query = hooks.operators();
            let list = into_result(query.settled().await)?;
            print!("{}", render::operator_table(&list));
        }

        Command::Install(lifecycle) => {
            let op = hooks
                .install_operator()
                .mutate(lifecycle.input())
                .await
                .map_err(anyhow::Error::from)?;
            println!("operator {}: {}", op.name, op.phase);
        }

        Command::Uninstall(lifecycle) => {
            let op = hooks
                .uninstall_operator()
                .mutate(lifecycle.input())
                .await
                .map_err(anyhow::Error::from)?;
            println!("operator {}: {}", op.name, op.phase);
        }

        Command::Health => {
            let mut query = hooks.cluster_health();
            let health = into_result(query.settled().await)?;
            print!("{}", render::health_report(&health));
        }

        Command::Watch { kind, count, interval } => {
            let kind = find_kind(&kind)?;
            watch(&hooks, kind, count, Duration::from_secs(interval.max(1))).await?;
        }
    }

    Ok(())
}

fn show_namespace(hooks: &Hooks, kind: &ResourceKind) -> bool {
    kind.namespaced && hooks.context().preferred_namespace().is_all()
}

async fn watch(hooks: &Hooks, kind: ResourceKind, count: usize, interval: Duration) -> Result<()> {
    let mut query = hooks.list_kind(kind, None);
    let mut shown = 0;

    loop {
        let state = query.settled().await;
        match into_result(state) {
            Ok(list) => print!("{}", render::resource_table(&list, show_namespace(hooks, &kind), Utc::now())),
            Err(e) => eprintln!("Error: {:#}", e),
        }
        println!();

        shown += 1;
        if count > 0 && shown >= count {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = tokio::time::sleep(interval) => query.refetch(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_flags() {
        let args = Args::parse_from(["kubedeck", "-A", "get", "pods"]);
        assert_eq!(cli_namespace(&args).unwrap(), Some(NamespaceSelector::AllNamespaces));

        let args = Args::parse_from(["kubedeck", "get", "cm", "-n", "kube-system"]);
        assert_eq!(
            cli_namespace(&args).unwrap(),
            Some(NamespaceSelector::Named("kube-system".to_string()))
        );

        let args = Args::parse_from(["kubedeck", "-n", "Bad_Name", "operators"]);
        assert!(cli_namespace(&args).is_err());

        assert!(Args::try_parse_from(["kubedeck", "-A", "-n", "default", "health"]).is_err());
    }

    #[test]
    fn test_lifecycle_input() {
        let args = Args::parse_from(["kubedeck", "install", "cert-manager", "--wait", "--timeout-ms", "60000"]);
        let Command::Install(lifecycle) = args.command else {
            panic!("expected install");
        };
        let input = lifecycle.input();
        assert_eq!(input.name, "cert-manager");
        assert_eq!(input.query.wait, Some(true));
        assert_eq!(input.query.timeout_ms, Some(60_000));

        assert!(Args::try_parse_from(["kubedeck", "uninstall", "istio", "--timeout-ms", "5"]).is_err());
    }

    #[test]
    fn test_find_kind_by_short_name() {
        assert_eq!(find_kind("ds").unwrap().kind, "DaemonSet");
        assert_eq!(find_kind("configmaps").unwrap().plural, "configmaps");
        assert!(find_kind("widgets").is_err());
    }
}

use crate::dispatcher::RestDispatcher;
use crate::echo::EchoProcess;
use crate::registry::{ComponentRegistry, ProcessKind};
use crate::routing::{load_routing_config, RoutingTable, Trigger};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Command-line interface for procdispatch
///
/// Inspects routing configuration and exercises the REST dispatcher against it.
#[derive(Debug, Parser)]
#[command(name = "procdispatch")]
#[command(about = "Process dispatch core CLI", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print every routing rule and the queue listen set
    Routes {
        /// Routing configuration file (YAML or JSON)
        #[arg(short, long, env = "PROCDISPATCH_ROUTING_CONFIG")]
        config: PathBuf,
    },
    /// Resolve a REST request to a process name
    Match {
        /// Routing configuration file (YAML or JSON)
        #[arg(short, long, env = "PROCDISPATCH_ROUTING_CONFIG")]
        config: PathBuf,

        /// HTTP method, case-insensitive
        #[arg(short, long)]
        method: String,

        /// Request path
        #[arg(short, long)]
        path: String,
    },
    /// Resolve a queue name to a process and reply queue
    Queue {
        /// Routing configuration file (YAML or JSON)
        #[arg(short, long, env = "PROCDISPATCH_ROUTING_CONFIG")]
        config: PathBuf,

        /// Queue name
        #[arg(short, long)]
        queue: String,
    },
    /// Dispatch a REST request with every configured process bound to an echo process
    Dispatch {
        /// Routing configuration file (YAML or JSON)
        #[arg(short, long, env = "PROCDISPATCH_ROUTING_CONFIG")]
        config: PathBuf,

        /// HTTP method, case-insensitive
        #[arg(short, long)]
        method: String,

        /// Request path
        #[arg(short, long)]
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
    },
}

/// How a command finished when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// The request resolved to nothing.
    NoMatch,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Ok => ExitCode::SUCCESS,
            Outcome::NoMatch => ExitCode::from(1),
        }
    }
}

fn load(config: &Path) -> anyhow::Result<RoutingTable> {
    load_routing_config(config)
        .with_context(|| format!("failed to load routing config {}", config.display()))
}

/// Run `cli`, writing results to `out`.
///
/// # Errors
///
/// Configuration errors, malformed `--body` JSON, process failures and
/// write errors.
pub fn run_cli(cli: &Cli, out: &mut dyn Write) -> anyhow::Result<Outcome> {
    match &cli.command {
        Commands::Routes { config } => {
            let table = load(config)?;
            for line in table.route_summaries() {
                writeln!(out, "{line}")?;
            }
            let queues: Vec<&str> = table.listen_queues().iter().map(String::as_str).collect();
            writeln!(out, "listen: [{}]", queues.join(", "))?;
            Ok(Outcome::Ok)
        }
        Commands::Match {
            config,
            method,
            path,
        } => {
            let table = load(config)?;
            match table.match_rest(path, method) {
                Some(process) => {
                    writeln!(out, "{process}")?;
                    Ok(Outcome::Ok)
                }
                None => {
                    writeln!(out, "no route for {} {path}", method.to_uppercase())?;
                    Ok(Outcome::NoMatch)
                }
            }
        }
        Commands::Queue { config, queue } => {
            let table = load(config)?;
            match table.match_queue_route(queue) {
                Some(route) => {
                    match route.reply_queue {
                        Some(reply) => writeln!(out, "{} (reply: {reply})", route.process_name)?,
                        None => writeln!(out, "{}", route.process_name)?,
                    }
                    Ok(Outcome::Ok)
                }
                None => {
                    writeln!(out, "no route for queue {queue}")?;
                    Ok(Outcome::NoMatch)
                }
            }
        }
        Commands::Dispatch {
            config,
            method,
            path,
            body,
        } => {
            let table = load(config)?;
            let body = body
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("--body is not valid JSON")?;
            let registry = echo_registry(&table)?;
            let dispatcher = RestDispatcher::new(Arc::new(table), Arc::new(registry));
            let response = dispatcher.handle(path, method, body)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
            Ok(if response.is_not_found() {
                Outcome::NoMatch
            } else {
                Outcome::Ok
            })
        }
    }
}

/// A registry with every process name in `table` bound to [`EchoProcess`].
fn echo_registry(table: &RoutingTable) -> anyhow::Result<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    for rule in table.rules() {
        let has_rest = rule
            .triggers
            .iter()
            .any(|t| matches!(t, Trigger::Rest { .. }));
        if has_rest && !registry.contains(&rule.process_name) {
            registry.register(
                &rule.process_name,
                Arc::new(EchoProcess),
                ProcessKind::DomainLogic,
                None,
            )?;
        }
    }
    Ok(registry)
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use std::collections::HashMap;

use flowrun_rs::engine::ExecutionStatus;
use flowrun_rs::graph::codec;
use flowrun_rs::FlowEngine;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a flow file
    Run {
        /// Path to the flow file
        #[arg(short, long)]
        file: String,

        /// Initial variables as key=value pairs (values parsed as JSON when possible)
        #[arg(short = 'v', long = "var")]
        vars: Vec<String>,

        /// Suppress per-event output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Parse and validate a flow file
    Check {
        /// Path to the flow file
        #[arg(short, long)]
        file: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Run { file, vars, quiet } => {
            let graph = codec::load(&file).with_context(|| format!("loading {}", file))?;
            let initial = parse_vars(&vars)?;

            let engine = FlowEngine::new();
            let subscription = if quiet {
                None
            } else {
                Some(engine.on_event(|event| {
                    println!(
                        "[{}] {:<13} {}",
                        event.timestamp.format("%H:%M:%S%.3f"),
                        event.kind,
                        event.node_id.as_deref().unwrap_or("-")
                    );
                }))
            };

            let state = engine.execute(&graph, initial).await;
            if let Some(subscription) = subscription {
                subscription.unsubscribe();
            }

            println!("{}", serde_json::to_string_pretty(&state)?);
            if state.status == ExecutionStatus::Error {
                std::process::exit(1);
            }
        }
        Commands::Check { file } => {
            let graph = codec::load(&file).with_context(|| format!("loading {}", file))?;
            println!(
                "{}: {} nodes, {} edges, {} variables - ok",
                graph.name,
                graph.nodes.len(),
                graph.edges.len(),
                graph.variables.len()
            );
        }
    }

    Ok(())
}

fn parse_vars(pairs: &[String]) -> anyhow::Result<HashMap<String, Value>> {
    let mut vars = HashMap::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("expected key=value, got '{}'", pair))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        vars.insert(key.to_string(), value);
    }
    Ok(vars)
}

//! meshdesk: operator console over a watchable store.
//! Projects collections from a store dump, searches them with a bounded
//! deadline, repairs single records and renders the relationship graph.

use clap::Parser;

mod cli;
mod cmd_find;
mod cmd_graph;
mod cmd_snapshot;
mod cmd_store;
mod config;
mod context;

fn init_logging() {
    let filter = std::env::var("MESHDESK_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    init_logging();

    let config = config::Config::load(args.config.as_deref())?;
    let store = context::open_store(&args.data)?;

    match args.command {
        cli::Command::Snapshot(opts) => {
            let out = cmd_snapshot::cmd_snapshot(&store, &config, &opts.types)?;
            print_json(&out)?;
        }
        cli::Command::Find(opts) => {
            let exit_code = cmd_find::cmd_find(&store, &config, &opts).await;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        cli::Command::Graph(opts) => {
            let out = cmd_graph::cmd_graph(&store, &config, &opts)?;
            print_json(&out)?;
        }
        cli::Command::Get(opts) => match cmd_store::cmd_get(&store, &opts)? {
            Some(value) => print_json(&value)?,
            None => {
                eprintln!("{}/{} not found", opts.collection, opts.id);
                std::process::exit(1);
            }
        },
        cli::Command::Put(opts) => {
            let path = cmd_store::cmd_put(&store, &opts, &args.data)?;
            println!("{path}");
        }
    }

    Ok(())
}

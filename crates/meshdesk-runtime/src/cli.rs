//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "meshdesk", about = "Inspect, repair and graph a watchable store")]
pub struct Cli {
    /// Store dump to operate on (collection → id → value JSON)
    #[arg(long, short = 'd', global = true, env = "MESHDESK_DATA", default_value = "meshdesk.json")]
    pub data: PathBuf,

    /// Config file (TOML); defaults apply when omitted
    #[arg(long, short = 'c', global = true, env = "MESHDESK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print a snapshot of every projected entity type (JSON)
    Snapshot(SnapshotOpts),
    /// Wait for a record whose field matches a value
    Find(FindOpts),
    /// Derive the relationship graph and print the renderer model (JSON)
    Graph(GraphOpts),
    /// Read one record
    Get(GetOpts),
    /// Write or tombstone one record and save the dump
    Put(PutOpts),
}

#[derive(clap::Args, Default)]
pub struct SnapshotOpts {
    /// Entity types to project (comma-separated; default from config)
    #[arg(long, value_delimiter = ',')]
    pub types: Vec<String>,
}

#[derive(clap::Args)]
pub struct FindOpts {
    /// Entity type to search
    #[arg(long = "type", short = 't', default_value = "users")]
    pub entity_type: String,

    /// Field to compare (email compares case-insensitively)
    #[arg(long, short = 'f', default_value = "email")]
    pub field: String,

    /// Value to look for
    #[arg(long, short = 'v')]
    pub value: String,

    /// Give up after this many milliseconds (default from config)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Suppress progress output on stderr
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(clap::Args, Default)]
pub struct GraphOpts {
    /// Renderer whose native model is printed (default from config)
    #[arg(long, short = 'r')]
    pub renderer: Option<RendererKind>,

    /// Use the hierarchical layout (cytoscape only)
    #[arg(long)]
    pub hierarchical: bool,

    /// Entity types to include (comma-separated; default from config)
    #[arg(long, value_delimiter = ',')]
    pub types: Vec<String>,
}

#[derive(clap::Args)]
pub struct GetOpts {
    pub collection: String,
    pub id: String,
}

#[derive(clap::Args)]
pub struct PutOpts {
    pub collection: String,
    pub id: String,

    /// New value as JSON
    #[arg(required_unless_present = "tombstone")]
    pub json: Option<String>,

    /// Delete the record instead of writing a value
    #[arg(long, conflicts_with = "json")]
    pub tombstone: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RendererKind {
    #[default]
    Cytoscape,
    ForceGraph,
}

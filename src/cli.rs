use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Parser)]
#[command(name = "stashd", about = "Caching HTTP file server")]
pub struct Cli {
    /// Port to listen on for HTTP requests.
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Number of bytes the cache may hold.
    #[arg(short = 'c', long)]
    pub capacity: Option<u64>,

    /// Seconds to wait for a backing read before answering with a timeout.
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Directory the served files live in.
    #[arg(short = 'd', long)]
    pub document_root: Option<PathBuf>,

    /// Log debugging messages.
    #[arg(short = 'l', long)]
    pub debug: bool,

    /// Path to an optional configuration file (defaults to ./stashd.toml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
    }
}

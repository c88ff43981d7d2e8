//! Command-line entry point: `clap` derive matching the teacher's pattern
//! of one flat struct over `ServerConfig`'s on-disk/CLI split.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "mnemo-server", about = "Tiered memory service over a WebSocket control channel")]
pub struct Cli {
    /// Path to `config.json`. Created with defaults if missing.
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Path to the `.env` file carrying `OPENAI_API_KEY` and overrides.
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// Dump every collection to `dump.json` and exit without serving.
    #[arg(long)]
    pub dump: bool,

    /// Enable debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,
}

//! CLI entry point for bnd-luajit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

/// bnd-luajit: generate LuaJIT FFI bindings from C/C++ headers.
#[derive(Parser, Debug)]
#[command(name = "bnd-luajit", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the cdef interface, Lua wrapper and host shim for a header.
    Generate {
        /// Header to bind.
        header: PathBuf,

        /// Path to a bnd-luajit.toml configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory (overrides config).
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bnd_luajit=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate {
            header,
            config,
            out_dir,
        } => {
            let cfg = match &config {
                Some(path) => bnd_luajit::config::load_config(path)
                    .with_context(|| format!("loading config from {}", path.display()))?,
                None => bnd_luajit::config::Config::default(),
            };
            bnd_luajit::run(&header, &cfg, out_dir.as_deref())?;
        }
    }
    Ok(())
}

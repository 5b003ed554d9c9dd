// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kestrel - question answering over visual inspection data.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod runtime;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use kestrel_config::KestrelConfig;
use kestrel_core::KestrelError;
use tracing_subscriber::EnvFilter;

use crate::runtime::Runtime;

/// Records indexed before a vector-search query when no limit is given.
const DEFAULT_INDEX_LIMIT: usize = 500;

/// Kestrel - question answering over visual inspection data.
#[derive(Parser, Debug)]
#[command(name = "kestrel", version, about, long_about = None)]
struct Cli {
    /// Configuration file; defaults to the XDG lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for Kestrel crates (overrides `engine.log_level`).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one question and exit.
    Ask {
        text: String,
        /// Ignore conversation context and long-term memory.
        #[arg(long)]
        no_context: bool,
        /// Skip grading the answer.
        #[arg(long)]
        no_reflection: bool,
        /// Add similar records from the semantic index.
        #[arg(long)]
        vector_search: bool,
    },
    /// Launch an interactive session.
    Shell {
        #[arg(long)]
        vector_search: bool,
    },
    /// Manage long-term memory.
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },
    /// Index recent records for vector search and print index statistics.
    Index {
        #[arg(long, default_value_t = DEFAULT_INDEX_LIMIT)]
        limit: usize,
    },
    /// Manage Kestrel configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum MemoryCommand {
    /// Write long-term memory to a file (default: the snapshot path).
    Save { path: Option<PathBuf> },
    /// Replace long-term memory with a file's contents.
    Load { path: PathBuf },
    /// Forget every insight, pattern and summary.
    Clear,
    /// Print long-term memory statistics.
    Stats,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration and exit.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => kestrel_config::load_and_validate_path(path),
        None => kestrel_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            kestrel_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(cli.log_level.as_deref().unwrap_or(&config.engine.log_level));

    if let Err(e) = run(cli.command, config).await {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kestrel={level},warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Option<Commands>, config: KestrelConfig) -> Result<(), KestrelError> {
    match command {
        Some(Commands::Config {
            action: ConfigCommand::Check,
        }) => {
            println!(
                "{} (model={}, mode={:?})",
                "config ok".green(),
                config.ollama.model,
                config.engine.mode
            );
            Ok(())
        }
        Some(Commands::Ask {
            text,
            no_context,
            no_reflection,
            vector_search,
        }) => {
            let mut runtime = Runtime::start(&config).await?;
            if vector_search {
                runtime.index_recent(DEFAULT_INDEX_LIMIT).await?;
            }
            let answer = runtime
                .session
                .process_query(&text, !no_context, !no_reflection, vector_search)
                .await;
            println!("{answer}");
            runtime.save_snapshot().await;
            Ok(())
        }
        Some(Commands::Shell { vector_search }) => {
            let mut runtime = Runtime::start(&config).await?;
            shell::run_shell(&mut runtime, vector_search).await
        }
        None => {
            let mut runtime = Runtime::start(&config).await?;
            shell::run_shell(&mut runtime, false).await
        }
        Some(Commands::Memory { action }) => {
            let mut runtime = Runtime::start(&config).await?;
            match action {
                MemoryCommand::Save { path } => {
                    let path = path.unwrap_or_else(|| runtime.snapshot_path().to_path_buf());
                    runtime.session.save_memories(&path).await?;
                    println!("memories saved to {}", path.display());
                }
                MemoryCommand::Load { path } => {
                    runtime.session.load_memories(&path).await?;
                    runtime.save_snapshot().await;
                    println!("memories loaded from {}", path.display());
                }
                MemoryCommand::Clear => {
                    runtime.session.clear_long_term_memory().await;
                    runtime.save_snapshot().await;
                    println!("long-term memory cleared");
                }
                MemoryCommand::Stats => {
                    let stats = runtime.session.engine_stats().await;
                    print_json(&stats.long_term)?;
                }
            }
            Ok(())
        }
        Some(Commands::Index { limit }) => {
            let runtime = Runtime::start(&config).await?;
            let indexed = runtime.index_recent(limit).await?;
            println!("indexed {indexed} records");
            print_json(&runtime.session.engine_stats().await.index)
        }
    }
}

pub(crate) fn print_json(value: &impl serde::Serialize) -> Result<(), KestrelError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| KestrelError::Internal(format!("failed to encode stats: {e}")))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_flags_parse() {
        let cli = Cli::try_parse_from([
            "kestrel",
            "--log-level",
            "debug",
            "ask",
            "how many inspections today",
            "--no-reflection",
            "--vector-search",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Some(Commands::Ask {
                text,
                no_context,
                no_reflection,
                vector_search,
            }) => {
                assert_eq!(text, "how many inspections today");
                assert!(!no_context);
                assert!(no_reflection);
                assert!(vector_search);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn index_limit_defaults() {
        let cli = Cli::try_parse_from(["kestrel", "index"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Index {
                limit: DEFAULT_INDEX_LIMIT
            })
        ));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = kestrel_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.reasoning.max_steps, 5);
    }
}

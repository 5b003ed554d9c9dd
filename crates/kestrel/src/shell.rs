// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kestrel shell` command implementation.
//!
//! An interactive REPL with a colored prompt and readline history. Every
//! line that is not a slash command is answered with context and
//! reflection on, and the memory snapshot is saved after each answer.

use std::path::PathBuf;

use colored::Colorize;
use kestrel_core::KestrelError;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::runtime::Runtime;

/// Records indexed when the shell starts with vector search on.
const SHELL_INDEX_LIMIT: usize = 500;

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Quit,
    Clear,
    Forget,
    Save(Option<PathBuf>),
    Load(PathBuf),
    Stats,
    Help,
    Unknown(String),
}

/// Parses a slash command. Plain questions return `None`.
fn parse_command(line: &str) -> Option<ShellCommand> {
    let rest = line.strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let path = (!arg.is_empty()).then(|| PathBuf::from(arg));
    Some(match name {
        "quit" | "exit" => ShellCommand::Quit,
        "clear" => ShellCommand::Clear,
        "forget" => ShellCommand::Forget,
        "save" => ShellCommand::Save(path),
        "load" => match path {
            Some(path) => ShellCommand::Load(path),
            None => ShellCommand::Unknown("/load needs a path".into()),
        },
        "stats" => ShellCommand::Stats,
        "help" => ShellCommand::Help,
        other => ShellCommand::Unknown(format!("unknown command /{other}")),
    })
}

fn print_help() {
    println!("  {}          clear the conversation context", "/clear".yellow());
    println!("  {}         forget long-term memory", "/forget".yellow());
    println!("  {}   save long-term memory", "/save [path]".yellow());
    println!("  {}    load long-term memory", "/load <path>".yellow());
    println!("  {}          show engine statistics", "/stats".yellow());
    println!("  {}           leave the shell", "/quit".yellow());
}

/// Runs the `kestrel shell` interactive REPL.
pub async fn run_shell(runtime: &mut Runtime, vector_search: bool) -> Result<(), KestrelError> {
    if vector_search {
        runtime.index_recent(SHELL_INDEX_LIMIT).await?;
    }

    let mut rl = DefaultEditor::new()
        .map_err(|e| KestrelError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "kestrel shell".bold().green());
    println!("Type {} for commands, {} to exit.\n", "/help".yellow(), "/quit".yellow());

    let prompt = format!("{}> ", "kestrel".green());
    loop {
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(trimmed);

        match parse_command(trimmed) {
            None => {
                let answer = runtime
                    .session
                    .process_query(trimmed, true, true, vector_search)
                    .await;
                println!("\n{answer}\n");
                runtime.save_snapshot().await;
            }
            Some(ShellCommand::Quit) => break,
            Some(ShellCommand::Clear) => {
                runtime.session.clear_context();
                println!("{}", "context cleared".dimmed());
            }
            Some(ShellCommand::Forget) => {
                runtime.session.clear_long_term_memory().await;
                runtime.save_snapshot().await;
                println!("{}", "long-term memory cleared".dimmed());
            }
            Some(ShellCommand::Save(path)) => {
                let path = path.unwrap_or_else(|| runtime.snapshot_path().to_path_buf());
                match runtime.session.save_memories(&path).await {
                    Ok(()) => println!("{}", format!("saved to {}", path.display()).dimmed()),
                    Err(e) => eprintln!("{}: {e}", "error".red()),
                }
            }
            Some(ShellCommand::Load(path)) => match runtime.session.load_memories(&path).await {
                Ok(()) => println!("{}", format!("loaded {}", path.display()).dimmed()),
                Err(e) => eprintln!("{}: {e}", "error".red()),
            },
            Some(ShellCommand::Stats) => {
                let stats = runtime.session.engine_stats().await;
                if let Err(e) = crate::print_json(&stats) {
                    eprintln!("{}: {e}", "error".red());
                }
            }
            Some(ShellCommand::Help) => print_help(),
            Some(ShellCommand::Unknown(message)) => eprintln!("{}", message.yellow()),
        }
    }

    runtime.session.wait_for_summarization().await;
    runtime.save_snapshot().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_questions_are_not_commands() {
        assert_eq!(parse_command("how many inspections today"), None);
    }

    #[test]
    fn commands_parse_with_arguments() {
        assert_eq!(parse_command("/quit"), Some(ShellCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ShellCommand::Quit));
        assert_eq!(parse_command("/save"), Some(ShellCommand::Save(None)));
        assert_eq!(
            parse_command("/save  /tmp/m.json "),
            Some(ShellCommand::Save(Some(PathBuf::from("/tmp/m.json"))))
        );
        assert_eq!(
            parse_command("/load m.json"),
            Some(ShellCommand::Load(PathBuf::from("m.json")))
        );
        assert!(matches!(parse_command("/load"), Some(ShellCommand::Unknown(_))));
        assert!(matches!(parse_command("/teleport"), Some(ShellCommand::Unknown(_))));
    }
}

//! tenet - command-line interface
//!
//! Loads a program file, runs the rule cycle to a fixed point, and
//! optionally drops into the interactive shell.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use tenet::chat::ChatClient;
use tenet::config::TenetConfig;
use tenet::engine::Engine;
use tenet::resolve::{strategy_by_prefix, STRATEGY_NAMES};
use tenet::shell::run_shell;

#[derive(Parser)]
#[command(name = "tenet")]
#[command(version = "0.1.0")]
#[command(about = "Truth-maintained production-rule reasoner", long_about = None)]
struct Cli {
    /// Program file to load
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Conflict-resolution strategy (prefix-matched: first-match, stratified-manual)
    #[arg(short, long, value_name = "NAME")]
    strategy: Option<String>,

    /// Enable schema validation
    #[arg(short = 'c', long = "schema-check")]
    schema_check: bool,

    /// Drop into the interactive shell after loading
    #[arg(short, long)]
    interactive: bool,

    /// Trace rule firings to stderr
    #[arg(short, long)]
    trace: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(file) = cli.file else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = TenetConfig::load().unwrap_or_else(|err| {
        eprintln!("tenet: warning: {}; using default configuration", err.message);
        TenetConfig::default()
    });

    let mut engine = Engine::new();
    engine.set_max_cycles(config.reasoning.max_cycles);
    engine.set_trace(cli.trace || config.general.trace);
    if cli.schema_check || config.reasoning.schema_check {
        engine.schema.set_enabled(true);
    }

    let strategy_name = cli
        .strategy
        .as_deref()
        .unwrap_or(&config.reasoning.strategy);
    match strategy_by_prefix(strategy_name) {
        Some(strategy) => engine.set_strategy(strategy),
        None => eprintln!(
            "tenet: warning: unknown strategy `{}`; falling back to first-match \
             (known: {})",
            strategy_name,
            STRATEGY_NAMES.join(", ")
        ),
    }

    let source = fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    if let Err(err) = engine.load_str(&source) {
        eprintln!("tenet: {}", err);
        std::process::exit(1);
    }

    let outcome = engine.run();
    engine.defuzzify_and_cascade();
    if cli.trace {
        eprintln!(
            "tenet: {} cycles, {}",
            outcome.cycles,
            if outcome.converged {
                "fixed point reached"
            } else {
                "stopped at the cycle limit"
            }
        );
    }

    if cli.interactive {
        let chat = ChatClient::from_env(config.chat_config());
        run_shell(&mut engine, chat)?;
    }

    Ok(())
}

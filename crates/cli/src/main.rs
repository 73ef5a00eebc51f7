//! deckrun binary.
//!
//! Validates deck files and runs their fragments against an interpreter
//! process.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "deckrun")]
#[command(about = "Run hierarchical code fragments from slide decks")]
struct Args {
	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Build a deck's fragment forest and report what it contains
	Check {
		/// Deck file
		deck: PathBuf,
	},
	/// Print a deck's fragments as an indented tree
	Tree {
		/// Deck file
		deck: PathBuf,
	},
	/// Run a fragment together with its ancestors
	Run {
		/// Deck file
		deck: PathBuf,
		/// Fragment identity, or `#<entry index>`
		target: String,
		/// Interpreter program, overriding the deck's `[interpreter]` table
		#[arg(long, value_name = "CMD")]
		interpreter: Option<String>,
		/// Interpreter argument, overriding the deck's (repeatable)
		#[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
		args: Vec<String>,
	},
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	match args.command {
		Command::Check { deck } => commands::check(&deck),
		Command::Tree { deck } => commands::tree(&deck),
		Command::Run {
			deck,
			target,
			interpreter,
			args,
		} => commands::run(&deck, &target, interpreter, args).await,
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = if verbose {
		EnvFilter::new("debug")
	} else {
		EnvFilter::try_from_env("DECKRUN_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
	};

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

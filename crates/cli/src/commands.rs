//! Subcommand implementations.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use deckrun_core::{ExecutionChannel, Fragment, OutputChange};
use deckrun_deck::{Deck, LoadedDeck};
use deckrun_host::{Interpreter, InterpreterConfig};

const SUMMARY_WIDTH: usize = 48;

pub fn check(path: &Path) -> Result<()> {
	let loaded = load(path)?;
	let forest = loaded.forest();
	println!(
		"{}: {} fragments, {} roots, {} entries",
		path.display(),
		forest.len(),
		forest.roots().count(),
		loaded.entries().len()
	);
	Ok(())
}

pub fn tree(path: &Path) -> Result<()> {
	let loaded = load(path)?;
	print!("{}", render_tree(&loaded));
	Ok(())
}

pub async fn run(path: &Path, target: &str, interpreter: Option<String>, args: Vec<String>) -> Result<()> {
	let deck = Deck::load(path)?;
	let loaded = deck.build().with_context(|| format!("invalid deck {}", path.display()))?;
	let fragment = loaded
		.resolve(target)
		.with_context(|| format!("no fragment matches '{target}'"))?;
	let config = interpreter_config(&deck, interpreter, args)?;

	let Interpreter { mut child, link } = deckrun_host::spawn(&config)?;
	let channel = ExecutionChannel::spawn(link);

	let chain = fragment.chain();
	for member in &chain {
		member.stdout().subscribe(|change| {
			if let OutputChange::Appended(text) = change {
				let mut stdout = std::io::stdout().lock();
				let _ = stdout.write_all(text.as_bytes());
				let _ = stdout.flush();
			}
		});
		member.stderr().subscribe(|change| {
			if let OutputChange::Appended(text) = change {
				let _ = std::io::stderr().write_all(text.as_bytes());
			}
		});
	}

	let result = fragment.execute(&channel).await;

	let mut failed = 0;
	for member in &chain {
		if let Some(error) = member.last_error() {
			eprintln!("error in {}: {error}", member.label());
			failed += 1;
		}
	}
	if let Err(e) = child.start_kill() {
		tracing::debug!(error = %e, "interpreter already exited");
	}

	result.with_context(|| format!("running {} failed", fragment.label()))?;
	// A fragment can fail while its session still settles successfully.
	if failed > 0 {
		bail!("running {} failed: {failed} fragment(s) raised", fragment.label());
	}
	Ok(())
}

fn load(path: &Path) -> Result<LoadedDeck> {
	Deck::load(path)?
		.build()
		.with_context(|| format!("invalid deck {}", path.display()))
}

/// Combines the deck's `[interpreter]` table with command line overrides.
///
/// `--interpreter` replaces the command and drops the deck's arguments;
/// `--arg` replaces the arguments. Environment and working directory always
/// come from the deck, the latter relative to the deck file.
pub(crate) fn interpreter_config(deck: &Deck, command: Option<String>, args: Vec<String>) -> Result<InterpreterConfig> {
	let section = deck.interpreter.as_ref();
	let overridden = command.is_some();
	let command = command
		.or_else(|| section.map(|s| s.command.clone()))
		.filter(|c| !c.is_empty())
		.context("no interpreter configured: add an [interpreter] table to the deck or pass --interpreter")?;

	let mut config = InterpreterConfig::new(command);
	if let Some(section) = section {
		if !overridden {
			config = config.args(section.args.iter().cloned());
		}
		config = config.env(section.env.clone());
		if let Some(cwd) = &section.cwd {
			config = config.cwd(match &deck.base_dir {
				Some(base) => base.join(cwd),
				None => cwd.clone(),
			});
		}
	}
	if !args.is_empty() {
		config = config.args(args);
	}
	Ok(config)
}

/// Renders the forest roots first, children indented under their parent.
pub(crate) fn render_tree(loaded: &LoadedDeck) -> String {
	let mut out = String::new();
	for root in loaded.forest().roots() {
		render_node(loaded, root, 0, &mut out);
	}
	out
}

fn render_node(loaded: &LoadedDeck, fragment: &Arc<Fragment>, depth: usize, out: &mut String) {
	let entry = loaded
		.entries()
		.iter()
		.position(|e| Arc::ptr_eq(e, fragment))
		.map_or_else(|| "?".to_owned(), |i| i.to_string());
	let _ = writeln!(
		out,
		"{:indent$}#{entry} {}  {}",
		"",
		fragment.label(),
		summary(&fragment.code()),
		indent = depth * 2
	);
	for child in loaded.forest().children(fragment) {
		render_node(loaded, child, depth + 1, out);
	}
}

fn summary(code: &str) -> String {
	let line = code.lines().find(|l| !l.trim().is_empty()).unwrap_or_default().trim();
	if line.chars().count() <= SUMMARY_WIDTH {
		return line.to_owned();
	}
	let mut cut: String = line.chars().take(SUMMARY_WIDTH - 3).collect();
	cut.push_str("...");
	cut
}

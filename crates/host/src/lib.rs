//! Out-of-process interpreters for deckrun.
//!
//! [`spawn`] starts the configured program with piped stdio and hands back an
//! [`InterpreterLink`] speaking the framed protocol over its stdin and stdout.
//! The child's stderr is forwarded to `tracing`. [`connect`] does the same for
//! any other byte stream.

#![warn(missing_docs)]

mod config;
mod io;

use std::process::Stdio;

use deckrun_core::InterpreterLink;
use tokio::process::{Child, Command};

pub use config::InterpreterConfig;
pub use io::connect;

/// Errors starting an interpreter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The program could not be started.
	#[error("failed to spawn interpreter '{command}': {reason}")]
	Spawn {
		/// Program that failed to start.
		command: String,
		/// Underlying failure.
		reason: String,
	},
}

/// Result alias for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A running interpreter process.
///
/// The process is killed when this value, or the [`Child`] taken out of it, is
/// dropped.
#[derive(Debug)]
pub struct Interpreter {
	/// The child process handle.
	pub child: Child,
	/// Protocol connection over the child's stdin and stdout.
	pub link: InterpreterLink,
}

/// Starts the interpreter described by `config`.
///
/// Must be called within a tokio runtime; the I/O tasks are spawned onto it.
pub fn spawn(config: &InterpreterConfig) -> Result<Interpreter> {
	let spawn_error = |reason: String| Error::Spawn {
		command: config.command.clone(),
		reason,
	};

	let mut cmd = Command::new(&config.command);
	cmd.args(&config.args)
		.envs(&config.env)
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true);
	if let Some(cwd) = &config.cwd {
		cmd.current_dir(cwd);
	}

	tracing::info!(command = %config.command, args = ?config.args, "Starting interpreter");
	let mut child = cmd.spawn().map_err(|e| spawn_error(e.to_string()))?;

	let stdin = child.stdin.take().ok_or_else(|| spawn_error("failed to capture stdin".into()))?;
	let stdout = child.stdout.take().ok_or_else(|| spawn_error("failed to capture stdout".into()))?;
	if let Some(stderr) = child.stderr.take() {
		tokio::spawn(io::forward_stderr(stderr, config.command.clone()));
	}

	let link = connect(stdout, stdin);
	Ok(Interpreter { child, link })
}

//! Interpreter process configuration.

use std::collections::HashMap;
use std::path::PathBuf;

/// How to start an interpreter process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
	/// Program to run.
	pub command: String,
	/// Arguments passed to the program.
	pub args: Vec<String>,
	/// Extra environment variables.
	pub env: HashMap<String, String>,
	/// Working directory. Inherited when unset.
	pub cwd: Option<PathBuf>,
}

impl InterpreterConfig {
	/// Create a configuration running `command` without arguments.
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			args: Vec::new(),
			env: HashMap::new(),
			cwd: None,
		}
	}

	/// Replace the command line arguments.
	pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.args = args.into_iter().map(Into::into).collect();
		self
	}

	/// Append one argument.
	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}

	/// Replace the extra environment variables.
	pub fn env(mut self, env: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
		self.env = env.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
		self
	}

	/// Set the working directory.
	pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
		self.cwd = Some(cwd.into());
		self
	}
}

//! Error types for forest construction and chain execution.

/// A line does not start with the padding of the first content line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line} is missing the indentation of the first line")]
pub struct MalformedIndentation {
	/// 1-based line number in the raw text.
	pub line: usize,
}

/// Fragment specifications that cannot form a forest.
///
/// Construction either succeeds completely or fails with one of these; no
/// partial forest is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestError {
	/// A later specification reuses an identity.
	#[error("duplicate identity \"{identity}\" used by fragment #{index}")]
	DuplicateIdentity {
		/// The repeated identity.
		identity: String,
		/// Input index of the repeat.
		index: usize,
	},
	/// A parent reference names no specification in the same input.
	#[error("fragment #{index} references a non-existing parent \"{parent}\"")]
	UnknownParent {
		/// Input index of the referencing specification.
		index: usize,
		/// The unresolved parent identity.
		parent: String,
	},
	/// Parent links loop back onto themselves.
	#[error("circular dependency: {}", format_path(.path))]
	CyclicDependency {
		/// Traversal from the starting specification to the revisited one.
		path: Vec<String>,
	},
	/// A specification's code could not be preprocessed.
	#[error("fragment #{index}: {source}")]
	MalformedCode {
		/// Input index of the specification.
		index: usize,
		/// The indentation failure.
		#[source]
		source: MalformedIndentation,
	},
}

fn format_path(path: &[String]) -> String {
	path.iter().map(|p| format!("\"{p}\"")).collect::<Vec<_>>().join(" -> ")
}

/// Failures of the interpreter channel itself, as opposed to the code it runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ChannelError {
	/// The interpreter side of the link went away.
	#[error("interpreter channel disconnected")]
	Disconnected,
	/// Reading from or writing to the interpreter failed.
	#[error("interpreter i/o failed: {0}")]
	Io(String),
	/// The interpreter sent something that is not the protocol.
	#[error("interpreter protocol violation: {0}")]
	Protocol(String),
}

/// Why a session did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
	/// The interpreter reported `session-failed`.
	#[error("session failed: {0}")]
	Session(String),
	/// The channel became unusable before the session settled.
	#[error(transparent)]
	Channel(#[from] ChannelError),
}

impl RunError {
	/// Returns true if the failure came from the channel rather than the interpreter.
	pub const fn is_channel(&self) -> bool {
		matches!(self, Self::Channel(_))
	}
}

/// Errors from [`Fragment::execute`](crate::Fragment::execute).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecuteError {
	/// A member of the chain is already running.
	#[error("fragment {identity} is not idle")]
	NotIdle {
		/// Identity of the busy chain member.
		identity: String,
	},
	/// The session failed after the chain started running.
	#[error(transparent)]
	Run(#[from] RunError),
}

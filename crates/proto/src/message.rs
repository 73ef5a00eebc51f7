//! Typed protocol messages and their envelope encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Prefix every message type is namespaced under.
pub const MESSAGE_PREFIX: &str = "deckrun.";

/// Unique identifier for an execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "session#{}", self.0)
	}
}

/// The JSON object every message travels in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	/// Prefixed message type, e.g. `deckrun.execute`.
	#[serde(rename = "type")]
	pub kind: String,
	/// Kind-specific payload.
	#[serde(default)]
	pub value: JsonValue,
}

impl Envelope {
	/// Builds an envelope for an unprefixed `kind`.
	pub fn new(kind: &str, value: JsonValue) -> Self {
		Self {
			kind: format!("{MESSAGE_PREFIX}{kind}"),
			value,
		}
	}

	/// Returns the message kind with our prefix removed, or `None` for foreign messages.
	pub fn local_kind(&self) -> Option<&str> {
		self.kind.strip_prefix(MESSAGE_PREFIX)
	}
}

/// Messages sent to the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
	/// Run `codes` in order as one program, reporting events under `session_id`.
	Execute {
		/// Session the interpreter must tag every resulting event with.
		session_id: SessionId,
		/// Chain codes, root first.
		codes: Vec<String>,
	},
}

#[derive(Serialize)]
struct ExecuteRef<'a> {
	session_id: SessionId,
	codes: &'a [String],
}

#[derive(Deserialize)]
struct ExecuteOwned {
	session_id: SessionId,
	codes: Vec<String>,
}

impl Outbound {
	/// Unprefixed message kind.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Execute { .. } => "execute",
		}
	}

	/// Encodes the message into its envelope.
	pub fn to_envelope(&self) -> Result<Envelope> {
		let value = match self {
			Self::Execute { session_id, codes } => serde_json::to_value(ExecuteRef {
				session_id: *session_id,
				codes,
			})?,
		};
		Ok(Envelope::new(self.kind(), value))
	}

	/// Decodes an envelope, returning `None` when it carries a foreign prefix.
	pub fn from_envelope(envelope: Envelope) -> Result<Option<Self>> {
		let Some(kind) = envelope.local_kind().map(str::to_owned) else {
			return Ok(None);
		};
		match kind.as_str() {
			"execute" => {
				let payload: ExecuteOwned = serde_json::from_value(envelope.value)?;
				Ok(Some(Self::Execute {
					session_id: payload.session_id,
					codes: payload.codes,
				}))
			}
			other => Err(Error::UnknownKind(other.to_string())),
		}
	}
}

/// Messages received from the interpreter.
///
/// `position` indexes the chain sent with the session's `execute`; 0 is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
	/// The fragment at `position` began running.
	FragmentStarted {
		/// Owning session.
		session_id: SessionId,
		/// Chain position.
		position: usize,
	},
	/// Standard output written by the fragment at `position`.
	FragmentStdout {
		/// Owning session.
		session_id: SessionId,
		/// Chain position.
		position: usize,
		/// Written text.
		text: String,
	},
	/// Standard output flush at `position`.
	FragmentStdoutFlush {
		/// Owning session.
		session_id: SessionId,
		/// Chain position.
		position: usize,
	},
	/// Standard error written by the fragment at `position`.
	FragmentStderr {
		/// Owning session.
		session_id: SessionId,
		/// Chain position.
		position: usize,
		/// Written text.
		text: String,
	},
	/// Standard error flush at `position`.
	FragmentStderrFlush {
		/// Owning session.
		session_id: SessionId,
		/// Chain position.
		position: usize,
	},
	/// The fragment at `position` completed without raising.
	FragmentSucceeded {
		/// Owning session.
		session_id: SessionId,
		/// Chain position.
		position: usize,
	},
	/// The fragment at `position` raised `error`.
	FragmentFailed {
		/// Owning session.
		session_id: SessionId,
		/// Chain position.
		position: usize,
		/// Interpreter-rendered error.
		error: String,
	},
	/// The whole session completed. Terminal.
	SessionSucceeded {
		/// Owning session.
		session_id: SessionId,
	},
	/// The whole session failed. Terminal.
	SessionFailed {
		/// Owning session.
		session_id: SessionId,
		/// Interpreter-rendered error.
		error: String,
	},
}

#[derive(Serialize, Deserialize)]
struct SessionPayload {
	session_id: SessionId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	error: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct PositionPayload {
	session_id: SessionId,
	position: usize,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	text: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	error: Option<String>,
}

impl Inbound {
	/// Unprefixed message kind.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::FragmentStarted { .. } => "fragment-started",
			Self::FragmentStdout { .. } => "fragment-stdout-data",
			Self::FragmentStdoutFlush { .. } => "fragment-stdout-flush",
			Self::FragmentStderr { .. } => "fragment-stderr-data",
			Self::FragmentStderrFlush { .. } => "fragment-stderr-flush",
			Self::FragmentSucceeded { .. } => "fragment-succeeded",
			Self::FragmentFailed { .. } => "fragment-failed",
			Self::SessionSucceeded { .. } => "session-succeeded",
			Self::SessionFailed { .. } => "session-failed",
		}
	}

	/// Session the message belongs to.
	pub const fn session_id(&self) -> SessionId {
		match self {
			Self::FragmentStarted { session_id, .. }
			| Self::FragmentStdout { session_id, .. }
			| Self::FragmentStdoutFlush { session_id, .. }
			| Self::FragmentStderr { session_id, .. }
			| Self::FragmentStderrFlush { session_id, .. }
			| Self::FragmentSucceeded { session_id, .. }
			| Self::FragmentFailed { session_id, .. }
			| Self::SessionSucceeded { session_id }
			| Self::SessionFailed { session_id, .. } => *session_id,
		}
	}

	/// Chain position, `None` for the session-level kinds.
	pub const fn position(&self) -> Option<usize> {
		match self {
			Self::FragmentStarted { position, .. }
			| Self::FragmentStdout { position, .. }
			| Self::FragmentStdoutFlush { position, .. }
			| Self::FragmentStderr { position, .. }
			| Self::FragmentStderrFlush { position, .. }
			| Self::FragmentSucceeded { position, .. }
			| Self::FragmentFailed { position, .. } => Some(*position),
			Self::SessionSucceeded { .. } | Self::SessionFailed { .. } => None,
		}
	}

	/// Returns true for the two kinds that settle a session.
	pub const fn is_terminal(&self) -> bool {
		matches!(self, Self::SessionSucceeded { .. } | Self::SessionFailed { .. })
	}

	/// Encodes the message into its envelope.
	pub fn to_envelope(&self) -> Result<Envelope> {
		let value = match self {
			Self::SessionSucceeded { session_id } => serde_json::to_value(SessionPayload {
				session_id: *session_id,
				error: None,
			})?,
			Self::SessionFailed { session_id, error } => serde_json::to_value(SessionPayload {
				session_id: *session_id,
				error: Some(error.clone()),
			})?,
			other => {
				let (text, error) = match other {
					Self::FragmentStdout { text, .. } | Self::FragmentStderr { text, .. } => (Some(text.clone()), None),
					Self::FragmentFailed { error, .. } => (None, Some(error.clone())),
					_ => (None, None),
				};
				serde_json::to_value(PositionPayload {
					session_id: other.session_id(),
					position: other.position().unwrap_or_default(),
					text,
					error,
				})?
			}
		};
		Ok(Envelope::new(self.kind(), value))
	}

	/// Decodes an envelope, returning `None` when it carries a foreign prefix.
	pub fn from_envelope(envelope: Envelope) -> Result<Option<Self>> {
		let Some(kind) = envelope.local_kind().map(str::to_owned) else {
			return Ok(None);
		};
		let missing = |field| Error::MissingField {
			kind: kind.clone(),
			field,
		};

		let msg = match kind.as_str() {
			"session-succeeded" | "session-failed" => {
				let p: SessionPayload = serde_json::from_value(envelope.value)?;
				if kind == "session-succeeded" {
					Self::SessionSucceeded { session_id: p.session_id }
				} else {
					Self::SessionFailed {
						session_id: p.session_id,
						error: p.error.ok_or_else(|| missing("error"))?,
					}
				}
			}
			"fragment-started"
			| "fragment-stdout-data"
			| "fragment-stdout-flush"
			| "fragment-stderr-data"
			| "fragment-stderr-flush"
			| "fragment-succeeded"
			| "fragment-failed" => {
				let p: PositionPayload = serde_json::from_value(envelope.value)?;
				let (session_id, position) = (p.session_id, p.position);
				match kind.as_str() {
					"fragment-started" => Self::FragmentStarted { session_id, position },
					"fragment-stdout-data" => Self::FragmentStdout {
						session_id,
						position,
						text: p.text.ok_or_else(|| missing("text"))?,
					},
					"fragment-stdout-flush" => Self::FragmentStdoutFlush { session_id, position },
					"fragment-stderr-data" => Self::FragmentStderr {
						session_id,
						position,
						text: p.text.ok_or_else(|| missing("text"))?,
					},
					"fragment-stderr-flush" => Self::FragmentStderrFlush { session_id, position },
					"fragment-succeeded" => Self::FragmentSucceeded { session_id, position },
					_ => Self::FragmentFailed {
						session_id,
						position,
						error: p.error.ok_or_else(|| missing("error"))?,
					},
				}
			}
			_ => return Err(Error::UnknownKind(kind.clone())),
		};
		Ok(Some(msg))
	}
}

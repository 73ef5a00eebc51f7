//! Protocol error types.

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while framing, encoding or decoding protocol messages.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// Input/output errors from the underlying stream.
	#[error("{0}")]
	Io(#[from] std::io::Error),
	/// The frame body or payload is not the expected JSON.
	#[error("invalid message json: {0}")]
	Json(#[from] serde_json::Error),
	/// A frame ended its headers without a `Content-Length`.
	#[error("missing Content-Length header")]
	MissingContentLength,
	/// A header line could not be parsed.
	#[error("invalid header line: {0:?}")]
	InvalidHeader(String),
	/// The stream ended in the middle of a frame.
	#[error("stream ended inside a frame")]
	TruncatedFrame,
	/// The message carries our prefix but names a kind we do not know.
	#[error("unknown message kind: {0}")]
	UnknownKind(String),
	/// A known message kind is missing a required payload field.
	#[error("message '{kind}' is missing field '{field}'")]
	MissingField {
		/// The message kind, without prefix.
		kind: String,
		/// The missing field name.
		field: &'static str,
	},
}

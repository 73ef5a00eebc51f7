//! Error types for deck loading.

use std::path::PathBuf;

use deckrun_core::ForestError;
use thiserror::Error;

/// Errors that can occur when loading or building a deck.
#[derive(Debug, Error)]
pub enum DeckError {
	/// Error reading a deck file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// The deck is not valid TOML or does not match the deck schema.
	#[error("deck parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// An entry combines fields that cannot go together.
	#[error("fragment entry #{index}: {reason}")]
	InvalidEntry {
		/// Position of the entry in the deck.
		index: usize,
		/// What is wrong with it.
		reason: String,
	},

	/// A `ref` entry names an identity no fragment carries.
	#[error("fragment entry #{index} references unknown fragment \"{reference}\"")]
	UnknownReference {
		/// Position of the entry in the deck.
		index: usize,
		/// The unresolved identity.
		reference: String,
	},

	/// The fragments do not form a valid forest. Indices are deck entry positions.
	#[error(transparent)]
	Forest(#[from] ForestError),
}

/// Result type for deck operations.
pub type Result<T> = std::result::Result<T, DeckError>;

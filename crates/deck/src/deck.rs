//! Deck schema and forest construction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use deckrun_core::{ForestError, Fragment, FragmentForest, FragmentSpec};
use serde::Deserialize;

use crate::{DeckError, Result};

/// A parsed deck file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Deck {
	/// How to start the interpreter, if the deck says.
	#[serde(default)]
	pub interpreter: Option<InterpreterSection>,
	/// Fragment entries in presentation order.
	#[serde(default, rename = "fragment")]
	pub fragments: Vec<DeckEntry>,
	/// Directory of the file the deck was loaded from.
	#[serde(skip)]
	pub base_dir: Option<PathBuf>,
}

/// The `[interpreter]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterpreterSection {
	/// Program to run.
	pub command: String,
	/// Arguments passed to the program.
	#[serde(default)]
	pub args: Vec<String>,
	/// Extra environment variables.
	#[serde(default)]
	pub env: HashMap<String, String>,
	/// Working directory, relative to the deck file.
	#[serde(default)]
	pub cwd: Option<PathBuf>,
}

/// One `[[fragment]]` entry.
///
/// Either defines a fragment (`id`, `parent`, `code`, all optional) or, with
/// `ref`, shows an already defined one again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeckEntry {
	/// Identity of the defined fragment.
	#[serde(default)]
	pub id: Option<String>,
	/// Identity of the fragment this one extends.
	#[serde(default)]
	pub parent: Option<String>,
	/// Raw code, dedented on build.
	#[serde(default)]
	pub code: Option<String>,
	/// Identity of the fragment this entry displays again.
	#[serde(default, rename = "ref")]
	pub reference: Option<String>,
}

impl DeckEntry {
	fn reference(&self) -> Option<&str> {
		self.reference.as_deref().filter(|r| !r.is_empty())
	}

	fn defines_anything(&self) -> bool {
		[&self.id, &self.parent, &self.code]
			.into_iter()
			.any(|f| f.as_deref().is_some_and(|s| !s.is_empty()))
	}
}

impl Deck {
	/// Parse a TOML string into a [`Deck`].
	pub fn parse(input: &str) -> Result<Self> {
		Ok(toml::from_str(input)?)
	}

	/// Load a deck from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| DeckError::Io {
			path: path.to_path_buf(),
			error: e,
		})?;
		let mut deck = Self::parse(&content)?;
		deck.base_dir = path.parent().map(Path::to_path_buf);
		Ok(deck)
	}

	/// Builds the fragment forest and resolves `ref` entries.
	pub fn build(&self) -> Result<LoadedDeck> {
		let mut specs = Vec::new();
		// Deck entry index of each spec, for error reporting.
		let mut spec_entries = Vec::new();

		for (index, entry) in self.fragments.iter().enumerate() {
			if let Some(reference) = entry.reference() {
				if entry.defines_anything() {
					return Err(DeckError::InvalidEntry {
						index,
						reason: format!("`ref = \"{reference}\"` cannot be combined with `id`, `parent` or `code`"),
					});
				}
				continue;
			}
			specs.push(FragmentSpec {
				identity: entry.id.clone(),
				parent: entry.parent.clone(),
				code: entry.code.clone(),
			});
			spec_entries.push(index);
		}

		let forest = FragmentForest::build(&specs).map_err(|e| remap_indices(e, &spec_entries))?;

		let mut defined = forest.fragments().iter();
		let mut entries = Vec::with_capacity(self.fragments.len());
		for (index, entry) in self.fragments.iter().enumerate() {
			let fragment = match entry.reference() {
				Some(reference) => forest.by_identity(reference).ok_or_else(|| DeckError::UnknownReference {
					index,
					reference: reference.to_owned(),
				})?,
				None => defined.next().ok_or_else(|| DeckError::InvalidEntry {
					index,
					reason: "no fragment was built for this entry".into(),
				})?,
			};
			entries.push(Arc::clone(fragment));
		}

		tracing::debug!(fragments = forest.len(), entries = entries.len(), "deck built");
		Ok(LoadedDeck { forest, entries })
	}
}

/// Rewrites forest input indices into deck entry indices.
fn remap_indices(err: ForestError, spec_entries: &[usize]) -> ForestError {
	let entry = |index: usize| spec_entries.get(index).copied().unwrap_or(index);
	match err {
		ForestError::DuplicateIdentity { identity, index } => ForestError::DuplicateIdentity {
			identity,
			index: entry(index),
		},
		ForestError::UnknownParent { index, parent } => ForestError::UnknownParent {
			index: entry(index),
			parent,
		},
		ForestError::MalformedCode { index, source } => ForestError::MalformedCode {
			index: entry(index),
			source,
		},
		other @ ForestError::CyclicDependency { .. } => other,
	}
}

/// A deck whose fragments have been built.
#[derive(Debug)]
pub struct LoadedDeck {
	forest: FragmentForest,
	entries: Vec<Arc<Fragment>>,
}

impl LoadedDeck {
	/// The fragments defined by the deck.
	pub fn forest(&self) -> &FragmentForest {
		&self.forest
	}

	/// One fragment per deck entry, `ref` entries resolved to the fragment they show.
	pub fn entries(&self) -> &[Arc<Fragment>] {
		&self.entries
	}

	/// Finds a fragment by identity, or by entry position written as `#<index>`.
	pub fn resolve(&self, target: &str) -> Option<&Arc<Fragment>> {
		match target.strip_prefix('#') {
			Some(index) => self.entries.get(index.parse::<usize>().ok()?),
			None => self.forest.by_identity(target),
		}
	}
}

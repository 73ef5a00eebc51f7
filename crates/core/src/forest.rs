//! Validation and construction of fragment forests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::fragment::ANONYMOUS;
use crate::{ForestError, Fragment, preprocess};

/// One entry of the flat input a forest is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentSpec {
	/// Unique name other specifications can extend. Empty means none.
	pub identity: Option<String>,
	/// Identity of the specification this one extends. Empty means none.
	pub parent: Option<String>,
	/// Raw, not yet preprocessed code. Absent means empty.
	pub code: Option<String>,
}

impl FragmentSpec {
	/// Creates an anonymous, parentless, empty specification.
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the identity.
	pub fn identity(mut self, identity: impl Into<String>) -> Self {
		self.identity = Some(identity.into());
		self
	}

	/// Set the parent identity.
	pub fn parent(mut self, parent: impl Into<String>) -> Self {
		self.parent = Some(parent.into());
		self
	}

	/// Set the raw code.
	pub fn code(mut self, code: impl Into<String>) -> Self {
		self.code = Some(code.into());
		self
	}

	fn identity_ref(&self) -> Option<&str> {
		self.identity.as_deref().filter(|s| !s.is_empty())
	}

	fn parent_ref(&self) -> Option<&str> {
		self.parent.as_deref().filter(|s| !s.is_empty())
	}

	fn label(&self) -> String {
		self.identity_ref().unwrap_or(ANONYMOUS).to_owned()
	}
}

/// Fragments built from one list of specifications.
///
/// The shape is fixed once built; fragments stay individually mutable.
#[derive(Debug, Default)]
pub struct FragmentForest {
	fragments: Vec<Arc<Fragment>>,
	by_identity: HashMap<String, Arc<Fragment>>,
}

impl FragmentForest {
	/// Validates `specs` and links them into fragments.
	///
	/// Phases run in order and each fails fast: identity collection, parent
	/// existence, cycle detection, construction. Output order matches input
	/// order, and a parent shared by several specifications becomes a single
	/// fragment referenced by each of them.
	pub fn build(specs: &[FragmentSpec]) -> Result<Self, ForestError> {
		let index_of = collect_identities(specs)?;
		check_parents(specs, &index_of)?;
		check_cycles(specs, &index_of)?;
		construct(specs, &index_of)
	}

	/// All fragments, in input order.
	pub fn fragments(&self) -> &[Arc<Fragment>] {
		&self.fragments
	}

	/// Fragment built from the specification at `index`.
	pub fn get(&self, index: usize) -> Option<&Arc<Fragment>> {
		self.fragments.get(index)
	}

	/// Looks a fragment up by identity.
	pub fn by_identity(&self, identity: &str) -> Option<&Arc<Fragment>> {
		self.by_identity.get(identity)
	}

	/// Number of fragments.
	pub fn len(&self) -> usize {
		self.fragments.len()
	}

	/// Returns true if built from an empty list.
	pub fn is_empty(&self) -> bool {
		self.fragments.is_empty()
	}

	/// Fragments without a parent, in input order.
	pub fn roots(&self) -> impl Iterator<Item = &Arc<Fragment>> {
		self.fragments.iter().filter(|f| f.parent().is_none())
	}

	/// Direct children of `fragment`, in input order.
	pub fn children<'a>(&'a self, fragment: &'a Arc<Fragment>) -> impl Iterator<Item = &'a Arc<Fragment>> + 'a {
		self.fragments
			.iter()
			.filter(move |f| f.parent().is_some_and(|p| Arc::ptr_eq(p, fragment)))
	}

	/// Input index of `fragment`, if it belongs to this forest.
	pub fn position_of(&self, fragment: &Arc<Fragment>) -> Option<usize> {
		self.fragments.iter().position(|f| Arc::ptr_eq(f, fragment))
	}
}

fn collect_identities(specs: &[FragmentSpec]) -> Result<HashMap<&str, usize>, ForestError> {
	let mut index_of = HashMap::new();
	for (index, spec) in specs.iter().enumerate() {
		let Some(identity) = spec.identity_ref() else {
			continue;
		};
		if index_of.insert(identity, index).is_some() {
			return Err(ForestError::DuplicateIdentity {
				identity: identity.to_owned(),
				index,
			});
		}
	}
	Ok(index_of)
}

fn check_parents(specs: &[FragmentSpec], index_of: &HashMap<&str, usize>) -> Result<(), ForestError> {
	for (index, spec) in specs.iter().enumerate() {
		if let Some(parent) = spec.parent_ref()
			&& !index_of.contains_key(parent)
		{
			return Err(ForestError::UnknownParent {
				index,
				parent: parent.to_owned(),
			});
		}
	}
	Ok(())
}

fn check_cycles(specs: &[FragmentSpec], index_of: &HashMap<&str, usize>) -> Result<(), ForestError> {
	// Specs whose whole ancestry is known to end at a root.
	let mut rooted: HashSet<usize> = HashSet::new();

	for (start, spec) in specs.iter().enumerate() {
		if spec.parent_ref().is_none() || rooted.contains(&start) {
			continue;
		}

		let mut visited = HashSet::from([start]);
		let mut path = vec![start];
		let mut current = start;
		while let Some(parent) = specs[current].parent_ref() {
			current = index_of[parent];
			if rooted.contains(&current) {
				break;
			}
			path.push(current);
			if !visited.insert(current) {
				return Err(ForestError::CyclicDependency {
					path: path.iter().map(|&i| specs[i].label()).collect(),
				});
			}
		}
		rooted.extend(path);
	}
	Ok(())
}

fn construct(specs: &[FragmentSpec], index_of: &HashMap<&str, usize>) -> Result<FragmentForest, ForestError> {
	let mut built: Vec<Option<Arc<Fragment>>> = vec![None; specs.len()];
	let mut by_identity: HashMap<String, Arc<Fragment>> = HashMap::new();
	let mut stack: Vec<usize> = Vec::new();

	for index in 0..specs.len() {
		// Schedule this spec and its not-yet-built ancestors, nearest first.
		let mut cursor = Some(index);
		while let Some(i) = cursor {
			if built[i].is_some() {
				break;
			}
			stack.push(i);
			cursor = specs[i].parent_ref().map(|p| index_of[p]);
		}

		// Unwind so every parent exists before its children.
		while let Some(i) = stack.pop() {
			let spec = &specs[i];
			let parent = match spec.parent_ref() {
				Some(p) => Some(by_identity.get(p).cloned().ok_or_else(|| ForestError::UnknownParent {
					index: i,
					parent: p.to_owned(),
				})?),
				None => None,
			};
			let code = preprocess(spec.code.as_deref().unwrap_or_default())
				.map_err(|source| ForestError::MalformedCode { index: i, source })?;

			let identity = spec.identity_ref().map(str::to_owned);
			let fragment = Arc::new(Fragment::new(identity.clone(), parent, code));
			if let Some(identity) = identity {
				by_identity.insert(identity, Arc::clone(&fragment));
			}
			built[i] = Some(fragment);
		}
	}

	Ok(FragmentForest {
		fragments: built.into_iter().flatten().collect(),
		by_identity,
	})
}

#[cfg(test)]
mod tests;

use super::*;
use crate::MalformedIndentation;

fn spec(identity: &str, parent: &str, code: &str) -> FragmentSpec {
	FragmentSpec {
		identity: Some(identity.to_owned()),
		parent: Some(parent.to_owned()),
		code: Some(code.to_owned()),
	}
}

#[test]
fn builds_in_input_order() {
	let forest = FragmentForest::build(&[
		FragmentSpec::new().identity("a").code("x = 1"),
		FragmentSpec::new().identity("b").parent("a").code("y = x"),
		FragmentSpec::new().parent("b").code("print(y)"),
	])
	.unwrap();

	assert_eq!(forest.len(), 3);
	assert_eq!(forest.get(0).unwrap().identity(), Some("a"));
	assert_eq!(forest.get(1).unwrap().identity(), Some("b"));
	assert_eq!(forest.get(2).unwrap().identity(), None);
	assert_eq!(forest.get(2).unwrap().label(), ANONYMOUS);

	let b = forest.by_identity("b").unwrap();
	assert!(Arc::ptr_eq(b, forest.get(1).unwrap()));
	assert!(Arc::ptr_eq(b.parent().unwrap(), forest.get(0).unwrap()));
	assert!(forest.by_identity("c").is_none());
}

#[test]
fn shared_parent_is_one_fragment() {
	let forest = FragmentForest::build(&[
		FragmentSpec::new().identity("base").code("import math"),
		FragmentSpec::new().parent("base").code("print(1)"),
		FragmentSpec::new().parent("base").code("print(2)"),
	])
	.unwrap();

	let base = forest.get(0).unwrap();
	assert!(Arc::ptr_eq(forest.get(1).unwrap().parent().unwrap(), base));
	assert!(Arc::ptr_eq(forest.get(2).unwrap().parent().unwrap(), base));
	assert_eq!(forest.children(base).count(), 2);
	assert_eq!(forest.roots().count(), 1);
}

#[test]
fn parent_may_follow_child_in_input() {
	let forest = FragmentForest::build(&[
		FragmentSpec::new().identity("leaf").parent("mid"),
		FragmentSpec::new().identity("mid").parent("root"),
		FragmentSpec::new().identity("root"),
	])
	.unwrap();

	let leaf = forest.get(0).unwrap();
	let labels: Vec<String> = leaf.chain().iter().map(|f| f.label().to_owned()).collect();
	assert_eq!(labels, ["root", "mid", "leaf"]);
	assert!(Arc::ptr_eq(leaf.parent().unwrap(), forest.get(1).unwrap()));
	assert!(Arc::ptr_eq(forest.get(1).unwrap().parent().unwrap(), forest.get(2).unwrap()));
	assert_eq!(forest.position_of(forest.get(2).unwrap()), Some(2));
}

#[test]
fn duplicate_identity_reports_later_index() {
	let err = FragmentForest::build(&[
		FragmentSpec::new().identity("a"),
		FragmentSpec::new().identity("b"),
		FragmentSpec::new().identity("a"),
	])
	.unwrap_err();

	assert_eq!(
		err,
		ForestError::DuplicateIdentity {
			identity: "a".into(),
			index: 2,
		}
	);
}

#[test]
fn unknown_parent() {
	let err = FragmentForest::build(&[FragmentSpec::new().identity("a"), FragmentSpec::new().parent("missing")]).unwrap_err();

	assert_eq!(
		err,
		ForestError::UnknownParent {
			index: 1,
			parent: "missing".into(),
		}
	);
	assert_eq!(err.to_string(), "fragment #1 references a non-existing parent \"missing\"");
}

#[test]
fn two_node_cycle() {
	let err = FragmentForest::build(&[spec("a", "b", ""), spec("b", "a", "")]).unwrap_err();

	assert_eq!(
		err,
		ForestError::CyclicDependency {
			path: vec!["a".into(), "b".into(), "a".into()],
		}
	);
	assert_eq!(err.to_string(), "circular dependency: \"a\" -> \"b\" -> \"a\"");
}

#[test]
fn self_parent_is_a_cycle() {
	let err = FragmentForest::build(&[spec("a", "a", "")]).unwrap_err();
	assert_eq!(
		err,
		ForestError::CyclicDependency {
			path: vec!["a".into(), "a".into()],
		}
	);
}

#[test]
fn cycle_reached_from_anonymous_tail() {
	let err = FragmentForest::build(&[
		FragmentSpec::new().parent("x"),
		spec("x", "y", ""),
		spec("y", "x", ""),
	])
	.unwrap_err();

	assert_eq!(
		err,
		ForestError::CyclicDependency {
			path: vec![ANONYMOUS.into(), "x".into(), "y".into(), "x".into()],
		}
	);
}

#[test]
fn duplicate_wins_over_later_phases() {
	let err = FragmentForest::build(&[spec("a", "missing", ""), FragmentSpec::new().identity("a")]).unwrap_err();
	assert!(matches!(err, ForestError::DuplicateIdentity { .. }));
}

#[test]
fn code_is_preprocessed() {
	let forest = FragmentForest::build(&[FragmentSpec::new().code("\n    def f():\n        return 1\n")]).unwrap();

	let fragment = forest.get(0).unwrap();
	assert_eq!(fragment.code(), "def f():\n    return 1");
	assert_eq!(fragment.original_code(), fragment.code());
}

#[test]
fn malformed_code_reports_index() {
	let err = FragmentForest::build(&[FragmentSpec::new().identity("ok").code("a"), FragmentSpec::new().code("  a\n b")]).unwrap_err();

	assert_eq!(
		err,
		ForestError::MalformedCode {
			index: 1,
			source: MalformedIndentation { line: 2 },
		}
	);
}

#[test]
fn empty_strings_mean_absent() {
	let forest = FragmentForest::build(&[spec("", "", "print(1)"), spec("", "", "print(2)")]).unwrap();

	assert_eq!(forest.len(), 2);
	assert!(forest.fragments().iter().all(|f| f.identity().is_none() && f.parent().is_none()));
	assert_eq!(forest.roots().count(), 2);
}

#[test]
fn empty_input() {
	let forest = FragmentForest::build(&[]).unwrap();
	assert!(forest.is_empty());
	assert_eq!(forest.roots().count(), 0);
}

use super::*;

#[test]
fn strips_blank_edges_and_padding() {
	assert_eq!(preprocess("\n\n  x = 1\n  y = 2\n\n").unwrap(), "x = 1\ny = 2");
}

#[test]
fn shorter_padding_is_rejected() {
	assert_eq!(preprocess("  a\n b"), Err(MalformedIndentation { line: 2 }));
}

#[test]
fn line_numbers_count_dropped_blank_lines() {
	assert_eq!(preprocess("\n\n    ok\n\tbad\n"), Err(MalformedIndentation { line: 4 }));
}

#[test]
fn blank_only_input_is_empty() {
	assert_eq!(preprocess("").unwrap(), "");
	assert_eq!(preprocess(" \n\t\n  ").unwrap(), "");
}

#[test]
fn interior_empty_lines_and_nesting_survive() {
	let raw = "\n    def f():\n        return 1\n\n    print(f())\n";
	assert_eq!(preprocess(raw).unwrap(), "def f():\n    return 1\n\nprint(f())");
}

#[test]
fn crlf_is_normalized() {
	assert_eq!(preprocess("\r\n  a\r\n  b\r\n").unwrap(), "a\nb");
}

#[test]
fn unindented_text_passes_through() {
	assert_eq!(preprocess("a\n  b\nc").unwrap(), "a\n  b\nc");
}

#[test]
fn whitespace_only_interior_line_must_carry_padding() {
	assert_eq!(preprocess("    a\n  \n    b"), Err(MalformedIndentation { line: 2 }));
	assert_eq!(preprocess("  a\n    \n  b").unwrap(), "a\n  \nb");
}

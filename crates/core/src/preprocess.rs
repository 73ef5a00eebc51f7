//! Snippet text normalization.

use crate::MalformedIndentation;

/// Dedents `raw` relative to its first non-blank line.
///
/// Leading and trailing blank lines are dropped, interior empty lines are kept.
/// Every other line must start with the first line's leading whitespace, which
/// is then stripped. Insufficient or mixed indentation is an error rather than
/// a best-effort fix.
pub fn preprocess(raw: &str) -> Result<String, MalformedIndentation> {
	let lines: Vec<&str> = raw.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).collect();

	let Some(first) = lines.iter().position(|l| !is_blank(l)) else {
		return Ok(String::new());
	};
	let last = lines.iter().rposition(|l| !is_blank(l)).unwrap_or(first);
	let content = &lines[first..=last];

	let head = content[0];
	let padding = &head[..head.len() - head.trim_start().len()];

	let mut out = Vec::with_capacity(content.len());
	for (offset, line) in content.iter().enumerate() {
		if line.is_empty() {
			out.push("");
			continue;
		}
		let Some(rest) = line.strip_prefix(padding) else {
			return Err(MalformedIndentation {
				line: first + offset + 1,
			});
		};
		out.push(rest);
	}

	Ok(out.join("\n"))
}

fn is_blank(line: &str) -> bool {
	line.chars().all(char::is_whitespace)
}

#[cfg(test)]
mod tests;

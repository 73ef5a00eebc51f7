//! `Content-Length` framing for envelopes over byte streams.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Envelope, Error, Result};

const CONTENT_LENGTH: &str = "content-length";

/// Largest frame body accepted from a peer.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Writes one framed envelope and flushes the stream.
pub async fn write_message(output: &mut (impl AsyncWrite + Unpin), envelope: &Envelope) -> Result<()> {
	let json = serde_json::to_string(envelope)?;
	let frame = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
	output.write_all(frame.as_bytes()).await?;
	output.flush().await?;
	Ok(())
}

/// Reads one framed envelope.
///
/// Returns `Ok(None)` on a clean EOF between frames. `buf` is scratch space
/// reused across calls.
pub async fn read_message(input: &mut (impl AsyncBufRead + Unpin), buf: &mut String) -> Result<Option<Envelope>> {
	let mut content_length: Option<usize> = None;
	let mut saw_header = false;
	loop {
		buf.clear();
		if input.read_line(buf).await? == 0 {
			if saw_header {
				return Err(Error::TruncatedFrame);
			}
			return Ok(None);
		}

		let line = buf.trim();
		if line.is_empty() {
			if saw_header {
				break;
			}
			// Tolerate stray blank lines between frames.
			continue;
		}
		saw_header = true;

		let (name, value) = line.split_once(':').ok_or_else(|| Error::InvalidHeader(line.to_string()))?;
		if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
			let len = value
				.trim()
				.parse::<usize>()
				.ok()
				.filter(|&len| len <= MAX_FRAME_LEN)
				.ok_or_else(|| Error::InvalidHeader(line.to_string()))?;
			content_length = Some(len);
		}
	}

	let length = content_length.ok_or(Error::MissingContentLength)?;
	let mut body = vec![0u8; length];
	input.read_exact(&mut body).await.map_err(|e| match e.kind() {
		std::io::ErrorKind::UnexpectedEof => Error::TruncatedFrame,
		_ => Error::Io(e),
	})?;

	Ok(Some(serde_json::from_slice(&body)?))
}

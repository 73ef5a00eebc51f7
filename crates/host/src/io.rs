//! Byte-stream plumbing between an [`InterpreterLink`] and an interpreter.

use deckrun_core::{ChannelError, InterpreterLink, LinkEvent};
use deckrun_proto::{Inbound, Outbound, read_message, write_message};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;

/// Connects an [`InterpreterLink`] to a framed byte stream.
///
/// Reading and writing run as two tasks on the current tokio runtime. The first
/// of them to fail reports [`LinkEvent::Closed`]; the channel stops listening
/// after that, so a second report is dropped.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn connect<R, W>(reader: R, writer: W) -> InterpreterLink
where
	R: AsyncRead + Unpin + Send + 'static,
	W: AsyncWrite + Unpin + Send + 'static,
{
	let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
	let (event_tx, event_rx) = mpsc::unbounded_channel();

	tokio::spawn(write_loop(writer, outbound_rx, event_tx.clone()));
	tokio::spawn(read_loop(reader, event_tx));

	InterpreterLink::new(outbound_tx, event_rx)
}

/// Writes requests in submission order until the channel goes away.
async fn write_loop<W>(mut writer: W, mut outbound_rx: mpsc::UnboundedReceiver<Outbound>, event_tx: mpsc::UnboundedSender<LinkEvent>)
where
	W: AsyncWrite + Unpin,
{
	while let Some(out) = outbound_rx.recv().await {
		let result = match out.to_envelope() {
			Ok(envelope) => write_message(&mut writer, &envelope).await,
			Err(e) => Err(e),
		};
		if let Err(e) = result {
			tracing::error!(kind = out.kind(), error = %e, "Outbound write failed; closing interpreter link");
			let _ = event_tx.send(LinkEvent::Closed(ChannelError::Io(e.to_string())));
			return;
		}
	}
	tracing::debug!("Interpreter link dropped by channel");
}

/// Decodes inbound frames until EOF or a framing failure.
async fn read_loop<R>(reader: R, event_tx: mpsc::UnboundedSender<LinkEvent>)
where
	R: AsyncRead + Unpin,
{
	let mut reader = BufReader::new(reader);
	let mut read_buf = String::new();

	let reason = loop {
		let envelope = match read_message(&mut reader, &mut read_buf).await {
			Ok(Some(envelope)) => envelope,
			Ok(None) => {
				tracing::info!("Interpreter closed its output");
				break ChannelError::Disconnected;
			}
			Err(deckrun_proto::Error::Io(e)) => {
				tracing::error!(error = %e, "Error reading from interpreter");
				break ChannelError::Io(e.to_string());
			}
			Err(e) => {
				tracing::error!(error = %e, "Undecodable frame from interpreter");
				break ChannelError::Protocol(e.to_string());
			}
		};

		match Inbound::from_envelope(envelope) {
			Ok(Some(msg)) => {
				if event_tx.send(LinkEvent::Message(msg)).is_err() {
					return;
				}
			}
			Ok(None) => tracing::trace!("Skipping message with foreign prefix"),
			Err(e @ deckrun_proto::Error::UnknownKind(_)) => {
				tracing::warn!(error = %e, "Skipping unknown interpreter message");
			}
			Err(e) => {
				tracing::error!(error = %e, "Malformed interpreter message");
				break ChannelError::Protocol(e.to_string());
			}
		}
	};

	let _ = event_tx.send(LinkEvent::Closed(reason));
}

/// Forwards interpreter diagnostics to the log, one record per line.
pub(crate) async fn forward_stderr<R>(stderr: R, command: String)
where
	R: AsyncRead + Unpin,
{
	let mut lines = BufReader::new(stderr).lines();
	loop {
		match lines.next_line().await {
			Ok(Some(line)) => tracing::warn!(target: "deckrun::interpreter", %command, "{line}"),
			Ok(None) => break,
			Err(e) => {
				tracing::debug!(%command, error = %e, "Stopped reading interpreter stderr");
				break;
			}
		}
	}
}

//! Session multiplexing over one shared interpreter.
//!
//! The interpreter is reached only through an [`InterpreterLink`]: an outbound
//! queue of [`Outbound`] requests and an inbound stream of [`LinkEvent`]s. Each
//! [`ExecutionChannel::run`] opens a session under a fresh [`SessionId`], sends
//! one `execute` request, and waits until the interpreter reports the session's
//! terminal event. Everything in between is routed by `(session_id, position)`
//! to the callbacks the session was opened with.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use deckrun_proto::{Inbound, Outbound, SessionId};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::{ChannelError, Fragment, RunError};

/// Receives the position-scoped events of one session.
///
/// Positions index the chain passed to [`ExecutionChannel::run`]; 0 is the root.
/// Panics raised here are caught and logged by the channel.
pub trait SessionCallbacks: Send + Sync {
	/// The fragment at `position` began running.
	fn started(&self, position: usize) {
		let _ = position;
	}

	/// The fragment at `position` wrote to standard output.
	fn stdout(&self, position: usize, text: &str) {
		let _ = (position, text);
	}

	/// The fragment at `position` wrote to standard error.
	fn stderr(&self, position: usize, text: &str) {
		let _ = (position, text);
	}

	/// The fragment at `position` completed.
	fn succeeded(&self, position: usize) {
		let _ = position;
	}

	/// The fragment at `position` raised `error`.
	///
	/// This does not settle the session; only the interpreter's terminal event does.
	fn failed(&self, position: usize, error: &str) {
		let _ = (position, error);
	}
}

/// Something arriving from the interpreter side of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
	/// A decoded protocol message.
	Message(Inbound),
	/// The link is unusable from now on.
	Closed(ChannelError),
}

/// Both directions of a connection to an interpreter.
#[derive(Debug)]
pub struct InterpreterLink {
	/// Requests towards the interpreter.
	pub outbound: mpsc::UnboundedSender<Outbound>,
	/// Messages and lifecycle events from the interpreter.
	pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

impl InterpreterLink {
	/// Creates a link from its two halves.
	pub fn new(outbound: mpsc::UnboundedSender<Outbound>, inbound: mpsc::UnboundedReceiver<LinkEvent>) -> Self {
		Self { outbound, inbound }
	}

	/// Creates an in-memory link and the interpreter-side peer driving it.
	pub fn pair() -> (Self, InterpreterPeer) {
		let (outbound, requests) = mpsc::unbounded_channel();
		let (events, inbound) = mpsc::unbounded_channel();
		(Self { outbound, inbound }, InterpreterPeer { requests, events })
	}
}

/// Interpreter side of an in-memory [`InterpreterLink`].
///
/// Used by in-process interpreters and tests.
#[derive(Debug)]
pub struct InterpreterPeer {
	requests: mpsc::UnboundedReceiver<Outbound>,
	events: mpsc::UnboundedSender<LinkEvent>,
}

impl InterpreterPeer {
	/// Waits for the next request. `None` once every channel handle is gone.
	pub async fn next_request(&mut self) -> Option<Outbound> {
		self.requests.recv().await
	}

	/// Returns a queued request without waiting.
	pub fn try_next_request(&mut self) -> Option<Outbound> {
		self.requests.try_recv().ok()
	}

	/// Delivers `msg` to the channel. Returns false if the channel is gone.
	pub fn send(&self, msg: Inbound) -> bool {
		self.events.send(LinkEvent::Message(msg)).is_ok()
	}

	/// Reports the link as unusable.
	pub fn close(&self, reason: ChannelError) {
		let _ = self.events.send(LinkEvent::Closed(reason));
	}
}

struct Session {
	chain_len: usize,
	callbacks: Arc<dyn SessionCallbacks>,
	done: oneshot::Sender<Result<(), RunError>>,
}

#[derive(Default)]
struct ChannelState {
	sessions: HashMap<SessionId, Session>,
	closed: Option<ChannelError>,
}

struct Shared {
	next_session: AtomicU64,
	outbound: mpsc::UnboundedSender<Outbound>,
	state: Mutex<ChannelState>,
}

/// Runs fragment chains against one interpreter, many sessions at a time.
///
/// Cloning yields another handle to the same channel. Sessions are not queued:
/// whether the interpreter runs them concurrently is its own business.
#[derive(Clone)]
pub struct ExecutionChannel {
	shared: Arc<Shared>,
}

impl std::fmt::Debug for ExecutionChannel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ExecutionChannel")
			.field("pending_sessions", &self.pending_sessions())
			.finish_non_exhaustive()
	}
}

impl ExecutionChannel {
	/// Starts routing `link`'s inbound events on the current tokio runtime.
	///
	/// # Panics
	///
	/// Panics if called outside a tokio runtime.
	pub fn spawn(link: InterpreterLink) -> Self {
		let InterpreterLink { outbound, inbound } = link;
		let shared = Arc::new(Shared {
			next_session: AtomicU64::new(0),
			outbound,
			state: Mutex::new(ChannelState::default()),
		});
		tokio::spawn(pump(Arc::downgrade(&shared), inbound));
		Self { shared }
	}

	/// Runs `chain` as one program and waits for the session to settle.
	///
	/// The interpreter receives every member's current code, root first.
	/// Position-scoped events are delivered to `callbacks` until the terminal
	/// event arrives. Fragment-level failures reach `callbacks` only; the
	/// result reflects `session-failed` or a channel failure.
	pub async fn run(&self, chain: &[Arc<Fragment>], callbacks: Arc<dyn SessionCallbacks>) -> Result<(), RunError> {
		let codes: Vec<String> = chain.iter().map(|f| f.code()).collect();
		let session_id = SessionId(self.shared.next_session.fetch_add(1, Ordering::Relaxed));
		let (done, settled) = oneshot::channel();

		{
			let mut state = self.shared.state.lock();
			if let Some(reason) = &state.closed {
				return Err(RunError::Channel(reason.clone()));
			}
			state.sessions.insert(
				session_id,
				Session {
					chain_len: codes.len(),
					callbacks,
					done,
				},
			);
		}
		let _open = OpenSession {
			shared: &self.shared,
			session_id,
		};

		debug!(%session_id, chain_len = codes.len(), "session opened");
		if self.shared.outbound.send(Outbound::Execute { session_id, codes }).is_err() {
			return Err(ChannelError::Disconnected.into());
		}

		match settled.await {
			Ok(result) => result,
			Err(_) => Err(ChannelError::Disconnected.into()),
		}
	}

	/// Number of sessions waiting for their terminal event.
	pub fn pending_sessions(&self) -> usize {
		self.shared.state.lock().sessions.len()
	}

	/// The failure that closed the channel, if it is closed.
	pub fn closed_reason(&self) -> Option<ChannelError> {
		self.shared.state.lock().closed.clone()
	}
}

/// Removes a session record that was abandoned before it settled.
struct OpenSession<'a> {
	shared: &'a Shared,
	session_id: SessionId,
}

impl Drop for OpenSession<'_> {
	fn drop(&mut self) {
		self.shared.state.lock().sessions.remove(&self.session_id);
	}
}

async fn pump(shared: Weak<Shared>, mut inbound: mpsc::UnboundedReceiver<LinkEvent>) {
	let reason = loop {
		let Some(event) = inbound.recv().await else {
			break ChannelError::Disconnected;
		};
		let Some(channel) = shared.upgrade() else {
			return;
		};
		match event {
			LinkEvent::Message(msg) => channel.dispatch(msg),
			LinkEvent::Closed(reason) => break reason,
		}
	};

	if let Some(channel) = shared.upgrade() {
		channel.close(reason);
	}
}

impl Shared {
	fn dispatch(&self, msg: Inbound) {
		let session_id = msg.session_id();

		if msg.is_terminal() {
			let Some(session) = self.state.lock().sessions.remove(&session_id) else {
				warn!(%session_id, kind = msg.kind(), "terminal event for unknown session");
				return;
			};
			let result = match msg {
				Inbound::SessionFailed { error, .. } => Err(RunError::Session(error)),
				_ => Ok(()),
			};
			debug!(%session_id, ok = result.is_ok(), "session settled");
			let _ = session.done.send(result);
			return;
		}

		let Some(position) = msg.position() else {
			return;
		};
		let (callbacks, chain_len) = {
			let state = self.state.lock();
			let Some(session) = state.sessions.get(&session_id) else {
				warn!(%session_id, kind = msg.kind(), "event for unknown session");
				return;
			};
			(Arc::clone(&session.callbacks), session.chain_len)
		};
		if position >= chain_len {
			warn!(%session_id, position, chain_len, kind = msg.kind(), "event position out of range");
			return;
		}

		let delivered = catch_unwind(AssertUnwindSafe(|| match &msg {
			Inbound::FragmentStarted { .. } => callbacks.started(position),
			Inbound::FragmentStdout { text, .. } => callbacks.stdout(position, text),
			Inbound::FragmentStderr { text, .. } => callbacks.stderr(position, text),
			Inbound::FragmentSucceeded { .. } => callbacks.succeeded(position),
			Inbound::FragmentFailed { error, .. } => callbacks.failed(position, error),
			Inbound::FragmentStdoutFlush { .. }
			| Inbound::FragmentStderrFlush { .. }
			| Inbound::SessionSucceeded { .. }
			| Inbound::SessionFailed { .. } => {}
		}));
		if delivered.is_err() {
			error!(%session_id, position, kind = msg.kind(), "session callback panicked");
		}
	}

	fn close(&self, reason: ChannelError) {
		let pending: Vec<Session> = {
			let mut state = self.state.lock();
			state.closed = Some(reason.clone());
			state.sessions.drain().map(|(_, session)| session).collect()
		};
		if pending.is_empty() {
			debug!(error = %reason, "interpreter channel closed");
		} else {
			warn!(error = %reason, pending = pending.len(), "interpreter channel closed with sessions pending");
		}
		for session in pending {
			let _ = session.done.send(Err(RunError::Channel(reason.clone())));
		}
	}
}

#[cfg(test)]
mod tests;

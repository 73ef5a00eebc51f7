//! A node of a fragment forest.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{ExecutionChannel, SessionCallbacks};
use crate::observer::{ObserverId, ObserverSet};
use crate::ExecuteError;

/// Placeholder label for fragments without an identity.
pub const ANONYMOUS: &str = "<anonymous>";

/// Execution state of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentState {
	/// Not part of any running chain.
	#[default]
	Idle,
	/// Part of a chain whose session has not settled yet.
	Running,
}

/// Change notification for an [`OutputBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChange {
	/// Text was appended.
	Appended(String),
	/// The buffer was emptied at the start of an execution.
	Cleared,
}

/// Append-only text buffer, reset when its fragment starts executing.
///
/// Only the owning fragment's execution writes here.
#[derive(Debug)]
pub struct OutputBuffer {
	text: Mutex<String>,
	observers: ObserverSet<OutputChange>,
}

impl OutputBuffer {
	fn new(name: &'static str) -> Self {
		Self {
			text: Mutex::new(String::new()),
			observers: ObserverSet::new(name),
		}
	}

	/// Snapshot of the buffered text.
	pub fn text(&self) -> String {
		self.text.lock().clone()
	}

	/// Returns true if nothing has been written since the last reset.
	pub fn is_empty(&self) -> bool {
		self.text.lock().is_empty()
	}

	/// Subscribes to appends and resets.
	pub fn subscribe(&self, callback: impl Fn(&OutputChange) + Send + Sync + 'static) -> ObserverId {
		self.observers.subscribe(callback)
	}

	/// Removes a subscription made with [`OutputBuffer::subscribe`].
	pub fn unsubscribe(&self, id: ObserverId) -> bool {
		self.observers.unsubscribe(id)
	}

	fn append(&self, text: &str) {
		if text.is_empty() {
			return;
		}
		self.text.lock().push_str(text);
		self.observers.notify(&OutputChange::Appended(text.to_owned()), None);
	}

	fn clear(&self) {
		self.text.lock().clear();
		self.observers.notify(&OutputChange::Cleared, None);
	}
}

/// One snippet in a forest.
///
/// Parent links are fixed at construction. Code, state and output are
/// interior-mutable so fragments can be shared as `Arc<Fragment>` between the
/// forest, descendants and running sessions.
pub struct Fragment {
	identity: Option<String>,
	parent: Option<Arc<Fragment>>,
	original_code: String,
	code: Mutex<String>,
	state: Mutex<FragmentState>,
	last_error: Mutex<Option<String>>,
	stdout: OutputBuffer,
	stderr: OutputBuffer,
	code_observers: ObserverSet<str>,
	state_observers: ObserverSet<FragmentState>,
}

impl std::fmt::Debug for Fragment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Fragment")
			.field("identity", &self.identity)
			.field("parent", &self.parent.as_ref().map(|p| p.label().to_owned()))
			.field("state", &self.state())
			.finish_non_exhaustive()
	}
}

impl Fragment {
	pub(crate) fn new(identity: Option<String>, parent: Option<Arc<Fragment>>, code: String) -> Self {
		Self {
			identity,
			parent,
			code: Mutex::new(code.clone()),
			original_code: code,
			state: Mutex::new(FragmentState::Idle),
			last_error: Mutex::new(None),
			stdout: OutputBuffer::new("stdout"),
			stderr: OutputBuffer::new("stderr"),
			code_observers: ObserverSet::new("code"),
			state_observers: ObserverSet::new("state"),
		}
	}

	/// Identity, if the specification carried one.
	pub fn identity(&self) -> Option<&str> {
		self.identity.as_deref()
	}

	/// Identity or [`ANONYMOUS`], for messages and logs.
	pub fn label(&self) -> &str {
		self.identity.as_deref().unwrap_or(ANONYMOUS)
	}

	/// The fragment this one extends.
	pub fn parent(&self) -> Option<&Arc<Fragment>> {
		self.parent.as_ref()
	}

	/// Current code.
	pub fn code(&self) -> String {
		self.code.lock().clone()
	}

	/// Code as constructed, the baseline for resets and diffs.
	pub fn original_code(&self) -> &str {
		&self.original_code
	}

	/// Returns true if the code differs from the original.
	pub fn is_modified(&self) -> bool {
		*self.code.lock() != self.original_code
	}

	/// Current execution state.
	pub fn state(&self) -> FragmentState {
		*self.state.lock()
	}

	/// Error reported for this fragment by the most recent execution, if any.
	pub fn last_error(&self) -> Option<String> {
		self.last_error.lock().clone()
	}

	/// Standard output of the most recent execution.
	pub fn stdout(&self) -> &OutputBuffer {
		&self.stdout
	}

	/// Standard error of the most recent execution.
	pub fn stderr(&self) -> &OutputBuffer {
		&self.stderr
	}

	/// Subscribes to code changes. The callback receives the new code.
	pub fn subscribe_code(&self, callback: impl Fn(&str) + Send + Sync + 'static) -> ObserverId {
		self.code_observers.subscribe(callback)
	}

	/// Removes a code subscription.
	pub fn unsubscribe_code(&self, id: ObserverId) -> bool {
		self.code_observers.unsubscribe(id)
	}

	/// Subscribes to state transitions.
	pub fn subscribe_state(&self, callback: impl Fn(&FragmentState) + Send + Sync + 'static) -> ObserverId {
		self.state_observers.subscribe(callback)
	}

	/// Removes a state subscription.
	pub fn unsubscribe_state(&self, id: ObserverId) -> bool {
		self.state_observers.unsubscribe(id)
	}

	/// Replaces the code and notifies code observers other than `origin`.
	///
	/// Returns false, notifying nobody, if `text` equals the current code.
	/// Passing the caller's own subscription as `origin` keeps an editor that
	/// both observes and writes the code from echoing its own edits.
	pub fn set_code(&self, text: &str, origin: Option<ObserverId>) -> bool {
		{
			let mut code = self.code.lock();
			if *code == text {
				return false;
			}
			*code = text.to_owned();
		}
		self.code_observers.notify(text, origin);
		true
	}

	/// Restores the original code. See [`Fragment::set_code`].
	pub fn reset_code(&self, origin: Option<ObserverId>) -> bool {
		self.set_code(&self.original_code, origin)
	}

	/// Ancestors root first, ending with `self`.
	pub fn chain(self: &Arc<Self>) -> Vec<Arc<Fragment>> {
		let mut chain = vec![Arc::clone(self)];
		let mut cursor = self.parent.as_ref();
		while let Some(parent) = cursor {
			chain.push(Arc::clone(parent));
			cursor = parent.parent.as_ref();
		}
		chain.reverse();
		chain
	}

	/// Runs this fragment's chain on `channel`.
	///
	/// Fails with [`ExecuteError::NotIdle`] without side effects if any chain
	/// member is running. Otherwise the whole chain is marked running and its
	/// buffers are cleared; output is routed back per position until the
	/// session settles, and the chain returns to idle before any failure is
	/// returned. Dropping the future also returns the chain to idle.
	pub async fn execute(self: &Arc<Self>, channel: &ExecutionChannel) -> Result<(), ExecuteError> {
		let chain = self.chain();
		let running = RunningChain::acquire(chain)?;
		tracing::debug!(fragment = self.label(), depth = running.chain.len(), "executing chain");

		let router = Arc::new(ChainRouter {
			chain: running.chain.clone(),
		});
		let result = channel.run(&running.chain, router).await;
		drop(running);

		if let Err(e) = &result {
			tracing::debug!(fragment = self.label(), error = %e, "chain execution failed");
		}
		result.map_err(ExecuteError::from)
	}
}

/// Marks a chain running for as long as it lives.
struct RunningChain {
	chain: Vec<Arc<Fragment>>,
}

impl RunningChain {
	fn acquire(chain: Vec<Arc<Fragment>>) -> Result<Self, ExecuteError> {
		{
			// Root-first locking: overlapping chains share a root-first prefix,
			// so they always contend in the same order.
			let mut guards = Vec::with_capacity(chain.len());
			for fragment in &chain {
				let guard = fragment.state.lock();
				if *guard != FragmentState::Idle {
					return Err(ExecuteError::NotIdle {
						identity: fragment.label().to_owned(),
					});
				}
				guards.push(guard);
			}
			for guard in &mut guards {
				**guard = FragmentState::Running;
			}
		}

		for fragment in &chain {
			fragment.stdout.clear();
			fragment.stderr.clear();
			*fragment.last_error.lock() = None;
			fragment.state_observers.notify(&FragmentState::Running, None);
		}
		Ok(Self { chain })
	}
}

impl Drop for RunningChain {
	fn drop(&mut self) {
		for fragment in &self.chain {
			*fragment.state.lock() = FragmentState::Idle;
		}
		for fragment in &self.chain {
			fragment.state_observers.notify(&FragmentState::Idle, None);
		}
	}
}

/// Routes session events to the chain member at each position.
struct ChainRouter {
	chain: Vec<Arc<Fragment>>,
}

impl SessionCallbacks for ChainRouter {
	fn started(&self, position: usize) {
		if let Some(fragment) = self.chain.get(position) {
			tracing::trace!(fragment = fragment.label(), position, "fragment started");
		}
	}

	fn stdout(&self, position: usize, text: &str) {
		if let Some(fragment) = self.chain.get(position) {
			fragment.stdout.append(text);
		}
	}

	fn stderr(&self, position: usize, text: &str) {
		if let Some(fragment) = self.chain.get(position) {
			fragment.stderr.append(text);
		}
	}

	fn succeeded(&self, position: usize) {
		if let Some(fragment) = self.chain.get(position) {
			tracing::trace!(fragment = fragment.label(), position, "fragment succeeded");
		}
	}

	fn failed(&self, position: usize, error: &str) {
		if let Some(fragment) = self.chain.get(position) {
			tracing::debug!(fragment = fragment.label(), position, error, "fragment failed");
			*fragment.last_error.lock() = Some(error.to_owned());
		}
	}
}

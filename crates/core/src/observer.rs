//! Subscriber registries for change notification.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

static NEXT_OBSERVER: AtomicU64 = AtomicU64::new(1);

/// Handle identifying one subscription.
///
/// Ids are unique for the process lifetime, so an id taken from one registry
/// can name the originator of a change in another without ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
	fn next() -> Self {
		Self(NEXT_OBSERVER.fetch_add(1, Ordering::Relaxed))
	}
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered set of callbacks notified on mutation.
///
/// Callbacks run outside the registry lock on a snapshot, so a callback may
/// subscribe, unsubscribe or trigger another notification. A panicking
/// callback is logged and does not prevent the remaining ones from running.
pub struct ObserverSet<T: ?Sized> {
	name: &'static str,
	entries: Mutex<Vec<(ObserverId, Callback<T>)>>,
}

impl<T: ?Sized> ObserverSet<T> {
	/// Creates an empty registry; `name` labels log records.
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			entries: Mutex::new(Vec::new()),
		}
	}

	/// Registers `callback` and returns its handle.
	pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ObserverId {
		let id = ObserverId::next();
		self.entries.lock().push((id, Arc::new(callback)));
		id
	}

	/// Removes a subscription. Returns false if `id` was not registered here.
	pub fn unsubscribe(&self, id: ObserverId) -> bool {
		let mut entries = self.entries.lock();
		let before = entries.len();
		entries.retain(|(entry, _)| *entry != id);
		entries.len() != before
	}

	/// Number of registered callbacks.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns true if nothing is subscribed.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Calls every callback except `skip` with `value`.
	pub fn notify(&self, value: &T, skip: Option<ObserverId>) {
		let snapshot: Vec<(ObserverId, Callback<T>)> = self
			.entries
			.lock()
			.iter()
			.filter(|(id, _)| Some(*id) != skip)
			.map(|(id, cb)| (*id, Arc::clone(cb)))
			.collect();

		for (id, callback) in snapshot {
			if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
				tracing::error!(registry = self.name, observer = id.0, "observer panicked");
			}
		}
	}
}

impl<T: ?Sized> std::fmt::Debug for ObserverSet<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ObserverSet")
			.field("name", &self.name)
			.field("len", &self.len())
			.finish()
	}
}

use std::time::Duration;

use super::*;
use crate::{FragmentForest, FragmentSpec};

#[derive(Default)]
struct Recorder {
	events: Mutex<Vec<String>>,
}

impl Recorder {
	fn take(&self) -> Vec<String> {
		std::mem::take(&mut *self.events.lock())
	}
}

impl SessionCallbacks for Recorder {
	fn started(&self, position: usize) {
		self.events.lock().push(format!("started {position}"));
	}

	fn stdout(&self, position: usize, text: &str) {
		self.events.lock().push(format!("stdout {position} {text}"));
	}

	fn stderr(&self, position: usize, text: &str) {
		self.events.lock().push(format!("stderr {position} {text}"));
	}

	fn succeeded(&self, position: usize) {
		self.events.lock().push(format!("succeeded {position}"));
	}

	fn failed(&self, position: usize, error: &str) {
		self.events.lock().push(format!("failed {position} {error}"));
	}
}

fn chain_of(codes: &[&str]) -> Vec<Arc<Fragment>> {
	let specs: Vec<FragmentSpec> = codes
		.iter()
		.enumerate()
		.map(|(i, code)| {
			let spec = FragmentSpec::new().identity(format!("f{i}")).code(*code);
			if i == 0 { spec } else { spec.parent(format!("f{}", i - 1)) }
		})
		.collect();
	let forest = FragmentForest::build(&specs).unwrap();
	forest.fragments().last().unwrap().chain()
}

async fn next_execute(peer: &mut InterpreterPeer) -> (SessionId, Vec<String>) {
	match peer.next_request().await.expect("channel dropped") {
		Outbound::Execute { session_id, codes } => (session_id, codes),
	}
}

/// Lets the pump drain everything sent so far.
async fn settle() {
	for _ in 0..8 {
		tokio::task::yield_now().await;
	}
}

#[tokio::test]
async fn run_sends_codes_and_routes_events() {
	let (link, mut peer) = InterpreterLink::pair();
	let channel = ExecutionChannel::spawn(link);
	let recorder = Arc::new(Recorder::default());
	let chain = chain_of(&["x = 1", "print(x)"]);

	let run = tokio::spawn({
		let channel = channel.clone();
		let recorder = Arc::clone(&recorder);
		async move { channel.run(&chain, recorder).await }
	});

	let (session_id, codes) = next_execute(&mut peer).await;
	assert_eq!(codes, ["x = 1", "print(x)"]);
	assert_eq!(channel.pending_sessions(), 1);

	peer.send(Inbound::FragmentStarted { session_id, position: 0 });
	peer.send(Inbound::FragmentSucceeded { session_id, position: 0 });
	peer.send(Inbound::FragmentStarted { session_id, position: 1 });
	peer.send(Inbound::FragmentStdout {
		session_id,
		position: 1,
		text: "1\n".into(),
	});
	peer.send(Inbound::FragmentStdoutFlush { session_id, position: 1 });
	peer.send(Inbound::FragmentSucceeded { session_id, position: 1 });
	peer.send(Inbound::SessionSucceeded { session_id });

	run.await.unwrap().unwrap();
	assert_eq!(
		recorder.take(),
		["started 0", "succeeded 0", "started 1", "stdout 1 1\n", "succeeded 1"]
	);
	assert_eq!(channel.pending_sessions(), 0);
}

#[tokio::test]
async fn concurrent_sessions_are_isolated() {
	let (link, mut peer) = InterpreterLink::pair();
	let channel = ExecutionChannel::spawn(link);
	let first = Arc::new(Recorder::default());
	let second = Arc::new(Recorder::default());

	let run_first = tokio::spawn({
		let (channel, first) = (channel.clone(), Arc::clone(&first));
		async move { channel.run(&chain_of(&["a"]), first).await }
	});
	let (first_id, _) = next_execute(&mut peer).await;
	let run_second = tokio::spawn({
		let (channel, second) = (channel.clone(), Arc::clone(&second));
		async move { channel.run(&chain_of(&["b"]), second).await }
	});
	let (second_id, _) = next_execute(&mut peer).await;
	assert_ne!(first_id, second_id);

	peer.send(Inbound::FragmentStdout {
		session_id: second_id,
		position: 0,
		text: "two".into(),
	});
	peer.send(Inbound::FragmentStdout {
		session_id: first_id,
		position: 0,
		text: "one".into(),
	});
	peer.send(Inbound::SessionFailed {
		session_id: second_id,
		error: "boom".into(),
	});
	peer.send(Inbound::SessionSucceeded { session_id: first_id });

	assert_eq!(run_second.await.unwrap(), Err(RunError::Session("boom".into())));
	assert_eq!(run_first.await.unwrap(), Ok(()));
	assert_eq!(first.take(), ["stdout 0 one"]);
	assert_eq!(second.take(), ["stdout 0 two"]);
}

#[tokio::test]
async fn fragment_failure_does_not_settle_session() {
	let (link, mut peer) = InterpreterLink::pair();
	let channel = ExecutionChannel::spawn(link);
	let recorder = Arc::new(Recorder::default());

	let run = tokio::spawn({
		let (channel, recorder) = (channel.clone(), Arc::clone(&recorder));
		async move { channel.run(&chain_of(&["raise X"]), recorder).await }
	});
	let (session_id, _) = next_execute(&mut peer).await;

	peer.send(Inbound::FragmentFailed {
		session_id,
		position: 0,
		error: "X".into(),
	});
	settle().await;
	assert!(!run.is_finished());
	assert_eq!(channel.pending_sessions(), 1);

	peer.send(Inbound::SessionFailed {
		session_id,
		error: "X".into(),
	});
	assert_eq!(run.await.unwrap(), Err(RunError::Session("X".into())));
	assert_eq!(recorder.take(), ["failed 0 X"]);
}

#[tokio::test]
async fn stray_events_are_dropped() {
	let (link, mut peer) = InterpreterLink::pair();
	let channel = ExecutionChannel::spawn(link);
	let recorder = Arc::new(Recorder::default());

	let run = tokio::spawn({
		let (channel, recorder) = (channel.clone(), Arc::clone(&recorder));
		async move { channel.run(&chain_of(&["a", "b"]), recorder).await }
	});
	let (session_id, _) = next_execute(&mut peer).await;

	let unknown = SessionId(session_id.0 + 100);
	peer.send(Inbound::FragmentStdout {
		session_id: unknown,
		position: 0,
		text: "lost".into(),
	});
	peer.send(Inbound::SessionSucceeded { session_id: unknown });
	peer.send(Inbound::FragmentStdout {
		session_id,
		position: 2,
		text: "out of range".into(),
	});
	peer.send(Inbound::FragmentStdout {
		session_id,
		position: 1,
		text: "kept".into(),
	});
	peer.send(Inbound::SessionSucceeded { session_id });

	run.await.unwrap().unwrap();
	assert_eq!(recorder.take(), ["stdout 1 kept"]);
}

#[tokio::test]
async fn panicking_callback_is_contained() {
	struct Explosive {
		seen: Mutex<Vec<usize>>,
	}
	impl SessionCallbacks for Explosive {
		fn started(&self, _position: usize) {
			panic!("callback failure");
		}
		fn succeeded(&self, position: usize) {
			self.seen.lock().push(position);
		}
	}

	let (link, mut peer) = InterpreterLink::pair();
	let channel = ExecutionChannel::spawn(link);
	let callbacks = Arc::new(Explosive {
		seen: Mutex::new(Vec::new()),
	});

	let run = tokio::spawn({
		let (channel, callbacks) = (channel.clone(), Arc::clone(&callbacks));
		async move { channel.run(&chain_of(&["a"]), callbacks).await }
	});
	let (session_id, _) = next_execute(&mut peer).await;

	peer.send(Inbound::FragmentStarted { session_id, position: 0 });
	peer.send(Inbound::FragmentSucceeded { session_id, position: 0 });
	peer.send(Inbound::SessionSucceeded { session_id });

	run.await.unwrap().unwrap();
	assert_eq!(*callbacks.seen.lock(), [0]);
	assert!(channel.closed_reason().is_none());
}

#[tokio::test]
async fn close_fails_pending_and_later_sessions() {
	let (link, mut peer) = InterpreterLink::pair();
	let channel = ExecutionChannel::spawn(link);

	let run = tokio::spawn({
		let channel = channel.clone();
		async move { channel.run(&chain_of(&["a"]), Arc::new(Recorder::default())).await }
	});
	next_execute(&mut peer).await;

	peer.close(ChannelError::Io("broken pipe".into()));
	let err = run.await.unwrap().unwrap_err();
	assert!(err.is_channel());
	assert_eq!(err, RunError::Channel(ChannelError::Io("broken pipe".into())));
	assert_eq!(channel.pending_sessions(), 0);
	assert_eq!(channel.closed_reason(), Some(ChannelError::Io("broken pipe".into())));

	let later = channel.run(&chain_of(&["b"]), Arc::new(Recorder::default())).await;
	assert_eq!(later, Err(RunError::Channel(ChannelError::Io("broken pipe".into()))));
	assert!(peer.try_next_request().is_none());
}

#[tokio::test]
async fn dropped_peer_disconnects() {
	let (link, mut peer) = InterpreterLink::pair();
	let channel = ExecutionChannel::spawn(link);

	let run = tokio::spawn({
		let channel = channel.clone();
		async move { channel.run(&chain_of(&["a"]), Arc::new(Recorder::default())).await }
	});
	next_execute(&mut peer).await;
	drop(peer);

	assert_eq!(run.await.unwrap(), Err(RunError::Channel(ChannelError::Disconnected)));
	assert_eq!(channel.closed_reason(), Some(ChannelError::Disconnected));
}

#[tokio::test]
async fn abandoned_run_forgets_session() {
	let (link, mut peer) = InterpreterLink::pair();
	let channel = ExecutionChannel::spawn(link);
	let chain = chain_of(&["while True: pass"]);

	let outcome = tokio::time::timeout(Duration::from_millis(20), channel.run(&chain, Arc::new(Recorder::default()))).await;
	assert!(outcome.is_err());
	assert_eq!(channel.pending_sessions(), 0);

	// Late events for the abandoned session are ignored.
	let (session_id, _) = next_execute(&mut peer).await;
	peer.send(Inbound::SessionSucceeded { session_id });
	settle().await;
	assert!(channel.closed_reason().is_none());
}

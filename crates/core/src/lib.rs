//! Hierarchical code fragments and their execution.
//!
//! A fragment may extend one parent fragment. Running a fragment runs its whole
//! ancestor chain, root first, as a single program inside a shared interpreter.
//!
//! * [`preprocess`]: dedent raw snippet text.
//! * [`FragmentForest`]: validate a flat list of [`FragmentSpec`]s and link it into trees.
//! * [`Fragment`]: mutable code, execution state and output buffers of one node.
//! * [`ExecutionChannel`]: session multiplexing over one [`InterpreterLink`].

#![warn(missing_docs)]

pub mod channel;
pub mod error;
pub mod forest;
pub mod fragment;
pub mod observer;
pub mod preprocess;

pub use channel::{ExecutionChannel, InterpreterLink, InterpreterPeer, LinkEvent, SessionCallbacks};
pub use deckrun_proto::SessionId;
pub use error::{ChannelError, ExecuteError, ForestError, MalformedIndentation, RunError};
pub use forest::{FragmentForest, FragmentSpec};
pub use fragment::{ANONYMOUS, Fragment, FragmentState, OutputBuffer, OutputChange};
pub use observer::{ObserverId, ObserverSet};
pub use preprocess::preprocess;

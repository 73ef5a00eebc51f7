//! Wire types and framing for the deckrun interpreter protocol.
//!
//! The interpreter is an opaque peer reached only through messages. This crate
//! provides:
//! * [`Envelope`]: the `{"type": ..., "value": ...}` object every message travels in
//! * [`Outbound`] / [`Inbound`]: typed messages for each direction
//! * [`write_message`] / [`read_message`]: `Content-Length` framing over tokio I/O
//!
//! All message types are namespaced under [`MESSAGE_PREFIX`] so several
//! protocols can share one interpreter without colliding. Envelopes carrying a
//! foreign prefix decode to `None` and are meant to be skipped.

#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{MAX_FRAME_LEN, read_message, write_message};
pub use error::{Error, Result};
pub use message::{Envelope, Inbound, MESSAGE_PREFIX, Outbound, SessionId};

//! Deck files for deckrun.
//!
//! A deck is a TOML document listing the code fragments of a presentation in
//! order, plus optionally how to start the interpreter that runs them:
//!
//! ```toml
//! [interpreter]
//! command = "python3"
//! args = ["-u", "runner.py"]
//!
//! [[fragment]]
//! id = "setup"
//! code = """
//!     import math
//! """
//!
//! [[fragment]]
//! parent = "setup"
//! code = "print(math.pi)"
//!
//! # Shows `setup` a second time without defining a new fragment.
//! [[fragment]]
//! ref = "setup"
//! ```

pub mod deck;
pub mod error;

pub use deck::{Deck, DeckEntry, InterpreterSection, LoadedDeck};
pub use error::{DeckError, Result};

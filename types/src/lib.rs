//! Fundamental types for the Agora task marketplace.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! node identifiers, timestamps and the clock abstraction, key material, and the
//! error-kind taxonomy that lets callers branch on failure causes across components.

pub mod error;
pub mod keys;
pub mod node_id;
pub mod time;

pub use error::ErrorKind;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use node_id::NodeId;
pub use time::{Clock, SystemClock, Timestamp};

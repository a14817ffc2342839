//! Core types shared by the whisk action runtime.
//!
//! - [`record`]: the per-invocation input record and the single result record
//! - [`codec`]: JSON encode/decode between the wire and handler types
//! - [`config`]: runtime configuration and the invocation metadata projection
//! - [`error`]: the error taxonomy every invocation outcome converges on

pub mod codec;
pub mod config;
pub mod error;
pub mod record;

pub use codec::{CodecOptions, WireCodec};
pub use config::{RuntimeConfig, SharedConfig, WhiskConfig};
pub use error::{ActionError, BoxError, ErrorKind};
pub use record::{InvocationRecord, ResultRecord};

//! Invocation dispatch for whisk actions.
//!
//! An action binary picks one [`HandlerShape`], wraps it in an
//! [`ActionRuntime`], and serves invocations from an [`InvocationChannel`]:
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use whisk_runtime::{ActionRuntime, ChannelMode, HandlerShape, InvocationChannel};
//! use whisk_runtime::core::{BoxError, RuntimeConfig, SharedConfig, WhiskConfig};
//!
//! #[derive(Deserialize)]
//! struct Input { name: Option<String> }
//!
//! #[derive(Serialize)]
//! struct Output { greeting: String }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SharedConfig::new(RuntimeConfig::from_env(&WhiskConfig::default()));
//! let handler = HandlerShape::typed(|input: Input| -> Result<Output, BoxError> {
//!     let name = input.name.unwrap_or_else(|| "stranger".into());
//!     Ok(Output { greeting: format!("Hello, {name}!") })
//! });
//!
//! let runtime = ActionRuntime::new(config, handler);
//! let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//! let results = whisk_runtime::channel::open_result_fd(3)?;
//! let mut channel = InvocationChannel::new(stdin, results, ChannelMode::Loop);
//! runtime.serve(&mut channel).await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod completion;
pub mod dispatcher;
pub mod handler;
pub mod serve;

pub use channel::{ChannelMode, InvocationChannel, Next};
pub use completion::Completion;
pub use dispatcher::Dispatcher;
pub use handler::HandlerShape;
pub use serve::{ActionRuntime, ServeStats};

pub use whisk_client as client;
pub use whisk_core as core;

//! Callback client for whisk actions.
//!
//! Lets a running handler talk back to the platform's control plane:
//! invoke another action, fire a trigger, create a trigger or a rule.
//!
//! ```rust,no_run
//! use whisk_client::CallbackClient;
//! use whisk_core::{RuntimeConfig, SharedConfig, WhiskConfig};
//!
//! # fn run() -> Result<(), whisk_core::ActionError> {
//! let config = SharedConfig::new(RuntimeConfig::from_env(&WhiskConfig::default()));
//! let client = CallbackClient::new(config)?;
//!
//! let activation = client.invoke_action("/whisk.system/utils/date", &serde_json::json!({}), true);
//! println!("{}", activation["response"]["result"]);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod qualified;

pub use client::CallbackClient;
pub use qualified::QualifiedName;

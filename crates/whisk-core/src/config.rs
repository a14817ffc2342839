use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Deserialize;

use crate::codec::{CodecOptions, WireCodec};
use crate::error::ActionError;
use crate::record::InvocationRecord;

/// Prefix of platform-provided variables.
pub const PLATFORM_PREFIX: &str = "__OW_";
pub const API_HOST: &str = "__OW_API_HOST";
pub const API_KEY: &str = "__OW_API_KEY";

/// Env var overriding `client.timeout_secs`.
pub const TIMEOUT_ENV: &str = "WHISK_CALLBACK_TIMEOUT_SECS";

/// File-level configuration (`whisk.toml`). Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct WhiskConfig {
    #[serde(default)]
    pub client: ClientOptions,
    #[serde(default)]
    pub codec: CodecOptions,
    #[serde(default)]
    pub channel: ChannelOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientOptions {
    /// Upper bound on a callback request; `0` waits forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Accept self-signed control-plane certificates (test setups only).
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            accept_invalid_certs: false,
        }
    }
}

impl ClientOptions {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelOptions {
    #[serde(default = "default_result_fd")]
    pub result_fd: i32,
    #[serde(default)]
    pub single_shot: bool,
}

fn default_result_fd() -> i32 {
    3
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            result_fd: default_result_fd(),
            single_shot: false,
        }
    }
}

impl WhiskConfig {
    pub fn from_file(path: &Path) -> Result<Self, ActionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ActionError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ActionError> {
        toml::from_str(content)
            .map_err(|e| ActionError::Config(format!("failed to parse config: {e}")))
    }

    /// Apply environment overrides, looking variables up through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ActionError> {
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            self.client.timeout_secs = raw
                .trim()
                .parse()
                .map_err(|e| ActionError::Config(format!("invalid {TIMEOUT_ENV} {raw:?}: {e}")))?;
        }
        Ok(self)
    }
}

/// Process-wide runtime state read by the callback client.
///
/// Holds the platform variables (`__OW_*`) plus codec and client options.
/// Instances are immutable once shared; updates go through
/// [`SharedConfig::apply_invocation`].
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    vars: BTreeMap<String, String>,
    pub codec: CodecOptions,
    pub client: ClientOptions,
}

impl RuntimeConfig {
    pub fn new(file: &WhiskConfig) -> Self {
        Self {
            vars: BTreeMap::new(),
            codec: file.codec.clone(),
            client: file.client.clone(),
        }
    }

    /// Seed platform variables from the process environment.
    pub fn from_env(file: &WhiskConfig) -> Self {
        Self::new(file).with_vars(std::env::vars())
    }

    /// Seed platform variables from `vars`; names without the `__OW_` prefix are ignored.
    pub fn with_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.vars.extend(
            vars.into_iter()
                .filter(|(name, _)| name.starts_with(PLATFORM_PREFIX)),
        );
        self
    }

    /// Platform-namespaced name for an invocation metadata key.
    pub fn projected_name(key: &str) -> String {
        format!("{PLATFORM_PREFIX}{}", key.to_uppercase())
    }

    /// Look up a platform variable by its full name (e.g. `__OW_API_HOST`).
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Look up a value by its invocation metadata key (e.g. `activation_id`).
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.var(&Self::projected_name(key))
    }

    pub fn api_host(&self) -> Option<&str> {
        self.var(API_HOST)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.var(API_KEY)
    }

    pub fn activation_id(&self) -> Option<&str> {
        self.meta("activation_id")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta("namespace")
    }

    pub fn action_name(&self) -> Option<&str> {
        self.meta("action_name")
    }

    pub fn deadline(&self) -> Option<&str> {
        self.meta("deadline")
    }

    pub fn codec(&self) -> WireCodec {
        WireCodec::new(self.codec.clone())
    }

    /// Copy of this config with every metadata key of `record` installed
    /// under its platform-namespaced name.
    pub fn with_invocation(&self, record: &InvocationRecord) -> Self {
        let mut next = self.clone();
        for (key, value) in &record.metadata {
            next.vars.insert(Self::projected_name(key), value.clone());
        }
        next
    }
}

/// Shared handle to the current [`RuntimeConfig`].
///
/// Readers take a snapshot per use; the Environment Projector
/// ([`apply_invocation`](Self::apply_invocation)) is the only writer.
#[derive(Clone)]
pub struct SharedConfig {
    current: Arc<ArcSwap<RuntimeConfig>>,
}

impl SharedConfig {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<RuntimeConfig> {
        self.current.load_full()
    }

    /// Project an invocation's metadata into the shared config.
    ///
    /// Must run before the invocation's `value` is dispatched.
    pub fn apply_invocation(&self, record: &InvocationRecord) -> Arc<RuntimeConfig> {
        let next = Arc::new(self.current.load().with_invocation(record));
        self.current.store(Arc::clone(&next));
        tracing::debug!(
            keys = record.metadata.len(),
            activation_id = record.activation_id().unwrap_or("-"),
            "Projected invocation metadata"
        );
        next
    }
}

impl std::fmt::Debug for SharedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedConfig").field(&self.current.load()).finish()
    }
}

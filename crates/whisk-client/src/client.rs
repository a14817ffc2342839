use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use whisk_core::{ActionError, SharedConfig};

use crate::qualified::QualifiedName;

/// Client for the platform's control-plane API, usable from inside a handler.
///
/// Two surfaces over the same requests:
///
/// - `*_async` methods return `Result` and are meant for suspension-capable
///   handlers.
/// - the plain methods block the calling handler until the response arrives
///   (bounded by `client.timeout_secs`) and fold any failure into an
///   `{"error": ...}` object, so the handler always gets a JSON object back.
///
/// The blocking methods must not be called from an async task on a
/// current-thread runtime; async handlers use the `*_async` variants.
///
/// Host, key and timeout are read from a [`SharedConfig`] snapshot on every
/// call, so invocation metadata projected after construction is honoured.
#[derive(Clone)]
pub struct CallbackClient {
    http: reqwest::Client,
    config: SharedConfig,
    handle: Option<Handle>,
}

impl CallbackClient {
    pub fn new(config: SharedConfig) -> Result<Self, ActionError> {
        let options = config.snapshot().client.clone();
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|e| ActionError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            handle: Handle::try_current().ok(),
        })
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Invoke another action. With `blocking`, the response is the finished
    /// activation record; without it, only the activation id.
    pub fn invoke_action(&self, qualified: &str, params: &Value, blocking: bool) -> Value {
        into_value(self.block_on(self.invoke_action_async(qualified, params, blocking)))
    }

    /// Fire a trigger.
    pub fn fire_trigger(&self, qualified: &str, params: &Value) -> Value {
        into_value(self.block_on(self.fire_trigger_async(qualified, params)))
    }

    /// Create (or update) a trigger.
    pub fn create_trigger(&self, qualified: &str, params: &Value) -> Value {
        into_value(self.block_on(self.create_trigger_async(qualified, params)))
    }

    /// Create (or update) a rule binding `trigger` to `action`.
    pub fn create_rule(&self, rule: &str, trigger: &str, action: &str) -> Value {
        into_value(self.block_on(self.create_rule_async(rule, trigger, action)))
    }

    pub async fn invoke_action_async(
        &self,
        qualified: &str,
        params: &Value,
        blocking: bool,
    ) -> Result<Map<String, Value>, ActionError> {
        let target = QualifiedName::parse(qualified);
        let path = format!(
            "/api/v1/namespaces/{}/actions/{}?blocking={blocking}",
            target.namespace, target.name
        );
        self.send(Method::POST, path, params).await
    }

    pub async fn fire_trigger_async(
        &self,
        qualified: &str,
        params: &Value,
    ) -> Result<Map<String, Value>, ActionError> {
        let target = QualifiedName::parse(qualified);
        let path = format!(
            "/api/v1/namespaces/{}/triggers/{}?blocking=true",
            target.namespace, target.name
        );
        self.send(Method::POST, path, params).await
    }

    pub async fn create_trigger_async(
        &self,
        qualified: &str,
        params: &Value,
    ) -> Result<Map<String, Value>, ActionError> {
        let target = QualifiedName::parse(qualified);
        let path = format!(
            "/api/v1/namespaces/{}/triggers/{}",
            target.namespace, target.name
        );
        self.send(Method::PUT, path, params).await
    }

    pub async fn create_rule_async(
        &self,
        rule: &str,
        trigger: &str,
        action: &str,
    ) -> Result<Map<String, Value>, ActionError> {
        let target = QualifiedName::parse(rule);
        let path = format!(
            "/api/v1/namespaces/{}/rules/{}",
            target.namespace, target.name
        );
        let body = serde_json::json!({ "trigger": trigger, "action": action });
        self.send(Method::PUT, path, &body).await
    }

    async fn send(
        &self,
        method: Method,
        path: String,
        body: &Value,
    ) -> Result<Map<String, Value>, ActionError> {
        let config = self.config.snapshot();
        let host = config
            .api_host()
            .ok_or_else(|| ActionError::Config("missing __OW_API_HOST".into()))?;
        let key = config
            .api_key()
            .ok_or_else(|| ActionError::Config("Invalid __OW_API_KEY".into()))?;

        let url_str = format!("{}{path}", host.trim_end_matches('/'));
        let url = reqwest::Url::parse(&url_str)
            .map_err(|_| ActionError::Config(format!("Invalid URL: {url_str}")))?;

        tracing::debug!(method = %method, path = %url.path(), "Sending control-plane request");

        let request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Basic {}", STANDARD.encode(key)))
            .json(body);

        let call = async move {
            let resp = request
                .send()
                .await
                .map_err(|e| ActionError::Network(e.to_string()))?;

            let status = resp.status();
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| ActionError::Network(e.to_string()))?;

            if !status.is_success() {
                return Err(ActionError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
            decode_body(&bytes)
        };

        match config.client.timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ActionError::Timeout(limit.as_secs()))?,
            None => call.await,
        }
    }

    /// Drive `fut` to completion from synchronous handler code.
    fn block_on<T>(
        &self,
        fut: impl Future<Output = Result<T, ActionError>>,
    ) -> Result<T, ActionError> {
        match Handle::try_current().ok().or_else(|| self.handle.clone()) {
            Some(handle) => tokio::task::block_in_place(|| handle.block_on(fut)),
            None => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| ActionError::Network(format!("failed to start I/O runtime: {e}")))?
                .block_on(fut),
        }
    }
}

/// Decode a successful control-plane response body.
pub fn decode_body(bytes: &[u8]) -> Result<Map<String, Value>, ActionError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ActionError::InvalidResponse(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ActionError::ResponseNotObject),
    }
}

fn into_value(outcome: Result<Map<String, Value>, ActionError>) -> Value {
    match outcome {
        Ok(map) => Value::Object(map),
        Err(e) => {
            tracing::warn!(kind = %e.kind(), error = %e, "Control-plane request failed");
            serde_json::json!({ "error": e.to_string() })
        }
    }
}

use serde_json::{Map, Value};
use whisk_core::{ActionError, ResultRecord, SharedConfig};

use crate::handler::HandlerShape;

/// Runs the action's handler for one invocation and normalizes the outcome.
///
/// Synchronous shapes (and the body of callback shapes) run on the blocking
/// pool so they may call the blocking [`CallbackClient`](whisk_client::CallbackClient)
/// surface. The dispatcher does not return until the handler has settled.
pub struct Dispatcher {
    handler: HandlerShape,
    config: SharedConfig,
}

impl Dispatcher {
    pub fn new(handler: HandlerShape, config: SharedConfig) -> Self {
        Self { handler, config }
    }

    pub fn handler(&self) -> &HandlerShape {
        &self.handler
    }

    /// Run the handler on an invocation's `value`.
    pub async fn run(&self, value: Value) -> ResultRecord {
        let outcome = self.settle(value).await;
        match &outcome {
            Ok(_) => tracing::debug!(shape = self.handler.kind(), "Handler settled"),
            Err(e) => tracing::warn!(
                shape = self.handler.kind(),
                kind = %e.kind(),
                error = %e,
                "Handler failed"
            ),
        }
        outcome.into()
    }

    async fn settle(&self, value: Value) -> Result<Map<String, Value>, ActionError> {
        let codec = self.config.snapshot().codec();

        match &self.handler {
            HandlerShape::Untyped(f) => {
                let f = f.clone();
                on_blocking_pool(move || {
                    let output = f(value).map_err(ActionError::handler)?;
                    codec.encode_untyped(output)
                })
                .await?
            }
            HandlerShape::UntypedAsync(f) => {
                let output = f(value).await.map_err(ActionError::handler)?;
                codec.encode_untyped(output)
            }
            HandlerShape::Typed(run) => {
                let run = run.clone();
                on_blocking_pool(move || run(value, codec)).await?
            }
            HandlerShape::Completion { run, .. } => {
                let run = run.clone();
                let settled = on_blocking_pool(move || run(value, codec)).await??;
                // every completion dropped without a response
                settled.await.unwrap_or(Err(ActionError::CallbackContract))
            }
            HandlerShape::Suspending { run, .. } => run(value, codec)?.await,
        }
    }
}

/// Run `f` on the blocking pool; a panicking handler takes the process down.
async fn on_blocking_pool<T, F>(f: F) -> Result<T, ActionError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(out) => Ok(out),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(ActionError::handler(e)),
    }
}

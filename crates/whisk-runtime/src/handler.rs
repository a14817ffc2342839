use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use whisk_core::{ActionError, BoxError, WireCodec};

use crate::completion::{Completion, Settled};

pub type UntypedFn = Arc<dyn Fn(Value) -> Result<Value, BoxError> + Send + Sync>;

pub type UntypedAsyncFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

pub type TypedFn =
    Arc<dyn Fn(Value, WireCodec) -> Result<Map<String, Value>, ActionError> + Send + Sync>;

pub type CompletionFn = Arc<
    dyn Fn(Value, WireCodec) -> Result<oneshot::Receiver<Settled>, ActionError> + Send + Sync,
>;

pub type Suspended = Result<BoxFuture<'static, Settled>, ActionError>;

pub type SuspendingFn = Arc<dyn Fn(Value, WireCodec) -> Suspended + Send + Sync>;

/// The user function an action runs, tagged by how it wants to be called.
///
/// Exactly one shape is chosen when the action is built; the dispatcher
/// has one code path per variant. Build values with the constructors, which
/// erase the handler's input and output types behind the codec.
#[derive(Clone)]
pub enum HandlerShape {
    /// `fn(Value) -> Result<Value, _>`; the result must be a JSON object.
    Untyped(UntypedFn),
    /// `async fn(Value) -> Result<Value, _>`.
    UntypedAsync(UntypedAsyncFn),
    /// `fn(In) -> Result<Out, _>` with serde input and output.
    Typed(TypedFn),
    /// `fn(In, Completion<Out>)`, or `fn(Completion<Out>)` when `takes_input` is false.
    Completion { takes_input: bool, run: CompletionFn },
    /// `async fn(In) -> Result<Option<Out>, _>`, or the no-input form.
    Suspending { takes_input: bool, run: SuspendingFn },
}

impl HandlerShape {
    pub fn untyped<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        HandlerShape::Untyped(Arc::new(f))
    }

    pub fn untyped_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        HandlerShape::UntypedAsync(Arc::new(move |value: Value| f(value).boxed()))
    }

    pub fn typed<In, Out, F>(f: F) -> Self
    where
        In: DeserializeOwned,
        Out: Serialize,
        F: Fn(In) -> Result<Out, BoxError> + Send + Sync + 'static,
    {
        HandlerShape::Typed(Arc::new(move |value: Value, codec: WireCodec| {
            let input: In = codec.decode(&value)?;
            let output = f(input).map_err(ActionError::handler)?;
            codec.encode(&output)
        }))
    }

    pub fn completion<In, Out, F>(f: F) -> Self
    where
        In: DeserializeOwned,
        Out: Serialize + 'static,
        F: Fn(In, Completion<Out>) + Send + Sync + 'static,
    {
        HandlerShape::Completion {
            takes_input: true,
            run: Arc::new(move |value: Value, codec: WireCodec| -> Result<_, ActionError> {
                let input: In = codec.decode(&value)?;
                let (completion, settled) = Completion::channel(codec);
                f(input, completion);
                Ok(settled)
            }),
        }
    }

    pub fn completion_no_input<Out, F>(f: F) -> Self
    where
        Out: Serialize + 'static,
        F: Fn(Completion<Out>) + Send + Sync + 'static,
    {
        HandlerShape::Completion {
            takes_input: false,
            run: Arc::new(move |_value: Value, codec: WireCodec| -> Result<_, ActionError> {
                let (completion, settled) = Completion::channel(codec);
                f(completion);
                Ok(settled)
            }),
        }
    }

    pub fn suspending<In, Out, F, Fut>(f: F) -> Self
    where
        In: DeserializeOwned,
        Out: Serialize + 'static,
        F: Fn(In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Out>, BoxError>> + Send + 'static,
    {
        HandlerShape::Suspending {
            takes_input: true,
            run: Arc::new(move |value: Value, codec: WireCodec| -> Suspended {
                let input: In = codec.decode(&value)?;
                Ok(settle(f(input), codec).boxed())
            }),
        }
    }

    pub fn suspending_no_input<Out, F, Fut>(f: F) -> Self
    where
        Out: Serialize + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Out>, BoxError>> + Send + 'static,
    {
        HandlerShape::Suspending {
            takes_input: false,
            run: Arc::new(move |_value: Value, codec: WireCodec| -> Suspended {
                Ok(settle(f(), codec).boxed())
            }),
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerShape::Untyped(_) => "untyped",
            HandlerShape::UntypedAsync(_) => "untyped_async",
            HandlerShape::Typed(_) => "typed",
            HandlerShape::Completion { takes_input: true, .. } => "completion",
            HandlerShape::Completion { takes_input: false, .. } => "completion_no_input",
            HandlerShape::Suspending { takes_input: true, .. } => "suspending",
            HandlerShape::Suspending { takes_input: false, .. } => "suspending_no_input",
        }
    }
}

impl std::fmt::Debug for HandlerShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HandlerShape").field(&self.kind()).finish()
    }
}

async fn settle<Out, Fut>(fut: Fut, codec: WireCodec) -> Settled
where
    Out: Serialize,
    Fut: Future<Output = Result<Option<Out>, BoxError>>,
{
    match fut.await {
        Ok(Some(out)) => codec.encode(&out),
        Ok(None) => Err(ActionError::CallbackContract),
        Err(e) => Err(ActionError::handler(e)),
    }
}

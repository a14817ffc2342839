use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use whisk_core::{ActionError, BoxError, WireCodec};

/// Outcome of one invocation once the handler has settled.
pub type Settled = Result<Map<String, Value>, ActionError>;

/// Completion callback handed to callback-style handlers.
///
/// Clones share one slot: the first [`respond`](Self::respond) settles the
/// invocation, later calls are ignored. Dropping every clone without
/// responding settles it as a contract violation.
pub struct Completion<Out> {
    inner: Arc<Inner>,
    _out: PhantomData<fn(Out)>,
}

struct Inner {
    slot: Mutex<Option<oneshot::Sender<Settled>>>,
    codec: WireCodec,
}

impl<Out> Clone for Completion<Out> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _out: PhantomData,
        }
    }
}

impl<Out: Serialize> Completion<Out> {
    pub(crate) fn channel(codec: WireCodec) -> (Self, oneshot::Receiver<Settled>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Some(tx)),
                codec,
            }),
            _out: PhantomData,
        };
        (completion, rx)
    }

    /// Settle the invocation with an output or an error.
    ///
    /// An error wins over an output; neither is a contract violation.
    /// Returns `false` if the invocation had already been settled.
    pub fn respond(&self, output: Option<Out>, error: Option<BoxError>) -> bool {
        let Some(tx) = self
            .inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            tracing::warn!("Completion called after the invocation was settled; ignoring");
            return false;
        };

        let outcome = match (output, error) {
            (_, Some(err)) => Err(ActionError::handler(err)),
            (None, None) => Err(ActionError::CallbackContract),
            (Some(out), None) => self.inner.codec.encode(&out),
        };

        // receiver is gone only if the dispatcher itself was dropped
        let _ = tx.send(outcome);
        true
    }

    pub fn succeed(&self, output: Out) -> bool {
        self.respond(Some(output), None)
    }

    pub fn fail(&self, error: impl Into<BoxError>) -> bool {
        self.respond(None, Some(error.into()))
    }

    pub fn is_settled(&self) -> bool {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::Instrument;
use whisk_core::{ActionError, InvocationRecord, ResultRecord, SharedConfig};

use crate::channel::{InvocationChannel, Next};
use crate::dispatcher::Dispatcher;
use crate::handler::HandlerShape;

/// Counters reported when the input channel closes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeStats {
    pub invocations: u64,
    pub errors: u64,
}

/// A single action process: one handler, one invocation at a time.
///
/// The serve loop reads an invocation, projects its metadata into the
/// shared config, dispatches its `value`, and writes the result before it
/// reads the next one, so results leave in the order invocations arrived.
pub struct ActionRuntime {
    config: SharedConfig,
    dispatcher: Dispatcher,
}

impl ActionRuntime {
    pub fn new(config: SharedConfig, handler: HandlerShape) -> Self {
        let dispatcher = Dispatcher::new(handler, config.clone());
        Self { config, dispatcher }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Handle one invocation end to end (without touching the channel).
    pub async fn handle(&self, record: InvocationRecord) -> ResultRecord {
        let span = tracing::info_span!(
            "invocation",
            activation_id = record.activation_id().unwrap_or("-"),
            action = record.action_name().unwrap_or("-"),
            shape = self.dispatcher.handler().kind(),
        );

        self.config.apply_invocation(&record);
        self.dispatcher.run(record.value).instrument(span).await
    }

    /// Serve invocations until the channel reports end of input.
    ///
    /// Only channel I/O failures end the loop with an error; every other
    /// failure becomes that invocation's result record.
    pub async fn serve<R, W>(
        &self,
        channel: &mut InvocationChannel<R, W>,
    ) -> Result<ServeStats, ActionError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut stats = ServeStats::default();

        loop {
            let result = match channel.next_invocation().await? {
                Next::End => break,
                Next::Malformed(err) => {
                    tracing::warn!(error = %err, "Malformed invocation record");
                    ResultRecord::from(err)
                }
                Next::Invocation(record) => self.handle(record).await,
            };

            stats.invocations += 1;
            if result.is_failure() {
                stats.errors += 1;
            }
            channel.emit_result(&result).await?;
        }

        tracing::info!(
            invocations = stats.invocations,
            errors = stats.errors,
            "Input closed, action runtime stopping"
        );
        Ok(stats)
    }
}

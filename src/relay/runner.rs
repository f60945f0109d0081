//! Running a workflow as a relay session on its own task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::RelayConfig;
use crate::metrics::RelayMetrics;
use crate::relay::ids::SharedIds;
use crate::relay::session::{PartStream, RelaySession};
use crate::relay::RelayError;

/// The body of one request: drives producers and writes to the session.
#[async_trait]
pub trait Workflow: Send + 'static {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn execute(self, session: &mut RelaySession) -> Result<(), RelayError>;
}

/// Everything a session needs besides its workflow.
#[derive(Clone)]
pub struct SessionContext {
    pub buffer_size: usize,
    pub timeout: Duration,
    pub ids: SharedIds,
    pub metrics: Option<Arc<RelayMetrics>>,
}

impl SessionContext {
    pub fn new(config: &RelayConfig, ids: SharedIds) -> Self {
        Self {
            buffer_size: config.buffer_size,
            timeout: Duration::from_secs(config.session_timeout_secs),
            ids,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RelayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Start `workflow` on a new task and return the session's output stream.
///
/// The stream ends exactly once: after `close` on success, after the error
/// part on failure, or without further parts when the reader has gone away.
pub fn spawn_session<W: Workflow>(ctx: &SessionContext, workflow: W) -> PartStream {
    let (mut session, stream) = RelaySession::new(ctx.buffer_size, ctx.ids.clone());
    let name = workflow.name();
    let timeout = ctx.timeout;
    let metrics = ctx.metrics.clone();

    let task = async move {
        if let Some(m) = &metrics {
            m.session_started();
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let watch = session.disconnect_watch();
        // Merged producers count against the session: the drain races the
        // same deadline and disconnect watch as the workflow itself.
        let run = async {
            workflow.execute(&mut session).await?;
            session.drain_merges().await;
            Ok::<(), RelayError>(())
        };
        let outcome = tokio::select! {
            result = tokio::time::timeout_at(deadline, run) => {
                result.unwrap_or(Err(RelayError::Timeout(timeout)))
            }
            _ = watch.closed() => Err(RelayError::Disconnected),
        };
        drop(watch);

        let label = match outcome {
            Ok(()) => match tokio::time::timeout_at(deadline, session.close()).await {
                Ok(Ok(summary)) => {
                    info!(
                        parts = summary.parts,
                        channels = summary.channels,
                        elapsed_ms = summary.elapsed.as_millis() as u64,
                        "Session complete"
                    );
                    "complete"
                }
                Ok(Err(e)) => {
                    debug!("Close interrupted: {e}");
                    "disconnected"
                }
                Err(_) => {
                    warn!("Reader stalled before the finish marker; session dropped");
                    "failed"
                }
            },
            Err(RelayError::Disconnected) => {
                let summary = session.abandon();
                info!(parts = summary.parts, "Reader disconnected; session cancelled");
                "disconnected"
            }
            Err(e) => {
                warn!(error = %e, "Session failed");
                let summary = session.fail(&e).await;
                debug!(parts = summary.parts, "Error part written");
                "failed"
            }
        };

        if let Some(m) = &metrics {
            m.session_finished(name, label);
        }
    };

    tokio::spawn(task.instrument(info_span!("relay_session", workflow = name)));
    stream
}

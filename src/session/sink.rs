//! Sink trait and the background worker that feeds sinks.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{Session, SessionOutbox};
use crate::{Result, TelemetryError};

/// Destination for completed sessions.
///
/// Sinks receive each session by value and run on the [`SinkWorker`] task, so
/// implementations may block on I/O without stalling frame reception.
#[async_trait]
pub trait SessionSink: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    async fn write_session(&mut self, session: Session) -> Result<()>;

    /// Called once after the last session.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What the worker did over its lifetime.
#[derive(Debug, Default)]
pub struct SinkReport {
    /// Sessions received from the accumulator.
    pub sessions: usize,
    /// Successful writes, summed over all sinks.
    pub writes: usize,
    pub failures: Vec<TelemetryError>,
}

impl SinkReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs sinks on a dedicated task fed by an unbounded channel.
pub struct SinkWorker {
    sender: mpsc::UnboundedSender<Session>,
    handle: JoinHandle<SinkReport>,
}

impl SinkWorker {
    /// Spawn the worker. Must be called within a tokio runtime.
    pub fn spawn(sinks: Vec<Box<dyn SessionSink>>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(sinks, receiver));
        Self { sender, handle }
    }

    /// An outbox that forwards flushed sessions to this worker.
    pub fn outbox(&self) -> SessionOutbox {
        SessionOutbox::Channel(self.sender.clone())
    }

    /// Close the channel, wait for queued sessions to be written and collect the report.
    ///
    /// Outboxes handed out earlier must be dropped first or this waits for them.
    pub async fn finish(self) -> SinkReport {
        drop(self.sender);
        match self.handle.await {
            Ok(report) => report,
            Err(join_error) => {
                error!(%join_error, "Sink worker task failed");
                SinkReport {
                    failures: vec![TelemetryError::sink_failed("worker", join_error.to_string())],
                    ..Default::default()
                }
            }
        }
    }
}

async fn run_worker(
    mut sinks: Vec<Box<dyn SessionSink>>,
    mut receiver: mpsc::UnboundedReceiver<Session>,
) -> SinkReport {
    let mut report = SinkReport::default();
    debug!(sinks = sinks.len(), "Sink worker started");

    while let Some(session) = receiver.recv().await {
        report.sessions += 1;
        let last = sinks.len().saturating_sub(1);
        let mut owned = Some(session);

        for (index, sink) in sinks.iter_mut().enumerate() {
            let copy = if index == last { owned.take() } else { owned.clone() };
            let Some(copy) = copy else { break };
            let session_id = copy.id.clone();

            match sink.write_session(copy).await {
                Ok(()) => {
                    report.writes += 1;
                    debug!(sink = sink.name(), session_id = %session_id, "Session written");
                }
                Err(error) => {
                    error!(sink = sink.name(), session_id = %session_id, %error, "Sink write failed");
                    report.failures.push(error);
                }
            }
        }
    }

    for sink in sinks.iter_mut() {
        if let Err(error) = sink.finish().await {
            error!(sink = sink.name(), %error, "Sink finish failed");
            report.failures.push(error);
        }
    }

    info!(sessions = report.sessions, failures = report.failures.len(), "Sink worker stopped");
    report
}

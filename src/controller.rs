//! Download orchestration over a [`Transport`].
//!
//! ```text
//! Idle -> AwaitingStart -> Downloading -> Completed
//!                              |
//!                              +-------> Failed (disconnect, timeout, cancel, negative ack)
//! ```
//!
//! The command is only sent once the subscription is active, so no reply can
//! be lost. Whatever the outcome, the controller unsubscribes, flushes the
//! open session and disconnects, in that order, before reporting.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, DownloadConfig};
use crate::protocol::{
    DOWNLOAD_COMMAND, DecoderConfig, DispatchOutcome, DispatchStats, DownloadState, Pipeline,
    ReassemblerConfig, ReassemblerStats,
};
use crate::session::{Session, SessionOutbox, SessionSink, SessionSummary, SinkReport, SinkWorker};
use crate::stream::ThrottleExt;
use crate::transport::Transport;
use crate::types::{TelemetryRecord, UpdateRate};
use crate::{Result, TelemetryError};

/// Where a download is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownloadPhase {
    #[default]
    Idle,
    AwaitingStart,
    Downloading,
    Completed,
    Failed,
}

impl DownloadPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadPhase::Completed | DownloadPhase::Failed)
    }
}

/// Snapshot published on every phase change and processed chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub phase: DownloadPhase,
    pub expected: Option<u32>,
    pub received: u32,
    pub sessions: usize,
}

impl DownloadProgress {
    /// Fraction of announced records received, once the count is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.expected {
            Some(0) => Some(1.0),
            Some(expected) => Some((f64::from(self.received) / f64::from(expected)).min(1.0)),
            None => None,
        }
    }
}

#[derive(Debug)]
pub enum DownloadOutcome {
    Completed,
    Failed(TelemetryError),
}

/// Everything a download produced, including on failure.
#[derive(Debug)]
pub struct DownloadReport {
    pub outcome: DownloadOutcome,
    pub state: DownloadState,
    pub dispatch: DispatchStats,
    pub reassembly: ReassemblerStats,
    /// Every session flushed, in order.
    pub sessions: Vec<SessionSummary>,
    pub nacks: u32,
    /// Present when sinks were supplied.
    pub sinks: Option<SinkReport>,
    /// Sessions not handed to a sink: all of them when no sinks were supplied.
    pub retained: Vec<Session>,
}

impl DownloadReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Completed)
    }

    pub fn error(&self) -> Option<&TelemetryError> {
        match &self.outcome {
            DownloadOutcome::Completed => None,
            DownloadOutcome::Failed(error) => Some(error),
        }
    }
}

/// Runs the download protocol and publishes progress and records.
pub struct DownloadController {
    decoder: DecoderConfig,
    reassembler: ReassemblerConfig,
    download: DownloadConfig,
    progress: watch::Sender<DownloadProgress>,
    records: watch::Sender<Option<Arc<TelemetryRecord>>>,
}

impl DownloadController {
    pub fn new(config: &Config) -> Self {
        let (progress, _) = watch::channel(DownloadProgress::default());
        let (records, _) = watch::channel(None);
        Self {
            decoder: config.decoder,
            reassembler: config.reassembler,
            download: config.download,
            progress,
            records,
        }
    }

    /// Progress snapshots.
    pub fn progress(&self) -> watch::Receiver<DownloadProgress> {
        self.progress.subscribe()
    }

    /// Decoded records, optionally throttled with latest-wins semantics.
    pub fn records(&self, rate: UpdateRate) -> impl Stream<Item = Arc<TelemetryRecord>> + 'static {
        let records =
            WatchStream::new(self.records.subscribe()).filter_map(|opt| async move { opt });

        match rate.throttle_interval() {
            None => records.boxed(),
            Some(interval) => records.throttle(interval).boxed(),
        }
    }

    /// Run on a spawned task. Subscribe to progress and records first.
    pub fn spawn<T>(
        self,
        mut transport: T,
        sinks: Vec<Box<dyn SessionSink>>,
        cancel: CancellationToken,
    ) -> JoinHandle<DownloadReport>
    where
        T: Transport + 'static,
    {
        tokio::spawn(async move { self.run(&mut transport, sinks, cancel).await })
    }

    /// Download every stored session.
    ///
    /// Sessions go to `sinks` through a [`SinkWorker`]; with no sinks they are
    /// returned in [`DownloadReport::retained`].
    pub async fn run(
        &self,
        transport: &mut dyn Transport,
        sinks: Vec<Box<dyn SessionSink>>,
        cancel: CancellationToken,
    ) -> DownloadReport {
        let mut pipeline = Pipeline::new(self.reassembler, self.decoder);
        let worker = (!sinks.is_empty()).then(|| SinkWorker::spawn(sinks));
        if let Some(worker) = &worker {
            pipeline.set_outbox(worker.outbox());
        }

        let mut nacks = 0u32;
        let result = self.drive(transport, &mut pipeline, &cancel, &mut nacks).await;

        if let Err(error) = transport.unsubscribe().await {
            warn!(transport = transport.name(), %error, "Unsubscribe failed");
        }
        pipeline.flush();
        if let Err(error) = transport.disconnect().await {
            warn!(transport = transport.name(), %error, "Disconnect failed");
        }

        // Release the worker's sender so it can drain and stop
        pipeline.set_outbox(SessionOutbox::Buffer);
        let sinks = match worker {
            Some(worker) => Some(worker.finish().await),
            None => None,
        };

        let (outcome, phase) = match result {
            Ok(()) => (DownloadOutcome::Completed, DownloadPhase::Completed),
            Err(error) => {
                warn!(
                    %error,
                    expected = ?pipeline.state().expected_record_count,
                    received = pipeline.state().received_count,
                    "Download failed"
                );
                (DownloadOutcome::Failed(error), DownloadPhase::Failed)
            }
        };
        self.publish(phase, &pipeline);

        DownloadReport {
            outcome,
            state: pipeline.state(),
            dispatch: pipeline.dispatch_stats(),
            reassembly: pipeline.reassembler_stats(),
            sessions: pipeline.flushed().to_vec(),
            nacks,
            sinks,
            retained: pipeline.drain_sessions(),
        }
    }

    async fn drive(
        &self,
        transport: &mut dyn Transport,
        pipeline: &mut Pipeline,
        cancel: &CancellationToken,
        nacks: &mut u32,
    ) -> Result<()> {
        let timeout = self.download.timeout();
        let deadline = timeout.map(|t| Instant::now() + t);
        let overall = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(overall);
        let timed_out = || TelemetryError::Timeout { duration: timeout.unwrap_or_default() };

        transport.subscribe().await?;
        self.publish(DownloadPhase::AwaitingStart, pipeline);

        transport.send(&DOWNLOAD_COMMAND).await?;
        self.publish(DownloadPhase::Downloading, pipeline);
        info!(transport = transport.name(), "Download requested");

        let chunk_timeout = self.download.chunk_timeout();
        let retry = self.download.nack_retry;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TelemetryError::Cancelled),
                _ = &mut overall => return Err(timed_out()),
                chunk = next_chunk(transport, chunk_timeout) => chunk?,
            };
            let Some(chunk) = chunk else {
                return Err(TelemetryError::Disconnected);
            };

            let mut recorded = false;
            let mut resend = false;
            for outcome in pipeline.feed(&chunk) {
                match outcome {
                    DispatchOutcome::Recorded => recorded = true,
                    DispatchOutcome::NegativeAck => {
                        *nacks += 1;
                        if *nacks > retry.max_attempts {
                            return Err(TelemetryError::NegativeAck { attempt: *nacks });
                        }
                        resend = true;
                    }
                    _ => {}
                }
            }

            if recorded {
                if let Some(record) = pipeline.latest_record() {
                    self.records.send_replace(Some(Arc::new(record.clone())));
                }
            }
            self.publish(DownloadPhase::Downloading, pipeline);

            if pipeline.state().completed {
                return Ok(());
            }

            if resend {
                debug!(attempt = *nacks, backoff_ms = retry.backoff_ms, "Retrying download command");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(TelemetryError::Cancelled),
                    _ = &mut overall => return Err(timed_out()),
                    _ = sleep(retry.backoff()) => {}
                }
                transport.send(&DOWNLOAD_COMMAND).await?;
            }
        }
    }

    fn publish(&self, phase: DownloadPhase, pipeline: &Pipeline) {
        let state = pipeline.state();
        let progress = DownloadProgress {
            phase,
            expected: state.expected_record_count,
            received: state.received_count,
            sessions: pipeline.flushed().len(),
        };
        let previous = self.progress.send_replace(progress);
        if previous.phase != phase {
            debug!(from = ?previous.phase, to = ?phase, "Download phase changed");
        }
    }
}

async fn next_chunk(
    transport: &mut dyn Transport,
    idle: Option<Duration>,
) -> Result<Option<bytes::Bytes>> {
    match idle {
        Some(idle) => tokio::time::timeout(idle, transport.next_chunk())
            .await
            .map_err(|_| TelemetryError::Timeout { duration: idle })?,
        None => transport.next_chunk().await,
    }
}

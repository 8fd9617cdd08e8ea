//! Message routing by `(class, id)`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::RecordDecoder;
use crate::session::{SessionAccumulator, SessionOutbox, SessionSummary};
use crate::types::{MessageKind, RawFrame, TelemetryRecord};
use crate::TelemetryError;

/// Progress of one history download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadState {
    /// Set once, from the first download start message.
    pub expected_record_count: Option<u32>,
    /// Record-bearing frames dispatched, including ones dropped by decoding.
    pub received_count: u32,
    /// Set once, on the first ack.
    pub completed: bool,
}

/// Per-message-kind counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub history_records: u64,
    pub live_records: u64,
    /// Records dropped for a malformed payload or a rejected fix.
    pub rejected_records: u64,
    /// Records dropped by the suppress fix policy.
    pub suppressed_records: u64,
    pub boundaries: u64,
    pub nacks: u64,
    pub unknown_messages: u64,
}

/// What a dispatched frame did.
#[derive(Debug)]
pub enum DispatchOutcome {
    DownloadStarted { expected: u32 },
    Recorded,
    Suppressed,
    /// A frame-local error; the frame was dropped.
    Rejected(TelemetryError),
    SessionFlushed(Option<SessionSummary>),
    Completed(Option<SessionSummary>),
    NegativeAck,
}

/// Routes validated frames to decoding, session control or download state.
#[derive(Debug)]
pub struct MessageDispatcher {
    decoder: RecordDecoder,
    sessions: SessionAccumulator,
    state: DownloadState,
    stats: DispatchStats,
    latest: Option<TelemetryRecord>,
}

impl MessageDispatcher {
    pub fn new(decoder: RecordDecoder) -> Self {
        let sessions = SessionAccumulator::new(decoder.variant());
        Self::with_sessions(decoder, sessions)
    }

    pub fn with_sessions(decoder: RecordDecoder, sessions: SessionAccumulator) -> Self {
        Self {
            decoder,
            sessions,
            state: DownloadState::default(),
            stats: DispatchStats::default(),
            latest: None,
        }
    }

    pub fn dispatch(&mut self, frame: &RawFrame) -> DispatchOutcome {
        match frame.kind() {
            MessageKind::DownloadStart => self.on_download_start(frame),
            MessageKind::HistoryRecord => {
                self.stats.history_records += 1;
                self.on_record(frame)
            }
            MessageKind::LiveRecord => {
                self.stats.live_records += 1;
                self.on_record(frame)
            }
            MessageKind::Ack => {
                let summary = self.sessions.flush();
                if self.state.completed {
                    debug!("Repeated ack ignored");
                } else {
                    self.state.completed = true;
                    info!(
                        expected = ?self.state.expected_record_count,
                        received = self.state.received_count,
                        "Download complete"
                    );
                }
                DispatchOutcome::Completed(summary)
            }
            MessageKind::Nack => {
                self.stats.nacks += 1;
                warn!("Device sent a negative ack");
                DispatchOutcome::NegativeAck
            }
            MessageKind::RecordingStateChanged => {
                self.stats.boundaries += 1;
                debug!("Recording state changed");
                DispatchOutcome::SessionFlushed(self.sessions.flush())
            }
            MessageKind::Unknown { class, id } => {
                self.stats.unknown_messages += 1;
                warn!(class, id, length = frame.payload.len(), "Unknown message discarded");
                DispatchOutcome::Rejected(TelemetryError::UnknownMessage { class, id })
            }
        }
    }

    fn on_download_start(&mut self, frame: &RawFrame) -> DispatchOutcome {
        let Some(count) = frame.payload.get(..4) else {
            let error = TelemetryError::PayloadLength {
                context: "download start",
                expected: 4,
                actual: frame.payload.len(),
            };
            warn!(%error, "Dropping download start");
            return DispatchOutcome::Rejected(error);
        };
        let announced = u32::from_le_bytes([count[0], count[1], count[2], count[3]]);

        match self.state.expected_record_count {
            Some(expected) => {
                warn!(expected, announced, "Repeated download start ignored");
                DispatchOutcome::DownloadStarted { expected }
            }
            None => {
                info!(expected = announced, "Download started");
                self.state.expected_record_count = Some(announced);
                DispatchOutcome::DownloadStarted { expected: announced }
            }
        }
    }

    fn on_record(&mut self, frame: &RawFrame) -> DispatchOutcome {
        self.state.received_count = self.state.received_count.saturating_add(1);

        match self.decoder.decode(&frame.payload) {
            Ok(Some(record)) => {
                trace!(itow = record.itow(), received = self.state.received_count, "Record decoded");
                self.latest = Some(record.clone());
                self.sessions.append(record);
                DispatchOutcome::Recorded
            }
            Ok(None) => {
                self.stats.suppressed_records += 1;
                DispatchOutcome::Suppressed
            }
            Err(error) => {
                self.stats.rejected_records += 1;
                warn!(id = frame.id, %error, "Dropping record");
                DispatchOutcome::Rejected(error)
            }
        }
    }

    /// Flush whatever session is open, e.g. when the transport goes away.
    pub fn flush(&mut self) -> Option<SessionSummary> {
        self.sessions.flush()
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Most recently decoded record.
    pub fn latest_record(&self) -> Option<&TelemetryRecord> {
        self.latest.as_ref()
    }

    pub fn sessions(&self) -> &SessionAccumulator {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionAccumulator {
        &mut self.sessions
    }

    pub fn set_outbox(&mut self, outbox: SessionOutbox) {
        self.sessions.set_outbox(outbox);
    }

    pub fn decoder(&self) -> &RecordDecoder {
        &self.decoder
    }
}

//! Session segmentation and hand-off to sinks.
//!
//! A session is a contiguous run of records between two boundary events. The
//! [`SessionAccumulator`] owns the open session exclusively; on flush the records
//! are moved into a [`Session`] value and pushed onto a [`SessionOutbox`]. When
//! the outbox is backed by a [`SinkWorker`] channel, all file or database I/O
//! happens on the worker task, never in the delivery path.

mod csv;
mod memory;
mod sink;

pub use csv::CsvSink;
pub use memory::MemorySink;
pub use sink::{SessionSink, SinkReport, SinkWorker};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::types::{SchemaVariant, TelemetryRecord};

/// A closed recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// `YYYYMMDDhhmmss_YYYYMMDDhhmmss` from the first and last record.
    pub id: String,
    pub variant: SchemaVariant,
    /// Records in arrival order.
    pub records: Vec<TelemetryRecord>,
    /// Wall-clock time at which the first record arrived.
    pub started_at: DateTime<Utc>,
    /// Wall-clock time spent accumulating the session.
    pub elapsed: Duration,
}

impl Session {
    pub fn first_record(&self) -> Option<&TelemetryRecord> {
        self.records.first()
    }

    pub fn last_record(&self) -> Option<&TelemetryRecord> {
        self.records.last()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Time covered according to the device's own timestamps.
    ///
    /// `None` when either end is not a valid calendar time or the clock went
    /// backwards.
    pub fn device_span(&self) -> Option<Duration> {
        let first = self.first_record()?.timestamp().to_datetime()?;
        let last = self.last_record()?.timestamp().to_datetime()?;
        (last - first).to_std().ok()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            variant: self.variant,
            record_count: self.records.len(),
            started_at: self.started_at,
            elapsed: self.elapsed,
            device_span: self.device_span(),
        }
    }
}

/// Session metadata without the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub variant: SchemaVariant,
    pub record_count: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub device_span: Option<Duration>,
}

/// Where flushed sessions go.
#[derive(Debug)]
pub enum SessionOutbox {
    /// Keep sessions until [`SessionAccumulator::drain_sessions`] is called.
    Buffer,
    /// Forward sessions to a [`SinkWorker`].
    Channel(mpsc::UnboundedSender<Session>),
}

#[derive(Debug)]
struct OpenSession {
    records: Vec<TelemetryRecord>,
    started_at: DateTime<Utc>,
    opened: Instant,
}

/// Groups decoded records into sessions.
#[derive(Debug)]
pub struct SessionAccumulator {
    variant: SchemaVariant,
    open: Option<OpenSession>,
    outbox: SessionOutbox,
    pending: Vec<Session>,
    flushed: Vec<SessionSummary>,
}

impl SessionAccumulator {
    pub fn new(variant: SchemaVariant) -> Self {
        Self::with_outbox(variant, SessionOutbox::Buffer)
    }

    pub fn with_outbox(variant: SchemaVariant, outbox: SessionOutbox) -> Self {
        Self { variant, open: None, outbox, pending: Vec::new(), flushed: Vec::new() }
    }

    /// Route later flushes to `outbox`. Sessions already buffered stay buffered.
    pub fn set_outbox(&mut self, outbox: SessionOutbox) {
        self.outbox = outbox;
    }

    /// Append a record, opening a session if none is open.
    pub fn append(&mut self, record: TelemetryRecord) {
        let open = self.open.get_or_insert_with(|| {
            debug!(itow = record.itow(), "Session opened");
            OpenSession { records: Vec::new(), started_at: Utc::now(), opened: Instant::now() }
        });
        open.records.push(record);
    }

    /// Close the open session and hand it off.
    ///
    /// Returns `None` without side effects when no records are open.
    pub fn flush(&mut self) -> Option<SessionSummary> {
        let open = self.open.take()?;
        // An open session always holds at least one record.
        let first = open.records.first()?.timestamp();
        let last = open.records.last()?.timestamp();

        let session = Session {
            id: format!("{}_{}", first.compact(), last.compact()),
            variant: self.variant,
            records: open.records,
            started_at: open.started_at,
            elapsed: open.opened.elapsed(),
        };
        let summary = session.summary();
        info!(
            session_id = %summary.id,
            records = summary.record_count,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Session flushed"
        );

        match &self.outbox {
            SessionOutbox::Buffer => self.pending.push(session),
            SessionOutbox::Channel(sender) => {
                if let Err(mpsc::error::SendError(session)) = sender.send(session) {
                    warn!(session_id = %session.id, "Sink worker gone, keeping session buffered");
                    self.pending.push(session);
                }
            }
        }

        self.flushed.push(summary.clone());
        Some(summary)
    }

    /// Take sessions held back by a buffer outbox or a closed channel.
    pub fn drain_sessions(&mut self) -> Vec<Session> {
        std::mem::take(&mut self.pending)
    }

    /// Summaries of every session flushed so far.
    pub fn flushed(&self) -> &[SessionSummary] {
        &self.flushed
    }

    /// Number of records in the open session.
    pub fn open_len(&self) -> usize {
        self.open.as_ref().map_or(0, |open| open.records.len())
    }

    pub fn variant(&self) -> SchemaVariant {
        self.variant
    }
}

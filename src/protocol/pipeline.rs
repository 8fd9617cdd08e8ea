//! Reassembler and dispatcher wired together for one delivery context.

use tracing::debug;

use super::{
    DecoderConfig, DispatchOutcome, DispatchStats, DownloadState, FrameReassembler,
    MessageDispatcher, ReassemblerConfig, ReassemblerStats, RecordDecoder,
};
use crate::session::{Session, SessionOutbox, SessionSummary};
use crate::types::TelemetryRecord;

/// Synchronous chunk-in, outcomes-out decoding pipeline.
///
/// Each [`feed`](Pipeline::feed) runs reassembly, dispatch, decoding and
/// session accumulation to completion before returning. Used directly for
/// offline decoding of captured streams and internally by the download
/// controller.
///
/// ```rust
/// use racebox::protocol::{DOWNLOAD_COMMAND, Pipeline};
///
/// let mut pipeline = Pipeline::default();
/// let outcomes = pipeline.feed(&DOWNLOAD_COMMAND[..4]);
/// assert!(outcomes.is_empty());
/// ```
#[derive(Debug)]
pub struct Pipeline {
    reassembler: FrameReassembler,
    dispatcher: MessageDispatcher,
}

impl Pipeline {
    pub fn new(reassembler: ReassemblerConfig, decoder: DecoderConfig) -> Self {
        Self {
            reassembler: FrameReassembler::with_config(reassembler),
            dispatcher: MessageDispatcher::new(RecordDecoder::new(decoder)),
        }
    }

    /// Push one transport chunk through every stage.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DispatchOutcome> {
        let frames = self.reassembler.feed(chunk);
        if !frames.is_empty() {
            debug!(chunk_len = chunk.len(), frames = frames.len(), "Chunk processed");
        }
        frames.iter().map(|frame| self.dispatcher.dispatch(frame)).collect()
    }

    /// Close the open session, if any.
    pub fn flush(&mut self) -> Option<SessionSummary> {
        self.dispatcher.flush()
    }

    /// Sessions flushed while the outbox was a buffer.
    pub fn drain_sessions(&mut self) -> Vec<Session> {
        self.dispatcher.sessions_mut().drain_sessions()
    }

    pub fn set_outbox(&mut self, outbox: SessionOutbox) {
        self.dispatcher.set_outbox(outbox);
    }

    pub fn state(&self) -> DownloadState {
        self.dispatcher.state()
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    pub fn reassembler_stats(&self) -> ReassemblerStats {
        self.reassembler.stats()
    }

    pub fn latest_record(&self) -> Option<&TelemetryRecord> {
        self.dispatcher.latest_record()
    }

    pub fn flushed(&self) -> &[SessionSummary] {
        self.dispatcher.sessions().flushed()
    }

    /// Drop partially buffered bytes.
    pub fn reset_buffer(&mut self) {
        self.reassembler.clear();
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(ReassemblerConfig::default(), DecoderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ack_frame, boundary_frame, history_frame, start_frame};
    use crate::test_utils::RawRecordBuilder;
    use proptest::prelude::*;

    fn capture() -> Vec<u8> {
        let mut bytes = start_frame(3);
        for itow in [100, 140] {
            bytes.extend(history_frame(&RawRecordBuilder::new().itow(itow).build()));
        }
        bytes.extend(boundary_frame());
        bytes.extend(history_frame(&RawRecordBuilder::new().itow(180).build()));
        bytes.extend(ack_frame());
        bytes
    }

    #[test]
    fn decodes_a_full_capture() {
        let mut pipeline = Pipeline::default();
        let outcomes = pipeline.feed(&capture());

        assert_eq!(outcomes.len(), 6);
        let state = pipeline.state();
        assert_eq!(state.expected_record_count, Some(3));
        assert_eq!(state.received_count, 3);
        assert!(state.completed);

        let sessions = pipeline.drain_sessions();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].record_count(), 2);
        assert_eq!(sessions[1].first_record().unwrap().itow(), 180);
    }

    #[test]
    fn corrupted_record_frame_is_skipped() {
        let mut bytes = history_frame(&RawRecordBuilder::new().itow(1).build());
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        bytes.extend(history_frame(&RawRecordBuilder::new().itow(2).build()));

        let mut pipeline = Pipeline::default();
        pipeline.feed(&bytes);
        pipeline.flush();

        let sessions = pipeline.drain_sessions();
        assert_eq!(sessions[0].record_count(), 1);
        assert_eq!(sessions[0].records[0].itow(), 2);
        assert_eq!(pipeline.reassembler_stats().checksum_errors, 1);
    }

    proptest! {
        #[test]
        fn prop_chunked_capture_yields_same_sessions(chunk in 1usize..64) {
            let bytes = capture();
            let mut pipeline = Pipeline::default();
            for piece in bytes.chunks(chunk) {
                pipeline.feed(piece);
            }

            let counts: Vec<usize> = pipeline.drain_sessions().iter().map(Session::record_count).collect();
            prop_assert_eq!(counts, vec![2, 1]);
            prop_assert!(pipeline.state().completed);
        }
    }
}

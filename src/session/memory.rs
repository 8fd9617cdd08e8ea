//! In-memory sink

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{Session, SessionSink};
use crate::Result;

/// Collects sessions into a shared vector.
///
/// Clones share storage, so keep one clone to read what the worker wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    sessions: Arc<Mutex<Vec<Session>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the sessions written so far.
    pub fn sessions(&self) -> Vec<Session> {
        match self.sessions.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map_or(0, |guard| guard.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write_session(&mut self, session: Session) -> Result<()> {
        match self.sessions.lock() {
            Ok(mut guard) => guard.push(session),
            Err(poisoned) => poisoned.into_inner().push(session),
        }
        Ok(())
    }
}

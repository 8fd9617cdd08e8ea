//! CSV file sink, one file per session

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{Session, SessionSink};
use crate::types::Timestamp;
use crate::{Result, TelemetryError};

/// Writes each session to `racebox_data_{device}_{YYYYMMDD}_{hhmmss}.csv`.
///
/// The timestamp comes from the first record. An existing file is never
/// overwritten; a numeric suffix is added instead.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
    device: String,
    written: Vec<PathBuf>,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>, device: impl AsRef<str>) -> Self {
        Self { dir: dir.into(), device: sanitize(device.as_ref()), written: Vec::new() }
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn file_name(device: &str, first: Timestamp) -> String {
        format!(
            "racebox_data_{}_{:04}{:02}{:02}_{:02}{:02}{:02}.csv",
            sanitize(device),
            first.year,
            first.month,
            first.day,
            first.hour,
            first.minute,
            first.second
        )
    }

    async fn free_path(&self, name: &str) -> Result<PathBuf> {
        let candidate = self.dir.join(name);
        if !exists(&candidate).await? {
            return Ok(candidate);
        }

        let stem = name.trim_end_matches(".csv");
        let mut suffix = 1u32;
        loop {
            let candidate = self.dir.join(format!("{stem}_{suffix}.csv"));
            if !exists(&candidate).await? {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))
}

/// Keep device names usable as a file name fragment.
fn sanitize(device: &str) -> String {
    device
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Render a session as CSV text with a header row.
pub(crate) fn render(session: &Session) -> String {
    let mut out = session.variant.columns().join(",");
    out.push('\n');
    for record in &session.records {
        out.push_str(&record.to_row().join(","));
        out.push('\n');
    }
    out
}

#[async_trait]
impl SessionSink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    async fn write_session(&mut self, session: Session) -> Result<()> {
        let Some(first) = session.first_record() else {
            return Ok(());
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| TelemetryError::file_error(self.dir.clone(), e))?;

        let path = self.free_path(&Self::file_name(&self.device, first.timestamp())).await?;
        tokio::fs::write(&path, render(&session))
            .await
            .map_err(|e| TelemetryError::file_error(path.clone(), e))?;

        info!(
            path = %path.display(),
            session_id = %session.id,
            records = session.record_count(),
            "Session saved"
        );
        self.written.push(path);
        Ok(())
    }
}

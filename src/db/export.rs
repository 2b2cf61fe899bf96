//! Final report export.

use crate::research::models::Report;
use crate::types::{AppError, Result};
use std::path::{Path, PathBuf};

/// Writes finished reports to `<output_dir>/<session_id>.json`.
#[derive(Debug, Clone)]
pub struct ReportExporter {
    output_dir: PathBuf,
}

impl ReportExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.output_dir.join(format!("{}.json", session_id))
    }

    /// Write the report as pretty-printed JSON and return the file path.
    pub async fn export(&self, session_id: &str, report: &Report) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| AppError::Internal(format!("Failed to serialize report: {}", e)))?;

        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            AppError::Internal(format!("Failed to create report directory: {}", e))
        })?;

        let path = self.path_for(session_id);
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write report: {}", e)))?;

        tracing::info!(path = %path.display(), "Report exported");
        Ok(path)
    }
}

//! Persisted health summary read by external status checks.

use crate::thresholds::Summary;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_SUMMARY_PATH: &str = "/tmp/bev";

/// Writes the `ok/warn/crit` file.
///
/// The file is replaced through a rename from a sibling temp file, so readers
/// see either the previous summary or the new one, never a partial or missing file.
#[derive(Debug, Clone)]
pub struct SummaryWriter {
    path: PathBuf,
}

impl SummaryWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub async fn write(&self, summary: &Summary) -> Result<()> {
        let staging = self.staging_path();
        tokio::fs::write(&staging, summary.to_file_contents()).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        debug!(
            path = %self.path.display(),
            ok = summary.ok,
            warn = summary.warn,
            crit = summary.crit,
            "summary written"
        );
        Ok(())
    }
}

impl Default for SummaryWriter {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_PATH)
    }
}

/// Parse a summary file body back into counts. Used by status checks and tests.
pub fn parse_summary(contents: &str) -> Option<Summary> {
    let mut summary = Summary::default();
    let mut seen = 0;
    for line in contents.lines() {
        let (key, value) = line.split_once(' ')?;
        let value: usize = value.trim().parse().ok()?;
        match key {
            "ok" => summary.ok = value,
            "warn" => summary.warn = value,
            "crit" => summary.crit = value,
            _ => return None,
        }
        seen += 1;
    }
    (seen == 3).then_some(summary)
}

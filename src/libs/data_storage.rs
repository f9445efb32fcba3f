//! Layout of the single working directory a migration run lives in:
//! the durable status file, one timestamped pre-rollback snapshot
//! directory per rollback run, and a `reports/` directory holding one
//! JSON report per phase plus the final Markdown summary.
//!
//! Plays the role of the single place that resolves file paths under
//! a base directory, except the base directory here is supplied by
//! the caller (`--work-dir`) rather than derived from platform
//! conventions — this is explicitly a single, caller-chosen working
//! directory rather than a platform data directory.

use crate::core::mst::Phase;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};

const STATUS_FILE_NAME: &str = "status.json";
const CONFIG_FILE_NAME: &str = "config.json";
const REPORTS_DIR_NAME: &str = "reports";
const SUMMARY_FILE_NAME: &str = "summary.md";

/// Resolves every path a migration run touches, rooted at one
/// caller-supplied directory.
#[derive(Debug, Clone)]
pub struct WorkingDirectory {
    root: PathBuf,
}

impl WorkingDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join(STATUS_FILE_NAME)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR_NAME)
    }

    pub fn phase_report_path(&self, phase: Phase) -> PathBuf {
        self.reports_dir().join(format!("{phase}.json"))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.reports_dir().join(SUMMARY_FILE_NAME)
    }

    /// One snapshot directory per rollback run, timestamped so repeated
    /// rollbacks never collide; colons are replaced so the name stays
    /// filesystem-safe on every platform.
    pub fn pre_rollback_dir(&self, at: DateTime<Utc>) -> PathBuf {
        self.root.join(format!("pre-rollback-{}", format_timestamp(at)))
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub async fn ensure_reports_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.reports_dir()).await
    }

    /// Writes one phase's structured report as pretty JSON, atomically.
    pub async fn write_phase_report(&self, phase: Phase, report: &serde_json::Value) -> io::Result<()> {
        self.ensure_reports_dir().await?;
        let bytes = serde_json::to_vec_pretty(report).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        atomic_write(&self.phase_report_path(phase), &bytes).await
    }

    /// Writes the final Markdown summary, atomically.
    pub async fn write_summary(&self, markdown: &str) -> io::Result<()> {
        self.ensure_reports_dir().await?;
        atomic_write(&self.summary_path(), markdown.as_bytes()).await
    }
}

/// `%Y-%m-%dT%H-%M-%S`: ISO-8601-shaped but with colons replaced by
/// dashes, so the result is filesystem-safe on every platform.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Writes via a sibling temp file then renames, so a crash mid-write
/// never leaves a half-written file behind — the same pattern the
/// migration status tracker itself relies on.
async fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn timestamp_formatting_replaces_colons() {
        let at = DateTime::parse_from_rfc3339("2026-07-29T10:15:30Z").unwrap().with_timezone(&Utc);
        assert_eq!(format_timestamp(at), "2026-07-29T10-15-30");
    }

    #[tokio::test]
    async fn write_phase_report_creates_reports_dir_and_file() {
        let dir = tempdir().unwrap();
        let wd = WorkingDirectory::new(dir.path());
        wd.write_phase_report(Phase::Preparation, &serde_json::json!({"ok": true})).await.unwrap();
        let contents = tokio::fs::read_to_string(wd.phase_report_path(Phase::Preparation)).await.unwrap();
        assert!(contents.contains("\"ok\""));
    }

    #[tokio::test]
    async fn write_summary_is_readable_back() {
        let dir = tempdir().unwrap();
        let wd = WorkingDirectory::new(dir.path());
        wd.write_summary("# Migration Summary\n").await.unwrap();
        let contents = tokio::fs::read_to_string(wd.summary_path()).await.unwrap();
        assert_eq!(contents, "# Migration Summary\n");
    }
}

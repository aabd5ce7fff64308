//! Append-only audit trails
//!
//! One line per filesystem action: `<timestamp>;<old_path>;<new_path>`.
//! Alignment renames and final placements are written to separate files.

use crate::error::Result;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub const ALIGNMENT_LOG_FILE: &str = "rename_log_canon.txt";
pub const PLACEMENT_LOG_FILE: &str = "rename_log.txt";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single audit stream backed by one text file
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stream for camera alignment renames
    pub fn alignment(log_dir: &Path) -> Self {
        Self::new(log_dir.join(ALIGNMENT_LOG_FILE))
    }

    /// Stream for final destination transfers
    pub fn placement(log_dir: &Path) -> Self {
        Self::new(log_dir.join(PLACEMENT_LOG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one action stamped with the current local time
    pub async fn record(&self, old_path: &Path, new_path: &Path) -> Result<()> {
        self.record_at(Local::now(), old_path, new_path).await
    }

    pub async fn record_at(&self, at: DateTime<Local>, old_path: &Path, new_path: &Path) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let line = format_line(at, old_path, new_path);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("📝 {}", line.trim_end());
        Ok(())
    }
}

pub fn format_line(at: DateTime<Local>, old_path: &Path, new_path: &Path) -> String {
    format!(
        "{};{};{}\n",
        at.format(TIMESTAMP_FORMAT),
        old_path.display(),
        new_path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_line_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let line = format_line(at, Path::new("/in/a.mp4"), Path::new("/out/S7/x.mp4"));
        assert_eq!(line, "2024-03-09 14:05:07;/in/a.mp4;/out/S7/x.mp4\n");
    }

    #[tokio::test]
    async fn test_streams_append_independently() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");
        let alignment = AuditLog::alignment(&log_dir);
        let placement = AuditLog::placement(&log_dir);

        alignment.record(Path::new("a"), Path::new("b")).await.unwrap();
        placement.record(Path::new("c"), Path::new("d")).await.unwrap();
        placement.record(Path::new("e"), Path::new("f")).await.unwrap();

        let alignment_lines = fs::read_to_string(alignment.path()).await.unwrap();
        let placement_lines = fs::read_to_string(placement.path()).await.unwrap();

        assert_eq!(alignment_lines.lines().count(), 1);
        assert!(alignment_lines.ends_with(";a;b\n"));
        assert_eq!(placement_lines.lines().count(), 2);
        assert!(placement_lines.lines().all(|l| l.split(';').count() == 3));
    }
}

//! Filesystem transfers into the destination tree

use crate::error::{OrganizerError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// How clips reach their destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Source stays in place
    #[default]
    Copy,
    /// Source is removed once the destination is written
    Move,
}

impl std::str::FromStr for TransferMode {
    type Err = OrganizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "move" => Ok(Self::Move),
            other => Err(OrganizerError::Config(format!("Unknown transfer mode '{}'", other))),
        }
    }
}

/// Moves bytes from a source clip to a fresh destination path
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn transfer(&self, from: &Path, to: &Path) -> Result<()>;
    fn mode(&self) -> TransferMode;
}

/// Create the transfer for a mode
pub fn create_transfer(mode: TransferMode, verify_checksums: bool) -> Box<dyn FileTransfer> {
    match mode {
        TransferMode::Copy => Box::new(CopyTransfer { verify_checksums }),
        TransferMode::Move => Box::new(MoveTransfer { verify_checksums }),
    }
}

fn transfer_failure(from: &Path, to: &Path, source: std::io::Error) -> OrganizerError {
    OrganizerError::FilesystemTransferFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    }
}

async fn prepare_destination(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| transfer_failure(from, to, e))?;
    }
    Ok(())
}

/// Remove a destination left behind by a failed copy
async fn discard_partial(to: &Path) {
    match fs::remove_file(to).await {
        Ok(()) => debug!("Removed partial copy {}", to.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("⚠️ Could not remove partial copy {}: {}", to.display(), e),
    }
}

async fn copy_verified(from: &Path, to: &Path, verify_checksums: bool) -> Result<()> {
    if let Err(e) = fs::copy(from, to).await {
        discard_partial(to).await;
        return Err(transfer_failure(from, to, e));
    }

    if verify_checksums && file_md5(from).await? != file_md5(to).await? {
        discard_partial(to).await;
        return Err(OrganizerError::ChecksumMismatch {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
    }
    Ok(())
}

/// Copies the clip, leaving the source untouched
#[derive(Debug, Clone, Default)]
pub struct CopyTransfer {
    verify_checksums: bool,
}

#[async_trait]
impl FileTransfer for CopyTransfer {
    async fn transfer(&self, from: &Path, to: &Path) -> Result<()> {
        prepare_destination(from, to).await?;
        copy_verified(from, to, self.verify_checksums).await?;
        debug!("Copied {} -> {}", from.display(), to.display());
        Ok(())
    }

    fn mode(&self) -> TransferMode {
        TransferMode::Copy
    }
}

/// Renames the clip; across filesystems falls back to copy then delete
#[derive(Debug, Clone, Default)]
pub struct MoveTransfer {
    verify_checksums: bool,
}

#[async_trait]
impl FileTransfer for MoveTransfer {
    async fn transfer(&self, from: &Path, to: &Path) -> Result<()> {
        prepare_destination(from, to).await?;

        match fs::rename(from, to).await {
            Ok(()) => {
                debug!("Moved {} -> {}", from.display(), to.display());
                return Ok(());
            }
            Err(e) => {
                // with the source gone there is nothing to copy
                if !fs::try_exists(from).await.unwrap_or(false) {
                    return Err(transfer_failure(from, to, e));
                }
                debug!("Rename failed ({}), copying {} instead", e, from.display());
            }
        }

        copy_verified(from, to, self.verify_checksums).await?;
        fs::remove_file(from)
            .await
            .map_err(|e| transfer_failure(from, to, e))?;
        debug!("Moved {} -> {} by copy", from.display(), to.display());
        Ok(())
    }

    fn mode(&self) -> TransferMode {
        TransferMode::Move
    }
}

/// MD5 of a file, read in chunks
pub async fn file_md5(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }

    Ok(format!("{:x}", context.compute()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("copy".parse::<TransferMode>().unwrap(), TransferMode::Copy);
        assert_eq!(" MOVE ".parse::<TransferMode>().unwrap(), TransferMode::Move);
        assert!("link".parse::<TransferMode>().is_err());
        assert_eq!(TransferMode::default(), TransferMode::Copy);
    }

    #[tokio::test]
    async fn test_copy_keeps_source_and_creates_folder() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("0012.mp4");
        let to = temp_dir.path().join("out/S7/S7_p002_c1_t000.mp4");
        fs::write(&from, b"frames").await.unwrap();

        let transfer = create_transfer(TransferMode::Copy, true);
        transfer.transfer(&from, &to).await.unwrap();

        assert!(from.exists());
        assert_eq!(fs::read(&to).await.unwrap(), b"frames");
        assert_eq!(transfer.mode(), TransferMode::Copy);
    }

    #[tokio::test]
    async fn test_move_removes_source() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("0012.mp4");
        let to = temp_dir.path().join("out/S7/S7_p002_c1_t000.mp4");
        fs::write(&from, b"frames").await.unwrap();

        create_transfer(TransferMode::Move, false)
            .transfer(&from, &to)
            .await
            .unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).await.unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_missing_source_is_transfer_failure() {
        let temp_dir = TempDir::new().unwrap();
        let err = CopyTransfer::default()
            .transfer(&temp_dir.path().join("gone.mp4"), &temp_dir.path().join("out/x.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrganizerError::FilesystemTransferFailure { .. }));
    }

    #[tokio::test]
    async fn test_move_of_missing_source_does_not_copy() {
        let temp_dir = TempDir::new().unwrap();
        let to = temp_dir.path().join("out/S7/S7_p002_c1_t000.mp4");

        let err = create_transfer(TransferMode::Move, false)
            .transfer(&temp_dir.path().join("gone.mp4"), &to)
            .await
            .unwrap_err();

        assert!(matches!(err, OrganizerError::FilesystemTransferFailure { .. }));
        assert!(!to.exists());
    }

    #[tokio::test]
    async fn test_failed_copy_leaves_no_destination() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("not_a_clip");
        std::fs::create_dir_all(&from).unwrap();
        let to = temp_dir.path().join("out/S7/S7_p002_c1_t000.mp4");

        let err = CopyTransfer::default().transfer(&from, &to).await.unwrap_err();

        assert!(matches!(err, OrganizerError::FilesystemTransferFailure { .. }));
        assert!(!to.exists());
        assert!(to.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_discard_partial_removes_leftover() {
        let temp_dir = TempDir::new().unwrap();
        let to = temp_dir.path().join("half.mp4");
        fs::write(&to, b"fra").await.unwrap();

        discard_partial(&to).await;
        assert!(!to.exists());

        // already gone is fine
        discard_partial(&to).await;
    }

    #[tokio::test]
    async fn test_md5_matches_known_digest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.bin");
        fs::write(&path, b"abc").await.unwrap();
        assert_eq!(file_md5(&path).await.unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    }
}

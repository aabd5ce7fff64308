//! Error taxonomy for the organizer

use std::path::PathBuf;

/// Result type for organizer operations
pub type Result<T> = std::result::Result<T, OrganizerError>;

/// Error types for organizer operations
#[derive(thiserror::Error, Debug)]
pub enum OrganizerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("No clips found for channel '{channel}' in {}", .dir.display())]
    EmptyChannel { channel: String, dir: PathBuf },

    #[error("File counts do not match! {}", format_counts(.counts))]
    ChannelLengthMismatch { counts: Vec<(String, usize)> },

    #[error("Cannot derive an identifier from {}", .0.display())]
    InvalidIdentifier(PathBuf),

    #[error("Identifier '{0}' has no sentence in the sentence table")]
    UnknownIdentifier(String),

    #[error("Identifier '{id}' maps to both '{first}' and '{second}'")]
    ConflictingSentence {
        id: String,
        first: String,
        second: String,
    },

    #[error("Missing required columns in {}: {columns}", .source_path.display())]
    MissingColumns { source_path: PathBuf, columns: String },

    #[error("Take counter exhausted for {}", .folder.display())]
    DestinationCollisionExhausted { folder: PathBuf },

    #[error("Cannot align {} onto {}: target is occupied", .from.display(), .to.display())]
    AlignmentConflict { from: PathBuf, to: PathBuf },

    #[error("Transfer {} -> {} failed: {source}", .from.display(), .to.display())]
    FilesystemTransferFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checksum mismatch after transfer {} -> {}", .from.display(), .to.display())]
    ChecksumMismatch { from: PathBuf, to: PathBuf },

    #[error("Unknown person '{0}'")]
    UnknownPerson(String),

    #[error("No camera code configured for channel '{0}'")]
    UnknownCamera(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,
}

fn format_counts(counts: &[(String, usize)]) -> String {
    counts
        .iter()
        .map(|(channel, count)| format!("{}: {} files", channel.to_uppercase(), count))
        .collect::<Vec<_>>()
        .join(", ")
}

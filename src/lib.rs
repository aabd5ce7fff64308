//! Anamnese Organizer
//!
//! Aligns multi-camera recordings of an anamnese session, matches every clip
//! to its sentence and files it under a standardized name.

pub mod error;
pub mod config;
pub mod discovery;
pub mod align;
pub mod identifier;
pub mod sentences;
pub mod naming;
pub mod transfer;
pub mod audit;
pub mod operator;
pub mod pipeline;

// Re-export main types for easy access
pub use crate::error::{OrganizerError, Result};
pub use crate::config::{Config, ConfigBuilder, FailurePolicy};
pub use crate::discovery::{ChannelSet, Clip, ClipDiscovery};
pub use crate::align::{AlignmentPlan, AlignmentStep};
pub use crate::identifier::{IdentifierRecord, SelectionEntry, SelectionTable};
pub use crate::sentences::{SentenceRow, SentenceTable};
pub use crate::naming::{DestinationName, DestinationRoots, TakeAllocator};
pub use crate::transfer::{FileTransfer, TransferMode};
pub use crate::audit::AuditLog;
pub use crate::pipeline::{FileFailure, Organizer, RunOptions, RunReport, TransferRecord};

//! Identifier parsing and retake selection
//!
//! Operators re-shoot a sentence and append a letter to the retake's
//! filename (`0012` then `0012b`). Within one channel the latest take of a
//! base identifier is selected; every earlier take of it is routed to the
//! errors root.

use crate::discovery::Clip;
use crate::error::{OrganizerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Identity derived from a clip's filename stem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    /// Filename up to its first dot
    pub raw_stem: String,

    /// Stem with the retake letter removed
    pub base_id: String,

    /// The stem ends in a retake letter
    pub has_retake_suffix: bool,

    /// Retake letter present and an earlier record shares the base id
    pub is_retake: bool,

    /// Position in capture order
    pub sequence_rank: usize,
}

impl IdentifierRecord {
    /// Parse a raw stem; `is_retake` is settled later against earlier records
    pub fn parse(raw_stem: &str, sequence_rank: usize) -> Self {
        let (base_id, has_retake_suffix) = split_retake_suffix(raw_stem);
        Self {
            raw_stem: raw_stem.to_string(),
            base_id: base_id.to_string(),
            has_retake_suffix,
            is_retake: false,
            sequence_rank,
        }
    }
}

/// Filename up to its first dot: `0012b.take2.mp4` -> `0012b`
pub fn stem_of(path: &Path) -> Option<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
}

/// Strip a single trailing alphabetic retake marker.
///
/// A stem made of one letter keeps it: the marker never consumes the whole id.
pub fn split_retake_suffix(stem: &str) -> (&str, bool) {
    match stem.char_indices().next_back() {
        Some((idx, last)) if last.is_alphabetic() && idx > 0 => (&stem[..idx], true),
        _ => (stem, false),
    }
}

/// One clip with its identity and routing decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub clip: Clip,
    pub record: IdentifierRecord,
    pub is_selected: bool,
}

/// Selection decisions for one channel, in capture order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionTable {
    entries: Vec<SelectionEntry>,
}

impl SelectionTable {
    /// Resolve identifiers for clips that are already in capture order.
    /// Fails on the first clip whose name carries no identifier.
    pub fn resolve(clips: &[Clip]) -> Result<Self> {
        let (table, rejected) = Self::resolve_valid(clips);
        match rejected.into_iter().next() {
            Some(clip) => Err(OrganizerError::InvalidIdentifier(clip.path)),
            None => Ok(table),
        }
    }

    /// Like `resolve`, but clips without an identifier are returned apart
    /// and take no part in selection
    pub fn resolve_valid(clips: &[Clip]) -> (Self, Vec<Clip>) {
        let mut entries: Vec<SelectionEntry> = Vec::with_capacity(clips.len());
        let mut rejected = Vec::new();
        let mut seen: HashMap<String, Vec<usize>> = HashMap::new();

        for clip in clips {
            let Some(stem) = stem_of(&clip.path) else {
                rejected.push(clip.clone());
                continue;
            };
            let rank = entries.len();
            let mut record = IdentifierRecord::parse(stem, rank);

            let earlier = seen.entry(record.base_id.clone()).or_default();
            if !earlier.is_empty() {
                record.is_retake = record.has_retake_suffix;
                for &idx in earlier.iter() {
                    entries[idx].is_selected = false;
                }
            }
            earlier.push(rank);

            entries.push(SelectionEntry {
                clip: clip.clone(),
                record,
                is_selected: true,
            });
        }

        (Self { entries }, rejected)
    }

    pub fn entries(&self) -> &[SelectionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn selected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_selected).count()
    }

    pub fn deselected_count(&self) -> usize {
        self.len() - self.selected_count()
    }

    /// Neighbourhood of every deselected entry, for operator review
    pub fn review_context(&self, radius: usize) -> Vec<(usize, &[SelectionEntry])> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_selected)
            .map(|(idx, _)| {
                let start = idx.saturating_sub(radius);
                let end = (idx + radius + 1).min(self.entries.len());
                (idx, &self.entries[start..end])
            })
            .collect()
    }
}

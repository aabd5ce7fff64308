//! Sentence table built from spreadsheet partitions
//!
//! Each partition of the sentence spreadsheet is exported as one CSV file
//! with at least the `ID` and `ID Sentenca` columns. All partitions are
//! concatenated into a single read-only table.

use crate::error::{OrganizerError, Result};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const ID_COLUMN: &str = "ID";
pub const SENTENCE_COLUMN: &str = "ID Sentenca";
const SENTENCE_COLUMN_ACCENTED: &str = "ID Sentença";

/// One `{ID, ID Sentenca}` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceRow {
    pub id: String,
    pub sentence_id: String,
}

impl SentenceRow {
    pub fn new(id: impl Into<String>, sentence_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sentence_id: sentence_id.into(),
        }
    }
}

/// Maps base identifiers to sentence ids
#[derive(Debug, Clone, Default)]
pub struct SentenceTable {
    entries: HashMap<String, String>,
}

impl SentenceTable {
    /// Build from rows. Repeated ids must agree on their sentence.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = SentenceRow>,
    {
        let mut entries: HashMap<String, String> = HashMap::new();

        for row in rows {
            if row.sentence_id.trim().is_empty() {
                warn!("Row {} has no sentence id, skipped", row.id);
                continue;
            }
            match entries.get(&row.id) {
                Some(existing) if existing != &row.sentence_id => {
                    return Err(OrganizerError::ConflictingSentence {
                        id: row.id,
                        first: existing.clone(),
                        second: row.sentence_id,
                    });
                }
                Some(_) => {}
                None => {
                    entries.insert(row.id, row.sentence_id);
                }
            }
        }

        Ok(Self { entries })
    }

    /// Load and concatenate every partition, in the order given
    pub fn load_partitions(sources: &[PathBuf]) -> Result<Self> {
        let mut rows = Vec::new();

        for path in expand_sources(sources)? {
            let file = File::open(&path)?;
            let partition = read_partition(BufReader::new(file), &path)?;
            debug!("Read {} sentence rows from {}", partition.len(), path.display());
            rows.extend(partition);
        }

        let table = Self::from_rows(rows)?;
        info!("📚 Sentence table loaded: {} identifiers", table.len());
        Ok(table)
    }

    /// Sentence id for a base identifier
    pub fn lookup(&self, base_id: &str) -> Result<&str> {
        self.entries
            .get(base_id)
            .map(String::as_str)
            .ok_or_else(|| OrganizerError::UnknownIdentifier(base_id.to_string()))
    }

    pub fn contains(&self, base_id: &str) -> bool {
        self.entries.contains_key(base_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Files are taken as-is; directories contribute their `.csv` files sorted by name
pub fn expand_sources(sources: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for source in sources {
        if source.is_dir() {
            let mut partitions = Vec::new();
            for entry in WalkDir::new(source).min_depth(1).max_depth(1).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                let is_csv = entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false);
                if entry.file_type().is_file() && is_csv {
                    partitions.push(entry.into_path());
                }
            }
            files.extend(partitions);
        } else if source.is_file() {
            files.push(source.clone());
        } else {
            return Err(OrganizerError::Config(format!(
                "Sentence source does not exist: {}",
                source.display()
            )));
        }
    }

    Ok(files)
}

/// Read the two sentence columns of one partition; rows without an id are skipped
pub fn read_partition<R: Read>(reader: R, source_path: &Path) -> Result<Vec<SentenceRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let position = |wanted: &[&str]| {
        headers.iter().position(|header| {
            let header = header.trim_start_matches('\u{feff}').trim();
            wanted.contains(&header)
        })
    };

    let id_idx = position(&[ID_COLUMN][..]);
    let sentence_idx = position(&[SENTENCE_COLUMN, SENTENCE_COLUMN_ACCENTED][..]);
    let (Some(id_idx), Some(sentence_idx)) = (id_idx, sentence_idx) else {
        let missing: Vec<&str> = [(ID_COLUMN, id_idx), (SENTENCE_COLUMN, sentence_idx)]
            .into_iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name)
            .collect();
        return Err(OrganizerError::MissingColumns {
            source_path: source_path.to_path_buf(),
            columns: missing.join(", "),
        });
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let id = record.get(id_idx).unwrap_or("").trim();
        if id.is_empty() {
            continue;
        }
        let sentence_id = record.get(sentence_idx).unwrap_or("").trim();
        rows.push(SentenceRow::new(id, sentence_id));
    }

    Ok(rows)
}

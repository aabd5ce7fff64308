//! Destination filenames and take allocation
//!
//! Layout: `<root>/<sentence_id>/<sentence_id>_<person>_<camera>_t<NNN>.<ext>`

use crate::error::{OrganizerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Components of a destination filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationName {
    pub sentence_id: String,
    pub person_code: String,
    pub camera_code: String,
    pub take_index: u32,
    pub extension: String,
}

impl DestinationName {
    /// First take (`t000`) for the given components
    pub fn new(
        sentence_id: impl Into<String>,
        person_code: impl Into<String>,
        camera_code: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            sentence_id: sentence_id.into(),
            person_code: person_code.into(),
            camera_code: camera_code.into(),
            take_index: 0,
            extension: extension.into().trim_start_matches('.').to_lowercase(),
        }
    }

    pub fn take_label(&self) -> String {
        format!("t{:03}", self.take_index)
    }

    pub fn file_name(&self) -> String {
        let stem = format!(
            "{}_{}_{}_{}",
            self.sentence_id,
            self.person_code,
            self.camera_code,
            self.take_label()
        );
        if self.extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, self.extension)
        }
    }

    /// Same name with the following take, `None` once the counter is exhausted
    pub fn next_take(&self) -> Option<Self> {
        let take_index = self.take_index.checked_add(1)?;
        Some(Self {
            take_index,
            ..self.clone()
        })
    }
}

/// Where selected and superseded takes are filed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRoots {
    pub selected: PathBuf,
    pub errors: PathBuf,
}

impl DestinationRoots {
    pub fn new(selected: impl Into<PathBuf>, errors: impl Into<PathBuf>) -> Self {
        Self {
            selected: selected.into(),
            errors: errors.into(),
        }
    }

    pub fn folder_for(&self, sentence_id: &str, is_selected: bool) -> PathBuf {
        let root = if is_selected { &self.selected } else { &self.errors };
        root.join(sentence_id)
    }
}

/// Hands out destination paths that neither exist nor were handed out before
/// in this run. Single writer only: nothing guards against another process
/// filling the same folder concurrently.
#[derive(Debug, Default)]
pub struct TakeAllocator {
    reserved: HashSet<PathBuf>,
}

impl TakeAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest free take in `folder`, probing with `exists`
    pub fn allocate<F>(&mut self, folder: &Path, name: DestinationName, exists: F) -> Result<(PathBuf, DestinationName)>
    where
        F: Fn(&Path) -> bool,
    {
        let mut candidate = name;
        loop {
            let path = folder.join(candidate.file_name());
            if !exists(&path) && !self.reserved.contains(&path) {
                self.reserved.insert(path.clone());
                return Ok((path, candidate));
            }

            candidate = candidate
                .next_take()
                .ok_or_else(|| OrganizerError::DestinationCollisionExhausted {
                    folder: folder.to_path_buf(),
                })?;
        }
    }

    /// Allocate against the real filesystem
    pub fn allocate_on_disk(&mut self, folder: &Path, name: DestinationName) -> Result<(PathBuf, DestinationName)> {
        self.allocate(folder, name, Path::exists)
    }

    /// Give back a reservation whose transfer never happened
    pub fn release(&mut self, path: &Path) {
        self.reserved.remove(path);
    }

    pub fn reserved_count(&self) -> usize {
        self.reserved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn s7() -> DestinationName {
        DestinationName::new("S7", "p002", "c1", "mp4")
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(s7().file_name(), "S7_p002_c1_t000.mp4");
        assert_eq!(
            DestinationName::new("S7", "p002", "c1", ".MOV").file_name(),
            "S7_p002_c1_t000.mov"
        );

        let mut late = s7();
        late.take_index = 1234;
        assert_eq!(late.file_name(), "S7_p002_c1_t1234.mp4");
    }

    #[test]
    fn test_routing_by_selection() {
        let roots = DestinationRoots::new("/out/good", "/out/errors");
        assert_eq!(roots.folder_for("S7", true), PathBuf::from("/out/good/S7"));
        assert_eq!(roots.folder_for("S7", false), PathBuf::from("/out/errors/S7"));
    }

    #[test]
    fn test_sequential_allocations_in_empty_root() {
        let mut allocator = TakeAllocator::new();
        let folder = Path::new("/out/good/S7");

        let (first, _) = allocator.allocate(folder, s7(), |_| false).unwrap();
        let (second, name) = allocator.allocate(folder, s7(), |_| false).unwrap();

        assert_eq!(first, folder.join("S7_p002_c1_t000.mp4"));
        assert_eq!(second, folder.join("S7_p002_c1_t001.mp4"));
        assert_eq!(name.take_index, 1);
    }

    #[test]
    fn test_allocation_skips_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        for take in ["t000", "t001", "t003"] {
            std::fs::write(temp_dir.path().join(format!("S7_p002_c1_{}.mp4", take)), b"x").unwrap();
        }

        let mut allocator = TakeAllocator::new();
        let (path, name) = allocator.allocate_on_disk(temp_dir.path(), s7()).unwrap();
        assert_eq!(name.take_label(), "t002");
        assert_eq!(path, temp_dir.path().join("S7_p002_c1_t002.mp4"));

        let (path, _) = allocator.allocate_on_disk(temp_dir.path(), s7()).unwrap();
        assert_eq!(path, temp_dir.path().join("S7_p002_c1_t004.mp4"));
    }

    #[test]
    fn test_release_frees_the_name() {
        let mut allocator = TakeAllocator::new();
        let folder = Path::new("/out");
        let (path, _) = allocator.allocate(folder, s7(), |_| false).unwrap();
        allocator.release(&path);

        let (again, _) = allocator.allocate(folder, s7(), |_| false).unwrap();
        assert_eq!(again, path);
        assert_eq!(allocator.reserved_count(), 1);
    }

    #[test]
    fn test_exhausted_counter() {
        let mut allocator = TakeAllocator::new();
        let mut name = s7();
        name.take_index = u32::MAX;

        let err = allocator
            .allocate(Path::new("/out"), name, |_| true)
            .unwrap_err();
        assert!(matches!(err, OrganizerError::DestinationCollisionExhausted { .. }));
    }
}

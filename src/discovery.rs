//! Clip enumeration per camera channel

use crate::error::{OrganizerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A single recording produced by one camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    /// Camera channel the clip was recorded on
    pub channel: String,

    /// Location of the clip on disk
    pub path: PathBuf,

    /// Filesystem modification time, used as capture order
    pub captured_at: DateTime<Utc>,
}

impl Clip {
    pub fn new(channel: impl Into<String>, path: impl Into<PathBuf>, captured_at: DateTime<Utc>) -> Self {
        Self {
            channel: channel.into(),
            path: path.into(),
            captured_at,
        }
    }

    /// Get the full filename
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Get the lower-cased extension, if any
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Same clip, relocated to `path`
    pub fn relocated(&self, path: PathBuf) -> Self {
        Self {
            channel: self.channel.clone(),
            path,
            captured_at: self.captured_at,
        }
    }
}

/// Sort clips by capture time, falling back to path so ties stay deterministic
pub fn sort_clips(clips: &mut [Clip]) {
    clips.sort_by(|a, b| {
        a.captured_at
            .cmp(&b.captured_at)
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// Lists clips for camera channels
#[derive(Debug, Clone)]
pub struct ClipDiscovery {
    /// Accepted extensions, lower-case without the dot
    supported_extensions: Vec<String>,
}

impl Default for ClipDiscovery {
    fn default() -> Self {
        Self::new(vec!["mp4".to_string(), "mov".to_string()])
    }
}

impl ClipDiscovery {
    pub fn new(supported_extensions: Vec<String>) -> Self {
        Self {
            supported_extensions: supported_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Check if a path carries an accepted extension (case-insensitive).
    /// Hidden files (`._0012.mp4` sidecars, staging names) never count.
    pub fn is_clip(&self, path: &Path) -> bool {
        let hidden = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(true);
        if hidden {
            return false;
        }

        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.supported_extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// List the clips of one channel, oldest first
    pub fn discover_channel(&self, channel: &str, dir: &Path) -> Result<Vec<Clip>> {
        if !dir.is_dir() {
            return Err(OrganizerError::DirectoryNotFound(dir.to_path_buf()));
        }

        let mut clips = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() || !self.is_clip(entry.path()) {
                continue;
            }

            let modified = entry.metadata().map_err(std::io::Error::from)?.modified()?;
            clips.push(Clip::new(channel, entry.path(), DateTime::<Utc>::from(modified)));
        }

        if clips.is_empty() {
            return Err(OrganizerError::EmptyChannel {
                channel: channel.to_string(),
                dir: dir.to_path_buf(),
            });
        }

        sort_clips(&mut clips);
        debug!("Found {} clips for {} in {}", clips.len(), channel, dir.display());
        Ok(clips)
    }

    /// List every configured channel. Empty channels are kept as empty lists
    /// so the length check can report them alongside the others.
    pub fn discover_all(&self, dirs: &BTreeMap<String, PathBuf>) -> Result<ChannelSet> {
        let mut channels = BTreeMap::new();

        for (channel, dir) in dirs {
            let clips = match self.discover_channel(channel, dir) {
                Ok(clips) => clips,
                Err(OrganizerError::EmptyChannel { channel, dir }) => {
                    warn!("📭 No clips for {} in {}", channel, dir.display());
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            channels.insert(channel.clone(), clips);
        }

        let set = ChannelSet::new(channels);
        info!("🔍 Enumerated {} channels: {}", set.len(), set.describe_counts());
        Ok(set)
    }
}

/// Clip lists keyed by channel name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSet {
    channels: BTreeMap<String, Vec<Clip>>,
}

impl ChannelSet {
    pub fn new(channels: BTreeMap<String, Vec<Clip>>) -> Self {
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel(&self, name: &str) -> Option<&[Clip]> {
        self.channels.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Clip])> {
        self.channels
            .iter()
            .map(|(name, clips)| (name.as_str(), clips.as_slice()))
    }

    pub fn counts(&self) -> Vec<(String, usize)> {
        self.channels
            .iter()
            .map(|(name, clips)| (name.clone(), clips.len()))
            .collect()
    }

    fn describe_counts(&self) -> String {
        self.counts()
            .iter()
            .map(|(name, count)| format!("{}={}", name, count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Number of clips per channel; every channel must hold the same number
    pub fn verify_equal_lengths(&self) -> Result<usize> {
        let mut lengths = self.channels.values().map(Vec::len);
        let Some(first) = lengths.next() else {
            return Ok(0);
        };

        if lengths.any(|len| len != first) {
            return Err(OrganizerError::ChannelLengthMismatch {
                counts: self.counts(),
            });
        }
        Ok(first)
    }

    /// Replace one channel's clip list, returning the new set
    pub fn with_channel(mut self, name: &str, clips: Vec<Clip>) -> Self {
        self.channels.insert(name.to_string(), clips);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
        path
    }

    fn clip(channel: &str, name: &str, secs: i64) -> Clip {
        Clip::new(channel, name, Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn test_discover_sorts_by_modification_time() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "late.mp4", 10);
        touch(temp_dir.path(), "early.MOV", 300);
        touch(temp_dir.path(), "middle.mp4", 100);
        touch(temp_dir.path(), "notes.txt", 50);
        touch(temp_dir.path(), "._late.mp4", 5);

        let clips = ClipDiscovery::default()
            .discover_channel("flir", temp_dir.path())
            .unwrap();

        let names: Vec<_> = clips.iter().filter_map(Clip::file_name).collect();
        assert_eq!(names, vec!["early.MOV", "middle.mp4", "late.mp4"]);
        assert!(clips.iter().all(|c| c.channel == "flir"));
    }

    #[test]
    fn test_discover_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let err = ClipDiscovery::default()
            .discover_channel("flir", &missing)
            .unwrap_err();
        assert!(matches!(err, OrganizerError::DirectoryNotFound(p) if p == missing));
    }

    #[test]
    fn test_discover_empty_channel() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "readme.txt", 0);

        let err = ClipDiscovery::default()
            .discover_channel("vue", temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, OrganizerError::EmptyChannel { channel, .. } if channel == "vue"));
    }

    #[test]
    fn test_discover_all_keeps_empty_channels_for_length_check() {
        let flir = TempDir::new().unwrap();
        let vue = TempDir::new().unwrap();
        touch(flir.path(), "a.mp4", 20);

        let dirs = BTreeMap::from([
            ("flir".to_string(), flir.path().to_path_buf()),
            ("vue".to_string(), vue.path().to_path_buf()),
        ]);
        let set = ClipDiscovery::default().discover_all(&dirs).unwrap();

        assert_eq!(set.channel("vue").map(<[Clip]>::len), Some(0));
        let err = set.verify_equal_lengths().unwrap_err();
        assert!(matches!(
            err,
            OrganizerError::ChannelLengthMismatch { ref counts }
                if counts == &vec![("flir".to_string(), 1), ("vue".to_string(), 0)]
        ));
    }

    #[test]
    fn test_equal_lengths() {
        let set = ChannelSet::default()
            .with_channel("flir", vec![clip("flir", "a.mp4", 1), clip("flir", "b.mp4", 2)])
            .with_channel("vue", vec![clip("vue", "x.mp4", 1), clip("vue", "y.mp4", 2)]);
        assert_eq!(set.verify_equal_lengths().unwrap(), 2);
        assert_eq!(ChannelSet::default().verify_equal_lengths().unwrap(), 0);
    }

    #[test]
    fn test_sort_ties_break_on_path() {
        let mut clips = vec![clip("c", "b.mp4", 5), clip("c", "a.mp4", 5), clip("c", "z.mp4", 1)];
        sort_clips(&mut clips);
        let names: Vec<_> = clips.iter().filter_map(Clip::file_name).collect();
        assert_eq!(names, vec!["z.mp4", "a.mp4", "b.mp4"]);
    }

    #[test]
    fn test_is_clip_case_insensitive() {
        let discovery = ClipDiscovery::new(vec![".MP4".to_string()]);
        assert!(discovery.is_clip(Path::new("x/0012.Mp4")));
        assert!(!discovery.is_clip(Path::new("x/0012.mov")));
        assert!(!discovery.is_clip(Path::new("x/0012")));
        assert!(!discovery.is_clip(Path::new("x/._0012.mp4")));
        assert!(!discovery.is_clip(Path::new("x/.aligning-0-0012.mp4")));
    }
}

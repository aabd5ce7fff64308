use crate::error::OrganizerError;
use crate::transfer::TransferMode;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration for the anamnese organizer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera channels and their codes
    pub cameras: CameraConfig,

    /// Display name -> person code
    pub people: BTreeMap<String, String>,

    /// Sentence table and destination roots
    pub anamnese: AnamneseConfig,

    /// Transfer behaviour
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Channel whose filenames the others adopt
    pub reference: String,

    /// Channel -> source directory
    pub paths: BTreeMap<String, PathBuf>,

    /// Channel -> camera code used in destination names
    pub codes: BTreeMap<String, String>,

    /// Secondary channels to align; all non-reference channels when unset
    pub align: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnamneseConfig {
    /// CSV partitions of the sentence spreadsheet (files or directories)
    pub sentence_sources: Vec<PathBuf>,

    /// Root for selected takes
    pub root_folder: PathBuf,

    /// Root for superseded takes
    pub root_folder_errors: PathBuf,

    /// Audit logs and run reports
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Accepted clip extensions (case-insensitive)
    pub supported_extensions: Vec<String>,

    /// Copy (default) or move clips into place
    pub transfer_mode: TransferMode,

    /// What a per-file failure does to the rest of the run
    pub failure_policy: FailurePolicy,

    /// Compare MD5 of source and destination after each transfer
    pub verify_checksums: bool,
}

/// Run-level reaction to a per-file failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure, keep going, report at the end
    #[default]
    Collect,
    /// Stop at the first failure
    FailFast,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            reference: "flir".to_string(),
            paths: BTreeMap::new(),
            codes: BTreeMap::new(),
            align: None,
        }
    }
}

impl Default for AnamneseConfig {
    fn default() -> Self {
        Self {
            sentence_sources: vec![PathBuf::from("anamnese/config/sentences")],
            root_folder: PathBuf::from("anamnese/selected"),
            root_folder_errors: PathBuf::from("anamnese/errors"),
            log_dir: PathBuf::from("anamnese/logs"),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            supported_extensions: vec!["mp4".to_string(), "mov".to_string()],
            transfer_mode: TransferMode::Copy,
            failure_policy: FailurePolicy::Collect,
            verify_checksums: false,
        }
    }
}

impl CameraConfig {
    /// Secondary channels that get aligned onto the reference
    pub fn aligned_channels(&self) -> Vec<String> {
        match &self.align {
            Some(channels) => channels
                .iter()
                .filter(|c| **c != self.reference)
                .cloned()
                .collect(),
            None => self
                .paths
                .keys()
                .filter(|c| **c != self.reference)
                .cloned()
                .collect(),
        }
    }

    pub fn code_for(&self, channel: &str) -> std::result::Result<&str, OrganizerError> {
        self.codes
            .get(channel)
            .map(String::as_str)
            .ok_or_else(|| OrganizerError::UnknownCamera(channel.to_string()))
    }
}

impl Config {
    const SEARCH_PATHS: [&'static str; 4] = [
        "anamnese.toml",
        "config/anamnese.toml",
        "anamnese.yaml",
        "config/anamnese.yaml",
    ];

    /// Load from an explicit file, or the first file found on the search path
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let found = Self::SEARCH_PATHS
                    .iter()
                    .map(|p| Path::new(*p))
                    .find(|p| p.is_file())
                    .ok_or_else(|| anyhow!("No configuration file found"))?;
                Self::from_file(found)?
            }
        };

        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML or YAML document, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        let config: Config = if is_yaml {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        };

        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Override paths and transfer mode from environment variables
    pub fn apply_env(&mut self) {
        if let Ok(root) = std::env::var("ANAMNESE_ROOT_FOLDER") {
            self.anamnese.root_folder = PathBuf::from(root);
        }

        if let Ok(root) = std::env::var("ANAMNESE_ROOT_FOLDER_ERRORS") {
            self.anamnese.root_folder_errors = PathBuf::from(root);
        }

        if let Ok(log_dir) = std::env::var("ANAMNESE_LOG_DIR") {
            self.anamnese.log_dir = PathBuf::from(log_dir);
        }

        if let Ok(mode) = std::env::var("ANAMNESE_TRANSFER_MODE") {
            match mode.parse() {
                Ok(mode) => self.processing.transfer_mode = mode,
                Err(e) => tracing::warn!("Ignoring ANAMNESE_TRANSFER_MODE: {}", e),
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cameras.paths.is_empty() {
            return Err(anyhow!("No camera paths configured"));
        }

        if !self.cameras.paths.contains_key(&self.cameras.reference) {
            return Err(anyhow!(
                "Reference channel '{}' has no path",
                self.cameras.reference
            ));
        }

        for channel in self.cameras.paths.keys() {
            self.cameras.code_for(channel)?;
        }

        if let Some(align) = &self.cameras.align {
            if let Some(unknown) = align.iter().find(|c| !self.cameras.paths.contains_key(*c)) {
                return Err(anyhow!("Aligned channel '{}' has no path", unknown));
            }
        }

        if self.people.is_empty() {
            return Err(anyhow!("No people configured"));
        }

        if self.anamnese.sentence_sources.is_empty() {
            return Err(anyhow!("No sentence sources configured"));
        }

        if self.anamnese.root_folder == self.anamnese.root_folder_errors {
            return Err(anyhow!("root_folder and root_folder_errors must differ"));
        }

        if self.processing.supported_extensions.is_empty() {
            return Err(anyhow!("supported_extensions must not be empty"));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Anamnese Organizer Configuration:\n\
            - Reference Camera: {}\n\
            - Channels: {}\n\
            - Aligned Channels: {}\n\
            - People: {}\n\
            - Selected Root: {}\n\
            - Errors Root: {}\n\
            - Log Directory: {}\n\
            - Transfer Mode: {:?}\n\
            - Failure Policy: {:?}",
            self.cameras.reference,
            self.cameras.paths.keys().cloned().collect::<Vec<_>>().join(", "),
            self.cameras.aligned_channels().join(", "),
            self.people.len(),
            self.anamnese.root_folder.display(),
            self.anamnese.root_folder_errors.display(),
            self.anamnese.log_dir.display(),
            self.processing.transfer_mode,
            self.processing.failure_policy
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_reference(mut self, channel: &str) -> Self {
        self.config.cameras.reference = channel.to_string();
        self
    }

    pub fn with_camera(mut self, channel: &str, path: impl Into<PathBuf>, code: &str) -> Self {
        self.config.cameras.paths.insert(channel.to_string(), path.into());
        self.config.cameras.codes.insert(channel.to_string(), code.to_string());
        self
    }

    pub fn with_person(mut self, name: &str, code: &str) -> Self {
        self.config.people.insert(name.to_string(), code.to_string());
        self
    }

    pub fn with_sentence_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.config.anamnese.sentence_sources = vec![source.into()];
        self
    }

    pub fn with_roots(mut self, selected: impl Into<PathBuf>, errors: impl Into<PathBuf>) -> Self {
        self.config.anamnese.root_folder = selected.into();
        self.config.anamnese.root_folder_errors = errors.into();
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.anamnese.log_dir = dir.into();
        self
    }

    pub fn with_transfer_mode(mut self, mode: TransferMode) -> Self {
        self.config.processing.transfer_mode = mode;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.processing.failure_policy = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

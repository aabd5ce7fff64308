use crate::align::{apply_alignment, plan_channels};
use crate::audit::AuditLog;
use crate::config::{Config, FailurePolicy};
use crate::discovery::{ChannelSet, ClipDiscovery};
use crate::error::{OrganizerError, Result};
use crate::identifier::{stem_of, SelectionEntry, SelectionTable};
use crate::naming::{DestinationName, DestinationRoots, TakeAllocator};
use crate::sentences::SentenceTable;
use crate::transfer::{create_transfer, FileTransfer, TransferMode};
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Neighbours shown around each superseded take
const REVIEW_RADIUS: usize = 10;
pub const REPORT_FILE: &str = "run_report.json";

/// Per-run switches, usually taken from the config and CLI flags
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    pub transfer_mode: TransferMode,
    pub failure_policy: FailurePolicy,
    pub verify_checksums: bool,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dry_run: false,
            transfer_mode: config.processing.transfer_mode,
            failure_policy: config.processing.failure_policy,
            verify_checksums: config.processing.verify_checksums,
            show_progress: false,
        }
    }
}

/// One clip placed (or, in a dry run, that would be placed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub channel: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub base_id: String,
    pub sentence_id: String,
    pub is_selected: bool,
}

/// One clip that could not be placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub channel: String,
    pub source: PathBuf,
    pub error: String,
}

impl FileFailure {
    fn new(channel: &str, source: &Path, error: &OrganizerError) -> Self {
        Self {
            channel: channel.to_string(),
            source: source.to_path_buf(),
            error: error.to_string(),
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub dry_run: bool,
    pub cancelled: bool,
    pub aligned: usize,
    pub total: usize,
    pub transferred: usize,
    pub failed: usize,
    pub total_time: Duration,
    pub transfers: Vec<TransferRecord>,
    pub failures: Vec<FileFailure>,

    /// Clips that were placed but whose audit line could not be written
    #[serde(default)]
    pub audit_failures: Vec<FileFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.audit_failures.is_empty() && !self.cancelled
    }
}

/// Result of the placement stage
struct Placement {
    transfers: Vec<TransferRecord>,
    audit_failures: Vec<FileFailure>,
    cancelled: bool,
}

/// A clip with everything needed to place it except its take number
#[derive(Debug, Clone)]
struct TransferJob {
    channel: String,
    camera_code: String,
    entry: SelectionEntry,
    sentence_id: String,
}

/// Drives enumeration, alignment, identification and placement
pub struct Organizer {
    config: Config,
    person_code: String,
    sentences: SentenceTable,
    discovery: ClipDiscovery,
    transfer: Box<dyn FileTransfer>,
    options: RunOptions,
    cancel: Arc<AtomicBool>,
}

impl Organizer {
    pub fn new(config: Config, person_code: String, sentences: SentenceTable, options: RunOptions) -> Self {
        info!(
            "🔧 Initializing Organizer for {} ({:?}{})",
            person_code,
            options.transfer_mode,
            if options.dry_run { ", dry run" } else { "" }
        );

        Self {
            discovery: ClipDiscovery::new(config.processing.supported_extensions.clone()),
            transfer: create_transfer(options.transfer_mode, options.verify_checksums),
            config,
            person_code,
            sentences,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the run before the next file operation once set
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn roots(&self) -> DestinationRoots {
        DestinationRoots::new(
            &self.config.anamnese.root_folder,
            &self.config.anamnese.root_folder_errors,
        )
    }

    /// Enumerate every channel and require equal counts. Touches nothing.
    pub fn preflight(&self) -> Result<ChannelSet> {
        for channel in self.config.cameras.paths.keys() {
            self.config.cameras.code_for(channel)?;
        }

        let set = self.discovery.discover_all(&self.config.cameras.paths)?;
        let count = set.verify_equal_lengths()?;

        // reference names are handed to every aligned channel
        if let Some(clips) = set.channel(&self.config.cameras.reference) {
            if let Some(clip) = clips.iter().find(|c| stem_of(&c.path).is_none()) {
                return Err(OrganizerError::InvalidIdentifier(clip.path.clone()));
            }
        }

        info!("✅ {} channels with {} clips each", set.len(), count);
        Ok(set)
    }

    /// Align the configured secondary channels; returns the new set and the
    /// number of renames performed (or planned, in a dry run)
    pub async fn align(&self, set: ChannelSet) -> Result<(ChannelSet, usize)> {
        let plans = plan_channels(
            &set,
            &self.config.cameras.reference,
            &self.config.cameras.aligned_channels(),
        )?;

        let audit = AuditLog::alignment(&self.config.anamnese.log_dir);
        let mut renamed = 0;
        let mut aligned_set = set;

        for plan in plans {
            if self.is_cancelled() {
                return Err(OrganizerError::Cancelled);
            }

            renamed += plan.steps.len();
            let clips = if self.options.dry_run {
                for step in &plan.steps {
                    info!("🧪 Would rename {} -> {}", step.from.display(), step.to.display());
                }
                plan.aligned.clone()
            } else {
                apply_alignment(&plan, &audit).await?
            };
            aligned_set = aligned_set.with_channel(&plan.channel, clips);
        }

        Ok((aligned_set, renamed))
    }

    /// Resolve identifiers and sentences for every clip
    fn resolve_jobs(&self, set: &ChannelSet) -> Result<(Vec<TransferJob>, Vec<FileFailure>)> {
        let mut jobs = Vec::new();
        let mut failures = Vec::new();

        for (channel, clips) in set.iter() {
            let camera_code = self.config.cameras.code_for(channel)?.to_string();
            let (table, rejected) = SelectionTable::resolve_valid(clips);
            for clip in rejected {
                let e = OrganizerError::InvalidIdentifier(clip.path.clone());
                warn!("❓ {}", e);
                failures.push(FileFailure::new(channel, &clip.path, &e));
            }

            info!(
                "🎬 {}: {} selected, {} routed to errors",
                channel,
                table.selected_count(),
                table.deselected_count()
            );
            for (idx, window) in table.review_context(REVIEW_RADIUS) {
                let context: Vec<String> = window
                    .iter()
                    .map(|e| format!("{}{}", e.record.raw_stem, if e.is_selected { "" } else { "*" }))
                    .collect();
                debug!("Superseded take #{} in {}: {}", idx, channel, context.join(" "));
            }

            for entry in table.entries() {
                match self.sentences.lookup(&entry.record.base_id) {
                    Ok(sentence_id) => jobs.push(TransferJob {
                        channel: channel.to_string(),
                        camera_code: camera_code.clone(),
                        entry: entry.clone(),
                        sentence_id: sentence_id.to_string(),
                    }),
                    Err(e) => {
                        warn!("❓ {}: {}", entry.clip.path.display(), e);
                        failures.push(FileFailure::new(channel, &entry.clip.path, &e));
                    }
                }
            }
        }

        Ok((jobs, failures))
    }

    /// The set as it will look once aligned, computed without renaming
    fn planned_set(&self, set: ChannelSet) -> Result<ChannelSet> {
        let plans = plan_channels(
            &set,
            &self.config.cameras.reference,
            &self.config.cameras.aligned_channels(),
        )?;
        Ok(plans
            .into_iter()
            .fold(set, |set, plan| set.with_channel(&plan.channel, plan.aligned)))
    }

    /// Pre-flight plus identifier lookups against the aligned names, without
    /// renaming or copying anything
    pub fn check(&self) -> Result<Vec<FileFailure>> {
        let set = self.planned_set(self.preflight()?)?;
        let (_, failures) = self.resolve_jobs(&set)?;
        Ok(failures)
    }

    /// First unresolvable identifier, if any
    fn first_unknown(&self, set: &ChannelSet) -> Result<()> {
        for (_, clips) in set.iter() {
            for entry in SelectionTable::resolve(clips)?.entries() {
                self.sentences.lookup(&entry.record.base_id)?;
            }
        }
        Ok(())
    }

    /// Run the whole pipeline
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Local::now();
        let start_time = Instant::now();

        info!("🚀 Starting organizer run...");
        let set = self.preflight()?;

        if self.options.failure_policy == FailurePolicy::FailFast {
            if let Err(e) = self.first_unknown(&self.planned_set(set.clone())?) {
                error!("Aborting before any rename: {}", e);
                return Err(e);
            }
        }

        let (set, aligned) = self.align(set).await?;
        let (jobs, mut failures) = self.resolve_jobs(&set)?;

        let total = jobs.len() + failures.len();
        let Placement {
            transfers,
            audit_failures,
            cancelled,
        } = self.place(jobs, &mut failures).await?;

        let report = RunReport {
            started_at,
            dry_run: self.options.dry_run,
            cancelled,
            aligned,
            total,
            transferred: transfers.len(),
            failed: failures.len(),
            total_time: start_time.elapsed(),
            transfers,
            failures,
            audit_failures,
        };

        if !self.options.dry_run {
            self.save_report(&report).await?;
        }
        Ok(report)
    }

    /// Transfer every job into its destination, one at a time
    async fn place(&self, jobs: Vec<TransferJob>, failures: &mut Vec<FileFailure>) -> Result<Placement> {
        let roots = self.roots();
        let audit = AuditLog::placement(&self.config.anamnese.log_dir);
        let mut allocator = TakeAllocator::new();
        let mut placement = Placement {
            transfers: Vec::with_capacity(jobs.len()),
            audit_failures: Vec::new(),
            cancelled: false,
        };
        let progress = self.progress_bar(jobs.len());

        for job in jobs {
            if self.is_cancelled() {
                warn!("🛑 Cancelled, {} placed so far", placement.transfers.len());
                progress.abandon();
                placement.cancelled = true;
                return Ok(placement);
            }

            match self.place_one(&job, &roots, &mut allocator).await {
                Ok(record) => {
                    if !self.options.dry_run {
                        if let Err(e) = audit.record(&record.source, &record.destination).await {
                            error!("📝 Placed {} but could not log it: {}", record.destination.display(), e);
                            placement
                                .audit_failures
                                .push(FileFailure::new(&job.channel, &record.source, &e));
                        }
                    }
                    placement.transfers.push(record);
                }
                Err(e) => {
                    error!("❌ Failed: {} - {}", job.entry.clip.path.display(), e);
                    if self.options.failure_policy == FailurePolicy::FailFast {
                        progress.abandon();
                        return Err(e);
                    }
                    failures.push(FileFailure::new(&job.channel, &job.entry.clip.path, &e));
                }
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(placement)
    }

    async fn place_one(
        &self,
        job: &TransferJob,
        roots: &DestinationRoots,
        allocator: &mut TakeAllocator,
    ) -> Result<TransferRecord> {
        let clip = &job.entry.clip;
        let folder = roots.folder_for(&job.sentence_id, job.entry.is_selected);
        let name = DestinationName::new(
            job.sentence_id.as_str(),
            self.person_code.as_str(),
            job.camera_code.as_str(),
            clip.extension().unwrap_or_default(),
        );
        let (destination, _) = allocator.allocate_on_disk(&folder, name)?;

        if self.options.dry_run {
            info!("🧪 Would place {} -> {}", clip.path.display(), destination.display());
        } else {
            if let Err(e) = self.transfer.transfer(&clip.path, &destination).await {
                allocator.release(&destination);
                return Err(e);
            }
        }

        Ok(TransferRecord {
            channel: job.channel.clone(),
            source: clip.path.clone(),
            destination,
            base_id: job.entry.record.base_id.clone(),
            sentence_id: job.sentence_id.clone(),
            is_selected: job.entry.is_selected,
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(len as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress
    }

    async fn save_report(&self, report: &RunReport) -> Result<()> {
        let log_dir = &self.config.anamnese.log_dir;
        tokio::fs::create_dir_all(log_dir).await?;

        let path = log_dir.join(REPORT_FILE);
        let json_data = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&path, json_data).await?;

        info!("💾 Run report saved to: {}", path.display());
        Ok(())
    }
}

//! Camera alignment
//!
//! Secondary cameras record the same takes as the reference camera but name
//! them differently. The i-th clip of a secondary channel takes the name of
//! the i-th reference clip, keeping its own directory and extension.

use crate::audit::AuditLog;
use crate::discovery::{ChannelSet, Clip};
use crate::error::{OrganizerError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One rename required to align a clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentStep {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Renames for one secondary channel and the clip list they produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentPlan {
    pub channel: String,
    pub steps: Vec<AlignmentStep>,
    pub aligned: Vec<Clip>,
}

impl AlignmentPlan {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    /// True when some rename targets a file another step still has to move away
    pub fn needs_staging(&self) -> bool {
        let sources: HashSet<&Path> = self.steps.iter().map(|s| s.from.as_path()).collect();
        self.steps.iter().any(|s| sources.contains(s.to.as_path()))
    }
}

/// Path `secondary` should have to match `reference`
pub fn aligned_path(reference: &Clip, secondary: &Clip) -> Result<PathBuf> {
    let stem = reference
        .path
        .file_stem()
        .ok_or_else(|| OrganizerError::InvalidIdentifier(reference.path.clone()))?;

    let mut name = stem.to_os_string();
    if let Some(ext) = secondary.path.extension() {
        name.push(".");
        name.push(ext);
    }

    let dir = secondary.path.parent().unwrap_or(Path::new(""));
    Ok(dir.join(name))
}

/// Plan the renames for one secondary channel. Pure: never touches the disk.
pub fn plan_alignment(channel: &str, reference: &[Clip], secondary: &[Clip]) -> Result<AlignmentPlan> {
    if reference.len() != secondary.len() {
        return Err(OrganizerError::ChannelLengthMismatch {
            counts: vec![
                (reference.first().map(|c| c.channel.clone()).unwrap_or_default(), reference.len()),
                (channel.to_string(), secondary.len()),
            ],
        });
    }

    let mut steps = Vec::new();
    let mut aligned = Vec::with_capacity(secondary.len());
    let mut targets = HashSet::new();

    for (reference_clip, secondary_clip) in reference.iter().zip(secondary) {
        let to = aligned_path(reference_clip, secondary_clip)?;
        if !targets.insert(to.clone()) {
            return Err(OrganizerError::AlignmentConflict {
                from: secondary_clip.path.clone(),
                to,
            });
        }

        if to != secondary_clip.path {
            steps.push(AlignmentStep {
                from: secondary_clip.path.clone(),
                to: to.clone(),
            });
        }
        aligned.push(secondary_clip.relocated(to));
    }

    Ok(AlignmentPlan {
        channel: channel.to_string(),
        steps,
        aligned,
    })
}

/// Plan every secondary channel in `targets` against `reference`
pub fn plan_channels(set: &ChannelSet, reference: &str, targets: &[String]) -> Result<Vec<AlignmentPlan>> {
    let reference_clips = set
        .channel(reference)
        .ok_or_else(|| OrganizerError::Config(format!("Reference channel '{}' is not configured", reference)))?;

    targets
        .iter()
        .filter(|name| name.as_str() != reference)
        .map(|name| {
            let clips = set
                .channel(name)
                .ok_or_else(|| OrganizerError::Config(format!("Channel '{}' is not configured", name)))?;
            plan_alignment(name, reference_clips, clips)
        })
        .collect()
}

/// Carry out a plan on disk, logging each completed rename.
///
/// Every target is checked before the first rename, so a conflict leaves the
/// channel untouched. When targets overlap with sources the clips are moved
/// through temporary names first.
pub async fn apply_alignment(plan: &AlignmentPlan, audit: &AuditLog) -> Result<Vec<Clip>> {
    if plan.is_noop() {
        debug!("Channel {} already aligned", plan.channel);
        return Ok(plan.aligned.clone());
    }

    let sources: HashSet<&Path> = plan.steps.iter().map(|s| s.from.as_path()).collect();
    for step in &plan.steps {
        if !sources.contains(step.to.as_path()) && tokio::fs::try_exists(&step.to).await? {
            return Err(OrganizerError::AlignmentConflict {
                from: step.from.clone(),
                to: step.to.clone(),
            });
        }
    }

    if plan.needs_staging() {
        let mut staged = Vec::with_capacity(plan.steps.len());
        for (idx, step) in plan.steps.iter().enumerate() {
            let staging = staging_path(&step.from, idx);
            tokio::fs::rename(&step.from, &staging).await?;
            staged.push(staging);
        }
        for (step, staging) in plan.steps.iter().zip(&staged) {
            tokio::fs::rename(staging, &step.to).await?;
            audit.record(&step.from, &step.to).await?;
        }
    } else {
        for step in &plan.steps {
            tokio::fs::rename(&step.from, &step.to).await?;
            audit.record(&step.from, &step.to).await?;
        }
    }

    info!("🎥 Aligned {} clips of {}", plan.steps.len(), plan.channel);
    Ok(plan.aligned.clone())
}

fn staging_path(path: &Path, idx: usize) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".aligning-{}-{}", idx, name))
}

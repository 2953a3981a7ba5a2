//! Sequential batch upload over (video, profile) pairs
//!
//! The plan is built from a snapshot of the video list, so it can be handed
//! to a worker thread while the control thread keeps the list. Requirements
//! are re-checked while planning; pairs that no longer qualify are skipped
//! with a reason instead of being dropped.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::UploadError;
use crate::helper_functions::Utils;
use crate::metadata::MetadataDocument;
use crate::profiles::{Profile, ProfileCatalog};
use crate::upload_log::{self, LogOutcome};
use crate::uploader::{UploadEvent, UploadOrchestrator, UploadRequest, UploadResult};
use crate::video_item::{BatchProgress, VideoItem};

const PENDING_MARK: &str = "↻";
const SUCCESS_MARK: &str = "●";
const FAILURE_MARK: &str = "×";
const SKIPPED_MARK: &str = "○";
const STATUS_MESSAGE_CHARS: usize = 80;

/// One enqueued upload
#[derive(Debug, Clone)]
pub struct BatchPair {
    pub video_path: PathBuf,
    pub subtitle_path: Option<PathBuf>,
    pub thumbnail_path: Option<PathBuf>,
    pub metadata: MetadataDocument,
    pub profile: Profile,
}

impl BatchPair {
    fn request(&self) -> UploadRequest<'_> {
        UploadRequest {
            video_path: &self.video_path,
            subtitle_path: self.subtitle_path.as_deref(),
            metadata: &self.metadata,
            profile: &self.profile,
            thumbnail_path: self.thumbnail_path.as_deref(),
        }
    }
}

/// Why a selected pair was not enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingMetadata,
    MissingSubtitle,
    UnknownProfile,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingMetadata => "JSON missing",
            Self::MissingSubtitle => "SRT missing",
            Self::UnknownProfile => "unknown profile",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPair {
    pub video_path: PathBuf,
    pub profile: String,
    pub reason: SkipReason,
}

/// Ordered pairs to upload plus the selections that were rejected
#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    pub pairs: Vec<BatchPair>,
    pub skipped: Vec<SkippedPair>,
}

impl BatchPlan {
    /// Expand selected profiles into pairs, videos in list order, profiles in catalog order
    pub fn from_videos(videos: &[VideoItem], catalog: &ProfileCatalog) -> Self {
        let mut plan = Self::default();

        for video in videos {
            let selected = video.active_profiles();
            if selected.is_empty() {
                continue;
            }

            let metadata = match &video.metadata {
                Some(metadata) => metadata,
                None => {
                    for name in selected {
                        plan.skip(video, name, SkipReason::MissingMetadata);
                    }
                    continue;
                }
            };

            for profile in catalog.iter().filter(|p| selected.contains(&p.name)) {
                // The subtitle may have been deleted since it was resolved
                if profile.requires_srt && !video.subtitle_on_disk() {
                    plan.skip(video, profile.name.clone(), SkipReason::MissingSubtitle);
                    continue;
                }
                plan.pairs.push(BatchPair {
                    video_path: video.video_path.clone(),
                    subtitle_path: video.srt_path.clone(),
                    thumbnail_path: video.thumbnail_path.clone(),
                    metadata: metadata.clone(),
                    profile: profile.clone(),
                });
            }

            for name in selected.into_iter().filter(|n| catalog.get(n).is_none()) {
                plan.skip(video, name, SkipReason::UnknownProfile);
            }
        }

        plan
    }

    fn skip(&mut self, video: &VideoItem, profile: String, reason: SkipReason) {
        log::info!(
            "Skipping {} [{}]: {}",
            video.video_path.display(),
            profile,
            reason
        );
        self.skipped.push(SkippedPair {
            video_path: video.video_path.clone(),
            profile,
            reason,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Events emitted while a batch runs
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Skipped(SkippedPair),
    PairStarted {
        index: usize,
        total: usize,
        video_path: PathBuf,
        profile: String,
    },
    Upload {
        video_path: PathBuf,
        profile: String,
        event: UploadEvent,
    },
    PairFinished {
        video_path: PathBuf,
        profile: String,
        outcome: Result<UploadResult, String>,
    },
    Progress(BatchProgress),
}

/// A line for a video's status trail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub video_path: PathBuf,
    pub line: String,
    /// Prefix of the pending line this one replaces
    pub replaces: Option<String>,
}

impl BatchEvent {
    /// Status trail update for the affected video, if the event produces one
    pub fn status_line(&self) -> Option<StatusLine> {
        match self {
            Self::Skipped(skipped) => Some(StatusLine {
                video_path: skipped.video_path.clone(),
                line: format!("{} {}: {}", SKIPPED_MARK, skipped.profile, skipped.reason),
                replaces: None,
            }),
            Self::PairStarted {
                video_path, profile, ..
            } => Some(StatusLine {
                video_path: video_path.clone(),
                line: format!("{} {}: running...", PENDING_MARK, profile),
                replaces: None,
            }),
            Self::PairFinished {
                video_path,
                profile,
                outcome,
            } => {
                let line = match outcome {
                    Ok(result) => format!("{} {}: {}", SUCCESS_MARK, profile, result.remote_id),
                    Err(message) => format!(
                        "{} {}: {}",
                        FAILURE_MARK,
                        profile,
                        Utils::truncate_string(message, STATUS_MESSAGE_CHARS)
                    ),
                };
                Some(StatusLine {
                    video_path: video_path.clone(),
                    line,
                    replaces: Some(format!("{} {}:", PENDING_MARK, profile)),
                })
            }
            Self::Upload { .. } | Self::Progress(_) => None,
        }
    }
}

/// Final report of a batch
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub successes: Vec<UploadResult>,
    pub failure_count: usize,
    pub skipped: Vec<SkippedPair>,
    pub progress: BatchProgress,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Batch finished: {} succeeded, {} failed, {} skipped",
            self.successes.len(),
            self.failure_count,
            self.skipped.len()
        )?;
        for result in &self.successes {
            writeln!(f, "{}", result)?;
        }
        Ok(())
    }
}

/// Runs a plan one pair at a time
pub struct BatchScheduler {
    orchestrator: Arc<UploadOrchestrator>,
}

impl BatchScheduler {
    pub fn new(orchestrator: Arc<UploadOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Plan from the video list and run it
    pub fn run_videos(
        &self,
        videos: &[VideoItem],
        catalog: &ProfileCatalog,
        replace_if_exists: bool,
        on_event: &mut dyn FnMut(BatchEvent),
    ) -> BatchSummary {
        self.run(BatchPlan::from_videos(videos, catalog), replace_if_exists, on_event)
    }

    /// Attempt every pair exactly once; one failure never stops the batch
    pub fn run(
        &self,
        plan: BatchPlan,
        replace_if_exists: bool,
        on_event: &mut dyn FnMut(BatchEvent),
    ) -> BatchSummary {
        let total = plan.pairs.len();
        let mut summary = BatchSummary {
            progress: BatchProgress::new(total),
            ..Default::default()
        };

        for skipped in &plan.skipped {
            on_event(BatchEvent::Skipped(skipped.clone()));
        }
        summary.skipped = plan.skipped;

        log::info!("Starting batch of {} uploads", total);
        for (index, pair) in plan.pairs.iter().enumerate() {
            let profile = pair.profile.name.clone();
            on_event(BatchEvent::PairStarted {
                index: index + 1,
                total,
                video_path: pair.video_path.clone(),
                profile: profile.clone(),
            });

            let outcome = {
                let mut forward = |event: UploadEvent| {
                    on_event(BatchEvent::Upload {
                        video_path: pair.video_path.clone(),
                        profile: profile.clone(),
                        event,
                    })
                };
                self.run_pair(pair, replace_if_exists, &mut forward)
            };

            match &outcome {
                Ok(result) => {
                    upload_log::append(&pair.video_path, &profile, LogOutcome::Success(result));
                    summary.successes.push(result.clone());
                    summary.progress.record(true);
                }
                Err(e) => {
                    log::error!("Upload of {} [{}] failed: {}", pair.video_path.display(), profile, e);
                    upload_log::append(&pair.video_path, &profile, LogOutcome::Failure(&e.to_string()));
                    summary.failure_count += 1;
                    summary.progress.record(false);
                }
            }

            on_event(BatchEvent::PairFinished {
                video_path: pair.video_path.clone(),
                profile,
                outcome: outcome.map_err(|e| e.to_string()),
            });
            on_event(BatchEvent::Progress(summary.progress));
        }

        log::info!(
            "Batch finished: {} succeeded, {} failed",
            summary.successes.len(),
            summary.failure_count
        );
        summary
    }

    fn run_pair(
        &self,
        pair: &BatchPair,
        replace_if_exists: bool,
        on_event: &mut dyn FnMut(UploadEvent),
    ) -> Result<UploadResult, UploadError> {
        if replace_if_exists {
            if let Some(result) = self.try_replace(pair, on_event) {
                return Ok(result);
            }
        }
        self.orchestrator.upload(pair.request(), on_event)
    }

    /// Replace the media of an item with the same title; `None` falls back to a new upload
    fn try_replace(&self, pair: &BatchPair, on_event: &mut dyn FnMut(UploadEvent)) -> Option<UploadResult> {
        let title = pair.metadata.snippet.title.trim();
        if title.is_empty() {
            return None;
        }

        let existing = match self.orchestrator.find_by_title(title) {
            Ok(Some(item)) => item,
            Ok(None) => return None,
            Err(e) => {
                log::debug!("Title lookup for '{}' failed: {}", title, e);
                return None;
            }
        };

        log::info!("Replacing media of {} ('{}')", existing.id, title);
        // Held back until the replace succeeds so a fallback upload starts only once
        let mut attempt = Vec::new();
        match self.orchestrator.replace_media(
            &existing.id,
            title,
            &pair.profile.name,
            &pair.video_path,
            &mut |event| attempt.push(event),
        ) {
            Ok(result) => {
                for event in attempt {
                    on_event(event);
                }
                Some(result)
            }
            Err(e) => {
                log::warn!(
                    "Replacing {} failed, uploading {} as new item: {}",
                    existing.id,
                    Utils::get_file_name(&pair.video_path),
                    e
                );
                None
            }
        }
    }
}

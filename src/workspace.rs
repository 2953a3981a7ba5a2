//! The active video list and everything that mutates it
//!
//! `Workspace` is the single consumer: workers (folder scans, enrichment,
//! batch runs) only send [`WorkerEvent`]s over a channel, and all changes to
//! videos, selections and status trails happen in [`Workspace::apply`] on the
//! owning thread.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::batch::{BatchEvent, BatchPlan, BatchScheduler, BatchSummary};
use crate::companion::{EnrichmentOutcome, EnrichmentRequest, EnrichmentSupervisor};
use crate::config::{DEFAULT_THUMBNAIL_OFFSET_SECS, SUBTITLE_EXTENSIONS};
use crate::file_matcher::FileMatcher;
use crate::helper_functions::{Utils, Validation};
use crate::metadata::MetadataValidator;
use crate::preferences::ProfilePreferences;
use crate::profiles::{ProfileCatalog, Requirement};
use crate::video_item::{BatchProgress, VideoItem};

/// Messages from worker threads to the workspace
#[derive(Debug)]
pub enum WorkerEvent {
    ScanFinished { root: PathBuf, videos: Vec<PathBuf> },
    Enriched(EnrichmentOutcome),
    Batch(BatchEvent),
    BatchFinished(BatchSummary),
}

/// Video files below `root`, recursively, in path order
pub fn collect_videos(root: &Path) -> Vec<PathBuf> {
    fn visit_dirs(dir: &Path, videos: &mut Vec<PathBuf>) {
        if let Ok(entries) = dir.read_dir() {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    visit_dirs(&path, videos);
                } else if Utils::is_video_file(&path) {
                    videos.push(path);
                }
            }
        }
    }

    let mut videos = Vec::new();
    visit_dirs(root, &mut videos);
    videos.sort();
    videos
}

/// Most recently modified video directly inside `dir`
pub fn newest_video_in(dir: &Path) -> Option<PathBuf> {
    dir.read_dir()
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && Utils::is_video_file(path))
        .max_by_key(|path| Utils::modified_time(path))
}

pub struct Workspace {
    catalog: Arc<ProfileCatalog>,
    matcher: FileMatcher,
    preferences: ProfilePreferences,
    supervisor: Option<EnrichmentSupervisor>,
    scheduler: Option<Arc<BatchScheduler>>,
    videos: Vec<VideoItem>,
    tx: Sender<WorkerEvent>,
    rx: Receiver<WorkerEvent>,
    scanning: bool,
    batch_running: bool,
    progress: Option<BatchProgress>,
    last_summary: Option<BatchSummary>,
    status: String,
}

impl Workspace {
    pub fn new(catalog: Arc<ProfileCatalog>, preferences: ProfilePreferences) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            catalog,
            matcher: FileMatcher::default(),
            preferences,
            supervisor: None,
            scheduler: None,
            videos: Vec::new(),
            tx,
            rx,
            scanning: false,
            batch_running: false,
            progress: None,
            last_summary: None,
            status: "Ready".to_string(),
        }
    }

    pub fn with_matcher(mut self, matcher: FileMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Enable background subtitle extraction and thumbnail capture
    pub fn with_enrichment(mut self, supervisor: EnrichmentSupervisor) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<BatchScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn videos(&self) -> &[VideoItem] {
        &self.videos
    }

    pub fn video(&self, index: usize) -> Option<&VideoItem> {
        self.videos.get(index)
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> Option<BatchProgress> {
        self.progress
    }

    pub fn last_summary(&self) -> Option<&BatchSummary> {
        self.last_summary.as_ref()
    }

    pub fn is_batch_running(&self) -> bool {
        self.batch_running
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// No scan, batch or enrichment is outstanding
    pub fn is_idle(&self) -> bool {
        let enriching = self
            .supervisor
            .as_ref()
            .map(|s| s.running_count() > 0)
            .unwrap_or(false);
        !self.scanning && !self.batch_running && !enriching
    }

    fn position(&self, video_path: &Path) -> Option<usize> {
        self.videos.iter().position(|v| v.video_path == video_path)
    }

    fn video_mut(&mut self, index: usize) -> Result<&mut VideoItem, String> {
        self.videos
            .get_mut(index)
            .ok_or_else(|| format!("No video at position {}", index))
    }

    /// Add one video; `Ok(false)` if it is already in the list
    pub fn add_video(&mut self, path: &Path) -> Result<bool, String> {
        Validation::validate_video_file(path)?;
        if self.position(path).is_some() {
            debug!("{} is already listed", path.display());
            return Ok(false);
        }

        let mut video = VideoItem::new(path);
        self.resolve(&mut video);
        info!(
            "Added {} (metadata: {}, subtitle: {})",
            path.display(),
            video.has_metadata(),
            video.has_subtitle()
        );
        self.videos.push(video);
        self.request_enrichment(self.videos.len() - 1);
        Ok(true)
    }

    /// Add the most recently modified video of a directory
    pub fn add_newest_from_directory(&mut self, dir: &Path) -> Result<PathBuf, String> {
        if !Validation::is_valid_folder(dir) {
            return Err(format!("Not a directory: {}", dir.display()));
        }
        let newest = newest_video_in(dir).ok_or_else(|| format!("No video files in {}", dir.display()))?;
        self.add_video(&newest)?;
        Ok(newest)
    }

    /// Scan a folder tree on a worker thread; results arrive as an event
    pub fn scan_folder(&mut self, root: &Path) -> Result<(), String> {
        if self.scanning {
            return Err("A scan is already running".to_string());
        }
        if !Validation::is_valid_folder(root) {
            return Err(format!("Not a directory: {}", root.display()));
        }

        info!("Starting folder scan: {}", root.display());
        self.scanning = true;
        self.status = "Scanning...".to_string();
        let tx = self.tx.clone();
        let root = root.to_path_buf();
        thread::spawn(move || {
            let videos = collect_videos(&root);
            let _ = tx.send(WorkerEvent::ScanFinished { root, videos });
        });
        Ok(())
    }

    /// Match companions, load metadata and compute the selection
    fn resolve(&self, video: &mut VideoItem) {
        video.apply_companions(self.matcher.resolve_companions(&video.video_path));
        video.metadata = None;
        video.metadata_error = None;

        if let Some(json) = video.json_path.clone() {
            match MetadataValidator::load_and_validate(&json) {
                Ok(document) => video.metadata = Some(document),
                Err(e) => {
                    warn!("Metadata {} rejected: {}", json.display(), e);
                    video.add_note(format!("metadata incomplete: {}", e));
                    video.metadata_error = Some(e.to_string());
                }
            }
        }
        self.refresh_selection(video);
    }

    /// Stored preference masked by eligibility, else the catalog defaults
    fn refresh_selection(&self, video: &mut VideoItem) {
        video.selected_profiles = match self.preferences.get(&video.video_path) {
            Some(stored) => self.catalog.mask_selection(video, stored),
            None => self.catalog.eligible_profiles(video),
        };
    }

    /// Run the matcher again and restart enrichment
    pub fn reresolve(&mut self, index: usize) -> Result<(), String> {
        let mut video = self.video_mut(index)?.clone();
        if let Some(supervisor) = self.supervisor.as_mut() {
            supervisor.forget(&video.video_path);
        }
        self.resolve(&mut video);
        self.videos[index] = video;
        self.request_enrichment(index);
        Ok(())
    }

    /// Use an operator-picked metadata document
    pub fn set_metadata_file(&mut self, index: usize, path: &Path) -> Result<(), String> {
        let document = MetadataValidator::load_and_validate(path).map_err(|e| e.to_string())?;
        let mut video = self.video_mut(index)?.clone();
        video.json_path = Some(path.to_path_buf());
        video.metadata = Some(document);
        video.metadata_error = None;
        video.companion_flags.json = true;
        self.refresh_selection(&mut video);
        self.videos[index] = video;
        Ok(())
    }

    /// Use an operator-picked subtitle file
    pub fn set_subtitle_file(&mut self, index: usize, path: &Path) -> Result<(), String> {
        if !path.is_file() || !Utils::has_extension(path, SUBTITLE_EXTENSIONS) {
            return Err(format!("Not a subtitle file: {}", path.display()));
        }
        let mut video = self.video_mut(index)?.clone();
        video.srt_path = Some(path.to_path_buf());
        video.companion_flags.srt_external = true;
        video.companion_flags.srt_container = false;
        self.refresh_selection(&mut video);
        self.videos[index] = video;
        Ok(())
    }

    /// Select or deselect a profile and remember the choice
    pub fn toggle_profile(&mut self, index: usize, profile: &str, selected: bool) -> Result<(), String> {
        let profile = self.catalog.require(profile).map_err(|e| e.to_string())?.clone();
        let video = self.videos.get_mut(index).ok_or_else(|| format!("No video at position {}", index))?;

        if selected {
            match profile.unmet_requirement(video) {
                Some(Requirement::Metadata) => return Err(format!("{}: JSON missing", profile.name)),
                Some(Requirement::Subtitle) => return Err(format!("{}: SRT missing", profile.name)),
                None => {}
            }
        }
        video.selected_profiles.insert(profile.name.clone(), selected);

        let (path, selection) = (video.video_path.clone(), video.selected_profiles.clone());
        if let Err(e) = self.preferences.remember(&path, &selection) {
            warn!("Failed to save profile preferences: {}", e);
        }
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<VideoItem> {
        if index >= self.videos.len() {
            return None;
        }
        let video = self.videos.remove(index);
        if let Some(supervisor) = self.supervisor.as_mut() {
            supervisor.forget(&video.video_path);
        }
        Some(video)
    }

    /// Start enrichment for whatever the video is missing
    pub fn request_enrichment(&mut self, index: usize) -> bool {
        let (Some(supervisor), Some(video)) = (self.supervisor.as_mut(), self.videos.get(index)) else {
            return false;
        };
        let Some(request) = EnrichmentRequest::for_video(video, DEFAULT_THUMBNAIL_OFFSET_SECS) else {
            return false;
        };
        let tx = self.tx.clone();
        supervisor.spawn(request, move |outcome| {
            let _ = tx.send(WorkerEvent::Enriched(outcome));
        });
        true
    }

    /// Run every selected pair on a worker thread; returns the number of pairs
    pub fn start_batch(&mut self, replace_if_exists: bool) -> Result<usize, String> {
        if self.batch_running {
            return Err("A batch is already running".to_string());
        }
        let scheduler = self
            .scheduler
            .clone()
            .ok_or_else(|| "Uploading is not configured".to_string())?;

        let plan = BatchPlan::from_videos(&self.videos, &self.catalog);
        if plan.is_empty() && plan.skipped.is_empty() {
            return Err("No profiles selected".to_string());
        }
        let total = plan.pairs.len();

        self.batch_running = true;
        self.progress = Some(BatchProgress::new(total));
        self.status = format!("Uploading 0/{}", total);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let summary = scheduler.run(plan, replace_if_exists, &mut |event| {
                let _ = tx.send(WorkerEvent::Batch(event));
            });
            let _ = tx.send(WorkerEvent::BatchFinished(summary));
        });
        Ok(total)
    }

    /// Apply every event that has arrived; returns how many were applied
    pub fn process_pending_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Block until idle or until `timeout` passes; `true` if idle
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.process_pending_events();
            if self.is_idle() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            // The workspace keeps its own sender, so the only error is a timeout
            match self.rx.recv_timeout(remaining) {
                Ok(event) => self.apply(event),
                Err(_) => return self.is_idle(),
            }
        }
    }

    pub fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::ScanFinished { root, videos } => {
                self.scanning = false;
                let mut added = 0;
                for path in &videos {
                    match self.add_video(path) {
                        Ok(true) => added += 1,
                        Ok(false) => {}
                        Err(e) => warn!("Skipping {}: {}", path.display(), e),
                    }
                }
                info!("Scan of {} found {} videos, {} added", root.display(), videos.len(), added);
                self.status = format!("Found {} videos, {} added", videos.len(), added);
            }
            WorkerEvent::Enriched(outcome) => self.apply_enrichment(outcome),
            WorkerEvent::Batch(event) => self.apply_batch_event(event),
            WorkerEvent::BatchFinished(summary) => {
                self.batch_running = false;
                self.progress = Some(summary.progress);
                self.status = format!(
                    "Done: {} succeeded, {} failed",
                    summary.successes.len(),
                    summary.failure_count
                );
                self.last_summary = Some(summary);
            }
        }
    }

    fn apply_enrichment(&mut self, outcome: EnrichmentOutcome) {
        let Some(index) = self.position(&outcome.video_path) else {
            debug!("Enrichment for removed video {}", outcome.video_path.display());
            return;
        };
        let Some(enrichment) = self.supervisor.as_mut().and_then(|s| s.accept(outcome)) else {
            return;
        };

        let mut video = self.videos[index].clone();
        let changes_eligibility = enrichment.changes_eligibility();
        enrichment.apply_to(&mut video);
        if changes_eligibility {
            self.refresh_selection(&mut video);
        }
        self.videos[index] = video;
    }

    fn apply_batch_event(&mut self, event: BatchEvent) {
        if let Some(status) = event.status_line() {
            if let Some(index) = self.position(&status.video_path) {
                self.videos[index].push_status(status.line, status.replaces.as_deref());
            }
        }
        match event {
            BatchEvent::PairStarted { index, total, .. } => {
                self.status = format!("Uploading {}/{}", index, total);
            }
            BatchEvent::Upload { event, .. } if event.is_warning() => {
                warn!("{}", event.name());
            }
            BatchEvent::Progress(progress) => {
                self.status = format!(
                    "Uploaded {}/{} ({})",
                    progress.completed,
                    progress.total,
                    Utils::format_progress(progress.completed, progress.total)
                );
                self.progress = Some(progress);
            }
            _ => {}
        }
    }
}

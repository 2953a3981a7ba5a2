//! Data structures for videos in the active list
//!
//! This module contains the per-video state (resolved companions, validated
//! metadata, profile selection, audit notes) and the batch counters shown
//! while a batch runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::file_matcher::CompanionSet;
use crate::metadata::MetadataDocument;

/// How each companion was obtained; display and audit only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompanionFlags {
    /// Metadata document found next to the video or picked manually
    pub json: bool,
    /// Subtitle exists as an external file
    pub srt_external: bool,
    /// Subtitle was extracted from the container
    pub srt_container: bool,
    /// Thumbnail found by the `sample_*` fallback or a naming convention
    pub thumbnail_sample: bool,
    /// Thumbnail was captured from the video
    pub thumbnail_generated: bool,
}

/// One physical video plus everything resolved around it
#[derive(Debug, Clone, PartialEq)]
pub struct VideoItem {
    pub video_path: PathBuf,
    pub srt_path: Option<PathBuf>,
    pub softsubs_path: Option<PathBuf>,
    pub hardsubs_path: Option<PathBuf>,
    pub thumbnail_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
    pub metadata: Option<MetadataDocument>,
    /// Why the metadata document was rejected, if it was
    pub metadata_error: Option<String>,
    pub selected_profiles: BTreeMap<String, bool>,
    pub companion_flags: CompanionFlags,
    pub notes: Vec<String>,
    /// Status lines fed by batch events
    pub status_trail: Vec<String>,
}

impl VideoItem {
    pub fn new(video_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            srt_path: None,
            softsubs_path: None,
            hardsubs_path: None,
            thumbnail_path: None,
            json_path: None,
            metadata: None,
            metadata_error: None,
            selected_profiles: BTreeMap::new(),
            companion_flags: CompanionFlags::default(),
            notes: Vec::new(),
            status_trail: Vec::new(),
        }
    }

    /// Replace every resolved companion with the matcher's result
    pub fn apply_companions(&mut self, set: CompanionSet) {
        self.companion_flags = CompanionFlags {
            json: set.json_path.is_some(),
            srt_external: set.srt_path.is_some(),
            srt_container: false,
            thumbnail_sample: set.thumbnail_path.is_some(),
            thumbnail_generated: false,
        };
        self.json_path = set.json_path;
        self.srt_path = set.srt_path;
        self.softsubs_path = set.softsubs_path;
        self.hardsubs_path = set.hardsubs_path;
        self.thumbnail_path = set.thumbnail_path;
    }

    /// Validated metadata is present
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// A subtitle path is resolved
    pub fn has_subtitle(&self) -> bool {
        self.srt_path.is_some()
    }

    /// The subtitle is resolved and still present on disk
    pub fn subtitle_on_disk(&self) -> bool {
        self.srt_path.as_deref().map(Path::is_file).unwrap_or(false)
    }

    /// Rendition used for extraction and frame capture: softsubs first, else the primary
    pub fn source_for_processing(&self) -> &Path {
        self.softsubs_path
            .as_deref()
            .filter(|p| p.is_file())
            .unwrap_or(&self.video_path)
    }

    /// Directory containing the video
    pub fn directory(&self) -> PathBuf {
        self.video_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Names of the profiles currently selected, in name order
    pub fn active_profiles(&self) -> Vec<String> {
        self.selected_profiles
            .iter()
            .filter(|(_, &on)| on)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }

    /// Append a status line, replacing the pending line that starts with `pending_marker`
    pub fn push_status(&mut self, line: impl Into<String>, pending_marker: Option<&str>) {
        let line = line.into();
        if let Some(marker) = pending_marker {
            if let Some(slot) = self
                .status_trail
                .iter_mut()
                .rev()
                .find(|existing| existing.starts_with(marker))
            {
                *slot = line;
                return;
            }
        }
        self.status_trail.push(line);
    }
}

/// Counters of the running batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
    pub success: usize,
    pub failure: usize,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, succeeded: bool) {
        self.completed += 1;
        if succeeded {
            self.success += 1;
        } else {
            self.failure += 1;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_status_is_replaced_in_place() {
        let mut item = VideoItem::new("/v/talk.mp4");
        item.push_status("[public] uploading...", None);
        item.push_status("[unlisted] uploading...", None);
        item.push_status("[public] done", Some("[public] uploading"));
        assert_eq!(item.status_trail, vec!["[public] done", "[unlisted] uploading..."]);
    }

    #[test]
    fn notes_are_not_duplicated() {
        let mut item = VideoItem::new("/v/talk.mp4");
        item.add_note("subtitle extracted from container");
        item.add_note("subtitle extracted from container");
        assert_eq!(item.notes.len(), 1);
    }

    #[test]
    fn progress_counts_outcomes() {
        let mut progress = BatchProgress::new(3);
        progress.record(true);
        progress.record(false);
        assert!(!progress.is_finished());
        progress.record(true);
        assert_eq!((progress.success, progress.failure), (2, 1));
        assert!(progress.is_finished());
    }

    #[test]
    fn processing_source_falls_back_to_primary() {
        let mut item = VideoItem::new("/v/talk.mp4");
        item.softsubs_path = Some(PathBuf::from("/v/missing_softsubs.mp4"));
        assert_eq!(item.source_for_processing(), Path::new("/v/talk.mp4"));
    }
}

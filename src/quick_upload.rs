//! Upload of arbitrary videos without a metadata document
//!
//! A minimal document is synthesized per video from the file name and the
//! operator's choices, then uploaded through the regular orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::companion::{CompanionProcessor, EnrichmentRequest};
use crate::config::{DEFAULT_QUICK_CATEGORY, DEFAULT_QUICK_LANGUAGE, MAX_TITLE_CHARS, QUICK_THUMBNAIL_OFFSET_SECS};
use crate::file_matcher::FileMatcher;
use crate::helper_functions::{Utils, Validation};
use crate::metadata::{MetadataDocument, PrivacyStatus, Status};
use crate::profiles::Profile;
use crate::uploader::{UploadEvent, UploadOrchestrator, UploadRequest, UploadResult};

/// Operator choices for a quick upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickOptions {
    pub privacy: PrivacyStatus,
    pub category_id: String,
    pub language: String,
    /// Only honoured when exactly one video is uploaded
    pub custom_title: Option<String>,
    /// Look for subtitle and thumbnail next to each video
    pub find_companions: bool,
    /// Capture the first frame when no thumbnail was found
    pub generate_thumbnail: bool,
}

impl Default for QuickOptions {
    fn default() -> Self {
        Self {
            privacy: PrivacyStatus::Unlisted,
            category_id: DEFAULT_QUICK_CATEGORY.to_string(),
            language: DEFAULT_QUICK_LANGUAGE.to_string(),
            custom_title: None,
            find_companions: true,
            generate_thumbnail: true,
        }
    }
}

/// One video queued for quick upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickItem {
    pub video_path: PathBuf,
    pub srt_path: Option<PathBuf>,
    pub thumbnail_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuickEvent {
    Started { index: usize, total: usize, video_path: PathBuf },
    Upload { index: usize, event: UploadEvent },
    Finished { video_path: PathBuf, outcome: Result<UploadResult, String> },
}

#[derive(Debug, Clone, Default)]
pub struct QuickSummary {
    pub successes: Vec<UploadResult>,
    pub failures: Vec<(PathBuf, String)>,
    /// Files refused before upload
    pub rejected: Vec<(PathBuf, String)>,
}

/// Build the document uploaded for a quick item
pub fn quick_metadata(item: &QuickItem, options: &QuickOptions, single: bool) -> MetadataDocument {
    let custom = options
        .custom_title
        .as_deref()
        .map(str::trim)
        .filter(|t| single && !t.is_empty());
    let title = match custom {
        Some(title) => Utils::char_prefix(title, MAX_TITLE_CHARS),
        None => Utils::title_from_file_name(&item.video_path),
    };

    let mut document = MetadataDocument::with_title(title.clone());
    document.snippet.description = Some(title);
    document.snippet.category_id = Some(options.category_id.clone());
    document.snippet.default_language = Some(options.language.clone());
    document.status = Status {
        privacy_status: Some(options.privacy),
        embeddable: Some(true),
        publish_at: None,
        self_declared_made_for_kids: Some(false),
    };
    document
}

pub struct QuickUploader {
    orchestrator: Arc<UploadOrchestrator>,
    matcher: FileMatcher,
    processor: Option<Arc<CompanionProcessor>>,
}

impl QuickUploader {
    pub fn new(orchestrator: Arc<UploadOrchestrator>, processor: Option<Arc<CompanionProcessor>>) -> Self {
        Self {
            orchestrator,
            matcher: FileMatcher::default(),
            processor,
        }
    }

    /// Validate and resolve the given files; duplicates are dropped silently
    pub fn prepare(&self, paths: &[PathBuf], options: &QuickOptions) -> (Vec<QuickItem>, Vec<(PathBuf, String)>) {
        let mut items: Vec<QuickItem> = Vec::new();
        let mut rejected = Vec::new();
        let custom_title = paths.len() == 1
            && options
                .custom_title
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty());

        for path in paths {
            if items.iter().any(|item| &item.video_path == path) {
                continue;
            }
            if let Err(message) = Validation::validate_video_file(path) {
                log::warn!("Skipping {}: {}", path.display(), message);
                rejected.push((path.clone(), message));
                continue;
            }
            if !custom_title && Utils::title_from_file_name(path).is_empty() {
                let message = "No title can be derived from the file name".to_string();
                log::warn!("Skipping {}: {}", path.display(), message);
                rejected.push((path.clone(), message));
                continue;
            }

            let mut item = QuickItem {
                video_path: path.clone(),
                srt_path: None,
                thumbnail_path: None,
            };
            if options.find_companions {
                let companions = self.matcher.resolve_companions(path);
                item.srt_path = companions.srt_path;
                item.thumbnail_path = companions.thumbnail_path;
            }
            if options.generate_thumbnail && item.thumbnail_path.is_none() {
                item.thumbnail_path = self.capture_first_frame(path);
            }
            items.push(item);
        }

        (items, rejected)
    }

    fn capture_first_frame(&self, video: &Path) -> Option<PathBuf> {
        let processor = self.processor.as_ref()?;
        let request = EnrichmentRequest {
            video_path: video.to_path_buf(),
            source_path: video.to_path_buf(),
            extract_subtitle: false,
            generate_thumbnail: true,
            thumbnail_offset_secs: QUICK_THUMBNAIL_OFFSET_SECS,
        };
        processor.enrich(&request).thumbnail_path
    }

    /// Upload each item in turn
    pub fn run(&self, items: &[QuickItem], options: &QuickOptions, on_event: &mut dyn FnMut(QuickEvent)) -> QuickSummary {
        let mut summary = QuickSummary::default();
        let single = items.len() == 1;

        for (index, item) in items.iter().enumerate() {
            on_event(QuickEvent::Started {
                index: index + 1,
                total: items.len(),
                video_path: item.video_path.clone(),
            });

            let metadata = quick_metadata(item, options, single);
            let mut profile = Profile::new("quick", "Quick upload");
            profile.requires_json = false;
            profile.requires_srt = item.srt_path.is_some();

            let request = UploadRequest {
                video_path: &item.video_path,
                subtitle_path: item.srt_path.as_deref(),
                metadata: &metadata,
                profile: &profile,
                thumbnail_path: item.thumbnail_path.as_deref(),
            };
            let outcome = self.orchestrator.upload(request, &mut |event: UploadEvent| {
                on_event(QuickEvent::Upload {
                    index: index + 1,
                    event,
                })
            });

            match &outcome {
                Ok(result) => summary.successes.push(result.clone()),
                Err(e) => {
                    log::error!("Quick upload of {} failed: {}", item.video_path.display(), e);
                    summary.failures.push((item.video_path.clone(), e.to_string()));
                }
            }
            on_event(QuickEvent::Finished {
                video_path: item.video_path.clone(),
                outcome: outcome.map_err(|e| e.to_string()),
            });
        }

        summary
    }

    /// Prepare and upload in one step
    pub fn upload_paths(
        &self,
        paths: &[PathBuf],
        options: &QuickOptions,
        on_event: &mut dyn FnMut(QuickEvent),
    ) -> QuickSummary {
        let (items, rejected) = self.prepare(paths, options);
        let mut summary = self.run(&items, options, on_event);
        summary.rejected = rejected;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeAuth, FakeService};

    fn uploader(service: Arc<FakeService>) -> QuickUploader {
        let orchestrator = UploadOrchestrator::new(Arc::new(FakeAuth { fail: false }), service);
        QuickUploader::new(Arc::new(orchestrator), None)
    }

    #[test]
    fn title_comes_from_file_name() {
        let item = QuickItem {
            video_path: PathBuf::from("/v/my-holiday__clip.mp4"),
            srt_path: None,
            thumbnail_path: None,
        };
        let doc = quick_metadata(&item, &QuickOptions::default(), true);
        assert_eq!(doc.snippet.title, "my holiday clip");
        assert_eq!(doc.snippet.description.as_deref(), Some("my holiday clip"));
        assert_eq!(doc.snippet.category_id.as_deref(), Some("27"));
        assert_eq!(doc.status.privacy_status, Some(PrivacyStatus::Unlisted));
        assert_eq!(doc.status.embeddable, Some(true));
        assert_eq!(doc.status.self_declared_made_for_kids, Some(false));
    }

    #[test]
    fn separator_only_names_are_rejected_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let blank = dir.path().join("___.mp4");
        let named = dir.path().join("clip_01.mp4");
        std::fs::write(&blank, b"video").unwrap();
        std::fs::write(&named, b"video").unwrap();
        let options = QuickOptions {
            find_companions: false,
            generate_thumbnail: false,
            ..Default::default()
        };

        let service = Arc::new(FakeService::default());
        let (items, rejected) = uploader(service.clone()).prepare(&[blank.clone(), named.clone()], &options);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].video_path, named);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, blank);
        assert!(service.calls().is_empty());

        let titled = QuickOptions {
            custom_title: Some("Launch recap".into()),
            ..options
        };
        let (items, rejected) = uploader(service).prepare(&[blank], &titled);
        assert_eq!(items.len(), 1);
        assert!(rejected.is_empty());
    }

    #[test]
    fn custom_title_only_for_single_file() {
        let item = QuickItem {
            video_path: PathBuf::from("/v/clip_01.mp4"),
            srt_path: None,
            thumbnail_path: None,
        };
        let options = QuickOptions {
            custom_title: Some("Launch recap".into()),
            ..Default::default()
        };
        assert_eq!(quick_metadata(&item, &options, true).snippet.title, "Launch recap");
        assert_eq!(quick_metadata(&item, &options, false).snippet.title, "clip 01");
    }

    #[test]
    fn uploads_valid_files_and_rejects_others() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("demo_reel.mp4");
        std::fs::write(&video, b"video").unwrap();
        std::fs::write(dir.path().join("demo_reel.srt"), "1\n00:00:00,000 --> 00:00:01,000\nHi\n").unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "x").unwrap();

        let service = Arc::new(FakeService::default());
        let options = QuickOptions {
            generate_thumbnail: false,
            ..Default::default()
        };
        let summary = uploader(service.clone()).upload_paths(
            &[video.clone(), video.clone(), text.clone()],
            &options,
            &mut |_| {},
        );

        assert_eq!(summary.successes.len(), 1);
        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(summary.rejected[0].0, text);
        assert_eq!(service.calls(), vec!["insert:demo reel", "caption:vid1:de"]);
    }
}

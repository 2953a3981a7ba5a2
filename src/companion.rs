//! Background enrichment of videos through the external media tool
//!
//! Extracts an embedded subtitle when no subtitle file exists and captures a
//! thumbnail frame when no thumbnail was found. Failures become notes. Work
//! runs on worker threads and results travel back to the single consumer,
//! where a newer request for the same video supersedes an older one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crate::helper_functions::Utils;
use crate::media_tool::MediaToolkit;
use crate::video_item::VideoItem;

/// What to do for one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRequest {
    pub video_path: PathBuf,
    /// Rendition read by the tool: the softsubs variant when present, else the video
    pub source_path: PathBuf,
    pub extract_subtitle: bool,
    pub generate_thumbnail: bool,
    pub thumbnail_offset_secs: u32,
}

impl EnrichmentRequest {
    /// Request for whatever the video is missing, or `None` if it lacks nothing
    pub fn for_video(video: &VideoItem, thumbnail_offset_secs: u32) -> Option<Self> {
        let request = Self {
            video_path: video.video_path.clone(),
            source_path: video.source_for_processing().to_path_buf(),
            extract_subtitle: !video.has_subtitle(),
            generate_thumbnail: video.thumbnail_path.is_none(),
            thumbnail_offset_secs,
        };
        (request.extract_subtitle || request.generate_thumbnail).then_some(request)
    }

    fn from_softsubs(&self) -> bool {
        self.source_path != self.video_path
    }
}

/// Files produced for one video plus audit notes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub srt_path: Option<PathBuf>,
    pub thumbnail_path: Option<PathBuf>,
    pub notes: Vec<String>,
}

impl Enrichment {
    /// Whether a new subtitle was produced, which can unlock profiles
    pub fn changes_eligibility(&self) -> bool {
        self.srt_path.is_some()
    }

    /// Merge the produced files into the video without overwriting resolved companions
    pub fn apply_to(self, video: &mut VideoItem) {
        if let Some(srt) = self.srt_path {
            if video.srt_path.is_none() {
                video.srt_path = Some(srt);
                video.companion_flags.srt_container = true;
            }
        }
        if let Some(thumb) = self.thumbnail_path {
            if video.thumbnail_path.is_none() {
                video.thumbnail_path = Some(thumb);
                video.companion_flags.thumbnail_generated = true;
            }
        }
        for note in self.notes {
            video.add_note(note);
        }
    }
}

/// Runs the media tool for enrichment requests
pub struct CompanionProcessor {
    tool: Arc<dyn MediaToolkit>,
}

impl CompanionProcessor {
    pub fn new(tool: Arc<dyn MediaToolkit>) -> Self {
        Self { tool }
    }

    /// Blocking enrichment; call from a worker thread
    pub fn enrich(&self, request: &EnrichmentRequest) -> Enrichment {
        let mut result = Enrichment::default();

        if request.extract_subtitle {
            match self.extract_subtitle(&request.source_path) {
                Ok(Some(srt)) => {
                    let origin = if request.from_softsubs() { "softsubs video" } else { "container" };
                    log::info!("Extracted subtitle {} from {}", srt.display(), origin);
                    result.notes.push(format!("subtitle extracted from {}", origin));
                    result.srt_path = Some(srt);
                }
                Ok(None) => log::debug!("No subtitle streams in {}", request.source_path.display()),
                Err(e) => {
                    log::warn!("Subtitle extraction failed for {}: {}", request.source_path.display(), e);
                    result.notes.push(format!("subtitle extraction failed: {}", e));
                }
            }
        }

        if request.generate_thumbnail {
            let output = sibling(&request.source_path, "_thumb.jpg");
            match self
                .tool
                .capture_frame(&request.source_path, request.thumbnail_offset_secs, &output)
            {
                Ok(()) => {
                    log::info!("Generated thumbnail {}", output.display());
                    result
                        .notes
                        .push(format!("thumbnail generated (t={}s)", request.thumbnail_offset_secs));
                    result.thumbnail_path = Some(output);
                }
                Err(e) => {
                    log::warn!("Thumbnail generation failed for {}: {}", request.source_path.display(), e);
                    result.notes.push(format!("thumbnail generation failed: {}", e));
                }
            }
        }

        result
    }

    fn extract_subtitle(&self, source: &Path) -> Result<Option<PathBuf>, crate::error::ToolError> {
        let indices = self.tool.subtitle_stream_indices(source)?;
        let Some(&first) = indices.first() else {
            return Ok(None);
        };
        let output = sibling(source, ".srt");
        self.tool.extract_stream(source, first, &output)?;
        Ok(Some(output))
    }
}

fn sibling(source: &Path, suffix: &str) -> PathBuf {
    let name = format!("{}{}", Utils::get_file_stem(source), suffix);
    match source.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Result of one supervised run, tagged with its generation
#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub video_path: PathBuf,
    pub generation: u64,
    pub enrichment: Enrichment,
}

/// Tracks enrichment runs per video so only the newest result is applied
pub struct EnrichmentSupervisor {
    processor: Arc<CompanionProcessor>,
    current: HashMap<PathBuf, u64>,
    next_generation: u64,
}

impl EnrichmentSupervisor {
    pub fn new(processor: Arc<CompanionProcessor>) -> Self {
        Self {
            processor,
            current: HashMap::new(),
            next_generation: 1,
        }
    }

    /// Start a run on a worker thread; any earlier run for the same video becomes stale
    pub fn spawn<F>(&mut self, request: EnrichmentRequest, deliver: F) -> u64
    where
        F: FnOnce(EnrichmentOutcome) + Send + 'static,
    {
        let generation = self.next_generation;
        self.next_generation += 1;
        if self.current.insert(request.video_path.clone(), generation).is_some() {
            log::debug!("Superseding enrichment for {}", request.video_path.display());
        }

        let processor = Arc::clone(&self.processor);
        thread::spawn(move || {
            let enrichment = processor.enrich(&request);
            deliver(EnrichmentOutcome {
                video_path: request.video_path,
                generation,
                enrichment,
            });
        });
        generation
    }

    /// Accept a finished run if it is still the newest for its video
    pub fn accept(&mut self, outcome: EnrichmentOutcome) -> Option<Enrichment> {
        match self.current.get(&outcome.video_path) {
            Some(&generation) if generation == outcome.generation => {
                self.current.remove(&outcome.video_path);
                Some(outcome.enrichment)
            }
            _ => {
                log::debug!(
                    "Discarding stale enrichment #{} for {}",
                    outcome.generation,
                    outcome.video_path.display()
                );
                None
            }
        }
    }

    /// Forget a video; results still in flight for it will be discarded
    pub fn forget(&mut self, video_path: &Path) {
        self.current.remove(video_path);
    }

    pub fn is_running(&self, video_path: &Path) -> bool {
        self.current.contains_key(video_path)
    }

    /// Runs whose results have not been accepted yet
    pub fn running_count(&self) -> usize {
        self.current.len()
    }
}

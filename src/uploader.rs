//! Upload of one (video, profile) pair
//!
//! Stages run strictly in order: authenticate, build payload, upload the
//! video, upload captions, upload the thumbnail. Only the first three can
//! fail the call; caption and thumbnail problems are reported as events.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::DEFAULT_ASSET_PAGE_SIZE;
use crate::error::UploadError;
use crate::metadata::MetadataDocument;
use crate::payload::build_payload;
use crate::preferences::SourceMap;
use crate::profiles::Profile;
use crate::remote::{self, AuthProvider, Credential, RemoteItem, RemoteMediaService};

/// Status events emitted while a pair is uploaded
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    AuthStart,
    AuthSuccess,
    MetadataReady { title: String, privacy: Option<String> },
    UploadStart,
    /// Fraction of the media transferred, `0.0..=1.0`
    UploadProgress(f64),
    UploadSuccess { remote_id: String },
    CaptionsStart,
    CaptionsSuccess { language: String },
    CaptionsError(String),
    ThumbnailStart,
    ThumbnailSuccess,
    ThumbnailError(String),
}

impl UploadEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthStart => "auth_start",
            Self::AuthSuccess => "auth_success",
            Self::MetadataReady { .. } => "metadata_ready",
            Self::UploadStart => "upload_start",
            Self::UploadProgress(_) => "upload_progress",
            Self::UploadSuccess { .. } => "upload_success",
            Self::CaptionsStart => "captions_start",
            Self::CaptionsSuccess { .. } => "captions_success",
            Self::CaptionsError(_) => "captions_error",
            Self::ThumbnailStart => "thumbnail_start",
            Self::ThumbnailSuccess => "thumbnail_success",
            Self::ThumbnailError(_) => "thumbnail_error",
        }
    }

    /// Non-fatal degradation of an otherwise successful upload
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::CaptionsError(_) | Self::ThumbnailError(_))
    }
}

/// Everything needed to upload one pair
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub video_path: &'a Path,
    pub subtitle_path: Option<&'a Path>,
    pub metadata: &'a MetadataDocument,
    pub profile: &'a Profile,
    /// Thumbnail to use when the metadata document names none
    pub thumbnail_path: Option<&'a Path>,
}

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub remote_id: String,
    pub title: String,
    pub profile: String,
    pub video_path: PathBuf,
    /// The media of an existing item was replaced instead of creating one
    pub replaced: bool,
}

impl UploadResult {
    pub fn watch_url(&self) -> String {
        remote::watch_url(&self.remote_id)
    }

    pub fn embed_url(&self) -> String {
        remote::embed_url(&self.remote_id)
    }
}

impl fmt::Display for UploadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]\n  ID: {}\n  Watch: {}\n  Embed: {}",
            self.title,
            self.profile,
            self.remote_id,
            self.watch_url(),
            self.embed_url()
        )
    }
}

/// Drives uploads through the auth and remote service capabilities
pub struct UploadOrchestrator {
    auth: Arc<dyn AuthProvider>,
    service: Arc<dyn RemoteMediaService>,
    source_map: Option<SourceMap>,
}

impl UploadOrchestrator {
    pub fn new(auth: Arc<dyn AuthProvider>, service: Arc<dyn RemoteMediaService>) -> Self {
        Self {
            auth,
            service,
            source_map: None,
        }
    }

    /// Record remote id to source directory after each upload
    pub fn with_source_map(mut self, source_map: SourceMap) -> Self {
        self.source_map = Some(source_map);
        self
    }

    pub fn authenticate(&self) -> Result<Credential, UploadError> {
        Ok(self.auth.authenticate()?)
    }

    /// Upload a new item for one (video, profile) pair
    pub fn upload(
        &self,
        request: UploadRequest<'_>,
        on_event: &mut dyn FnMut(UploadEvent),
    ) -> Result<UploadResult, UploadError> {
        if !request.video_path.is_file() {
            return Err(UploadError::VideoNotFound(request.video_path.to_path_buf()));
        }
        let video_dir = parent_dir(request.video_path);

        on_event(UploadEvent::AuthStart);
        let credential = self.authenticate()?;
        on_event(UploadEvent::AuthSuccess);

        let payload = build_payload(request.metadata, request.profile)?;
        let title = payload.snippet.title.clone();
        on_event(UploadEvent::MetadataReady {
            title: title.clone(),
            privacy: payload.privacy_status().map(str::to_string),
        });

        log::info!(
            "Uploading {} as '{}' with profile {}",
            request.video_path.display(),
            title,
            request.profile.name
        );
        on_event(UploadEvent::UploadStart);
        let remote_id = self.service.insert_item(&credential, &payload, request.video_path, &mut |fraction: f64| {
            on_event(UploadEvent::UploadProgress(fraction.clamp(0.0, 1.0)))
        })?;
        log::info!("Uploaded {} as {}", request.video_path.display(), remote_id);
        on_event(UploadEvent::UploadSuccess {
            remote_id: remote_id.clone(),
        });

        if request.profile.requires_srt {
            let subtitle = request
                .subtitle_path
                .map(Path::to_path_buf)
                .filter(|p| p.is_file())
                .or_else(|| request.metadata.captions_file(&video_dir).filter(|p| p.is_file()));
            match subtitle {
                Some(subtitle) => self.upload_captions(&credential, &remote_id, request.metadata, &subtitle, on_event),
                None => log::warn!("Subtitle for {} vanished before caption upload", request.video_path.display()),
            }
        }

        let thumbnail = request
            .metadata
            .thumbnail_file(&video_dir)
            .filter(|p| p.is_file())
            .or_else(|| request.thumbnail_path.map(Path::to_path_buf).filter(|p| p.is_file()));
        if let Some(thumbnail) = thumbnail {
            on_event(UploadEvent::ThumbnailStart);
            match self.service.set_thumbnail(&credential, &remote_id, &thumbnail) {
                Ok(()) => on_event(UploadEvent::ThumbnailSuccess),
                Err(e) => {
                    log::warn!("Thumbnail upload failed for {}: {}", remote_id, e);
                    on_event(UploadEvent::ThumbnailError(e.to_string()));
                }
            }
        }

        self.record_source(&remote_id, &video_dir);

        Ok(UploadResult {
            remote_id,
            title,
            profile: request.profile.name.clone(),
            video_path: request.video_path.to_path_buf(),
            replaced: false,
        })
    }

    fn upload_captions(
        &self,
        credential: &Credential,
        remote_id: &str,
        metadata: &MetadataDocument,
        subtitle: &Path,
        on_event: &mut dyn FnMut(UploadEvent),
    ) {
        let language = metadata.caption_language();
        let name = metadata
            .captions
            .as_ref()
            .and_then(|c| c.name.clone())
            .unwrap_or_else(|| format!("Subtitles ({})", language));

        on_event(UploadEvent::CaptionsStart);
        match self
            .service
            .insert_caption(credential, remote_id, &language, &name, subtitle)
        {
            Ok(()) => on_event(UploadEvent::CaptionsSuccess { language }),
            Err(e) => {
                log::warn!("Caption upload failed for {}: {}", remote_id, e);
                on_event(UploadEvent::CaptionsError(e.to_string()));
            }
        }
    }

    /// Replace the media of an existing item; its id and metadata are kept
    pub fn replace_media(
        &self,
        remote_id: &str,
        title: &str,
        profile: &str,
        video_path: &Path,
        on_event: &mut dyn FnMut(UploadEvent),
    ) -> Result<UploadResult, UploadError> {
        if !video_path.is_file() {
            return Err(UploadError::VideoNotFound(video_path.to_path_buf()));
        }

        on_event(UploadEvent::AuthStart);
        let credential = self.authenticate()?;
        on_event(UploadEvent::AuthSuccess);

        on_event(UploadEvent::UploadStart);
        self.service.replace_media(&credential, remote_id, video_path, &mut |fraction: f64| {
            on_event(UploadEvent::UploadProgress(fraction.clamp(0.0, 1.0)))
        })?;
        on_event(UploadEvent::UploadSuccess {
            remote_id: remote_id.to_string(),
        });
        self.record_source(remote_id, &parent_dir(video_path));

        Ok(UploadResult {
            remote_id: remote_id.to_string(),
            title: title.to_string(),
            profile: profile.to_string(),
            video_path: video_path.to_path_buf(),
            replaced: true,
        })
    }

    /// Most recent item whose title equals `title` exactly
    pub fn find_by_title(&self, title: &str) -> Result<Option<RemoteItem>, UploadError> {
        let credential = self.authenticate()?;
        let items = self.service.list_my_items(&credential, DEFAULT_ASSET_PAGE_SIZE)?;
        Ok(items.into_iter().find(|item| item.title == title))
    }

    fn record_source(&self, remote_id: &str, directory: &Path) {
        if let Some(map) = &self.source_map {
            if let Err(e) = map.update(remote_id, directory) {
                log::warn!("Failed to record source folder for {}: {}", remote_id, e);
            }
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

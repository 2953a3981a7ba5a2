//! Configuration constants and path resolution for the ytuploader tool
//!
//! This module contains application-wide configuration values including
//! supported file formats, matching conventions, external tool timeouts,
//! and the locations of the per-user state files.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The current application version (keep in sync with Cargo.toml)
pub const APP_VERSION: &str = "0.3.0";

/// Supported video file extensions for uploads
pub static VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mkv"];

/// Extensions accepted for external subtitle files
pub static SUBTITLE_EXTENSIONS: &[&str] = &["srt"];

/// Extensions accepted for thumbnails
pub static THUMBNAIL_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Suffix that marks a metadata document belonging to a video
pub static METADATA_SUFFIX: &str = "_yt_profile.json";

/// Extensions considered during prefix-based metadata matching
pub static METADATA_EXTENSIONS: &[&str] = &["json"];

/// Rendition markers appended to alternate renditions of a video
pub static VARIANT_SUFFIXES: &[&str] = &["softsubs", "hardsubs"];

/// Prefix length used for companion matching
pub const DEFAULT_PREFIX_LEN: usize = 12;
pub const MIN_PREFIX_LEN: usize = 10;
pub const MAX_PREFIX_LEN: usize = 15;

/// Version probe for ffmpeg/ffprobe
pub const TOOL_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Listing subtitle streams of a container
pub const STREAM_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Extracting one subtitle stream
pub const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);
/// Capturing a single frame
pub const FRAME_CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);
/// No external invocation may run longer than this
pub const MAX_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Frame offset for generated thumbnails in the batch path
pub const DEFAULT_THUMBNAIL_OFFSET_SECS: u32 = 3;
/// Frame offset for generated thumbnails in the quick upload path
pub const QUICK_THUMBNAIL_OFFSET_SECS: u32 = 0;

/// Upload chunk size, must stay a multiple of 256 KiB for resumable sessions
pub const UPLOAD_CHUNK_SIZE: usize = 8 * 256 * 1024;

/// Maximum title length accepted by the platform
pub const MAX_TITLE_CHARS: usize = 100;
/// Maximum number of tags in a metadata document
pub const MAX_TAGS: usize = 500;

/// Number of title characters used to group variants in the asset browser
pub const TITLE_GROUP_PREFIX_LEN: usize = 50;

/// Number of recent uploads fetched by the asset browser and title lookups
pub const DEFAULT_ASSET_PAGE_SIZE: u32 = 25;

/// Caption language used when the metadata document does not name one
pub static DEFAULT_CAPTION_LANGUAGE: &str = "de";

/// Quick upload defaults
pub static DEFAULT_QUICK_CATEGORY: &str = "27";
pub static DEFAULT_QUICK_LANGUAGE: &str = "de";

/// Name of the append-only audit log written next to uploaded videos
pub static UPLOAD_LOG_FILE: &str = "yt_upload.log";

pub static WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";
pub static EMBED_URL_BASE: &str = "https://www.youtube.com/embed/";
pub static STUDIO_URL_BASE: &str = "https://studio.youtube.com/video/";

/// Clamp a requested prefix length into the supported range
pub fn clamp_prefix_len(len: usize) -> usize {
    len.clamp(MIN_PREFIX_LEN, MAX_PREFIX_LEN)
}

/// Locations of every per-user file the tool reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub client_secrets: PathBuf,
    pub token: PathBuf,
    pub profiles: PathBuf,
    pub favorites: PathBuf,
    pub profile_prefs: PathBuf,
    pub source_map: PathBuf,
}

impl AppPaths {
    /// Resolve paths from the environment, falling back to the platform config directory
    pub fn resolve() -> std::io::Result<Self> {
        Self::resolve_with(|key| env::var(key).ok())
    }

    /// Resolve paths with an injectable environment lookup
    pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> std::io::Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };

        let config_dir = match non_empty("YTUPLOADER_CONFIG_DIR") {
            Some(dir) => dir,
            None => default_config_dir()?,
        };

        let mut paths = Self::in_dir(&config_dir);
        if let Some(path) = non_empty("YOUTUBE_CLIENT_SECRETS_PATH") {
            paths.client_secrets = path;
        }
        if let Some(path) = non_empty("YOUTUBE_TOKEN_PATH") {
            paths.token = path;
        }
        if let Some(path) = non_empty("YTUPLOADER_PROFILES_PATH") {
            paths.profiles = path;
        }
        Ok(paths)
    }

    /// All files placed directly inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config_dir: dir.to_path_buf(),
            client_secrets: dir.join("client_secrets.json"),
            token: dir.join("token.json"),
            profiles: dir.join("profiles.yaml"),
            favorites: dir.join("favorite_dirs.json"),
            profile_prefs: dir.join("profile_prefs.json"),
            source_map: dir.join("source_map.json"),
        }
    }
}

fn default_config_dir() -> std::io::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg_dirs) = xdg::BaseDirectories::new() {
            return Ok(xdg_dirs.get_config_home().join("ytuploader"));
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        if let Some(config) = dirs::config_dir() {
            return Ok(config.join("ytuploader"));
        }
    }

    let home_dir = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "Failed to get home directory")
    })?;
    Ok(home_dir.join(".ytuploader"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn prefix_len_is_clamped() {
        assert_eq!(clamp_prefix_len(3), MIN_PREFIX_LEN);
        assert_eq!(clamp_prefix_len(12), 12);
        assert_eq!(clamp_prefix_len(40), MAX_PREFIX_LEN);
    }

    #[test]
    fn env_overrides_take_precedence() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("YTUPLOADER_CONFIG_DIR", "/cfg"),
            ("YOUTUBE_TOKEN_PATH", "/secret/token.json"),
            ("YOUTUBE_CLIENT_SECRETS_PATH", "   "),
        ]);
        let paths = AppPaths::resolve_with(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/cfg"));
        assert_eq!(paths.token, PathBuf::from("/secret/token.json"));
        assert_eq!(paths.client_secrets, PathBuf::from("/cfg/client_secrets.json"));
        assert_eq!(paths.profiles, PathBuf::from("/cfg/profiles.yaml"));
    }

    #[test]
    fn chunk_size_is_resumable_aligned() {
        assert_eq!(UPLOAD_CHUNK_SIZE % (256 * 1024), 0);
    }
}

//! Common utility functions and validation helpers
//!
//! This module provides utility functions for file names, string formatting,
//! progress display, and input validation used throughout the application.

use std::path::Path;
use std::time::SystemTime;

use crate::config::{MAX_TITLE_CHARS, VIDEO_EXTENSIONS};

/// Common utility functions used throughout the application
pub struct Utils;

impl Utils {
    /// Safely get the file name from a path, returning a default if not available
    pub fn get_file_name(path: &Path) -> String {
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("Unknown")
            .to_string()
    }

    /// File name without extension
    pub fn get_file_stem(path: &Path) -> String {
        path.file_stem()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Truncate a string to a maximum number of characters, adding ellipsis if needed
    pub fn truncate_string(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }

    /// First `len` characters of a string
    pub fn char_prefix(s: &str, len: usize) -> String {
        s.chars().take(len).collect()
    }

    /// Check if a path is a video file based on its extension
    pub fn is_video_file(path: &Path) -> bool {
        Self::has_extension(path, VIDEO_EXTENSIONS)
    }

    /// Case-insensitive extension check
    pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|&v| v.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// Modification time, or the epoch when it cannot be read
    pub fn modified_time(path: &Path) -> SystemTime {
        path.metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    /// Create a progress percentage string
    pub fn format_progress(current: usize, total: usize) -> String {
        if total == 0 {
            "0%".to_string()
        } else {
            let percentage = (current as f32 / total as f32 * 100.0) as usize;
            format!("{}%", percentage)
        }
    }

    /// Human readable title derived from a video file name
    pub fn title_from_file_name(path: &Path) -> String {
        let stem = Self::get_file_stem(path).replace(['-', '_'], " ");
        let collapsed = stem.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::char_prefix(&collapsed, MAX_TITLE_CHARS)
    }

    /// Open a URL with the system's default handler
    pub fn open_in_browser(url: &str) -> Result<(), String> {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            let mut cmd = std::process::Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
            cmd.spawn().map_err(|e| e.to_string())?;
        }
        #[cfg(target_os = "linux")]
        {
            std::process::Command::new("xdg-open")
                .arg(url)
                .spawn()
                .map_err(|e| e.to_string())?;
        }
        #[cfg(target_os = "macos")]
        {
            std::process::Command::new("open")
                .arg(url)
                .spawn()
                .map_err(|e| e.to_string())?;
        }
        #[cfg(not(any(windows, target_os = "linux", target_os = "macos")))]
        {
            return Err(format!("Opening URLs is not supported on this OS: {}", url));
        }
        Ok(())
    }
}

/// Input validation utilities
pub struct Validation;

impl Validation {
    /// Validate that a video path exists, is a readable file and has a supported extension
    pub fn validate_video_file(path: &Path) -> Result<(), String> {
        if path.as_os_str().is_empty() {
            return Err("No video selected.".to_string());
        }
        if !path.exists() {
            return Err(format!("File not found: {}", path.display()));
        }
        if !path.is_file() {
            return Err(format!("Path is not a file: {}", path.display()));
        }
        if std::fs::File::open(path).is_err() {
            return Err(format!("File not readable: {}", path.display()));
        }
        if !Utils::is_video_file(path) {
            return Err(format!("Unsupported video format: {}", path.display()));
        }
        Ok(())
    }

    /// Validate that a folder path exists and is a directory
    pub fn is_valid_folder(path: &Path) -> bool {
        !path.as_os_str().is_empty() && path.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn title_from_file_name_collapses_separators() {
        let path = PathBuf::from("/videos/my-great__talk_2024.mp4");
        assert_eq!(Utils::title_from_file_name(&path), "my great talk 2024");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(Utils::truncate_string("äöüäöüäöü", 6), "äöü...");
        assert_eq!(Utils::truncate_string("short", 10), "short");
    }

    #[test]
    fn video_extension_check_ignores_case() {
        assert!(Utils::is_video_file(Path::new("clip.MP4")));
        assert!(!Utils::is_video_file(Path::new("clip.srt")));
    }

    #[test]
    fn validate_rejects_missing_and_non_video_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.mp4");
        assert!(Validation::validate_video_file(&missing).is_err());

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "x").unwrap();
        assert!(Validation::validate_video_file(&text).is_err());

        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, "x").unwrap();
        assert!(Validation::validate_video_file(&video).is_ok());
    }
}

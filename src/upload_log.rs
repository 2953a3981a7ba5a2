//! Append-only audit log written next to uploaded videos
//!
//! One record per attempt, success or failure:
//!
//! ```text
//! [2024-01-01T12:00:00+01:00] talk.mp4 [public]
//! STATUS: SUCCESS
//! WATCH: https://www.youtube.com/watch?v=abc
//! EMBED: https://www.youtube.com/embed/abc
//! VIDEO_ID: abc
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::UPLOAD_LOG_FILE;
use crate::helper_functions::Utils;
use crate::uploader::UploadResult;

/// Outcome of one attempt as recorded in the log
#[derive(Debug, Clone, Copy)]
pub enum LogOutcome<'a> {
    Success(&'a UploadResult),
    Failure(&'a str),
}

/// Location of the log for a video
pub fn log_path_for(video_path: &Path) -> PathBuf {
    video_path
        .parent()
        .map(|dir| dir.join(UPLOAD_LOG_FILE))
        .unwrap_or_else(|| PathBuf::from(UPLOAD_LOG_FILE))
}

/// Render one record, including its trailing blank line
pub fn format_record(video_path: &Path, profile: &str, outcome: LogOutcome<'_>) -> String {
    let timestamp = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
    let mut record = format!("[{}] {} [{}]\n", timestamp, Utils::get_file_name(video_path), profile);
    match outcome {
        LogOutcome::Success(result) => {
            record.push_str("STATUS: SUCCESS\n");
            record.push_str(&format!("WATCH: {}\n", result.watch_url()));
            record.push_str(&format!("EMBED: {}\n", result.embed_url()));
            record.push_str(&format!("VIDEO_ID: {}\n", result.remote_id));
            if result.replaced {
                record.push_str("MODE: REPLACED\n");
            }
        }
        LogOutcome::Failure(message) => {
            record.push_str("STATUS: ERROR\n");
            // Keep one record per line block
            record.push_str(&format!("MESSAGE: {}\n", message.replace('\n', " ")));
        }
    }
    record.push('\n');
    record
}

/// Append a record next to the video; failures are logged, never raised
pub fn append(video_path: &Path, profile: &str, outcome: LogOutcome<'_>) -> Option<PathBuf> {
    let path = log_path_for(video_path);
    let record = format_record(video_path, profile, outcome);
    let written = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| file.write_all(record.as_bytes()));
    match written {
        Ok(()) => Some(path),
        Err(e) => {
            log::warn!("Failed to write upload log {}: {}", path.display(), e);
            None
        }
    }
}

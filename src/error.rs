//! Error taxonomy for the uploader
//!
//! Leaf components (matching, validation) report expected failures as values;
//! network-bound components raise the typed errors below, which are caught at
//! the orchestration boundary.

use std::path::PathBuf;

/// Missing or malformed configuration: profile catalog, client secrets
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}\n\n{hint}")]
    MissingFile { path: PathBuf, hint: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },

    #[error("No profiles defined in {0}")]
    Empty(PathBuf),

    #[error("Unknown profile '{name}'. Available profiles: {available}")]
    UnknownProfile { name: String, available: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A metadata document that failed schema validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// Dotted path of the failing member, e.g. `snippet.title` or `chapters[2].time`
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Companion matching failed because the caller has to pick a file
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Ambiguous match for '{pattern}': {}. Use unique file names or pick one manually.", candidates.join(", "))]
    Ambiguous {
        pattern: String,
        candidates: Vec<String>,
    },

    #[error("IO error while matching: {0}")]
    Io(#[from] std::io::Error),
}

/// Authentication against the platform failed
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("OAuth client secrets not found: {path}\n\n{hint}")]
    MissingClientSecrets { path: PathBuf, hint: String },

    #[error("Invalid client secrets in {path}: {message}")]
    InvalidClientSecrets { path: PathBuf, message: String },

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Authorization flow failed: {0}")]
    Flow(String),

    #[error("IO error during authentication: {0}")]
    Io(#[from] std::io::Error),
}

/// The remote media service rejected or failed a call
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Unexpected response from remote service: {0}")]
    Decode(String),

    #[error("Remote item not found: {0}")]
    NotFound(String),

    #[error("IO error while transferring: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// The external media tool (ffmpeg/ffprobe) failed
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Media tool not available: {0}")]
    Unavailable(String),

    #[error("{program} timed out after {secs}s")]
    TimedOut { program: String, secs: u64 },

    #[error("{program} failed: {stderr}")]
    Failed { program: String, stderr: String },

    #[error("Expected output was not created: {0}")]
    NoOutput(PathBuf),

    #[error("IO error running media tool: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of one (video, profile) upload
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Video file not found: {0}")]
    VideoNotFound(PathBuf),

    #[error("Metadata has no title; refusing to upload")]
    MissingTitle,

    #[error("Upload failed: {0}")]
    Remote(#[from] RemoteError),
}

/// Failure of an asset browser operation
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Deletion was not confirmed")]
    NotConfirmed,

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguity_lists_every_candidate() {
        let err = MatchError::Ambiguous {
            pattern: "talk_2024010*".into(),
            candidates: vec!["a.json".into(), "b.json".into()],
        };
        let text = err.to_string();
        assert!(text.contains("a.json"));
        assert!(text.contains("b.json"));
    }

    #[test]
    fn validation_error_names_path() {
        let err = ValidationError::new("snippet.title", "is required");
        assert_eq!(err.to_string(), "snippet.title: is required");
    }

    #[test]
    fn auth_errors_stay_distinct_inside_upload_errors() {
        let err: UploadError = AuthError::Refresh("expired".into()).into();
        assert!(matches!(err, UploadError::Auth(_)));
    }
}

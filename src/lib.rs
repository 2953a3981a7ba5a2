//! ytuploader - Batch Video Uploader Library
//!
//! Matches videos with their companion files (metadata document, subtitles,
//! thumbnail, alternate renditions), validates metadata, and uploads each
//! selected (video, profile) pair to the hosting platform.

pub mod assets;
pub mod auth;
pub mod batch;
pub mod companion;
pub mod config;
pub mod error;
pub mod file_matcher;
pub mod helper_functions;
pub mod logging;
pub mod media_tool;
pub mod metadata;
pub mod payload;
pub mod preferences;
pub mod profiles;
pub mod quick_upload;
pub mod remote;
pub mod upload_log;
pub mod uploader;
pub mod video_item;
pub mod workspace;
pub mod youtube;

#[cfg(test)]
mod test_support;

// Re-export commonly used items
pub use assets::{AssetBrowser, AssetGroup, Confirm};
pub use batch::{BatchEvent, BatchPlan, BatchScheduler, BatchSummary};
pub use companion::{CompanionProcessor, EnrichmentSupervisor};
pub use config::AppPaths;
pub use error::*;
pub use file_matcher::{CompanionSet, FileMatcher};
pub use helper_functions::*;
pub use logging::{setup_logging, shutdown_logging};
pub use media_tool::{FfmpegTool, MediaToolkit};
pub use metadata::{MetadataDocument, MetadataValidator, PrivacyStatus};
pub use profiles::{Profile, ProfileCatalog};
pub use remote::{AuthProvider, Credential, RemoteItem, RemoteMediaService};
pub use uploader::{UploadEvent, UploadOrchestrator, UploadResult};
pub use video_item::VideoItem;
pub use workspace::Workspace;

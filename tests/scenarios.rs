//! End-to-end behaviour through the public library API

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use common::{metadata_json, write_aged, MemoryPlatform, StaticAuth, PROFILES_YAML};
use ytuploader::batch::BatchScheduler;
use ytuploader::config::UPLOAD_LOG_FILE;
use ytuploader::error::MatchError;
use ytuploader::file_matcher::FileMatcher;
use ytuploader::preferences::{ProfilePreferences, SourceMap};
use ytuploader::profiles::ProfileCatalog;
use ytuploader::uploader::{UploadOrchestrator, UploadRequest};
use ytuploader::workspace::Workspace;

fn catalog() -> Arc<ProfileCatalog> {
    Arc::new(ProfileCatalog::from_yaml_str(PROFILES_YAML).unwrap())
}

#[test]
fn metadata_without_subtitle_uploads_to_plain_profile() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("talk_20240101_120000.mp4");
    fs::write(&video, b"video").unwrap();
    fs::write(
        dir.path().join("talk_20240101_120000_yt_profile.json"),
        metadata_json("Talk", "unlisted"),
    )
    .unwrap();

    let catalog = catalog();
    let mut workspace = Workspace::new(catalog.clone(), ProfilePreferences::load(dir.path().join("prefs.json")));
    workspace.add_video(&video).unwrap();
    let item = workspace.video(0).unwrap();

    assert!(catalog.can_select("public", item));
    assert!(!catalog.can_select("subtitled", item));
    assert_eq!(item.selected_profiles.get("public"), Some(&true));
    assert_eq!(item.selected_profiles.get("subtitled"), Some(&false));

    let platform = Arc::new(MemoryPlatform::default());
    let source_map = SourceMap::new(dir.path().join("source_map.json"));
    let orchestrator =
        UploadOrchestrator::new(Arc::new(StaticAuth), platform.clone()).with_source_map(source_map.clone());
    let result = orchestrator
        .upload(
            UploadRequest {
                video_path: &item.video_path,
                subtitle_path: item.srt_path.as_deref(),
                metadata: item.metadata.as_ref().unwrap(),
                profile: catalog.get("public").unwrap(),
                thumbnail_path: None,
            },
            &mut |_| {},
        )
        .unwrap();

    assert_eq!(result.title, "Talk");
    assert!(result.watch_url().contains(&result.remote_id));
    assert_eq!(source_map.get(&result.remote_id), Some(dir.path().to_path_buf()));
    assert_eq!(platform.calls(), vec!["insert:Talk"]);
}

#[test]
fn two_metadata_candidates_are_ambiguous_in_strict_mode() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("talk_20240101_120000.mp4");
    fs::write(&video, b"video").unwrap();
    let older = write_aged(
        &dir.path().join("talk_20240101_120000_yt_profile.json"),
        &metadata_json("Talk", "public"),
        600,
    );
    let newer = write_aged(
        &dir.path().join("talk_20240101_130000_yt_profile.json"),
        &metadata_json("Talk v2", "public"),
        10,
    );

    let matcher = FileMatcher::default();
    match matcher.match_strict(&video) {
        Err(MatchError::Ambiguous { candidates, .. }) => {
            assert!(candidates.contains(&"talk_20240101_120000_yt_profile.json".to_string()));
            assert!(candidates.contains(&"talk_20240101_130000_yt_profile.json".to_string()));
        }
        other => panic!("expected ambiguity, got {:?}", other),
    }

    let multi = matcher.match_multi(&video);
    assert_eq!(multi.json_files, vec![newer, older]);
    assert!(multi.srt_files.is_empty());
}

#[test]
fn batch_continues_after_a_failed_pair() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog();
    let platform = Arc::new(MemoryPlatform::failing(&["Second"]));
    let orchestrator = UploadOrchestrator::new(Arc::new(StaticAuth), platform.clone());
    let scheduler = Arc::new(BatchScheduler::new(Arc::new(orchestrator)));
    let mut workspace = Workspace::new(catalog, ProfilePreferences::load(dir.path().join("prefs.json")))
        .with_scheduler(scheduler);

    let mut folders = Vec::new();
    for (name, title) in [("first", "First"), ("second", "Second"), ("third", "Third")] {
        let folder = dir.path().join(name);
        fs::create_dir(&folder).unwrap();
        let video = folder.join(format!("{}.mp4", name));
        fs::write(&video, b"video").unwrap();
        fs::write(
            folder.join(format!("{}_yt_profile.json", name)),
            metadata_json(title, "public"),
        )
        .unwrap();
        workspace.add_video(&video).unwrap();
        folders.push(folder);
    }

    assert_eq!(workspace.start_batch(false).unwrap(), 3);
    assert!(workspace.wait_idle(Duration::from_secs(10)));

    let summary = workspace.last_summary().unwrap();
    assert_eq!(summary.successes.len(), 2);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(platform.calls(), vec!["insert:First", "insert:Second", "insert:Third"]);

    let progress = workspace.progress().unwrap();
    assert_eq!((progress.completed, progress.success, progress.failure), (3, 2, 1));

    for folder in &folders {
        let log = fs::read_to_string(folder.join(UPLOAD_LOG_FILE)).unwrap();
        assert_eq!(log.matches("STATUS:").count(), 1);
    }
    let failed_log = fs::read_to_string(folders[1].join(UPLOAD_LOG_FILE)).unwrap();
    assert!(failed_log.contains("STATUS: ERROR"));

    let failed = workspace.video(1).unwrap();
    assert_eq!(failed.status_trail.len(), 1);
    assert!(failed.status_trail[0].starts_with("× public:"));
    assert!(workspace.video(2).unwrap().status_trail[0].starts_with("● public: remote"));
}

#[test]
fn invalid_privacy_marks_metadata_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("talk.mp4");
    fs::write(&video, b"video").unwrap();
    fs::write(dir.path().join("talk_yt_profile.json"), metadata_json("Talk", "draft")).unwrap();

    let catalog = catalog();
    let mut workspace = Workspace::new(catalog.clone(), ProfilePreferences::load(dir.path().join("prefs.json")));
    workspace.add_video(&video).unwrap();
    let item = workspace.video(0).unwrap();

    assert!(!item.has_metadata());
    assert!(item.metadata_error.as_deref().unwrap().contains("status.privacyStatus"));
    for profile in catalog.iter().filter(|p| p.requires_json) {
        assert!(!profile.can_select(item));
        assert_eq!(item.selected_profiles.get(&profile.name), Some(&false));
    }
    assert!(workspace.toggle_profile(0, "public", true).is_err());
}

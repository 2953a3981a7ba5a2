//! Companion file discovery by naming convention
//!
//! Given a video on disk this module finds its metadata document, subtitle,
//! thumbnail and alternate renditions in the same directory. Absence is never
//! an error; only true ambiguity under strict matching is.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{
    clamp_prefix_len, DEFAULT_PREFIX_LEN, METADATA_EXTENSIONS, METADATA_SUFFIX,
    SUBTITLE_EXTENSIONS, THUMBNAIL_EXTENSIONS, VARIANT_SUFFIXES, VIDEO_EXTENSIONS,
};
use crate::error::MatchError;
use crate::helper_functions::Utils;

static TRAILING_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_\d{8}_\d{6}$").expect("valid timestamp pattern"));

/// Everything the matcher resolved for one video
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanionSet {
    pub json_path: Option<PathBuf>,
    pub srt_path: Option<PathBuf>,
    pub softsubs_path: Option<PathBuf>,
    pub hardsubs_path: Option<PathBuf>,
    pub thumbnail_path: Option<PathBuf>,
}

/// Result of strict prefix matching: at most one file per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixMatch {
    pub srt_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
}

/// Result of multi prefix matching: every candidate, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixCandidates {
    pub srt_files: Vec<PathBuf>,
    pub json_files: Vec<PathBuf>,
}

/// Convention-based companion finder
#[derive(Debug, Clone, Copy)]
pub struct FileMatcher {
    prefix_len: usize,
}

impl Default for FileMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX_LEN)
    }
}

impl FileMatcher {
    /// Create a matcher; the prefix length is clamped to the supported range
    pub fn new(prefix_len: usize) -> Self {
        Self {
            prefix_len: clamp_prefix_len(prefix_len),
        }
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    /// Stem of the video with rendition markers and trailing timestamps removed
    pub fn base_name(video_path: &Path) -> String {
        let stem = Utils::get_file_stem(video_path);
        let mut name = stem.clone();
        loop {
            let before = name.len();
            for suffix in VARIANT_SUFFIXES {
                let marker = format!("_{}", suffix);
                if let Some(stripped) = name.strip_suffix(&marker) {
                    name = stripped.to_string();
                }
            }
            if let Some(found) = TRAILING_TIMESTAMP.find(&name) {
                name.truncate(found.start());
            }
            if name.len() == before {
                break;
            }
        }
        if name.is_empty() {
            stem
        } else {
            name
        }
    }

    /// First `prefix_len` characters of the video's stem
    pub fn file_prefix(&self, video_path: &Path) -> String {
        Utils::char_prefix(&Utils::get_file_stem(video_path), self.prefix_len)
    }

    /// Resolve every companion of a video, picking the newest file on ties
    pub fn resolve_companions(&self, video_path: &Path) -> CompanionSet {
        let entries = DirListing::read(video_path);
        let set = CompanionSet {
            json_path: entries.newest(|name| name.ends_with(METADATA_SUFFIX)),
            srt_path: entries.newest(|name| self.prefix_matches(video_path, name, SUBTITLE_EXTENSIONS)),
            softsubs_path: self.find_variant_in(&entries, video_path, "softsubs"),
            hardsubs_path: self.find_variant_in(&entries, video_path, "hardsubs"),
            thumbnail_path: Self::find_thumbnail_in(&entries, video_path),
        };
        log::debug!("Resolved companions for {}: {:?}", video_path.display(), set);
        set
    }

    /// Newest `<base>_<suffix>.<ext>` or `<base>*_<suffix>.<ext>` rendition
    pub fn find_variant(&self, video_path: &Path, suffix: &str) -> Option<PathBuf> {
        self.find_variant_in(&DirListing::read(video_path), video_path, suffix)
    }

    /// Thumbnail by three-tier fallback: `_thumbnail`, `_thumb`, `sample_*`
    pub fn find_thumbnail(&self, video_path: &Path) -> Option<PathBuf> {
        Self::find_thumbnail_in(&DirListing::read(video_path), video_path)
    }

    /// Strict prefix matching: more than one candidate of a kind is an error
    pub fn match_strict(&self, video_path: &Path) -> Result<PrefixMatch, MatchError> {
        let candidates = self.match_multi(video_path);
        let prefix = self.file_prefix(video_path);
        Ok(PrefixMatch {
            srt_path: Self::single(candidates.srt_files, &prefix, SUBTITLE_EXTENSIONS)?,
            json_path: Self::single(candidates.json_files, &prefix, METADATA_EXTENSIONS)?,
        })
    }

    /// Multi prefix matching: all candidates, newest first, never fails
    pub fn match_multi(&self, video_path: &Path) -> PrefixCandidates {
        let entries = DirListing::read(video_path);
        PrefixCandidates {
            srt_files: entries.all(|name| self.prefix_matches(video_path, name, SUBTITLE_EXTENSIONS)),
            json_files: entries.all(|name| self.prefix_matches(video_path, name, METADATA_EXTENSIONS)),
        }
    }

    fn single(
        mut files: Vec<PathBuf>,
        prefix: &str,
        extensions: &[&str],
    ) -> Result<Option<PathBuf>, MatchError> {
        match files.len() {
            0 => Ok(None),
            1 => Ok(files.pop()),
            _ => Err(MatchError::Ambiguous {
                pattern: format!("{}*.{}", prefix, extensions.join("|")),
                candidates: files.iter().map(|p| Utils::get_file_name(p)).collect(),
            }),
        }
    }

    fn prefix_matches(&self, video_path: &Path, name: &str, extensions: &[&str]) -> bool {
        let prefix = self.file_prefix(video_path);
        !prefix.is_empty() && name.starts_with(&prefix) && Utils::has_extension(Path::new(name), extensions)
    }

    fn find_variant_in(&self, entries: &DirListing, video_path: &Path, suffix: &str) -> Option<PathBuf> {
        let base = Self::base_name(video_path);
        let marker = format!("_{}", suffix);
        entries.newest(|name| {
            let path = Path::new(name);
            let stem = Utils::get_file_stem(path);
            Utils::has_extension(path, VIDEO_EXTENSIONS)
                && stem.starts_with(&base)
                && stem.len() >= base.len() + marker.len()
                && stem.ends_with(&marker)
        })
    }

    fn find_thumbnail_in(entries: &DirListing, video_path: &Path) -> Option<PathBuf> {
        let base = Self::base_name(video_path);
        let correlated = |marker: &'static str| {
            let base = base.clone();
            move |name: &str| {
                let path = Path::new(name);
                let stem = Utils::get_file_stem(path);
                Utils::has_extension(path, THUMBNAIL_EXTENSIONS)
                    && stem.starts_with(&base)
                    && stem.len() >= base.len() + marker.len()
                    && stem.ends_with(marker)
            }
        };

        entries
            .newest(correlated("_thumbnail"))
            .or_else(|| entries.newest(correlated("_thumb")))
            .or_else(|| {
                entries.newest(|name| {
                    name.starts_with("sample_") && Utils::has_extension(Path::new(name), THUMBNAIL_EXTENSIONS)
                })
            })
    }
}

/// Snapshot of the regular files in a video's directory, newest first
struct DirListing {
    files: Vec<(PathBuf, String, SystemTime)>,
}

impl DirListing {
    fn read(video_path: &Path) -> Self {
        let folder = match video_path.parent() {
            Some(f) if !f.as_os_str().is_empty() => f.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut files = Vec::new();
        match folder.read_dir() {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if !path.is_file() || path == video_path {
                        continue;
                    }
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        let name = name.to_string();
                        files.push((path.clone(), name, Utils::modified_time(&path)));
                    }
                }
            }
            Err(e) => {
                log::debug!("Cannot list {}: {}", folder.display(), e);
            }
        }
        // Newest first, names break ties so repeated scans agree
        files.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.1.cmp(&b.1)));
        Self { files }
    }

    fn all(&self, pred: impl Fn(&str) -> bool) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|(_, name, _)| pred(name))
            .map(|(path, _, _)| path.clone())
            .collect()
    }

    fn newest(&self, pred: impl Fn(&str) -> bool) -> Option<PathBuf> {
        self.files
            .iter()
            .find(|(_, name, _)| pred(name))
            .map(|(path, _, _)| path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn touch(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
        path
    }

    #[test]
    fn base_name_strips_markers_and_timestamps_in_any_order() {
        assert_eq!(FileMatcher::base_name(Path::new("talk_20240101_120000.mp4")), "talk");
        assert_eq!(FileMatcher::base_name(Path::new("talk_20240101_120000_softsubs.mp4")), "talk");
        assert_eq!(FileMatcher::base_name(Path::new("talk_hardsubs_20240101_120000.mp4")), "talk");
        assert_eq!(FileMatcher::base_name(Path::new("plain.mp4")), "plain");
    }

    #[test]
    fn resolves_all_companion_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let video = touch(dir.path(), "talk_20240101_120000.mp4", 100);
        let json = touch(dir.path(), "talk_20240101_120000_yt_profile.json", 90);
        let srt = touch(dir.path(), "talk_20240101_120000.srt", 80);
        let soft = touch(dir.path(), "talk_20240101_120000_softsubs.mp4", 70);
        let hard = touch(dir.path(), "talk_hardsubs.mp4", 60);
        let thumb = touch(dir.path(), "talk_20240101_thumb.png", 50);

        let set = FileMatcher::default().resolve_companions(&video);
        assert_eq!(set.json_path, Some(json));
        assert_eq!(set.srt_path, Some(srt));
        assert_eq!(set.softsubs_path, Some(soft));
        assert_eq!(set.hardsubs_path, Some(hard));
        assert_eq!(set.thumbnail_path, Some(thumb));
    }

    #[test]
    fn missing_companions_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let video = touch(dir.path(), "lonely_video_file.mp4", 10);
        assert_eq!(FileMatcher::default().resolve_companions(&video), CompanionSet::default());
        assert!(FileMatcher::default().match_strict(&video).unwrap().srt_path.is_none());
    }

    #[test]
    fn thumbnail_tiers_prefer_correlated_names() {
        let dir = tempfile::tempdir().unwrap();
        let video = touch(dir.path(), "talk_20240101_120000.mp4", 100);
        touch(dir.path(), "sample_001.png", 1);
        let thumb = touch(dir.path(), "talk_thumb.jpg", 50);
        let thumbnail = touch(dir.path(), "talk_final_thumbnail.png", 60);

        let matcher = FileMatcher::default();
        assert_eq!(matcher.find_thumbnail(&video), Some(thumbnail.clone()));

        std::fs::remove_file(&thumbnail).unwrap();
        assert_eq!(matcher.find_thumbnail(&video), Some(thumb.clone()));

        std::fs::remove_file(&thumb).unwrap();
        assert_eq!(
            matcher.find_thumbnail(&video).and_then(|p| p.file_name().map(|n| n.to_owned())),
            Some("sample_001.png".into())
        );
    }

    #[test]
    fn newest_variant_wins() {
        let dir = tempfile::tempdir().unwrap();
        let video = touch(dir.path(), "talk_20240101_120000.mp4", 100);
        touch(dir.path(), "talk_20231231_090000_softsubs.mp4", 50);
        let newer = touch(dir.path(), "talk_20240101_120000_softsubs.mp4", 5);
        assert_eq!(FileMatcher::default().find_variant(&video, "softsubs"), Some(newer));
    }

    #[test]
    fn strict_matching_rejects_ambiguity_and_multi_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let video = touch(dir.path(), "lecture_part_one.mp4", 100);
        let older = touch(dir.path(), "lecture_part_one_a.json", 40);
        let newer = touch(dir.path(), "lecture_part_one_b.json", 10);

        let matcher = FileMatcher::default();
        match matcher.match_strict(&video) {
            Err(MatchError::Ambiguous { candidates, .. }) => {
                assert!(candidates.contains(&"lecture_part_one_a.json".to_string()));
                assert!(candidates.contains(&"lecture_part_one_b.json".to_string()));
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
        assert_eq!(matcher.match_multi(&video).json_files, vec![newer, older]);
    }

    #[test]
    fn resolving_twice_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let video = touch(dir.path(), "talk_20240101_120000.mp4", 100);
        touch(dir.path(), "talk_20240101_120000_a.srt", 20);
        touch(dir.path(), "talk_20240101_120000_b.srt", 20);
        let matcher = FileMatcher::default();
        assert_eq!(matcher.resolve_companions(&video), matcher.resolve_companions(&video));
    }
}

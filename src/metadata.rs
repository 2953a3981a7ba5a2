//! Metadata documents (`*_yt_profile.json`) and their validation
//!
//! A document is checked once against the fixed schema at load time and then
//! carried through the pipeline as a typed [`MetadataDocument`].

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{DEFAULT_CAPTION_LANGUAGE, MAX_TAGS, MAX_TITLE_CHARS};
use crate::error::ValidationError;

static CHAPTER_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?$").expect("valid chapter pattern"));

/// Visibility of an uploaded item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    Unlisted,
    Private,
}

impl PrivacyStatus {
    pub const ALL: [PrivacyStatus; 3] = [Self::Public, Self::Unlisted, Self::Private];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated metadata for one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub snippet: Snippet,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chapters: Vec<Chapter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captions: Option<CaptionsRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ThumbnailRef>,
    /// Unknown top-level members are kept for forward compatibility
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bullet_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_status: Option<PrivacyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_declared_made_for_kids: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub time: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionsRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRef {
    pub file: String,
}

impl MetadataDocument {
    /// Minimal document with just a title
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            snippet: Snippet {
                title: title.into(),
                ..Default::default()
            },
            status: Status::default(),
            chapters: Vec::new(),
            captions: None,
            thumbnail: None,
            extra: Map::new(),
        }
    }

    /// Language used for caption tracks
    pub fn caption_language(&self) -> String {
        self.captions
            .as_ref()
            .and_then(|c| c.language.clone())
            .or_else(|| self.snippet.default_language.clone())
            .unwrap_or_else(|| DEFAULT_CAPTION_LANGUAGE.to_string())
    }

    /// Thumbnail referenced by the document, resolved against the video's directory
    pub fn thumbnail_file(&self, video_dir: &Path) -> Option<PathBuf> {
        self.thumbnail
            .as_ref()
            .map(|t| resolve_relative(video_dir, &t.file))
    }

    /// Caption file referenced by the document, resolved against the video's directory
    pub fn captions_file(&self, video_dir: &Path) -> Option<PathBuf> {
        self.captions
            .as_ref()
            .and_then(|c| c.file.as_deref())
            .map(|file| resolve_relative(video_dir, file))
    }
}

fn resolve_relative(base: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Schema checks for metadata documents
pub struct MetadataValidator;

impl MetadataValidator {
    /// Read, parse and validate a metadata file
    pub fn load_and_validate(path: &Path) -> Result<MetadataDocument, ValidationError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::new("$", format!("cannot read {}: {}", path.display(), e)))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| ValidationError::new("$", format!("invalid JSON: {}", e)))?;
        let document = Self::validate(&value)?;
        log::debug!("Validated metadata {} (title: {})", path.display(), document.snippet.title);
        Ok(document)
    }

    /// Validate an already parsed document and convert it to its typed form
    pub fn validate(value: &Value) -> Result<MetadataDocument, ValidationError> {
        let mut root = value
            .as_object()
            .cloned()
            .ok_or_else(|| ValidationError::new("$", "document must be an object"))?;

        let snippet = match root.get_mut("snippet") {
            Some(Value::Object(snippet)) => snippet,
            Some(_) => return Err(ValidationError::new("snippet", "must be an object")),
            None => return Err(ValidationError::new("snippet", "is required")),
        };
        Self::check_snippet(snippet)?;

        match root.get("status") {
            None | Some(Value::Null) => {}
            Some(Value::Object(status)) => Self::check_status(status)?,
            Some(_) => return Err(ValidationError::new("status", "must be an object")),
        }

        match root.get("chapters") {
            None | Some(Value::Null) => {}
            Some(Value::Array(chapters)) => Self::check_chapters(chapters)?,
            Some(_) => return Err(ValidationError::new("chapters", "must be an array")),
        }

        match root.get("captions") {
            None | Some(Value::Null) => {}
            Some(Value::Object(captions)) => {
                for key in ["file", "language", "name"] {
                    optional_string(captions, key, &format!("captions.{}", key))?;
                }
            }
            Some(_) => return Err(ValidationError::new("captions", "must be an object")),
        }

        // A bare path string is accepted as shorthand for {"file": path}
        let thumbnail = match root.get("thumbnail") {
            None | Some(Value::Null) => None,
            Some(Value::String(file)) => Some(Value::Object(Map::from_iter([(
                "file".to_string(),
                Value::String(file.clone()),
            )]))),
            Some(Value::Object(thumb)) => match thumb.get("file") {
                Some(Value::String(_)) => Some(Value::Object(thumb.clone())),
                _ => return Err(ValidationError::new("thumbnail.file", "must be a string")),
            },
            Some(_) => return Err(ValidationError::new("thumbnail", "must be a path or an object")),
        };
        match thumbnail {
            Some(thumb) => root.insert("thumbnail".into(), thumb),
            None => root.remove("thumbnail"),
        };

        strip_nulls(&mut root, &["status", "chapters", "captions"]);

        serde_json::from_value(Value::Object(root))
            .map_err(|e| ValidationError::new("$", format!("unexpected shape: {}", e)))
    }

    fn check_snippet(snippet: &mut Map<String, Value>) -> Result<(), ValidationError> {
        match snippet.get("title") {
            Some(Value::String(title)) => {
                if title.trim().is_empty() {
                    return Err(ValidationError::new("snippet.title", "must not be empty"));
                }
                if title.chars().count() > MAX_TITLE_CHARS {
                    return Err(ValidationError::new(
                        "snippet.title",
                        format!("must be at most {} characters", MAX_TITLE_CHARS),
                    ));
                }
            }
            Some(_) => return Err(ValidationError::new("snippet.title", "must be a string")),
            None => return Err(ValidationError::new("snippet.title", "is required")),
        }

        for key in ["description", "shortDescription", "defaultLanguage"] {
            optional_string(snippet, key, &format!("snippet.{}", key))?;
        }
        for key in ["bulletPoints", "tags", "hashtags"] {
            optional_string_array(snippet, key, &format!("snippet.{}", key))?;
        }
        if let Some(Value::Array(tags)) = snippet.get("tags") {
            if tags.len() > MAX_TAGS {
                return Err(ValidationError::new(
                    "snippet.tags",
                    format!("must have at most {} entries", MAX_TAGS),
                ));
            }
        }

        let category = match snippet.get("categoryId") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) if id.is_u64() => Some(id.to_string()),
            Some(_) => {
                return Err(ValidationError::new(
                    "snippet.categoryId",
                    "must be a string or a non-negative integer",
                ))
            }
        };
        match category {
            Some(id) => snippet.insert("categoryId".into(), Value::String(id)),
            None => snippet.remove("categoryId"),
        };

        strip_nulls(snippet, &["description", "shortDescription", "defaultLanguage", "bulletPoints", "tags", "hashtags"]);
        Ok(())
    }

    fn check_status(status: &Map<String, Value>) -> Result<(), ValidationError> {
        match status.get("privacyStatus") {
            None | Some(Value::Null) => {}
            Some(Value::String(value)) if PrivacyStatus::parse(value).is_some() => {}
            Some(other) => {
                return Err(ValidationError::new(
                    "status.privacyStatus",
                    format!("must be one of public, unlisted, private (got {})", other),
                ))
            }
        }
        for key in ["embeddable", "selfDeclaredMadeForKids"] {
            match status.get(key) {
                None | Some(Value::Null) | Some(Value::Bool(_)) => {}
                Some(_) => return Err(ValidationError::new(format!("status.{}", key), "must be a boolean")),
            }
        }
        match status.get("publishAt") {
            None | Some(Value::Null) => {}
            Some(Value::String(at)) => {
                if chrono::DateTime::parse_from_rfc3339(at).is_err() {
                    return Err(ValidationError::new(
                        "status.publishAt",
                        "must be an RFC 3339 timestamp",
                    ));
                }
            }
            Some(_) => return Err(ValidationError::new("status.publishAt", "must be a string")),
        }
        Ok(())
    }

    fn check_chapters(chapters: &[Value]) -> Result<(), ValidationError> {
        for (index, chapter) in chapters.iter().enumerate() {
            let path = format!("chapters[{}]", index);
            let chapter = chapter
                .as_object()
                .ok_or_else(|| ValidationError::new(path.clone(), "must be an object"))?;
            match chapter.get("time") {
                Some(Value::String(time)) if CHAPTER_TIME.is_match(time) => {}
                Some(Value::String(time)) => {
                    return Err(ValidationError::new(
                        format!("{}.time", path),
                        format!("'{}' does not match H:MM or H:MM:SS", time),
                    ))
                }
                Some(_) => return Err(ValidationError::new(format!("{}.time", path), "must be a string")),
                None => return Err(ValidationError::new(format!("{}.time", path), "is required")),
            }
            match chapter.get("title") {
                Some(Value::String(title)) if !title.trim().is_empty() => {}
                Some(Value::String(_)) => {
                    return Err(ValidationError::new(format!("{}.title", path), "must not be empty"))
                }
                Some(_) => return Err(ValidationError::new(format!("{}.title", path), "must be a string")),
                None => return Err(ValidationError::new(format!("{}.title", path), "is required")),
            }
        }
        Ok(())
    }
}

fn optional_string(map: &Map<String, Value>, key: &str, path: &str) -> Result<(), ValidationError> {
    match map.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(ValidationError::new(path, "must be a string")),
    }
}

fn optional_string_array(map: &Map<String, Value>, key: &str, path: &str) -> Result<(), ValidationError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                if !item.is_string() {
                    return Err(ValidationError::new(format!("{}[{}]", path, index), "must be a string"));
                }
            }
            Ok(())
        }
        Some(_) => Err(ValidationError::new(path, "must be an array of strings")),
    }
}

fn strip_nulls(map: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        if matches!(map.get(*key), Some(Value::Null)) {
            map.remove(*key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "snippet": {
                "title": "Talk",
                "description": "Full text",
                "shortDescription": "Short",
                "bulletPoints": ["one", "two"],
                "tags": ["rust"],
                "hashtags": ["talk"],
                "categoryId": 27
            },
            "status": {
                "privacyStatus": "unlisted",
                "embeddable": true,
                "publishAt": "2024-01-02T10:00:00Z",
                "selfDeclaredMadeForKids": false
            },
            "chapters": [{"time": "0:00", "title": "Intro"}, {"time": "1:02:03", "title": "End"}],
            "thumbnail": "cover.png",
            "producer": "someone"
        })
    }

    #[test]
    fn accepts_full_document() {
        let doc = MetadataValidator::validate(&valid()).unwrap();
        assert_eq!(doc.snippet.title, "Talk");
        assert_eq!(doc.snippet.category_id.as_deref(), Some("27"));
        assert_eq!(doc.status.privacy_status, Some(PrivacyStatus::Unlisted));
        assert_eq!(doc.chapters.len(), 2);
        assert_eq!(doc.thumbnail, Some(ThumbnailRef { file: "cover.png".into() }));
        assert_eq!(doc.extra.get("producer"), Some(&json!("someone")));
    }

    #[test]
    fn missing_title_names_its_path() {
        let err = MetadataValidator::validate(&json!({"snippet": {"description": "x"}})).unwrap_err();
        assert_eq!(err.path, "snippet.title");
    }

    #[test]
    fn empty_or_long_titles_fail() {
        let err = MetadataValidator::validate(&json!({"snippet": {"title": "  "}})).unwrap_err();
        assert_eq!(err.path, "snippet.title");
        let long = "x".repeat(MAX_TITLE_CHARS + 1);
        let err = MetadataValidator::validate(&json!({"snippet": {"title": long}})).unwrap_err();
        assert_eq!(err.path, "snippet.title");
    }

    #[test]
    fn unknown_privacy_status_fails() {
        let mut doc = valid();
        doc["status"]["privacyStatus"] = json!("draft");
        let err = MetadataValidator::validate(&doc).unwrap_err();
        assert_eq!(err.path, "status.privacyStatus");
    }

    #[test]
    fn malformed_chapter_time_fails() {
        let mut doc = valid();
        doc["chapters"][1]["time"] = json!("123:00");
        let err = MetadataValidator::validate(&doc).unwrap_err();
        assert_eq!(err.path, "chapters[1].time");
    }

    #[test]
    fn too_many_tags_fail() {
        let tags: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{}", i)).collect();
        let err = MetadataValidator::validate(&json!({"snippet": {"title": "t", "tags": tags}})).unwrap_err();
        assert_eq!(err.path, "snippet.tags");
    }

    #[test]
    fn load_reports_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken_yt_profile.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = MetadataValidator::load_and_validate(&path).unwrap_err();
        assert_eq!(err.path, "$");
    }

    #[test]
    fn caption_language_falls_back() {
        let mut doc = MetadataDocument::with_title("t");
        assert_eq!(doc.caption_language(), DEFAULT_CAPTION_LANGUAGE);
        doc.snippet.default_language = Some("en".into());
        assert_eq!(doc.caption_language(), "en");
        doc.captions = Some(CaptionsRef { language: Some("fr".into()), ..Default::default() });
        assert_eq!(doc.caption_language(), "fr");
    }
}

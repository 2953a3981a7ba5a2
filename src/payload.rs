//! Provider-shaped request body built from metadata and a profile

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::UploadError;
use crate::metadata::MetadataDocument;
use crate::profiles::Profile;

/// Body of an item insert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoPayload {
    pub snippet: PayloadSnippet,
    pub status: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadSnippet {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
    /// Other snippet keys a profile declares, passed through as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VideoPayload {
    pub fn privacy_status(&self) -> Option<&str> {
        self.status.get("privacyStatus").and_then(Value::as_str)
    }
}

/// Merge a metadata document with a profile into an insert body
pub fn build_payload(metadata: &MetadataDocument, profile: &Profile) -> Result<VideoPayload, UploadError> {
    let title = metadata.snippet.title.trim();
    if title.is_empty() {
        return Err(UploadError::MissingTitle);
    }

    let mut snippet = PayloadSnippet {
        title: title.to_string(),
        description: compose_description(metadata),
        tags: metadata.snippet.tags.clone(),
        category_id: metadata.snippet.category_id.clone(),
        default_language: metadata.snippet.default_language.clone(),
        extra: Map::new(),
    };

    for (key, value) in &profile.snippet_overrides {
        match key.as_str() {
            // The document owns title and description
            "title" | "description" => {}
            "categoryId" => {
                if let Some(id) = scalar_string(value) {
                    snippet.category_id = Some(id);
                }
            }
            "defaultLanguage" => {
                if let Some(lang) = scalar_string(value) {
                    snippet.default_language = Some(lang);
                }
            }
            "tags" => {
                if let Value::Array(items) = value {
                    snippet.tags = items.iter().filter_map(scalar_string).collect();
                }
            }
            _ => {
                snippet.extra.insert(key.clone(), value.clone());
            }
        }
    }

    let mut status = match serde_json::to_value(&metadata.status) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (key, value) in &profile.status_overrides {
        status.insert(key.clone(), value.clone());
    }

    Ok(VideoPayload { snippet, status })
}

/// Description assembled from its parts, or the title when every part is empty
pub fn compose_description(metadata: &MetadataDocument) -> String {
    let snippet = &metadata.snippet;
    let mut parts: Vec<String> = Vec::new();

    if let Some(short) = non_empty(snippet.short_description.as_deref()) {
        parts.push(short.to_string());
    }
    let bullets: Vec<String> = snippet
        .bullet_points
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .map(|b| format!("- {}", b))
        .collect();
    if !bullets.is_empty() {
        parts.push(bullets.join("\n"));
    }
    if let Some(full) = non_empty(snippet.description.as_deref()) {
        parts.push(full.to_string());
    }
    let hashtags = hashtag_line(&snippet.hashtags);
    if !hashtags.is_empty() {
        parts.push(hashtags);
    }
    if !metadata.chapters.is_empty() {
        let lines: Vec<String> = metadata
            .chapters
            .iter()
            .map(|c| format!("{} - {}", c.time, c.title))
            .collect();
        parts.push(format!("Chapters:\n{}", lines.join("\n")));
    }

    if parts.is_empty() {
        snippet.title.trim().to_string()
    } else {
        parts.join("\n\n")
    }
}

fn hashtag_line(tags: &[String]) -> String {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && *t != "#")
        .map(|t| if t.starts_with('#') { t.to_string() } else { format!("#{}", t) })
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Chapter, MetadataValidator, PrivacyStatus};
    use serde_json::json;

    fn profile_with(status: Value, snippet: Value) -> Profile {
        let mut profile = Profile::new("public", "Public release");
        profile.status_overrides = status.as_object().cloned().unwrap_or_default();
        profile.snippet_overrides = snippet.as_object().cloned().unwrap_or_default();
        profile
    }

    #[test]
    fn description_joins_parts_in_order() {
        let mut doc = MetadataDocument::with_title("Talk");
        doc.snippet.short_description = Some("Short".into());
        doc.snippet.bullet_points = vec!["one".into(), "two".into()];
        doc.snippet.description = Some("Full".into());
        doc.snippet.hashtags = vec!["rust".into(), "#talk".into()];
        doc.chapters = vec![Chapter { time: "0:00".into(), title: "Intro".into() }];

        assert_eq!(
            compose_description(&doc),
            "Short\n\n- one\n- two\n\nFull\n\n#rust #talk\n\nChapters:\n0:00 - Intro"
        );
    }

    #[test]
    fn empty_description_falls_back_to_title() {
        let payload = build_payload(&MetadataDocument::with_title("Talk"), &Profile::new("p", "d")).unwrap();
        assert_eq!(payload.snippet.title, "Talk");
        assert_eq!(payload.snippet.description, "Talk");
    }

    #[test]
    fn missing_title_is_an_error() {
        let doc = MetadataDocument::with_title("   ");
        assert!(matches!(build_payload(&doc, &Profile::new("p", "d")), Err(UploadError::MissingTitle)));
    }

    #[test]
    fn profile_status_wins_over_metadata() {
        let doc = MetadataValidator::validate(&json!({
            "snippet": {"title": "Talk", "categoryId": "22", "tags": ["a"]},
            "status": {"privacyStatus": "private", "embeddable": false}
        }))
        .unwrap();
        assert_eq!(doc.status.privacy_status, Some(PrivacyStatus::Private));

        let profile = profile_with(json!({"privacyStatus": "public"}), json!({"categoryId": 27}));
        let payload = build_payload(&doc, &profile).unwrap();
        assert_eq!(payload.privacy_status(), Some("public"));
        assert_eq!(payload.status["embeddable"], json!(false));
        assert_eq!(payload.snippet.category_id.as_deref(), Some("27"));
        assert_eq!(payload.snippet.tags, vec!["a"]);
    }

    #[test]
    fn undeclared_profile_keys_keep_metadata_values() {
        let mut doc = MetadataDocument::with_title("Talk");
        doc.snippet.default_language = Some("en".into());
        let payload = build_payload(&doc, &profile_with(json!({}), json!({}))).unwrap();
        assert_eq!(payload.snippet.default_language.as_deref(), Some("en"));
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["snippet"]["defaultLanguage"], "en");
        assert!(body["snippet"].get("tags").is_none());
    }
}

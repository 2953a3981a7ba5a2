//! Capabilities the uploader consumes from the hosting platform
//!
//! [`AuthProvider`] hands out credentials and [`RemoteMediaService`] performs
//! the platform calls. The orchestration layers only see these traits, so the
//! HTTP implementations in `auth` and `youtube` can be swapped for fakes.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{EMBED_URL_BASE, STUDIO_URL_BASE, WATCH_URL_BASE};
use crate::error::{AuthError, RemoteError};
use crate::metadata::PrivacyStatus;
use crate::payload::VideoPayload;

/// Bearer credential for platform calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    /// Still valid for at least another minute
    pub fn is_valid(&self) -> bool {
        match self.expires_at {
            Some(at) => at - chrono::Duration::seconds(60) > Utc::now(),
            None => !self.access_token.is_empty(),
        }
    }
}

/// Produces a usable credential, refreshing or re-authorizing as needed
pub trait AuthProvider: Send + Sync {
    fn authenticate(&self) -> Result<Credential, AuthError>;
}

/// Progress of a byte transfer as a fraction in `0.0..=1.0`
pub type Progress<'a> = &'a mut dyn FnMut(f64);

/// Previously uploaded item as reported by the platform
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: Option<String>,
    pub privacy_status: Option<PrivacyStatus>,
    pub publish_at: Option<String>,
    pub made_for_kids: Option<bool>,
    pub embeddable: Option<bool>,
    pub published_at: Option<String>,
    pub view_count: u64,
    pub has_captions: bool,
    pub thumbnail_url: Option<String>,
}

impl RemoteItem {
    pub fn watch_url(&self) -> String {
        watch_url(&self.id)
    }

    pub fn studio_url(&self) -> String {
        format!("{}{}/edit", STUDIO_URL_BASE, self.id)
    }
}

/// Partial edit of an existing item; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category_id: Option<String>,
    pub privacy_status: Option<PrivacyStatus>,
    /// `Some(None)` clears the publish schedule
    pub publish_at: Option<Option<String>>,
    pub made_for_kids: Option<bool>,
    pub embeddable: Option<bool>,
}

impl MetadataUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the edit to a local copy of an item
    pub fn apply_to(&self, item: &mut RemoteItem) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(tags) = &self.tags {
            item.tags = tags.clone();
        }
        if let Some(category) = &self.category_id {
            item.category_id = Some(category.clone());
        }
        if let Some(privacy) = self.privacy_status {
            item.privacy_status = Some(privacy);
        }
        if let Some(publish_at) = &self.publish_at {
            item.publish_at = publish_at.clone();
        }
        if let Some(kids) = self.made_for_kids {
            item.made_for_kids = Some(kids);
        }
        if let Some(embeddable) = self.embeddable {
            item.embeddable = Some(embeddable);
        }
    }
}

/// Operations consumed from the video hosting platform
pub trait RemoteMediaService: Send + Sync {
    /// Most recent uploads of the authenticated channel, newest first
    fn list_my_items(&self, credential: &Credential, max_results: u32) -> Result<Vec<RemoteItem>, RemoteError>;

    fn get_items(&self, credential: &Credential, ids: &[String]) -> Result<Vec<RemoteItem>, RemoteError>;

    /// Create an item from a payload and a media file; returns the new id
    fn insert_item(
        &self,
        credential: &Credential,
        payload: &VideoPayload,
        media: &Path,
        progress: Progress<'_>,
    ) -> Result<String, RemoteError>;

    fn update_item(&self, credential: &Credential, id: &str, update: &MetadataUpdate) -> Result<(), RemoteError>;

    /// Swap the media of an existing item, keeping its id and metadata
    fn replace_media(
        &self,
        credential: &Credential,
        id: &str,
        media: &Path,
        progress: Progress<'_>,
    ) -> Result<(), RemoteError>;

    fn set_thumbnail(&self, credential: &Credential, id: &str, image: &Path) -> Result<(), RemoteError>;

    fn insert_caption(
        &self,
        credential: &Credential,
        id: &str,
        language: &str,
        name: &str,
        file: &Path,
    ) -> Result<(), RemoteError>;

    fn delete_item(&self, credential: &Credential, id: &str) -> Result<(), RemoteError>;
}

pub fn watch_url(id: &str) -> String {
    format!("{}{}", WATCH_URL_BASE, id)
}

pub fn embed_url(id: &str) -> String {
    format!("{}{}", EMBED_URL_BASE, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_contain_the_id() {
        assert_eq!(watch_url("abc123"), "https://www.youtube.com/watch?v=abc123");
        assert_eq!(embed_url("abc123"), "https://www.youtube.com/embed/abc123");
    }

    #[test]
    fn expired_credentials_are_invalid() {
        let mut credential = Credential::new("token");
        assert!(credential.is_valid());
        credential.expires_at = Some(Utc::now() - chrono::Duration::minutes(5));
        assert!(!credential.is_valid());
        credential.expires_at = Some(Utc::now() + chrono::Duration::hours(1));
        assert!(credential.is_valid());
    }

    #[test]
    fn update_leaves_unset_fields_alone() {
        let mut item = RemoteItem {
            id: "a".into(),
            title: "Old".into(),
            privacy_status: Some(PrivacyStatus::Public),
            ..Default::default()
        };
        let update = MetadataUpdate {
            title: Some("New".into()),
            made_for_kids: Some(false),
            ..Default::default()
        };
        update.apply_to(&mut item);
        assert_eq!(item.title, "New");
        assert_eq!(item.privacy_status, Some(PrivacyStatus::Public));
        assert_eq!(item.made_for_kids, Some(false));
        assert!(!update.is_empty());
        assert!(MetadataUpdate::default().is_empty());
    }
}

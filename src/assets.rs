//! Maintenance of already uploaded items
//!
//! Items are listed newest first and grouped by title prefix: one logical
//! video is often published several times with different visibility. Group
//! edits apply the same value to every member but never touch a member's
//! visibility. Deletion needs two explicit confirmations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{DEFAULT_ASSET_PAGE_SIZE, TITLE_GROUP_PREFIX_LEN};
use crate::error::AssetError;
use crate::helper_functions::Utils;
use crate::metadata::PrivacyStatus;
use crate::preferences::SourceMap;
use crate::remote::{AuthProvider, Credential, MetadataUpdate, Progress, RemoteItem, RemoteMediaService};

/// Asks the operator a yes/no question
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Items sharing a title prefix
#[derive(Debug, Clone, PartialEq)]
pub struct AssetGroup {
    pub key: String,
    /// In listing order
    pub items: Vec<RemoteItem>,
}

impl AssetGroup {
    /// Representative item: the unlisted variant if there is one, else the newest
    pub fn primary(&self) -> Option<&RemoteItem> {
        self.items
            .iter()
            .find(|item| item.privacy_status == Some(PrivacyStatus::Unlisted))
            .or_else(|| self.items.first())
    }

    pub fn has_variants(&self) -> bool {
        self.items.len() > 1
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}

/// Group items by the first characters of their title, keeping first-seen order
pub fn group_by_title(items: Vec<RemoteItem>) -> Vec<AssetGroup> {
    let mut groups: Vec<AssetGroup> = Vec::new();
    for item in items {
        let key = Utils::char_prefix(item.title.trim(), TITLE_GROUP_PREFIX_LEN);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.items.push(item),
            None => groups.push(AssetGroup {
                key,
                items: vec![item],
            }),
        }
    }
    groups
}

/// Everything shown for a single item
#[derive(Debug, Clone, PartialEq)]
pub struct AssetDetail {
    pub item: RemoteItem,
    pub watch_url: String,
    pub studio_url: String,
    /// Local directory the item was uploaded from, if recorded
    pub source_folder: Option<PathBuf>,
}

pub struct AssetBrowser {
    auth: Arc<dyn AuthProvider>,
    service: Arc<dyn RemoteMediaService>,
    source_map: Option<SourceMap>,
}

impl AssetBrowser {
    pub fn new(auth: Arc<dyn AuthProvider>, service: Arc<dyn RemoteMediaService>) -> Self {
        Self {
            auth,
            service,
            source_map: None,
        }
    }

    pub fn with_source_map(mut self, source_map: SourceMap) -> Self {
        self.source_map = Some(source_map);
        self
    }

    fn credential(&self) -> Result<Credential, AssetError> {
        Ok(self.auth.authenticate()?)
    }

    /// Most recent uploads in the service's order
    pub fn fetch_recent(&self, max_results: Option<u32>) -> Result<Vec<RemoteItem>, AssetError> {
        let credential = self.credential()?;
        let items = self
            .service
            .list_my_items(&credential, max_results.unwrap_or(DEFAULT_ASSET_PAGE_SIZE))?;
        log::info!("Loaded {} uploads", items.len());
        Ok(items)
    }

    pub fn fetch_groups(&self, max_results: Option<u32>) -> Result<Vec<AssetGroup>, AssetError> {
        Ok(group_by_title(self.fetch_recent(max_results)?))
    }

    /// Re-read items after an edit
    pub fn refresh(&self, ids: &[String]) -> Result<Vec<RemoteItem>, AssetError> {
        let credential = self.credential()?;
        Ok(self.service.get_items(&credential, ids)?)
    }

    pub fn source_folder(&self, remote_id: &str) -> Option<PathBuf> {
        self.source_map.as_ref().and_then(|map| map.get(remote_id))
    }

    pub fn detail(&self, item: &RemoteItem) -> AssetDetail {
        AssetDetail {
            item: item.clone(),
            watch_url: item.watch_url(),
            studio_url: item.studio_url(),
            source_folder: self.source_folder(&item.id),
        }
    }

    /// Edit one item; any field may change, visibility included
    pub fn update_metadata(&self, id: &str, update: &MetadataUpdate) -> Result<(), AssetError> {
        if update.is_empty() {
            return Ok(());
        }
        let credential = self.credential()?;
        self.service.update_item(&credential, id, update)?;
        log::info!("Updated metadata of {}", id);
        Ok(())
    }

    /// Apply the same edit to every id; each member keeps its own visibility
    pub fn update_group(&self, ids: &[String], update: &MetadataUpdate) -> Result<usize, AssetError> {
        let update = MetadataUpdate {
            privacy_status: None,
            ..update.clone()
        };
        if update.is_empty() {
            return Ok(0);
        }
        let credential = self.credential()?;
        for id in ids {
            self.service.update_item(&credential, id, &update)?;
        }
        log::info!("Updated {} grouped items", ids.len());
        Ok(ids.len())
    }

    pub fn set_made_for_kids(&self, ids: &[String], value: bool) -> Result<usize, AssetError> {
        self.update_group(
            ids,
            &MetadataUpdate {
                made_for_kids: Some(value),
                ..Default::default()
            },
        )
    }

    pub fn set_embeddable(&self, ids: &[String], value: bool) -> Result<usize, AssetError> {
        self.update_group(
            ids,
            &MetadataUpdate {
                embeddable: Some(value),
                ..Default::default()
            },
        )
    }

    pub fn replace_thumbnail(&self, id: &str, image: &Path) -> Result<(), AssetError> {
        if !image.is_file() {
            return Err(AssetError::FileNotFound(image.to_path_buf()));
        }
        let credential = self.credential()?;
        self.service.set_thumbnail(&credential, id, image)?;
        log::info!("Replaced thumbnail of {}", id);
        Ok(())
    }

    /// Swap the media file; id and metadata stay
    pub fn replace_video(&self, id: &str, media: &Path, progress: Progress<'_>) -> Result<(), AssetError> {
        if !media.is_file() {
            return Err(AssetError::FileNotFound(media.to_path_buf()));
        }
        let credential = self.credential()?;
        self.service.replace_media(&credential, id, media, progress)?;
        log::info!("Replaced media of {} with {}", id, media.display());
        Ok(())
    }

    /// Delete every id after two confirmations
    pub fn delete(&self, ids: &[String], confirm: &mut dyn Confirm) -> Result<usize, AssetError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let first = format!("Delete {} item(s): {}?", ids.len(), ids.join(", "));
        if !confirm.confirm(&first) {
            return Err(AssetError::NotConfirmed);
        }
        if !confirm.confirm("This cannot be undone. Delete permanently?") {
            return Err(AssetError::NotConfirmed);
        }

        let credential = self.credential()?;
        for id in ids {
            self.service.delete_item(&credential, id)?;
            log::warn!("Deleted remote item {}", id);
        }
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeAuth, FakeService};

    struct Answers(Vec<bool>);

    impl Confirm for Answers {
        fn confirm(&mut self, _prompt: &str) -> bool {
            if self.0.is_empty() {
                false
            } else {
                self.0.remove(0)
            }
        }
    }

    fn item(id: &str, title: &str, privacy: PrivacyStatus) -> RemoteItem {
        RemoteItem {
            id: id.into(),
            title: title.into(),
            privacy_status: Some(privacy),
            ..Default::default()
        }
    }

    fn sample() -> Vec<RemoteItem> {
        let long = "A very long title that goes well beyond fifty characters in length";
        vec![
            item("a", &format!("{} (public)", long), PrivacyStatus::Public),
            item("b", "Short talk", PrivacyStatus::Private),
            item("c", &format!("{} (unlisted)", long), PrivacyStatus::Unlisted),
        ]
    }

    fn browser(service: Arc<FakeService>) -> AssetBrowser {
        AssetBrowser::new(Arc::new(FakeAuth { fail: false }), service)
    }

    #[test]
    fn groups_by_title_prefix_and_prefers_unlisted() {
        let groups = group_by_title(sample());
        assert_eq!(groups.len(), 2);
        assert!(groups[0].has_variants());
        assert_eq!(groups[0].ids(), vec!["a", "c"]);
        assert_eq!(groups[0].primary().unwrap().id, "c");
        assert_eq!(groups[1].primary().unwrap().id, "b");
    }

    #[test]
    fn group_edit_keeps_each_visibility() {
        let service = Arc::new(FakeService::with_items(sample()));
        let browser = browser(service.clone());
        let update = MetadataUpdate {
            description: Some("Updated".into()),
            privacy_status: Some(PrivacyStatus::Private),
            ..Default::default()
        };

        let count = browser.update_group(&["a".to_string(), "c".to_string()], &update).unwrap();
        assert_eq!(count, 2);
        let a = service.item("a").unwrap();
        let c = service.item("c").unwrap();
        assert_eq!(a.description, "Updated");
        assert_eq!(c.description, "Updated");
        assert_eq!(a.privacy_status, Some(PrivacyStatus::Public));
        assert_eq!(c.privacy_status, Some(PrivacyStatus::Unlisted));
    }

    #[test]
    fn flags_apply_to_every_member() {
        let service = Arc::new(FakeService::with_items(sample()));
        let browser = browser(service.clone());
        browser.set_made_for_kids(&["a".to_string(), "c".to_string()], true).unwrap();
        assert_eq!(service.item("a").unwrap().made_for_kids, Some(true));
        assert_eq!(service.item("c").unwrap().made_for_kids, Some(true));
        assert_eq!(service.item("b").unwrap().made_for_kids, None);
    }

    #[test]
    fn delete_needs_two_confirmations() {
        let service = Arc::new(FakeService::with_items(sample()));
        let browser = browser(service.clone());
        let ids = vec!["a".to_string(), "c".to_string()];

        let err = browser.delete(&ids, &mut Answers(vec![true, false])).unwrap_err();
        assert!(matches!(err, AssetError::NotConfirmed));
        assert!(service.calls().is_empty());

        let deleted = browser.delete(&ids, &mut Answers(vec![true, true])).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(service.calls(), vec!["delete:a", "delete:c"]);
        assert!(service.item("a").is_none());
    }

    #[test]
    fn detail_joins_source_folder() {
        let dir = tempfile::tempdir().unwrap();
        let map = SourceMap::new(dir.path().join("source_map.json"));
        map.update("b", Path::new("/videos/talks")).unwrap();
        let service = Arc::new(FakeService::with_items(sample()));
        let browser = browser(service).with_source_map(map);

        let items = browser.fetch_recent(None).unwrap();
        let detail = browser.detail(&items[1]);
        assert_eq!(detail.source_folder, Some(PathBuf::from("/videos/talks")));
        assert!(detail.studio_url.ends_with("/b/edit"));
        assert!(detail.watch_url.ends_with("=b"));
    }

    #[test]
    fn missing_thumbnail_is_rejected_before_auth() {
        let service = Arc::new(FakeService::default());
        let browser = AssetBrowser::new(Arc::new(FakeAuth { fail: true }), service);
        let err = browser
            .replace_thumbnail("a", Path::new("/nonexistent/thumb.jpg"))
            .unwrap_err();
        assert!(matches!(err, AssetError::FileNotFound(_)));
    }
}

//! Shared fakes and fixtures for the end-to-end tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use ytuploader::error::{AuthError, RemoteError};
use ytuploader::payload::VideoPayload;
use ytuploader::remote::{AuthProvider, Credential, MetadataUpdate, Progress, RemoteItem, RemoteMediaService};

pub struct StaticAuth;

impl AuthProvider for StaticAuth {
    fn authenticate(&self) -> Result<Credential, AuthError> {
        Ok(Credential::new("test-token"))
    }
}

/// In-memory platform that fails inserts for chosen titles
#[derive(Default)]
pub struct MemoryPlatform {
    pub fail_titles: Vec<String>,
    items: Mutex<Vec<RemoteItem>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryPlatform {
    pub fn failing(titles: &[&str]) -> Self {
        Self {
            fail_titles: titles.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RemoteMediaService for MemoryPlatform {
    fn list_my_items(&self, _c: &Credential, max_results: u32) -> Result<Vec<RemoteItem>, RemoteError> {
        Ok(self.items.lock().unwrap().iter().take(max_results as usize).cloned().collect())
    }

    fn get_items(&self, _c: &Credential, ids: &[String]) -> Result<Vec<RemoteItem>, RemoteError> {
        let items = self.items.lock().unwrap();
        Ok(items.iter().filter(|i| ids.contains(&i.id)).cloned().collect())
    }

    fn insert_item(
        &self,
        _c: &Credential,
        payload: &VideoPayload,
        _media: &Path,
        progress: Progress<'_>,
    ) -> Result<String, RemoteError> {
        let title = payload.snippet.title.clone();
        self.record(format!("insert:{}", title));
        if self.fail_titles.contains(&title) {
            return Err(RemoteError::Http {
                status: 503,
                message: "backend unavailable".into(),
            });
        }
        progress(1.0);
        let mut items = self.items.lock().unwrap();
        let id = format!("remote{}", items.len() + 1);
        items.insert(
            0,
            RemoteItem {
                id: id.clone(),
                title,
                ..Default::default()
            },
        );
        Ok(id)
    }

    fn update_item(&self, _c: &Credential, id: &str, update: &MetadataUpdate) -> Result<(), RemoteError> {
        self.record(format!("update:{}", id));
        let mut items = self.items.lock().unwrap();
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        update.apply_to(item);
        Ok(())
    }

    fn replace_media(&self, _c: &Credential, id: &str, _media: &Path, progress: Progress<'_>) -> Result<(), RemoteError> {
        self.record(format!("replace:{}", id));
        progress(1.0);
        Ok(())
    }

    fn set_thumbnail(&self, _c: &Credential, id: &str, _image: &Path) -> Result<(), RemoteError> {
        self.record(format!("thumbnail:{}", id));
        Ok(())
    }

    fn insert_caption(
        &self,
        _c: &Credential,
        id: &str,
        language: &str,
        _name: &str,
        _file: &Path,
    ) -> Result<(), RemoteError> {
        self.record(format!("caption:{}:{}", id, language));
        Ok(())
    }

    fn delete_item(&self, _c: &Credential, id: &str) -> Result<(), RemoteError> {
        self.record(format!("delete:{}", id));
        self.items.lock().unwrap().retain(|i| i.id != id);
        Ok(())
    }
}

pub fn metadata_json(title: &str, privacy: &str) -> String {
    format!(
        r#"{{"snippet": {{"title": "{}", "description": "About {}"}}, "status": {{"privacyStatus": "{}"}}}}"#,
        title, title, privacy
    )
}

/// Write a file and pin its modification time `age_secs` into the past
pub fn write_aged(path: &Path, content: &str, age_secs: u64) -> PathBuf {
    fs::write(path, content).unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs)).unwrap();
    path.to_path_buf()
}

pub const PROFILES_YAML: &str = r#"
public:
  description: Public release
  default_selected: true
  status:
    privacyStatus: public
subtitled:
  description: Unlisted with captions
  requires_srt: true
  status:
    privacyStatus: unlisted
"#;

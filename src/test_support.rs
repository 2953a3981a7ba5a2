//! In-memory fakes for unit tests

use std::path::Path;
use std::sync::Mutex;

use crate::error::{AuthError, RemoteError};
use crate::metadata::PrivacyStatus;
use crate::payload::VideoPayload;
use crate::remote::{AuthProvider, Credential, MetadataUpdate, Progress, RemoteItem, RemoteMediaService};

pub struct FakeAuth {
    pub fail: bool,
}

impl AuthProvider for FakeAuth {
    fn authenticate(&self) -> Result<Credential, AuthError> {
        if self.fail {
            Err(AuthError::Refresh("token revoked".into()))
        } else {
            Ok(Credential::new("fake-token"))
        }
    }
}

#[derive(Default)]
pub struct FakeState {
    /// Newest first
    pub items: Vec<RemoteItem>,
    pub next_id: usize,
    pub fail_insert_titles: Vec<String>,
    pub fail_captions: bool,
    pub fail_thumbnails: bool,
    pub fail_replace: bool,
    pub calls: Vec<String>,
    pub payloads: Vec<VideoPayload>,
}

#[derive(Default)]
pub struct FakeService {
    pub state: Mutex<FakeState>,
}

impl FakeService {
    pub fn with_items(items: Vec<RemoteItem>) -> Self {
        let service = Self::default();
        service.state.lock().unwrap().items = items;
        service
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn item(&self, id: &str) -> Option<RemoteItem> {
        self.state.lock().unwrap().items.iter().find(|i| i.id == id).cloned()
    }
}

impl RemoteMediaService for FakeService {
    fn list_my_items(&self, _c: &Credential, max_results: u32) -> Result<Vec<RemoteItem>, RemoteError> {
        let state = self.state.lock().unwrap();
        Ok(state.items.iter().take(max_results as usize).cloned().collect())
    }

    fn get_items(&self, _c: &Credential, ids: &[String]) -> Result<Vec<RemoteItem>, RemoteError> {
        let state = self.state.lock().unwrap();
        Ok(state.items.iter().filter(|i| ids.contains(&i.id)).cloned().collect())
    }

    fn insert_item(
        &self,
        _c: &Credential,
        payload: &VideoPayload,
        _media: &Path,
        progress: Progress<'_>,
    ) -> Result<String, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("insert:{}", payload.snippet.title));
        if state.fail_insert_titles.contains(&payload.snippet.title) {
            return Err(RemoteError::Http {
                status: 500,
                message: "backend error".into(),
            });
        }
        progress(0.5);
        progress(1.0);
        state.next_id += 1;
        let id = format!("vid{}", state.next_id);
        let item = RemoteItem {
            id: id.clone(),
            title: payload.snippet.title.clone(),
            description: payload.snippet.description.clone(),
            privacy_status: payload.privacy_status().and_then(PrivacyStatus::parse),
            ..Default::default()
        };
        state.items.insert(0, item);
        state.payloads.push(payload.clone());
        Ok(id)
    }

    fn update_item(&self, _c: &Credential, id: &str, update: &MetadataUpdate) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("update:{}", id));
        let item = state
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        update.apply_to(item);
        Ok(())
    }

    fn replace_media(&self, _c: &Credential, id: &str, _media: &Path, progress: Progress<'_>) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("replace:{}", id));
        if state.fail_replace {
            return Err(RemoteError::Http {
                status: 403,
                message: "forbidden".into(),
            });
        }
        progress(1.0);
        Ok(())
    }

    fn set_thumbnail(&self, _c: &Credential, id: &str, _image: &Path) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("thumbnail:{}", id));
        if state.fail_thumbnails {
            return Err(RemoteError::Transport("connection reset".into()));
        }
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
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("caption:{}:{}", id, language));
        if state.fail_captions {
            return Err(RemoteError::Http {
                status: 400,
                message: "invalid caption".into(),
            });
        }
        Ok(())
    }

    fn delete_item(&self, _c: &Credential, id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete:{}", id));
        state.items.retain(|i| i.id != id);
        Ok(())
    }
}

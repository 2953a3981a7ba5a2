//! Persisted local state: favorites, profile preferences and the source map
//!
//! Every file is read and written as a whole document. A missing or corrupt
//! file reads as empty; the tool is single-instance so no locking is done.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helper_functions::Utils;

/// Whole-document JSON file
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, falling back to the default if missing or unreadable
    pub fn load<T: DeserializeOwned + Default>(&self) -> T {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", self.path.display(), e);
                    T::default()
                }
            },
            Err(e) => {
                log::debug!("{} not found or unreadable: {}. Using defaults.", self.path.display(), e);
                T::default()
            }
        }
    }

    /// Save the document as pretty JSON, creating the parent directory
    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| format!("Failed to serialize {}: {}", self.path.display(), e))?;
        std::fs::write(&self.path, json)
            .map_err(|e| format!("Failed to write {}: {}", self.path.display(), e))?;
        log::debug!("Saved {}", self.path.display());
        Ok(())
    }

    /// Load, mutate and save in one step
    pub fn update<T, F>(&self, mutate: F) -> Result<T, String>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T),
    {
        let mut value: T = self.load();
        mutate(&mut value);
        self.save(&value)?;
        Ok(value)
    }
}

/// Selection map for one video
pub type ProfileSelection = BTreeMap<String, bool>;

/// Per-video profile selections keyed by the video's file stem
#[derive(Debug, Clone)]
pub struct ProfilePreferences {
    store: JsonStore,
    entries: BTreeMap<String, ProfileSelection>,
}

impl ProfilePreferences {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let store = JsonStore::new(path);
        let entries = store.load();
        Self { store, entries }
    }

    fn key(video_path: &Path) -> String {
        Utils::get_file_stem(video_path)
    }

    pub fn get(&self, video_path: &Path) -> Option<&ProfileSelection> {
        self.entries.get(&Self::key(video_path))
    }

    /// Remember a selection and write the whole file
    pub fn remember(&mut self, video_path: &Path, selection: &ProfileSelection) -> Result<(), String> {
        self.entries.insert(Self::key(video_path), selection.clone());
        self.store.save(&self.entries)
    }
}

/// A quick-access directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub label: String,
    pub path: String,
}

/// Favorite directories stored as a list of `{label, path}`
#[derive(Debug, Clone)]
pub struct Favorites {
    store: JsonStore,
}

impl Favorites {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    /// Stored favorites; malformed entries are dropped
    pub fn load(&self) -> Vec<Favorite> {
        let raw: Vec<Value> = self.store.load();
        raw.into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect()
    }

    /// Stored favorites, or the default set when none are stored
    pub fn load_or_default(&self) -> Vec<Favorite> {
        let stored = self.load();
        if stored.is_empty() {
            Self::defaults()
        } else {
            stored
        }
    }

    /// Add a favorite or update the path of an existing label
    pub fn add(&self, label: &str, path: &str) -> Result<(), String> {
        let mut favorites = self.load();
        match favorites.iter_mut().find(|f| f.label == label) {
            Some(existing) => existing.path = path.to_string(),
            None => favorites.push(Favorite {
                label: label.to_string(),
                path: path.to_string(),
            }),
        }
        self.store.save(&favorites)
    }

    pub fn remove(&self, label: &str) -> Result<(), String> {
        let mut favorites = self.load();
        favorites.retain(|f| f.label != label);
        self.store.save(&favorites)
    }

    pub fn defaults() -> Vec<Favorite> {
        let home = dirs::home_dir().unwrap_or_default();
        [("Home", home.clone()), ("Videos", home.join("Videos")), ("Downloads", home.join("Downloads"))]
            .into_iter()
            .map(|(label, path)| Favorite {
                label: label.to_string(),
                path: path.to_string_lossy().into_owned(),
            })
            .collect()
    }
}

/// Remote id to local source directory
#[derive(Debug, Clone)]
pub struct SourceMap {
    store: JsonStore,
}

impl SourceMap {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    /// Record where an upload came from
    pub fn update(&self, remote_id: &str, directory: &Path) -> Result<(), String> {
        self.store
            .update(|map: &mut BTreeMap<String, String>| {
                map.insert(remote_id.to_string(), directory.to_string_lossy().into_owned());
            })
            .map(|_| ())
    }

    pub fn get(&self, remote_id: &str) -> Option<PathBuf> {
        let map: BTreeMap<String, String> = self.store.load();
        map.get(remote_id).map(PathBuf::from)
    }
}

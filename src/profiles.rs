//! Upload profiles loaded from `profiles.yaml`
//!
//! A profile bundles target status settings with requirement flags. The
//! catalog is loaded once, fails on the first malformed entry and is
//! read-only afterwards.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::video_item::VideoItem;

/// Named upload configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub description: String,
    pub requires_json: bool,
    pub requires_srt: bool,
    pub default_selected: bool,
    /// Merged into the payload's status, winning over metadata
    pub status_overrides: Map<String, Value>,
    /// Snippet keys the profile explicitly declares
    pub snippet_overrides: Map<String, Value>,
}

impl Profile {
    /// Profile with the default requirement flags and no overrides
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            requires_json: true,
            requires_srt: false,
            default_selected: false,
            status_overrides: Map::new(),
            snippet_overrides: Map::new(),
        }
    }

    /// The first unmet requirement for a video, if any
    pub fn unmet_requirement(&self, video: &VideoItem) -> Option<Requirement> {
        if self.requires_json && !video.has_metadata() {
            Some(Requirement::Metadata)
        } else if self.requires_srt && !video.has_subtitle() {
            Some(Requirement::Subtitle)
        } else {
            None
        }
    }

    pub fn can_select(&self, video: &VideoItem) -> bool {
        self.unmet_requirement(video).is_none()
    }
}

/// Companion a profile can demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Metadata,
    Subtitle,
}

/// Ordered, read-only set of profiles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileCatalog {
    profiles: Vec<Profile>,
}

impl ProfileCatalog {
    pub fn new(profiles: Vec<Profile>) -> Self {
        Self { profiles }
    }

    /// Load the catalog from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
                hint: "Create a profiles.yaml mapping profile names to {description, status, snippet} \
                       or set YTUPLOADER_PROFILES_PATH."
                    .to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml_str(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            ConfigError::Empty(_) => ConfigError::Empty(path.to_path_buf()),
            other => other,
        })?;
        log::info!(
            "Loaded {} profiles from {}: {}",
            catalog.profiles.len(),
            path.display(),
            catalog.names().join(", ")
        );
        Ok(catalog)
    }

    /// Parse a catalog document; any malformed entry rejects the whole document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            path: Default::default(),
            message,
        };

        let document: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
        let entries = match document {
            serde_yaml::Value::Null => return Err(ConfigError::Empty(Default::default())),
            serde_yaml::Value::Mapping(map) if map.is_empty() => {
                return Err(ConfigError::Empty(Default::default()))
            }
            serde_yaml::Value::Mapping(map) => map,
            _ => return Err(parse_error("expected a mapping of profile names".to_string())),
        };

        let mut profiles = Vec::with_capacity(entries.len());
        for (key, body) in entries {
            let name = match key {
                serde_yaml::Value::String(name) => name,
                other => {
                    return Err(parse_error(format!("profile names must be strings, got {:?}", other)))
                }
            };
            profiles.push(Self::parse_profile(name, body)?);
        }
        Ok(Self { profiles })
    }

    fn parse_profile(name: String, body: serde_yaml::Value) -> Result<Profile, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidProfile {
            name: name.clone(),
            reason: reason.to_string(),
        };
        let body: Value = serde_json::to_value(&body).map_err(|e| invalid(&e.to_string()))?;
        let fields = body.as_object().ok_or_else(|| invalid("must be a mapping"))?;

        let description = match fields.get("description") {
            Some(Value::String(text)) => text.clone(),
            Some(_) => return Err(invalid("'description' must be a string")),
            None => return Err(invalid("'description' is required")),
        };

        let flag = |key: &str, default: bool| match fields.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(value)) => Ok(*value),
            Some(_) => Err(invalid(&format!("'{}' must be a boolean", key))),
        };
        let section = |key: &str| match fields.get(key) {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(invalid(&format!("'{}' must be a mapping", key))),
        };

        Ok(Profile {
            requires_json: flag("requires_json", true)?,
            requires_srt: flag("requires_srt", false)?,
            default_selected: flag("default_selected", false)?,
            status_overrides: section("status")?,
            snippet_overrides: section("snippet")?,
            description,
            name,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Like [`get`](Self::get) but reports the available names on a miss
    pub fn require(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.get(name).ok_or_else(|| ConfigError::UnknownProfile {
            name: name.to_string(),
            available: self.names().join(", "),
        })
    }

    /// Profile names in file order
    pub fn names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Initial selection state for every profile: selectable and selected by default
    pub fn eligible_profiles(&self, video: &VideoItem) -> BTreeMap<String, bool> {
        self.profiles
            .iter()
            .map(|p| (p.name.clone(), p.can_select(video) && p.default_selected))
            .collect()
    }

    /// Whether a profile can be selected for a video; unknown names never can
    pub fn can_select(&self, name: &str, video: &VideoItem) -> bool {
        self.get(name).map(|p| p.can_select(video)).unwrap_or(false)
    }

    /// Drop selections that are no longer satisfiable, keeping the rest
    pub fn mask_selection(&self, video: &VideoItem, selection: &BTreeMap<String, bool>) -> BTreeMap<String, bool> {
        self.profiles
            .iter()
            .map(|p| {
                let wanted = selection.get(&p.name).copied().unwrap_or(false);
                (p.name.clone(), wanted && p.can_select(video))
            })
            .collect()
    }
}

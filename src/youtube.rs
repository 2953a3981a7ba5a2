//! Blocking HTTP client for the YouTube Data API
//!
//! Implements [`RemoteMediaService`], including the resumable upload session
//! used for video media and caption tracks.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::{APP_VERSION, UPLOAD_CHUNK_SIZE};
use crate::error::RemoteError;
use crate::metadata::PrivacyStatus;
use crate::payload::VideoPayload;
use crate::remote::{Credential, MetadataUpdate, Progress, RemoteItem, RemoteMediaService};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";
const MAX_PAGE_SIZE: u32 = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const SNIPPET_KEYS: &[&str] = &["title", "description", "tags", "categoryId", "defaultLanguage"];
const STATUS_KEYS: &[&str] = &[
    "privacyStatus",
    "embeddable",
    "publishAt",
    "selfDeclaredMadeForKids",
    "license",
    "publicStatsViewable",
];

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiVideo {
    id: String,
    #[serde(default)]
    snippet: ApiSnippet,
    #[serde(default)]
    status: ApiStatus,
    #[serde(default)]
    statistics: ApiStatistics,
    #[serde(default)]
    content_details: ApiContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    category_id: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: BTreeMap<String, ApiThumbnail>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiThumbnail {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStatus {
    privacy_status: Option<String>,
    publish_at: Option<String>,
    embeddable: Option<bool>,
    made_for_kids: Option<bool>,
    self_declared_made_for_kids: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStatistics {
    view_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiContentDetails {
    caption: Option<String>,
}

impl From<ApiVideo> for RemoteItem {
    fn from(video: ApiVideo) -> Self {
        let thumbnail_url = ["maxres", "standard", "high", "medium", "default"]
            .iter()
            .filter_map(|key| video.snippet.thumbnails.get(*key))
            .map(|t| t.url.clone())
            .find(|url| !url.is_empty());
        RemoteItem {
            id: video.id,
            title: video.snippet.title,
            description: video.snippet.description,
            tags: video.snippet.tags,
            category_id: video.snippet.category_id,
            privacy_status: video.status.privacy_status.as_deref().and_then(PrivacyStatus::parse),
            publish_at: video.status.publish_at,
            made_for_kids: video.status.self_declared_made_for_kids.or(video.status.made_for_kids),
            embeddable: video.status.embeddable,
            published_at: video.snippet.published_at,
            view_count: video
                .statistics
                .view_count
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            has_captions: video.content_details.caption.as_deref() == Some("true"),
            thumbnail_url,
        }
    }
}

/// YouTube Data API v3 over blocking reqwest
pub struct YouTubeService {
    http: Client,
    api_base: String,
    upload_base: String,
}

impl YouTubeService {
    pub fn new() -> Result<Self, RemoteError> {
        Self::with_base_urls(API_BASE, UPLOAD_BASE)
    }

    /// Service against other endpoints, e.g. a local test server
    pub fn with_base_urls(api_base: &str, upload_base: &str) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .user_agent(format!("ytuploader/{}", APP_VERSION))
            .redirect(reqwest::redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
        })
    }

    fn authorized(&self, builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
        builder.bearer_auth(&credential.access_token)
    }

    fn get_json(&self, credential: &Credential, url: &str, query: &[(&str, String)]) -> Result<Value, RemoteError> {
        let response = self.authorized(self.http.get(url).query(query), credential).send()?;
        Ok(check(response)?.json()?)
    }

    /// Open a resumable session and return its upload URL
    fn start_session(
        &self,
        credential: &Credential,
        url: &str,
        body: &Value,
        media_type: &str,
        media_len: u64,
    ) -> Result<String, RemoteError> {
        let response = self
            .authorized(self.http.post(url), credential)
            .header("X-Upload-Content-Type", media_type)
            .header("X-Upload-Content-Length", media_len.to_string())
            .json(body)
            .send()?;
        let response = check(response)?;
        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Decode("resumable session without Location header".to_string()))
    }

    /// PUT the file in chunks; returns the final resource
    fn upload_chunks(
        &self,
        credential: &Credential,
        session_url: &str,
        media: &Path,
        progress: Progress<'_>,
    ) -> Result<Value, RemoteError> {
        let mut file = File::open(media)?;
        let total = file.metadata()?.len();

        if total == 0 {
            let response = self
                .authorized(self.http.put(session_url), credential)
                .header(CONTENT_RANGE, "bytes */0")
                .header(CONTENT_LENGTH, 0)
                .send()?;
            progress(1.0);
            return Ok(check(response)?.json()?);
        }

        let mut offset: u64 = 0;
        let mut buffer = vec![0u8; UPLOAD_CHUNK_SIZE];
        loop {
            let read = read_full(&mut file, &mut buffer)?;
            if read == 0 {
                return Err(RemoteError::Decode(format!(
                    "upload ended at byte {} of {} without a final response",
                    offset, total
                )));
            }
            let end = offset + read as u64 - 1;
            let response = self
                .authorized(self.http.put(session_url), credential)
                .header(CONTENT_RANGE, format!("bytes {}-{}/{}", offset, end, total))
                .body(buffer[..read].to_vec())
                .send()?;

            match response.status() {
                StatusCode::PERMANENT_REDIRECT => {
                    let acknowledged = response
                        .headers()
                        .get(RANGE)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_range_end)
                        .map(|last| last + 1)
                        .unwrap_or(end + 1);
                    if acknowledged != end + 1 {
                        log::debug!("Server acknowledged {} of {} bytes, rewinding", acknowledged, end + 1);
                        std::io::Seek::seek(&mut file, std::io::SeekFrom::Start(acknowledged))?;
                    }
                    offset = acknowledged;
                    progress(offset as f64 / total as f64);
                }
                _ => {
                    let value = check(response)?.json()?;
                    progress(1.0);
                    return Ok(value);
                }
            }
        }
    }
}

impl RemoteMediaService for YouTubeService {
    fn list_my_items(&self, credential: &Credential, max_results: u32) -> Result<Vec<RemoteItem>, RemoteError> {
        let channels = self.get_json(
            credential,
            &format!("{}/channels", self.api_base),
            &[("part", "contentDetails".into()), ("mine", "true".into())],
        )?;
        let Some(uploads) = channels
            .pointer("/items/0/contentDetails/relatedPlaylists/uploads")
            .and_then(Value::as_str)
        else {
            return Ok(Vec::new());
        };

        let playlist = self.get_json(
            credential,
            &format!("{}/playlistItems", self.api_base),
            &[
                ("part", "contentDetails".into()),
                ("playlistId", uploads.to_string()),
                ("maxResults", max_results.clamp(1, MAX_PAGE_SIZE).to_string()),
            ],
        )?;
        let ids: Vec<String> = playlist["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.pointer("/contentDetails/videoId").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut items = self.get_items(credential, &ids)?;
        // Keep the playlist's recency order
        items.sort_by_key(|item| ids.iter().position(|id| *id == item.id).unwrap_or(usize::MAX));
        Ok(items)
    }

    fn get_items(&self, credential: &Credential, ids: &[String]) -> Result<Vec<RemoteItem>, RemoteError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .authorized(self.http.get(format!("{}/videos", self.api_base)), credential)
            .query(&[
                ("part", "snippet,statistics,status,contentDetails".to_string()),
                ("id", ids.join(",")),
            ])
            .send()?;
        let list: ListResponse<ApiVideo> = check(response)?.json()?;
        Ok(list.items.into_iter().map(RemoteItem::from).collect())
    }

    fn insert_item(
        &self,
        credential: &Credential,
        payload: &VideoPayload,
        media: &Path,
        progress: Progress<'_>,
    ) -> Result<String, RemoteError> {
        let len = std::fs::metadata(media)?.len();
        let body = serde_json::to_value(payload).map_err(|e| RemoteError::Decode(e.to_string()))?;
        let session = self.start_session(
            credential,
            &format!("{}/videos?uploadType=resumable&part=snippet,status", self.upload_base),
            &body,
            "video/*",
            len,
        )?;
        let resource = self.upload_chunks(credential, &session, media, progress)?;
        resource["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Decode("upload response carried no id".to_string()))
    }

    fn update_item(&self, credential: &Credential, id: &str, update: &MetadataUpdate) -> Result<(), RemoteError> {
        let current = self.get_json(
            credential,
            &format!("{}/videos", self.api_base),
            &[("part", "snippet,status".into()), ("id", id.to_string())],
        )?;
        let item = current
            .pointer("/items/0")
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;

        let mut snippet = retain_keys(&item["snippet"], SNIPPET_KEYS);
        let mut status = retain_keys(&item["status"], STATUS_KEYS);
        merge_update(&mut snippet, &mut status, update);

        let response = self
            .authorized(
                self.http.put(format!("{}/videos?part=snippet,status", self.api_base)),
                credential,
            )
            .json(&json!({"id": id, "snippet": snippet, "status": status}))
            .send()?;
        check(response)?;
        log::info!("Updated metadata of {}", id);
        Ok(())
    }

    fn replace_media(
        &self,
        credential: &Credential,
        id: &str,
        media: &Path,
        progress: Progress<'_>,
    ) -> Result<(), RemoteError> {
        let len = std::fs::metadata(media)?.len();
        let session = self.start_session(
            credential,
            &format!("{}/videos?uploadType=resumable&part=id", self.upload_base),
            &json!({ "id": id }),
            "video/*",
            len,
        )?;
        self.upload_chunks(credential, &session, media, progress)?;
        log::info!("Replaced media of {}", id);
        Ok(())
    }

    fn set_thumbnail(&self, credential: &Credential, id: &str, image: &Path) -> Result<(), RemoteError> {
        let bytes = std::fs::read(image)?;
        let mime = match image.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("png") => "image/png",
            _ => "image/jpeg",
        };
        let response = self
            .authorized(self.http.post(format!("{}/thumbnails/set", self.upload_base)), credential)
            .query(&[("videoId", id), ("uploadType", "media")])
            .header(CONTENT_TYPE, mime)
            .body(bytes)
            .send()?;
        check(response)?;
        Ok(())
    }

    fn insert_caption(
        &self,
        credential: &Credential,
        id: &str,
        language: &str,
        name: &str,
        file: &Path,
    ) -> Result<(), RemoteError> {
        let len = std::fs::metadata(file)?.len();
        let body = json!({
            "snippet": {"videoId": id, "language": language, "name": name, "isDraft": false}
        });
        let session = self.start_session(
            credential,
            &format!("{}/captions?uploadType=resumable&part=snippet", self.upload_base),
            &body,
            "application/x-subrip",
            len,
        )?;
        self.upload_chunks(credential, &session, file, &mut |_| {})?;
        Ok(())
    }

    fn delete_item(&self, credential: &Credential, id: &str) -> Result<(), RemoteError> {
        let response = self
            .authorized(self.http.delete(format!("{}/videos", self.api_base)), credential)
            .query(&[("id", id)])
            .send()?;
        check(response)?;
        log::info!("Deleted {}", id);
        Ok(())
    }
}

/// Map non-success responses into [`RemoteError`]
fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(message));
    }
    Err(RemoteError::Http {
        status: status.as_u16(),
        message,
    })
}

fn read_full(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Last byte index from a `Range: bytes=0-N` header
fn parse_range_end(header: &str) -> Option<u64> {
    header.trim().strip_prefix("bytes=")?.split('-').nth(1)?.parse().ok()
}

fn retain_keys(value: &Value, keys: &[&str]) -> Map<String, Value> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(k, _)| keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn merge_update(snippet: &mut Map<String, Value>, status: &mut Map<String, Value>, update: &MetadataUpdate) {
    if let Some(title) = &update.title {
        snippet.insert("title".into(), json!(title));
    }
    if let Some(description) = &update.description {
        snippet.insert("description".into(), json!(description));
    }
    if let Some(tags) = &update.tags {
        snippet.insert("tags".into(), json!(tags));
    }
    if let Some(category) = &update.category_id {
        snippet.insert("categoryId".into(), json!(category));
    }
    if let Some(privacy) = update.privacy_status {
        status.insert("privacyStatus".into(), json!(privacy.as_str()));
    }
    match &update.publish_at {
        Some(Some(at)) => {
            status.insert("publishAt".into(), json!(at));
        }
        Some(None) => {
            status.remove("publishAt");
        }
        None => {}
    }
    if let Some(kids) = update.made_for_kids {
        status.insert("selfDeclaredMadeForKids".into(), json!(kids));
    }
    if let Some(embeddable) = update.embeddable {
        status.insert("embeddable".into(), json!(embeddable));
    }
}

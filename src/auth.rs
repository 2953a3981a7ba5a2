//! OAuth authorization for the platform API
//!
//! Reads the installed-app client from `client_secrets.json`, reuses the
//! cached token while it is valid, refreshes it once when it expired and
//! otherwise runs the loopback authorization flow in the browser.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::helper_functions::Utils;
use crate::remote::{AuthProvider, Credential};

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/youtube.upload",
    "https://www.googleapis.com/auth/youtube",
    "https://www.googleapis.com/auth/youtube.force-ssl",
];

const CALLBACK_PORT: u16 = 8080;
const FLOW_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Remediation shown when the client secrets file is missing
pub fn client_secrets_hint(path: &Path) -> String {
    format!(
        "Create OAuth credentials in the Google Cloud Console:\n\
         1. Open https://console.cloud.google.com/apis/credentials\n\
         2. Create a project (if you have none yet)\n\
         3. Enable the YouTube Data API v3\n\
         4. Create an OAuth client of type 'Desktop app'\n\
         5. Download the client secrets JSON\n\
         6. Save it as: {}\n\n\
         Or point YOUTUBE_CLIENT_SECRETS_PATH at the file.",
        path.display()
    )
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ClientSecrets {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        if !path.is_file() {
            return Err(AuthError::MissingClientSecrets {
                path: path.to_path_buf(),
                hint: client_secrets_hint(path),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let invalid = |message: String| AuthError::InvalidClientSecrets {
            path: path.to_path_buf(),
            message,
        };
        let file: ClientSecretsFile = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| invalid("expected an 'installed' or 'web' client".to_string()))
    }

    fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn auth_uri(&self) -> &str {
        self.auth_uri.as_deref().unwrap_or(DEFAULT_AUTH_URI)
    }
}

/// Token as persisted in `token.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    fn credential(&self) -> Credential {
        Credential {
            access_token: self.access_token.clone(),
            expires_at: self.expires_at,
        }
    }

    fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!("Ignoring unreadable token file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn save(&self, path: &Path) {
        let result = path
            .parent()
            .map(std::fs::create_dir_all)
            .unwrap_or(Ok(()))
            .map_err(|e| e.to_string())
            .and_then(|_| serde_json::to_string_pretty(self).map_err(|e| e.to_string()))
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        match result {
            Ok(()) => log::info!("Token saved to {}", path.display()),
            Err(e) => log::warn!("Failed to save token to {}: {}", path.display(), e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Installed-app OAuth provider with a cached, file-backed token
pub struct OAuthTokenProvider {
    client_secrets: PathBuf,
    token_path: PathBuf,
    http: reqwest::blocking::Client,
    cached: Mutex<Option<StoredToken>>,
}

impl OAuthTokenProvider {
    pub fn new(client_secrets: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secrets: client_secrets.into(),
            token_path: token_path.into(),
            http: reqwest::blocking::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Check the client secrets without contacting the platform
    pub fn check_prerequisites(&self) -> Result<(), AuthError> {
        ClientSecrets::load(&self.client_secrets).map(|_| ())
    }

    fn refresh(&self, secrets: &ClientSecrets, refresh_token: &str) -> Result<StoredToken, AuthError> {
        let response = self
            .http
            .post(secrets.token_uri())
            .form(&[
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .map_err(|e| AuthError::Refresh(e.to_string()))?;
        let token = read_token_response(response).map_err(AuthError::Refresh)?;
        Ok(StoredToken {
            // Refresh responses usually omit the refresh token
            refresh_token: token.refresh_token.or_else(|| Some(refresh_token.to_string())),
            ..token
        })
    }

    fn run_flow(&self, secrets: &ClientSecrets) -> Result<StoredToken, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", CALLBACK_PORT))
            .map_err(|e| AuthError::Flow(format!("cannot listen on port {}: {}", CALLBACK_PORT, e)))?;
        let redirect_uri = format!("http://localhost:{}/", CALLBACK_PORT);
        let state = format!(
            "{:x}{:x}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            std::process::id()
        );

        let mut url = reqwest::Url::parse(secrets.auth_uri()).map_err(|e| AuthError::Flow(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &secrets.client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", &state);

        log::info!("Starting OAuth authorization in the browser");
        println!("Authorize access in your browser:\n{}", url);
        if let Err(e) = Utils::open_in_browser(url.as_str()) {
            log::warn!("Failed to open browser: {}", e);
        }

        let stream = accept_with_timeout(&listener, FLOW_TIMEOUT)?;
        let code = read_callback(stream, &state)?;

        let response = self
            .http
            .post(secrets.token_uri())
            .form(&[
                ("code", code.as_str()),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .map_err(|e| AuthError::Flow(e.to_string()))?;
        read_token_response(response).map_err(AuthError::Flow)
    }
}

impl AuthProvider for OAuthTokenProvider {
    fn authenticate(&self) -> Result<Credential, AuthError> {
        let secrets = ClientSecrets::load(&self.client_secrets)?;
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| AuthError::Flow("credential cache poisoned".to_string()))?;

        if cached.is_none() {
            *cached = StoredToken::load(&self.token_path);
        }
        if let Some(token) = cached.as_ref() {
            let credential = token.credential();
            if credential.is_valid() {
                return Ok(credential);
            }
        }

        if let Some(refresh_token) = cached.as_ref().and_then(|t| t.refresh_token.clone()) {
            log::info!("Access token expired, refreshing");
            match self.refresh(&secrets, &refresh_token) {
                Ok(token) => {
                    token.save(&self.token_path);
                    let credential = token.credential();
                    *cached = Some(token);
                    return Ok(credential);
                }
                Err(e) => log::warn!("{}", e),
            }
        }

        let token = self.run_flow(&secrets)?;
        token.save(&self.token_path);
        log::info!("Authorization successful");
        let credential = token.credential();
        *cached = Some(token);
        Ok(credential)
    }
}

fn read_token_response(response: reqwest::blocking::Response) -> Result<StoredToken, String> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(format!("HTTP {}: {}", status.as_u16(), body.trim()));
    }
    let token: TokenResponse = response.json().map_err(|e| e.to_string())?;
    Ok(StoredToken {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at: token
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
    })
}

fn accept_with_timeout(listener: &TcpListener, timeout: Duration) -> Result<TcpStream, AuthError> {
    listener.set_nonblocking(true)?;
    let started = Instant::now();
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false)?;
                return Ok(stream);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if started.elapsed() >= timeout {
                    return Err(AuthError::Flow("timed out waiting for the browser callback".to_string()));
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(AuthError::Io(e)),
        }
    }
}

fn read_callback(mut stream: TcpStream, expected_state: &str) -> Result<String, AuthError> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line)?;
    let result = parse_callback(&request_line, expected_state);

    let body = match &result {
        Ok(_) => "Authorization successful. You can close this window.",
        Err(_) => "Authorization failed. Return to the application for details.",
    };
    let _ = write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    result
}

/// Extract the authorization code from the callback's request line
pub fn parse_callback(request_line: &str, expected_state: &str) -> Result<String, AuthError> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AuthError::Flow("malformed callback request".to_string()))?;
    let url = reqwest::Url::parse(&format!("http://localhost{}", target))
        .map_err(|e| AuthError::Flow(e.to_string()))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(AuthError::Flow(format!("authorization denied: {}", value))),
            _ => {}
        }
    }
    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::Flow("state mismatch in callback".to_string()));
    }
    code.ok_or_else(|| AuthError::Flow("callback carried no authorization code".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secrets_carry_remediation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secrets.json");
        let provider = OAuthTokenProvider::new(&path, dir.path().join("token.json"));
        let err = provider.authenticate().unwrap_err();
        assert!(matches!(err, AuthError::MissingClientSecrets { .. }));
        assert!(err.to_string().contains("YouTube Data API v3"));
    }

    #[test]
    fn valid_cached_token_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("client_secrets.json");
        std::fs::write(&secrets, r#"{"installed": {"client_id": "id", "client_secret": "s"}}"#).unwrap();
        let token_path = dir.path().join("token.json");
        let token = StoredToken {
            access_token: "abc".into(),
            refresh_token: Some("r".into()),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        };
        std::fs::write(&token_path, serde_json::to_string(&token).unwrap()).unwrap();

        let provider = OAuthTokenProvider::new(&secrets, &token_path);
        assert_eq!(provider.authenticate().unwrap().access_token, "abc");
    }

    #[test]
    fn secrets_without_client_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("client_secrets.json");
        std::fs::write(&secrets, "{}").unwrap();
        assert!(matches!(
            ClientSecrets::load(&secrets),
            Err(AuthError::InvalidClientSecrets { .. })
        ));
    }

    #[test]
    fn callback_parsing_checks_state() {
        let code = parse_callback("GET /?state=xyz&code=4%2Fabc HTTP/1.1\r\n", "xyz").unwrap();
        assert_eq!(code, "4/abc");
        assert!(parse_callback("GET /?state=other&code=c HTTP/1.1", "xyz").is_err());
        assert!(parse_callback("GET /?error=access_denied HTTP/1.1", "xyz").is_err());
    }
}

use std::time::Duration;

use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::auth::{Auth, Token};
use crate::error::{Result, RundeckError};

use super::login;

pub(super) const USER_AGENT: &str = concat!("rundeck-job/", env!("CARGO_PKG_VERSION"));
pub(super) const SESSION_COOKIE: &str = "JSESSIONID";
const AUTH_TOKEN_HEADER: &str = "X-Rundeck-Auth-Token";
const JSON: &str = "application/json";
const SNIPPET_LEN: usize = 200;

/// Connection knobs that are not part of the credential.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Rundeck API version used in `/api/{version}`
    pub api_version: u32,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Timeout for the form login request
    pub login_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_version: 18,
            insecure: false,
            login_timeout: Duration::from_secs(3),
        }
    }
}

enum Credential {
    Token(Token),
    Session(String),
}

/// Authenticated session against one Rundeck server.
pub struct RundeckClient {
    client: Client,
    api_url: Url,
    credential: Credential,
}

impl RundeckClient {
    /// Opens a session.
    ///
    /// Token credentials are used as-is and never trigger a login. A
    /// username/password pair is exchanged exactly once for a session cookie
    /// which every later request reuses.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an http(s) URL, the HTTP client
    /// cannot be built, or the login is rejected.
    pub async fn connect(base_url: &str, auth: Auth, settings: &ClientSettings) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;

        let api_url = base_url
            .join(&format!("api/{}/", settings.api_version))
            .map_err(|e| RundeckError::Config(format!("Invalid API base URL: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(settings.insecure)
            .build()
            .map_err(|e| RundeckError::Config(format!("Failed to create HTTP client: {e}")))?;

        let credential = match auth {
            Auth::Token(token) => Credential::Token(token),
            Auth::Login { username, password } => {
                let session =
                    login::authenticate(&base_url, &username, &password, settings).await?;
                Credential::Session(session)
            }
        };

        debug!("Using Rundeck API at {api_url}");

        Ok(Self {
            client,
            api_url,
            credential,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Builds `{api_url}/{segments...}`, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| RundeckError::Config(format!("Invalid API URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends one request and returns whatever came back, without judging it.
    pub async fn request(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Payload> {
        debug!("{method} {url}");

        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON);

        request = match &self.credential {
            Credential::Token(token) => request.header(AUTH_TOKEN_HEADER, token.as_str()),
            Credential::Session(id) => request.header(COOKIE, format!("{SESSION_COOKIE}={id}")),
        };

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let raw = response.bytes().await?.to_vec();

        Ok(Payload::new(status, raw))
    }

    pub async fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Payload> {
        let mut url = self.endpoint(segments)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        self.request(Method::GET, url, None).await?.into_checked()
    }

    pub async fn post(&self, segments: &[&str], body: Option<&Value>) -> Result<Payload> {
        let url = self.endpoint(segments)?;
        self.request(Method::POST, url, body).await?.into_checked()
    }
}

/// A decoded response body.
///
/// The raw bytes are always kept; `json` is set when they parse as JSON.
#[derive(Debug, Clone)]
pub struct Payload {
    status: StatusCode,
    raw: Vec<u8>,
    json: Option<Value>,
}

impl Payload {
    fn new(status: StatusCode, raw: Vec<u8>) -> Self {
        let json = serde_json::from_slice(&raw).ok();
        Self { status, raw, json }
    }

    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }

    /// The `errorCode`/`message` pair Rundeck embeds in failed responses.
    pub fn server_error(&self) -> Option<RundeckError> {
        let body = self.json()?.as_object()?;
        let code = body.get("errorCode")?;

        Some(RundeckError::Api {
            code: value_text(code),
            message: body.get("message").map(value_text).unwrap_or_default(),
        })
    }

    fn into_checked(self) -> Result<Self> {
        if let Some(err) = self.server_error() {
            return Err(err);
        }

        if !self.status.is_success() {
            let text = self.text();
            let message = if text.trim().is_empty() {
                self.status.canonical_reason().unwrap_or_default().to_string()
            } else {
                snippet(&text)
            };
            return Err(RundeckError::Api {
                code: self.status.as_u16().to_string(),
                message,
            });
        }

        Ok(self)
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        match self.json {
            Some(json) => Ok(serde_json::from_value(json)?),
            None => Err(RundeckError::UnexpectedResponse(format!(
                "expected JSON, got: {}",
                snippet(&self.text())
            ))),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn snippet(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(SNIPPET_LEN) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).map_err(|e| RundeckError::Config(format!("Invalid base URL: {e}")))?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(RundeckError::Config(format!(
            "Invalid base URL: {base_url} is not an http(s) URL"
        )));
    }

    // Treat the last path segment as a directory so a context path survives joins.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

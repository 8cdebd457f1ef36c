use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::{fmt, time::Duration};
use tracing::debug;

use super::track::Track;
use crate::error::{CiderError, Result};

/// Where Cider's RPC server listens out of the box.
pub const DEFAULT_API_URL: &str = "http://localhost:10767";

/// Connect and read timeout applied to every call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Header Cider reads the app token from.
pub const TOKEN_HEADER: &str = "apptoken";

pub const ACTIVE_PATH: &str = "/api/v1/playback/active";
pub const IS_PLAYING_PATH: &str = "/api/v1/playback/is-playing";
pub const NOW_PLAYING_PATH: &str = "/api/v1/playback/now-playing";

/// Connection parameters for one Cider instance.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub require_token: bool,
}

impl ConnectionSettings {
    pub fn new(base_url: impl Into<String>, token: Option<String>, require_token: bool) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: if base_url.trim().is_empty() {
                DEFAULT_API_URL.to_string()
            } else {
                base_url
            },
            token,
            require_token,
        }
    }

    /// Token to send, if any. A configured token stays inert unless
    /// `require_token` is set.
    pub fn auth_token(&self) -> Option<&str> {
        if !self.require_token {
            return None;
        }
        self.token.as_deref().filter(|token| !token.is_empty())
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL, None, false)
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("require_token", &self.require_token)
            .finish()
    }
}

/// The three read calls one poll cycle makes against the playback service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// `Ok(())` when the server answers the active check with 200 or 204.
    async fn is_active(&self, conn: &ConnectionSettings) -> Result<()>;

    async fn is_playing(&self, conn: &ConnectionSettings) -> Result<bool>;

    async fn now_playing(&self, conn: &ConnectionSettings) -> Result<Track>;
}

/// HTTP client for Cider's RPC API
#[derive(Debug, Clone)]
pub struct CiderClient {
    client: reqwest::Client,
}

impl CiderClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .read_timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("cider-link/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    pub(crate) fn request(
        &self,
        method: Method,
        conn: &ConnectionSettings,
        path: &str,
    ) -> RequestBuilder {
        let mut request = self.client.request(method, conn.endpoint(path));
        if let Some(token) = conn.auth_token() {
            request = request.header(TOKEN_HEADER, token);
        }
        request
    }

    async fn get_ok_body(&self, conn: &ConnectionSettings, path: &str) -> Result<String> {
        let response = self.request(Method::GET, conn, path).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(CiderError::status(path, status));
        }
        Ok(response.text().await?)
    }
}

/// Success codes Cider uses for commands and the active check.
pub(crate) fn is_success(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct IsPlayingResponse {
    is_playing: bool,
}

/// Accepts the bare `true`/`false` body as well as `{"is_playing": bool}`.
pub(crate) fn parse_is_playing(body: &str) -> Result<bool> {
    let trimmed = body.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Ok(false);
    }
    serde_json::from_str::<IsPlayingResponse>(trimmed)
        .map(|response| response.is_playing)
        .map_err(|_| CiderError::InvalidBody(IS_PLAYING_PATH.to_string()))
}

#[async_trait]
impl PlaybackSource for CiderClient {
    async fn is_active(&self, conn: &ConnectionSettings) -> Result<()> {
        let response = self.request(Method::GET, conn, ACTIVE_PATH).send().await?;
        let status = response.status();
        if is_success(status) {
            Ok(())
        } else {
            Err(CiderError::status(ACTIVE_PATH, status))
        }
    }

    async fn is_playing(&self, conn: &ConnectionSettings) -> Result<bool> {
        let body = self.get_ok_body(conn, IS_PLAYING_PATH).await?;
        parse_is_playing(&body)
    }

    async fn now_playing(&self, conn: &ConnectionSettings) -> Result<Track> {
        let body = self.get_ok_body(conn, NOW_PLAYING_PATH).await?;
        debug!("📡 now-playing: {} bytes", body.len());
        Track::from_now_playing(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_only_sent_when_required() {
        let conn = ConnectionSettings::new(DEFAULT_API_URL, Some("secret".into()), false);
        assert_eq!(conn.auth_token(), None);

        let conn = ConnectionSettings::new(DEFAULT_API_URL, Some("secret".into()), true);
        assert_eq!(conn.auth_token(), Some("secret"));

        let conn = ConnectionSettings::new(DEFAULT_API_URL, Some(String::new()), true);
        assert_eq!(conn.auth_token(), None);

        let conn = ConnectionSettings::new(DEFAULT_API_URL, None, true);
        assert_eq!(conn.auth_token(), None);
    }

    #[test]
    fn test_request_carries_header_per_auth_rule() {
        let client = CiderClient::new().unwrap();

        let conn = ConnectionSettings::new(DEFAULT_API_URL, Some("secret".into()), true);
        let request = client
            .request(Method::GET, &conn, ACTIVE_PATH)
            .build()
            .unwrap();
        assert_eq!(request.headers()[TOKEN_HEADER], "secret");
        assert_eq!(
            request.url().as_str(),
            "http://localhost:10767/api/v1/playback/active"
        );

        let conn = ConnectionSettings::new(DEFAULT_API_URL, Some("secret".into()), false);
        let request = client
            .request(Method::GET, &conn, ACTIVE_PATH)
            .build()
            .unwrap();
        assert!(request.headers().get(TOKEN_HEADER).is_none());
    }

    #[test]
    fn test_endpoint_joins_trailing_slash() {
        let conn = ConnectionSettings::new("http://10.0.0.2:10767/", None, false);
        assert_eq!(
            conn.endpoint(NOW_PLAYING_PATH),
            "http://10.0.0.2:10767/api/v1/playback/now-playing"
        );
        assert_eq!(ConnectionSettings::new("  ", None, false).base_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_is_playing_body_variants() {
        assert!(parse_is_playing("true").unwrap());
        assert!(parse_is_playing("TRUE\n").unwrap());
        assert!(!parse_is_playing("false").unwrap());
        assert!(parse_is_playing(r#"{"status":"ok","is_playing":true}"#).unwrap());
        assert!(parse_is_playing("maybe").is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let conn = ConnectionSettings::new(DEFAULT_API_URL, Some("secret".into()), true);
        assert!(!format!("{conn:?}").contains("secret"));
    }
}

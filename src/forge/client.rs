use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{StatusCode, Url};
use tokio_util::sync::CancellationToken;

use crate::errors::ApiError;

const USER_AGENT_VALUE: &str = concat!("forge-archive/", env!("CARGO_PKG_VERSION"));

/// Authenticated read access to a forge REST API.
/// Real implementation: `HttpApiClient`. Tests substitute in-memory fakes.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// GET `url` and return the decoded JSON body. Anything but a 200 is an error.
    async fn get_json(&self, url: &Url) -> Result<serde_json::Value, ApiError>;
}

/// `ApiClient` backed by a single shared `reqwest::Client`.
///
/// The bearer token is installed as a default header when the client is
/// built, so callers only ever pass URLs.
pub struct HttpApiClient {
    http: reqwest::Client,
    cancel: CancellationToken,
}

impl HttpApiClient {
    pub fn new(token: &str, cancel: CancellationToken) -> anyhow::Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .context("Access token contains characters not allowed in an HTTP header")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, cancel })
    }

    async fn fetch(&self, url: &Url) -> Result<serde_json::Value, ApiError> {
        let transport = |e: reqwest::Error| ApiError::Transport {
            url: url.to_string(),
            source: Box::new(e),
        };

        let resp = self.http.get(url.clone()).send().await.map_err(transport)?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(transport)?;
        decode_body(url, &body)
    }
}

/// An empty body is a broken response, not a JSON document of the wrong shape.
fn decode_body(url: &Url, body: &[u8]) -> Result<serde_json::Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::Transport {
            url: url.to_string(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "empty response body",
            )),
        });
    }
    serde_json::from_slice(body).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn get_json(&self, url: &Url) -> Result<serde_json::Value, ApiError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled { url: url.to_string() }),
            result = self.fetch(url) => result,
        }
    }
}

/// Append path segments to the API base, whether or not it ends in `/`.
///
/// Each segment is percent-encoded, so a slug can never introduce extra path
/// components. Any query string on the base is dropped.
pub fn join_api_path(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl {
            base: base.to_string(),
            reason: "URL cannot be a base".to_string(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

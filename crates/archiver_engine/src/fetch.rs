use std::path::Path;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};

use crate::decode::decode_body;
use crate::persist::write_asset;
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Forward proxy for every request; `None` also ignores proxy environment variables.
    pub proxy: Option<String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub retry: RetryPolicy,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            redirect_limit: 5,
            max_bytes: 20 * 1024 * 1024,
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Raw body of `url`; retries are the implementation's business.
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError>;

    /// Body of `url` decoded to text.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let output = self.fetch(url).await?;
        let decoded = decode_body(&output.bytes, output.metadata.content_type.as_deref());
        if decoded.had_errors {
            engine_warn!(
                "{} decoded as {} with replacement characters",
                url,
                decoded.encoding_label
            );
        }
        Ok(decoded.text)
    }

    /// Saves `url` to `destination`. Never fails the caller: `false` means
    /// the asset is missing and the article should carry on without it.
    async fn download(&self, url: &str, destination: &Path) -> bool {
        let output = match self.fetch(url).await {
            Ok(output) => output,
            Err(err) => {
                engine_warn!("Failed to download {}: {}", url, err);
                return false;
            }
        };
        match write_asset(destination, &output.bytes).await {
            Ok(()) => {
                engine_debug!("Saved {} ({} bytes) to {:?}", url, output.bytes.len(), destination);
                true
            }
            Err(err) => {
                engine_warn!("Failed to store {} at {:?}: {}", url, destination, err);
                false
            }
        }
    }
}

/// HTTP fetcher sharing one `reqwest::Client` (and its connection pool) across requests.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = build_client(&settings)?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    async fn fetch_once(&self, url: &reqwest::Url, attempt: u32) -> Result<FetchOutput, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(declared) = response.content_length().filter(|len| *len > max_bytes) {
            return Err(too_large(max_bytes, declared));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let bytes = read_capped(response, max_bytes).await?;

        let metadata = FetchMetadata {
            original_url: url.to_string(),
            final_url,
            content_type,
            byte_len: bytes.len() as u64,
            attempts: attempt,
        };
        Ok(FetchOutput { bytes, metadata })
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, format!("{url}: {err}")))?;
        engine_debug!(
            "Fetching {} (proxy: {})",
            url,
            self.settings.proxy.as_deref().unwrap_or("none")
        );
        let parsed = &parsed;
        retry_with_policy(&self.settings.retry, url, move |attempt| async move {
            self.fetch_once(parsed, attempt).await
        })
        .await
    }
}

fn build_client(settings: &FetchSettings) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    let user_agent = HeaderValue::from_str(&settings.user_agent)
        .map_err(|err| FetchError::new(FailureKind::ClientSetup, err.to_string()))?;
    headers.insert(USER_AGENT, user_agent);
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );

    let builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit));

    let builder = match settings.proxy.as_deref() {
        Some(proxy) => {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|err| FetchError::new(FailureKind::ClientSetup, err.to_string()))?;
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|err| FetchError::new(FailureKind::ClientSetup, err.to_string()))
}

/// Streams the body, stopping as soon as it grows past `max_bytes`.
async fn read_capped(response: reqwest::Response, max_bytes: u64) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        let received = (body.len() + chunk.len()) as u64;
        if received > max_bytes {
            return Err(too_large(max_bytes, received));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        format!("{actual} bytes exceeds the {max_bytes} byte limit"),
    )
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

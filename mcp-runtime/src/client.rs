use std::fmt;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use shopping_insight_core::query::{CategoryQuery, KeywordQuery};
use shopping_insight_core::trend::TrendResponse;

pub const DEFAULT_BASE_URL: &str = "https://openapi.naver.com/v1/datalab/shopping";
pub const CLIENT_ID_ENV: &str = "NAVER_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "NAVER_CLIENT_SECRET";

const CLIENT_ID_HEADER: &str = "x-naver-client-id";
const CLIENT_SECRET_HEADER: &str = "x-naver-client-secret";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("네이버 API 인증 정보가 없습니다. 환경 변수를 확인해주세요. ({0} is not set)")]
    MissingCredential(&'static str),
    #[error("{0} contains characters that cannot be sent as an HTTP header")]
    InvalidCredential(&'static str),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failure of a single upstream call. No variant is retried.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Upstream answered with a non-2xx status
    #[error("네이버 API 오류: {status} - {body}")]
    Status { status: u16, body: Value },
    /// The request never produced a response (DNS, connect, timeout, ...)
    #[error("네이버 API 요청 중 오류 발생: {0}")]
    Transport(String),
    /// 2xx response whose body is not a trend response
    #[error("네이버 API 요청 중 오류 발생: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Upstream sub-paths, relative to the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Categories,
    CategoryDevice,
    CategoryGender,
    CategoryAge,
    Keywords,
    KeywordDevice,
    KeywordGender,
    KeywordAge,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Categories => "/categories",
            Endpoint::CategoryDevice => "/category/device",
            Endpoint::CategoryGender => "/category/gender",
            Endpoint::CategoryAge => "/category/age",
            Endpoint::Keywords => "/category/keywords",
            Endpoint::KeywordDevice => "/category/keyword/device",
            Endpoint::KeywordGender => "/category/keyword/gender",
            Endpoint::KeywordAge => "/category/keyword/age",
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Reads both credentials from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(key))
        };
        Ok(Self::new(read(CLIENT_ID_ENV)?, read(CLIENT_SECRET_ENV)?))
    }

    fn headers(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(CLIENT_ID_HEADER),
            HeaderValue::from_str(&self.client_id)
                .map_err(|_| ConfigError::InvalidCredential(CLIENT_ID_ENV))?,
        );
        let mut secret = HeaderValue::from_str(&self.client_secret)
            .map_err(|_| ConfigError::InvalidCredential(CLIENT_SECRET_ENV))?;
        secret.set_sensitive(true);
        headers.insert(HeaderName::from_static(CLIENT_SECRET_HEADER), secret);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-request timeout; `None` keeps the transport default
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

/// Naver DataLab shopping-insight client. Credential headers are fixed at
/// construction and sent with every request.
#[derive(Clone, Debug)]
pub struct ShoppingInsightClient {
    http: reqwest::Client,
    base_url: String,
}

impl ShoppingInsightClient {
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder().default_headers(credentials.headers()?);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 쇼핑인사이트 분야별 트렌드 조회
    pub async fn get_categories(&self, query: &CategoryQuery) -> Result<TrendResponse, UpstreamError> {
        self.send_request(Endpoint::Categories, query).await
    }

    /// 쇼핑인사이트 분야 내 기기별 트렌드 조회
    pub async fn get_category_by_device(
        &self,
        query: &CategoryQuery,
    ) -> Result<TrendResponse, UpstreamError> {
        self.send_request(Endpoint::CategoryDevice, query).await
    }

    /// 쇼핑인사이트 분야 내 성별 트렌드 조회
    pub async fn get_category_by_gender(
        &self,
        query: &CategoryQuery,
    ) -> Result<TrendResponse, UpstreamError> {
        self.send_request(Endpoint::CategoryGender, query).await
    }

    /// 쇼핑인사이트 분야 내 연령별 트렌드 조회
    pub async fn get_category_by_age(
        &self,
        query: &CategoryQuery,
    ) -> Result<TrendResponse, UpstreamError> {
        self.send_request(Endpoint::CategoryAge, query).await
    }

    /// 쇼핑인사이트 키워드별 트렌드 조회
    pub async fn get_keywords(&self, query: &KeywordQuery) -> Result<TrendResponse, UpstreamError> {
        self.send_request(Endpoint::Keywords, query).await
    }

    pub async fn get_keyword_by_device(
        &self,
        query: &KeywordQuery,
    ) -> Result<TrendResponse, UpstreamError> {
        self.send_request(Endpoint::KeywordDevice, query).await
    }

    pub async fn get_keyword_by_gender(
        &self,
        query: &KeywordQuery,
    ) -> Result<TrendResponse, UpstreamError> {
        self.send_request(Endpoint::KeywordGender, query).await
    }

    pub async fn get_keyword_by_age(
        &self,
        query: &KeywordQuery,
    ) -> Result<TrendResponse, UpstreamError> {
        self.send_request(Endpoint::KeywordAge, query).await
    }

    async fn send_request<B: Serialize>(
        &self,
        endpoint: Endpoint,
        body: &B,
    ) -> Result<TrendResponse, UpstreamError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(endpoint = endpoint.path(), error = %e, "upstream request failed");
                UpstreamError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(format!("Failed to read response body: {e}")))?;

        if !(200..=299).contains(&status) {
            tracing::warn!(endpoint = endpoint.path(), status, "upstream rejected request");
            return Err(UpstreamError::Status {
                status,
                body: parse_response_body(&bytes),
            });
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| UpstreamError::Decode(format!("Unexpected response body: {e}")))
    }
}

fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}

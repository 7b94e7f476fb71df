//! Signing HTTP client for the WeChat Pay API v3.

use std::sync::Arc;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
    Method, Url,
};

use crate::credentials::WechatPay2Credentials;
use crate::error::{Result, WechatPayError};
use crate::validator::ResponseValidator;
use crate::verifier::AutoRefreshingVerifier;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_USER_AGENT: &str = concat!("wxpay-rs/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
/// Transport settings for [`ApiV3Client`].
pub struct ClientConfig {
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
/// A fully read API response.
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

#[derive(Debug, Clone)]
/// How [`ApiV3Client`] authenticates responses.
pub enum ResponseValidation {
    Validator(ResponseValidator),
    /// Verify through a verifier that keeps its platform certificates current.
    AutoRefresh(Arc<AutoRefreshingVerifier>),
}

pub(crate) fn build_http_client(
    request_timeout_ms: u64,
    user_agent: &str,
) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).map_err(|error| {
            WechatPayError::InvalidConfig(format!("invalid user agent header: {error}"))
        })?,
    );
    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(std::time::Duration::from_millis(request_timeout_ms.max(1)))
        .build()?;
    Ok(client)
}

/// Signs and sends one request, returning the raw response without validating it.
pub(crate) async fn send_signed_request(
    http: &reqwest::Client,
    credentials: &WechatPay2Credentials,
    method: Method,
    url: &str,
    body: Option<&str>,
) -> Result<ApiResponse> {
    let parsed = Url::parse(url)
        .map_err(|error| WechatPayError::InvalidConfig(format!("invalid url '{url}': {error}")))?;
    let payload = body.unwrap_or_default();
    let authorization = credentials.authorization_header(
        method.as_str(),
        parsed.path(),
        parsed.query(),
        payload,
    )?;

    let mut request = http
        .request(method.clone(), parsed)
        .header(AUTHORIZATION, authorization);
    if let Some(body) = body {
        request = request
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
    }

    let response = request.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await?;
    tracing::debug!(
        method = %method,
        url,
        status = status.as_u16(),
        body_bytes = body.len(),
        "api v3 response received"
    );
    if !status.is_success() {
        return Err(WechatPayError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }
    Ok(ApiResponse {
        status: status.as_u16(),
        headers,
        body,
    })
}

#[derive(Debug, Clone)]
/// Signs every request and refuses responses whose platform signature fails.
pub struct ApiV3Client {
    http: reqwest::Client,
    credentials: WechatPay2Credentials,
    validation: ResponseValidation,
}

impl ApiV3Client {
    pub fn new(
        credentials: WechatPay2Credentials,
        validation: ResponseValidation,
        config: ClientConfig,
    ) -> Result<Self> {
        let http = build_http_client(config.request_timeout_ms, &config.user_agent)?;
        Ok(Self {
            http,
            credentials,
            validation,
        })
    }

    pub fn credentials(&self) -> &WechatPay2Credentials {
        &self.credentials
    }

    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&str>,
    ) -> Result<ApiResponse> {
        let response = send_signed_request(&self.http, &self.credentials, method, url, body).await?;
        let valid = match &self.validation {
            ResponseValidation::Validator(validator) => {
                validator.validate(&response.headers, &response.body)?
            }
            ResponseValidation::AutoRefresh(verifier) => {
                verifier
                    .validate_response(&response.headers, &response.body)
                    .await?
            }
        };
        if !valid {
            tracing::warn!(
                url,
                status = response.status,
                "rejecting response with bad platform signature"
            );
            return Err(WechatPayError::SignatureMismatch);
        }
        Ok(response)
    }

    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.execute(Method::GET, url, None).await
    }

    pub async fn post(&self, url: &str, body: &str) -> Result<ApiResponse> {
        self.execute(Method::POST, url, Some(body)).await
    }
}

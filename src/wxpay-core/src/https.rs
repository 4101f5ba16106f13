//! Signed HTTPS transport for the API v3.
//!
//! Every request is signed with the merchant credential before it is sent,
//! and every 2xx response is passed to a [`ResponseValidator`] before its
//! body is returned. Non-2xx responses are turned into
//! [`PayError::Provider`] without validation.
//!
//! ## Request headers
//!
//! - `Accept: */*`
//! - `Content-Type: application/json`
//! - `User-Agent: wxpay-rs/<version>`
//! - `Authorization: WECHATPAY2-SHA256-RSA2048 ...`

use std::sync::Arc;

use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::error::PayError;
use crate::validation::{header_value, NoopValidator, ResponseValidator, REQUEST_ID};

/// `User-Agent` sent with every request.
pub fn user_agent() -> String {
    format!("wxpay-rs/{}", env!("CARGO_PKG_VERSION"))
}

/// A validated response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    /// HTTP status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Take ownership of the body.
    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// `Request-ID` header, if present.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        header_value(&self.headers, REQUEST_ID)
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PayError::Json`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, PayError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Provider error body for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default, alias = "detail")]
    details: Option<serde_json::Value>,
}

/// HTTPS client that signs requests and validates responses.
pub struct HttpsClient {
    client: Client,
    base_url: String,
    credential: Arc<dyn Credential>,
    validator: Arc<dyn ResponseValidator>,
}

impl std::fmt::Debug for HttpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpsClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpsClient {
    /// Create a transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the base URL is invalid.
    pub fn new(
        config: &ClientConfig,
        credential: Arc<dyn Credential>,
        validator: Arc<dyn ResponseValidator>,
    ) -> Result<Self, PayError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| PayError::config(format!("Invalid base URL {base_url}: {e}")))?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| PayError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            credential,
            validator,
        })
    }

    /// API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Signed `GET`, validated with the default validator.
    ///
    /// # Errors
    ///
    /// Returns transport, provider or validation errors.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, PayError> {
        self.request(Method::GET, path, None, self.validator.as_ref())
            .await
    }

    /// Signed `GET`, validated with the given validator.
    ///
    /// # Errors
    ///
    /// Returns transport, provider or validation errors.
    pub async fn get_with(
        &self,
        path: &str,
        validator: &dyn ResponseValidator,
    ) -> Result<ApiResponse, PayError> {
        self.request(Method::GET, path, None, validator).await
    }

    /// Signed `POST` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns serialization, transport, provider or validation errors.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, PayError> {
        let body = serde_json::to_string(body)?;
        self.request(Method::POST, path, Some(body), self.validator.as_ref())
            .await
    }

    /// Signed `PUT` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns serialization, transport, provider or validation errors.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, PayError> {
        let body = serde_json::to_string(body)?;
        self.request(Method::PUT, path, Some(body), self.validator.as_ref())
            .await
    }

    /// Signed `PATCH` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns serialization, transport, provider or validation errors.
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, PayError> {
        let body = serde_json::to_string(body)?;
        self.request(Method::PATCH, path, Some(body), self.validator.as_ref())
            .await
    }

    /// Signed `DELETE` without a body.
    ///
    /// # Errors
    ///
    /// Returns transport, provider or validation errors.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, PayError> {
        self.request(Method::DELETE, path, None, self.validator.as_ref())
            .await
    }

    /// Signed `GET` of an absolute URL whose response is not signed (bill files).
    ///
    /// # Errors
    ///
    /// Returns transport or provider errors.
    pub async fn download(&self, url: &str) -> Result<ApiResponse, PayError> {
        self.request(Method::GET, url, None, &NoopValidator).await
    }

    /// Sign, send and validate one request.
    ///
    /// `path` is either an absolute URL or a path appended to the base URL.
    ///
    /// # Errors
    ///
    /// Returns transport, provider or validation errors.
    #[instrument(skip(self, body, validator), fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        validator: &dyn ResponseValidator,
    ) -> Result<ApiResponse, PayError> {
        let url = self.resolve(path)?;
        let canonical_url = canonical_url(&url);
        let body = body.unwrap_or_default();

        let authorization =
            self.credential
                .generate_authorization_header(method.as_str(), &canonical_url, &body)?;

        debug!(url = %url, "HTTPS: Sending request");
        let mut request = self
            .client
            .request(method, url.clone())
            .header(ACCEPT, "*/*")
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, authorization);
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTPS request failed");
            PayError::transport(&format!("Request to {url} failed"), &e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| PayError::transport(&format!("Failed to read response from {url}"), &e))?
            .to_vec();

        let request_id = header_value(&headers, REQUEST_ID).map(str::to_string);
        info!(
            url = %url,
            status = %status,
            request_id = request_id.as_deref().unwrap_or(""),
            "HTTPS: Response received"
        );

        if !status.is_success() {
            warn!(url = %url, status = %status, "HTTPS: Non-success status");
            return Err(provider_error(status, &body, request_id));
        }

        validator.validate(&headers, &body)?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn resolve(&self, path: &str) -> Result<Url, PayError> {
        let full = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        };
        Url::parse(&full).map_err(|e| PayError::malformed(format!("Invalid request URL {full}: {e}")))
    }
}

/// Absolute path plus query string, as signed in the canonical message.
#[must_use]
pub fn canonical_url(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn provider_error(status: StatusCode, body: &[u8], request_id: Option<String>) -> PayError {
    let parsed: Option<ProviderErrorBody> = serde_json::from_slice(body).ok();
    let (code, message, details) = match parsed {
        Some(p) => (p.code, p.message, p.details),
        None => (String::new(), String::new(), None),
    };
    PayError::Provider {
        status: status.as_u16(),
        code,
        message,
        details,
        body: String::from_utf8_lossy(body).into_owned(),
        request_id,
    }
}

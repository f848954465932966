//! HTTP client adapter shared by every gateway.
//!
//! Owns the configured `reqwest::Client` and base URL, and attaches
//! `Authorization: Bearer <token>` to each outgoing request when the token
//! store holds a credential. Failures are mapped onto [`ClientError`] and
//! returned unmodified otherwise: no retry, no logout handling here.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::storage::TokenStore;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Join a base URL and an endpoint path with exactly one slash between them
fn join_url_segments(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

/// Error payload shapes the backend is known to send
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Pull a human readable message out of an error response body
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(msg) = parsed.error.or(parsed.message) {
            if !msg.trim().is_empty() {
                return Some(msg);
            }
        }
        return None;
    }

    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A failed request together with the message the backend sent, if any
///
/// Errors built from a status code carry the canonical reason when the body
/// had nothing to say; `backend_message` tells the two cases apart.
#[derive(Debug)]
pub(crate) struct RequestFailure {
    pub error: ClientError,
    pub backend_message: Option<String>,
}

impl From<ClientError> for RequestFailure {
    fn from(error: ClientError) -> Self {
        Self {
            error,
            backend_message: None,
        }
    }
}

impl From<reqwest::Error> for RequestFailure {
    fn from(err: reqwest::Error) -> Self {
        ClientError::from(err).into()
    }
}

impl From<RequestFailure> for ClientError {
    fn from(failure: RequestFailure) -> Self {
        failure.error
    }
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Option<Duration>,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClientBuilder {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            tokens,
        }
    }

    /// Set the default timeout for requests
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build
    pub fn build(self) -> ClientResult<ApiClient> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let mut client_builder = reqwest::Client::builder().default_headers(headers);

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder
            .build()
            .map_err(|e| ClientError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(ApiClient {
            client,
            base_url: self.base_url,
            tokens: self.tokens,
        })
    }
}

/// Configured request pipeline used by the session and the task gateway
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>, tokens: Arc<dyn TokenStore>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url, tokens)
    }

    /// Build a client from validated configuration
    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenStore>) -> ClientResult<Self> {
        config.validate()?;
        Self::builder(&config.api_url, tokens)
            .with_timeout(config.request_timeout())
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Store the adapter reads the bearer token from
    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Absolute URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        join_url_segments(&self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.send(self.request(Method::GET, path), None).await?;
        Ok(response.json().await?)
    }

    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> ClientResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.request(Method::GET, path).query(query);
        let response = self.send(request, None).await?;
        Ok(response.json().await?)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        Ok(self.post_detailed(path, body).await?)
    }

    /// POST keeping the backend's own error message apart from the error
    pub(crate) async fn post_detailed<B, T>(&self, path: &str, body: &B) -> Result<T, RequestFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path).json(body);
        let response = self.send(request, None).await?;
        Ok(response.json().await?)
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::PATCH, path).json(body);
        let response = self.send(request, None).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send(self.request(Method::DELETE, path), None).await?;
        Ok(())
    }

    /// GET authenticated with an explicit token instead of the store
    pub async fn get_with_token<T: DeserializeOwned>(&self, path: &str, token: &str) -> ClientResult<T> {
        Ok(self.get_with_token_detailed(path, token).await?)
    }

    pub(crate) async fn get_with_token_detailed<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, RequestFailure> {
        let response = self.send(self.request(Method::GET, path), Some(token)).await?;
        Ok(response.json().await?)
    }

    /// POST without a body, authenticated with an explicit token instead of the store
    pub async fn post_with_token(&self, path: &str, token: &str) -> ClientResult<()> {
        self.send(self.request(Method::POST, path), Some(token))
            .await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);
        self.client.request(method, url)
    }

    async fn send(
        &self,
        mut request: RequestBuilder,
        token: Option<&str>,
    ) -> Result<Response, RequestFailure> {
        let token = match token {
            Some(token) => Some(token.to_string()),
            None => self.tokens.load().await?,
        };

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let backend_message = extract_error_message(&body);
        let message = backend_message.clone().unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

        debug!("Request failed with status {}: {}", status, message);
        Err(RequestFailure {
            error: ClientError::from_status(status, message),
            backend_message,
        })
    }
}

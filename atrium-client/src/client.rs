//! The resilient API client.
//!
//! Wraps a [`Transport`] with bearer-token injection, structured error
//! construction, transient-failure retry with exponential backoff, and
//! paginated-shape discovery for list endpoints of unknown envelope shape.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use atrium_core::{decode_page, from_value_lenient, is_transient_status, ApiError, Page};

use crate::auth::{AuthEvent, AuthSignals, TokenProvider, TOKEN_EXPIRED_HEADER};
use crate::config::ClientConfig;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};

/// Retry attempts used by convenience callers of [`ApiClient::get`].
pub const DEFAULT_RETRIES: u32 = 1;

const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_CAP_MS: u64 = 2_000;

/// Typed JSON client over an abstract transport.
///
/// Cheap to clone; clones share the bearer override and signal channel.
/// Cancellation is the usual async story: dropping an in-flight call
/// abandons the request and any pending backoff sleep.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    bearer: Arc<RwLock<Option<String>>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    signals: AuthSignals,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer: Arc::new(RwLock::new(None)),
            token_provider: None,
            signals: AuthSignals::new(),
        }
    }

    /// Build a client with a reqwest transport from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let transport = HttpTransport::new(timeout)?;
        Ok(Self::new(Arc::new(transport), &config.api_base_url))
    }

    /// Attach a credential source consulted per request when no explicit
    /// bearer override is set.
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Subscribe to auth signals. Receivers obtained after a signal fired do
    /// not see it; subscribe before issuing requests.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.signals.subscribe()
    }

    /// Set the bearer token attached to all subsequent requests.
    /// Blank tokens are rejected.
    pub fn set_bearer_token(&self, token: &str) -> Result<(), ApiError> {
        if token.trim().is_empty() {
            return Err(ApiError::InvalidToken);
        }
        if let Ok(mut bearer) = self.bearer.write() {
            *bearer = Some(token.to_string());
        }
        Ok(())
    }

    /// Remove the bearer token; subsequent requests carry no authorization
    /// header unless a token provider supplies one.
    pub fn clear_bearer_token(&self) {
        if let Ok(mut bearer) = self.bearer.write() {
            *bearer = None;
        }
    }

    // ------------------------------------------------------------------------
    // Raw JSON operations
    // ------------------------------------------------------------------------

    /// GET returning the parsed JSON tree as-is. An empty body parses as
    /// `Value::Null`. Non-2xx becomes a structured error; a 401 additionally
    /// fires an auth signal first.
    pub async fn get_value(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        let response = self
            .send(self.build_request(Method::Get, endpoint, query, None))
            .await?;
        self.require_success(&response)?;
        parse_tree(&response.body)
    }

    /// POST with a JSON body, returning the parsed response tree as-is.
    pub async fn post_value<B>(&self, endpoint: &str, body: &B) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let payload = encode_body(body)?;
        let response = self
            .send(self.build_request(Method::Post, endpoint, &[], Some(payload)))
            .await?;
        self.require_success(&response)?;
        parse_tree(&response.body)
    }

    /// GET returning the body verbatim; an empty body yields `None`.
    pub async fn get_text(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<String>, ApiError> {
        let response = self
            .send(self.build_request(Method::Get, endpoint, query, None))
            .await?;
        self.require_success(&response)?;
        if response.body.is_empty() {
            Ok(None)
        } else {
            Ok(Some(response.body))
        }
    }

    // ------------------------------------------------------------------------
    // Typed operations
    // ------------------------------------------------------------------------

    /// Typed GET with transient-failure retry.
    ///
    /// Transient statuses (408, 429, >=500) are retried up to `retries`
    /// additional attempts, sleeping 250ms doubled per attempt and capped at
    /// 2000ms. Anything else non-2xx surfaces immediately as a structured
    /// error. An empty success body decodes to `None`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        retries: u32,
    ) -> Result<Option<T>, ApiError> {
        let mut attempt = 0u32;
        loop {
            let response = self
                .send(self.build_request(Method::Get, endpoint, query, None))
                .await?;
            if response.is_success() {
                return decode_body(&response.body);
            }
            if is_transient_status(response.status) && attempt < retries {
                let delay = backoff_delay(attempt);
                tracing::debug!(
                    endpoint,
                    status = response.status,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return Err(self.error_for(response));
        }
    }

    /// Typed GET over an unknown list envelope: decode the body as a generic
    /// tree, then discover the item array and total count heuristically.
    /// Callers that know their envelope should use [`ApiClient::get`] with a
    /// typed page struct instead.
    pub async fn get_paged<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Page<T>, ApiError> {
        let root = self.get_value(endpoint, query).await?;
        decode_page(&root)
    }

    /// Typed POST, single attempt.
    pub async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<Option<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.write(Method::Post, endpoint, body).await
    }

    /// Typed PUT, single attempt.
    pub async fn put<B, T>(&self, endpoint: &str, body: &B) -> Result<Option<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.write(Method::Put, endpoint, body).await
    }

    /// DELETE, single attempt; the response body is ignored.
    pub async fn delete(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<(), ApiError> {
        let response = self
            .send(self.build_request(Method::Delete, endpoint, query, None))
            .await?;
        self.require_success(&response)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn write<B, T>(&self, method: Method, endpoint: &str, body: &B) -> Result<Option<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = encode_body(body)?;
        let response = self
            .send(self.build_request(method, endpoint, &[], Some(payload)))
            .await?;
        self.require_success(&response)?;
        decode_body(&response.body)
    }

    fn build_request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<String>,
    ) -> ApiRequest {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let query = query
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        if let Some(token) = self.current_token() {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }

        ApiRequest {
            method,
            url,
            query,
            headers,
            body,
        }
    }

    fn current_token(&self) -> Option<String> {
        if let Some(token) = self.bearer.read().ok().and_then(|b| b.clone()) {
            return Some(token);
        }
        self.token_provider.as_ref().and_then(|p| p.token())
    }

    /// Execute the request and fire auth signals on 401 before any other
    /// interpretation of the response.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.transport.execute(request).await?;
        if response.status == 401 {
            let event = if response.header(TOKEN_EXPIRED_HEADER).is_some() {
                AuthEvent::TokenExpired
            } else {
                AuthEvent::Unauthorized
            };
            tracing::debug!(?event, "authentication signal");
            self.signals.fire(event);
        }
        Ok(response)
    }

    fn require_success(&self, response: &ApiResponse) -> Result<(), ApiError> {
        if response.is_success() {
            Ok(())
        } else {
            Err(self.error_for(response.clone()))
        }
    }

    fn error_for(&self, response: ApiResponse) -> ApiError {
        let reason = response.reason_phrase().to_string();
        let body = if response.body.is_empty() {
            None
        } else {
            Some(response.body)
        };
        let error = ApiError::from_response(response.status, &reason, body);
        tracing::warn!(%error, "request failed");
        error
    }
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<String, ApiError> {
    serde_json::to_string(body).map_err(|e| ApiError::Encode(e.to_string()))
}

fn parse_tree(body: &str) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Empty bodies decode to `None`; everything else goes through the lenient
/// decoder (the identity for `Value` targets).
fn decode_body<T: DeserializeOwned>(body: &str) -> Result<Option<T>, ApiError> {
    if body.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    from_value_lenient(&value).map(Some)
}

fn backoff_delay(attempt: u32) -> Duration {
    let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(8));
    Duration::from_millis(ms.min(BACKOFF_CAP_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(250));
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(3), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(10), Duration::from_millis(2_000));
    }

    #[test]
    fn decode_body_handles_empty_and_typed() {
        assert_eq!(decode_body::<u32>("").unwrap(), None);
        assert_eq!(decode_body::<u32>("7").unwrap(), Some(7));
        assert!(decode_body::<u32>("not json").is_err());
    }
}

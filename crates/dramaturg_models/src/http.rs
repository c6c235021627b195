//! Shared HTTP plumbing for provider clients.

use dramaturg_error::{ProviderError, ProviderErrorKind};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};

/// Longest error body kept in an error message.
const ERROR_BODY_PREVIEW: usize = 500;

/// Builds a client with a whole-request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::new(ProviderErrorKind::ClientCreation(e.to_string())))
}

/// Sends a prepared request and decodes a JSON body, mapping failures to provider errors.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| {
        error!(provider, error = ?e, "Failed to send request");
        if e.is_timeout() {
            ProviderError::new(ProviderErrorKind::Timeout)
        } else {
            ProviderError::new(ProviderErrorKind::Network(e.to_string()))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(provider, status = %status, "Provider returned error status");
        return Err(ProviderError::new(ProviderErrorKind::HttpStatus {
            status_code: status.as_u16(),
            message: body.chars().take(ERROR_BODY_PREVIEW).collect(),
        }));
    }

    debug!(provider, status = %status, "Provider responded");
    response.json::<T>().await.map_err(|e| {
        error!(provider, error = ?e, "Failed to decode provider response");
        if e.is_timeout() {
            ProviderError::new(ProviderErrorKind::Timeout)
        } else {
            ProviderError::new(ProviderErrorKind::InvalidResponse(e.to_string()))
        }
    })
}

use reqwest::Client;
use std::time::Duration;

use crossrelay_traits::ProviderError;

/// Timeout applied to every provider request (seconds).
pub(crate) const PROVIDER_TIMEOUT_SECS: u64 = 30;

pub(crate) fn build_http_client() -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
        .build()
        .map_err(|e| ProviderError::Request(e.to_string()))
}

/// Read an error body and turn it into [`ProviderError::Http`].
pub(crate) async fn http_error(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error").and_then(|error| error.get("message")))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);
    ProviderError::Http {
        provider: provider.to_string(),
        status,
        message,
    }
}

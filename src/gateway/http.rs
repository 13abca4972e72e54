use crate::error::{CheckoutError, CheckoutResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Shared HTTP transport for gateway calls.
///
/// Applies a request timeout and a bounded retry with exponential backoff
/// on 429 and 5xx responses. Client errors are returned immediately.
#[derive(Clone)]
pub struct GatewayHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CheckoutError::network(format!("failed to initialize HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
    ) -> CheckoutResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            if let Some(token) = bearer_token {
                request = request.bearer_auth(token);
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    let err = CheckoutError::network(format!("gateway request failed: {e}"));
                    if attempt < self.max_retries {
                        warn!(url, attempt = attempt + 1, error = %err, "gateway request failed, retrying");
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.is_success() {
                return serde_json::from_str::<T>(&text).map_err(|e| {
                    CheckoutError::gateway(
                        status.as_u16(),
                        format!("invalid gateway JSON response: {e}"),
                    )
                });
            }

            if (status.as_u16() == 429 || status.is_server_error()) && attempt < self.max_retries {
                warn!(
                    status = %status,
                    attempt = attempt + 1,
                    "gateway returned a retryable status, backing off"
                );
                last_error = Some(CheckoutError::gateway(status.as_u16(), text));
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                continue;
            }

            return Err(CheckoutError::gateway(status.as_u16(), text));
        }

        Err(last_error.unwrap_or_else(|| CheckoutError::network("gateway request failed")))
    }
}

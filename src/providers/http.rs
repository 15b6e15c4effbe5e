use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::types::ProviderFamily;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// HTTP client shared by the provider adapters. Every call carries the
/// configured timeout; 429s and 5xx responses are retried with exponential
/// backoff up to `max_retries`.
#[derive(Clone)]
pub struct ProviderHttpClient {
    client: Client,
    family: ProviderFamily,
    timeout: Duration,
    max_retries: u32,
}

pub enum RequestBody<'a> {
    Json(&'a JsonValue),
    Form(&'a [(&'a str, String)]),
    None,
}

impl ProviderHttpClient {
    pub fn new(
        family: ProviderFamily,
        timeout: Duration,
        max_retries: u32,
    ) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network {
                family,
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            family,
            timeout,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: Option<&str>,
        body: RequestBody<'_>,
        additional_headers: &[(&str, &str)],
    ) -> ProviderResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            if let Some(token) = bearer_token {
                request = request.bearer_auth(token);
            }
            for (k, v) in additional_headers {
                request = request.header(*k, *v);
            }
            match &body {
                RequestBody::Json(payload) => request = request.json(payload),
                RequestBody::Form(fields) => request = request.form(*fields),
                RequestBody::None => {}
            }

            let response = request.send().await.map_err(|e| ProviderError::Network {
                family: self.family,
                message: format!("processor request failed: {}", e),
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            ProviderError::InvalidResponse {
                                family: self.family,
                                message: format!("invalid processor JSON response: {}", e),
                            }
                        });
                    }

                    if (status.as_u16() == 429 || status.is_server_error())
                        && attempt < self.max_retries
                    {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            family = %self.family,
                            "processor error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(ProviderError::Rejected {
                        family: self.family,
                        message: format!("HTTP {}: {}", status, truncate(&text, 512)),
                        provider_code: Some(status.as_u16().to_string()),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::Network {
            family: self.family,
            message: "processor request failed".to_string(),
        }))
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

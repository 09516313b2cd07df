//! OpenAI-compatible embeddings client (`POST {base_url}/embeddings`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use filemind_core::config::EmbeddingSettings;
use filemind_core::error::ProviderError;
use filemind_core::traits::Embedder;

pub(crate) fn build_client(api_key: &str, timeout: Duration) -> Result<Client, ProviderError> {
    if api_key.trim().is_empty() {
        return Err(ProviderError::NotConfigured("missing API key".into()));
    }
    let mut headers = HeaderMap::new();
    let auth = format!("Bearer {}", api_key.trim());
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&auth).map_err(|_| ProviderError::NotConfigured("invalid API key".into()))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))
}

pub(crate) fn map_send_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Request(err.to_string())
    }
}

/// Async embeddings client for OpenAI-compatible endpoints, one input per call.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    timeout: Duration,
    max_retries: usize,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimensions: Option<usize>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, ProviderError> {
        if model.trim().is_empty() {
            return Err(ProviderError::NotConfigured("missing embedding model name".into()));
        }
        let client = build_client(api_key, timeout)?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            dimensions,
            timeout,
            max_retries: max_retries.max(1),
            id: format!("openai:{model}"),
        })
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self, ProviderError> {
        let api_key = settings
            .api_key()
            .ok_or_else(|| ProviderError::NotConfigured("set embedding.api_key or OPENAI_API_KEY".into()))?;
        Self::new(
            &api_key,
            &settings.base_url,
            &settings.model,
            settings.dimensions,
            Duration::from_secs(settings.timeout_secs),
            settings.max_retries,
        )
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn retry_backoff(attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(250 * (1 << capped))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest { model: &self.model, input: [text], dimensions: self.dimensions };
        let mut attempt = 0usize;
        loop {
            let response = self.client.post(&self.endpoint).json(&request).send().await;
            match response {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: EmbeddingResponse = resp
                        .json()
                        .await
                        .map_err(|e| ProviderError::Malformed(e.to_string()))?;
                    return parsed.into_single();
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
                    if Self::should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(%status, attempt, "embedding request throttled; retrying");
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(ProviderError::Status { status: status.as_u16(), body });
                }
                Err(err) => {
                    if (err.is_connect() || err.is_timeout()) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        debug!(error = %err, attempt, "embedding request failed; retrying");
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(map_send_error(err, self.timeout));
                }
            }
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl EmbeddingResponse {
    fn into_single(mut self) -> Result<Vec<f32>, ProviderError> {
        self.data.sort_by_key(|entry| entry.index);
        match self.data.into_iter().next() {
            Some(entry) if !entry.embedding.is_empty() => Ok(entry.embedding),
            Some(_) => Err(ProviderError::Malformed("empty embedding".into())),
            None => Err(ProviderError::Malformed("no embedding in response".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_unset_dimensions() {
        let req = EmbeddingRequest { model: "m", input: ["hello"], dimensions: None };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"model": "m", "input": ["hello"]}));
    }

    #[test]
    fn response_yields_first_embedding() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2,0.3]}],"model":"m"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.into_single().unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn empty_response_is_malformed() {
        let parsed: EmbeddingResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(matches!(parsed.into_single(), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn missing_key_is_not_configured() {
        let err = OpenAiEmbedder::new(" ", "http://localhost", "m", None, Duration::from_secs(1), 1).err();
        assert!(matches!(err, Some(ProviderError::NotConfigured(_))));
    }
}

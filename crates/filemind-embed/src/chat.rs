use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use filemind_core::config::ChatSettings;
use filemind_core::error::ProviderError;
use filemind_core::traits::ChatModel;
use filemind_core::types::ChatMessage;

use crate::openai::{build_client, map_send_error};

/// Chat completions against an OpenAI-compatible endpoint.
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
    id: String,
}

impl OpenAiChat {
    pub fn from_settings(settings: &ChatSettings) -> Result<Self, ProviderError> {
        let api_key = settings
            .api_key()
            .ok_or_else(|| ProviderError::NotConfigured("set chat.api_key or OPENAI_API_KEY".into()))?;
        let timeout = Duration::from_secs(settings.timeout_secs);
        Ok(Self {
            client: build_client(&api_key, timeout)?,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout,
            id: format!("openai:{}", settings.model),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn id(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Status { status, body });
        }
        let parsed: ChatResponse = resp.json().await.map_err(|e| ProviderError::Malformed(e.to_string()))?;
        parsed.into_answer()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_answer(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed("no message content in chat response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let messages = [ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let req = ChatRequest { model: "m", temperature: 0.0, max_tokens: 10, messages: &messages };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn answer_is_first_non_empty_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"42"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.into_answer().unwrap(), "42");

        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(parsed.into_answer(), Err(ProviderError::Malformed(_))));
    }
}

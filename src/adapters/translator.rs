use crate::domain::ports::Translator;
use crate::utils::error::{PrepError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

/// Client for a LibreTranslate-compatible `POST /translate` endpoint.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let body = TranslateRequest {
            q: text,
            source,
            target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        tracing::debug!("Translating {} chars {} -> {}", text.len(), source, target);
        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(PrepError::TranslationError {
                target: target.to_string(),
                attempts: 1,
                message: format!("service returned status {}", response.status()),
            });
        }

        let parsed: TranslateResponse = response.json().await?;
        Ok(parsed.translated_text)
    }
}

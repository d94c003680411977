use crate::config::ApiKey;
use crate::reasoning::{ReasoningBackend, ReasoningError};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl AnthropicBackend {
    pub fn new(api_key: ApiKey, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    /// Points the client at a proxy or compatible gateway.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

fn first_text(response: MessagesResponse) -> Result<String, ReasoningError> {
    response
        .content
        .into_iter()
        .find_map(|block| block.text)
        .map(|text| text.trim().to_owned())
        .ok_or_else(|| ReasoningError::InvalidResponse("no text block in response".to_owned()))
}

impl ReasoningBackend for AnthropicBackend {
    fn complete(
        &self,
        prompt: String,
        max_output_tokens: u32,
    ) -> BoxFuture<'_, Result<String, ReasoningError>> {
        async move {
            let request = MessagesRequest {
                model: &self.model,
                max_tokens: max_output_tokens,
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
            };

            let response = self
                .client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", self.api_key.expose())
                .header("anthropic-version", API_VERSION)
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_owned());
                return Err(ReasoningError::Api { status, body });
            }

            let parsed: MessagesResponse = response
                .json()
                .await
                .map_err(|e| ReasoningError::InvalidResponse(format!("failed to parse JSON: {e}")))?;

            first_text(parsed)
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

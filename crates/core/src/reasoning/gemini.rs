use crate::config::ApiKey;
use crate::reasoning::{ReasoningBackend, ReasoningError};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl GeminiBackend {
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
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn candidate_text(response: GenerateResponse) -> Result<String, ReasoningError> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| {
            ReasoningError::InvalidResponse("no candidates (rate limited or blocked)".to_owned())
        })?;

    let text = content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join(" ");

    if text.trim().is_empty() {
        return Err(ReasoningError::InvalidResponse("candidate has no text".to_owned()));
    }
    Ok(text.trim().to_owned())
}

impl ReasoningBackend for GeminiBackend {
    fn complete(
        &self,
        prompt: String,
        max_output_tokens: u32,
    ) -> BoxFuture<'_, Result<String, ReasoningError>> {
        async move {
            let request = GenerateRequest {
                contents: vec![Content {
                    parts: vec![Part { text: Some(prompt) }],
                }],
                generation_config: GenerationConfig { max_output_tokens },
            };

            let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

            let response = self
                .client
                .post(url)
                .header("x-goog-api-key", self.api_key.expose())
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

            let parsed: GenerateResponse = response
                .json()
                .await
                .map_err(|e| ReasoningError::InvalidResponse(format!("failed to parse JSON: {e}")))?;

            candidate_text(parsed)
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::serve_once;

    #[test]
    fn request_uses_camel_case_generation_config() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some("hi".to_owned()),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 500,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 500);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"days\":"},{"text":"5}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(candidate_text(parsed).unwrap(), "{\"days\": 5}");
    }

    #[test]
    fn missing_candidates_is_invalid() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert!(matches!(candidate_text(parsed), Err(ReasoningError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn posts_generate_content_under_configured_base_url() {
        let (base, server) = serve_once(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"days\": 5}"}]}}]}"#,
        );
        let backend = GeminiBackend::new(ApiKey::new("k").unwrap(), "gemini-test".to_owned())
            .with_base_url(format!("{base}/v1beta"));

        let reply = backend.complete("hi".to_owned(), 10).await.unwrap();
        assert_eq!(reply, r#"{"days": 5}"#);
        assert_eq!(
            server.join().unwrap(),
            "POST /v1beta/models/gemini-test:generateContent HTTP/1.1"
        );
    }
}

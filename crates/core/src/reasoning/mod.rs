mod anthropic;
mod gemini;

use futures::future::BoxFuture;
use std::time::Duration;

pub use anthropic::AnthropicBackend;
pub use gemini::GeminiBackend;

#[derive(thiserror::Error, Debug)]
pub enum ReasoningError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),
}

/// A text-completion service the trend analyzer may consult.
pub trait ReasoningBackend: Send + Sync {
    fn complete(
        &self,
        prompt: String,
        max_output_tokens: u32,
    ) -> BoxFuture<'_, Result<String, ReasoningError>>;

    fn name(&self) -> &'static str;
}

/// Pulls the JSON object out of a completion that may wrap it in a code fence.
pub fn extract_json(raw: &str) -> Result<&str, ReasoningError> {
    let cleaned = raw.trim();

    let fenced = if let Some(start) = cleaned.find("```json") {
        Some(&cleaned[start + "```json".len()..])
    } else {
        cleaned.find("```").map(|start| &cleaned[start + "```".len()..])
    };

    if let Some(after_fence) = fenced {
        let body = match after_fence.find("```") {
            Some(end) => &after_fence[..end],
            None => after_fence,
        };
        return Ok(body.trim());
    }

    if cleaned.starts_with('{') {
        return Ok(cleaned);
    }

    let start = cleaned
        .find('{')
        .ok_or_else(|| ReasoningError::InvalidResponse("no JSON object found".to_owned()))?;
    let end = cleaned
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| ReasoningError::InvalidResponse("no closing brace found".to_owned()))?;
    Ok(&cleaned[start..=end])
}

/// Answers exactly one HTTP request with `status` and `body`. The handle
/// yields the request line that arrived.
#[cfg(test)]
pub(crate) fn serve_once(status: u16, body: &str) -> (String, std::thread::JoinHandle<String>) {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let body = body.to_owned();
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut request_body = vec![0; content_length];
        reader.read_exact(&mut request_body).unwrap();

        let response = format!(
            "HTTP/1.1 {status} OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        reader.get_mut().write_all(response.as_bytes()).unwrap();
        request_line.trim_end().to_owned()
    });
    (format!("http://{addr}"), handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let raw = "Here you go:\n```json\n{\"days\": 4}\n```\nanything else?";
        assert_eq!(extract_json(raw).unwrap(), "{\"days\": 4}");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "```\n{\"days\": 4}\n```";
        assert_eq!(extract_json(raw).unwrap(), "{\"days\": 4}");
    }

    #[test]
    fn unterminated_fence_takes_the_rest() {
        let raw = "```json\n{\"days\": 4}";
        assert_eq!(extract_json(raw).unwrap(), "{\"days\": 4}");
    }

    #[test]
    fn plain_object_passes_through() {
        assert_eq!(extract_json("  {\"a\":1} ").unwrap(), "{\"a\":1}");
    }

    #[test]
    fn finds_object_inside_prose() {
        let raw = "Sure! {\"a\": {\"b\": 2}} Hope that helps.";
        assert_eq!(extract_json(raw).unwrap(), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn prose_without_object_is_invalid() {
        assert!(matches!(
            extract_json("I cannot help with that."),
            Err(ReasoningError::InvalidResponse(_))
        ));
        assert!(extract_json("} backwards {").is_err());
    }
}

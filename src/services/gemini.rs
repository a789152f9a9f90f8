use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::generation::{GenerationError, Language, MessageGenerator};

pub const DEFAULT_GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

pub struct GeminiGenerator {
    client: Client,
    api_url: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(api_url: String, api_key: String) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_url,
            api_key,
        })
    }
}

pub fn build_prompt(language: Language, count: u32) -> String {
    format!(
        "Generate {} short, fun anonymous messages for NGL in {}. \
        Keep each one under 50 characters and make them casual. \
        Reply with one message per line and nothing else.",
        count,
        language.prompt_name()
    )
}

/// Splits the model output into individual messages, dropping list markers and quotes.
pub fn parse_messages(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let line = line.trim_start_matches(|c: char| {
                c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*' | '•')
            });
            line.trim().trim_matches('"').trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[async_trait]
impl MessageGenerator for GeminiGenerator {
    async fn generate(
        &self,
        language: Language,
        count: u32,
    ) -> Result<Vec<String>, GenerationError> {
        let payload = json!({
            "contents": [{
                "parts": [{ "text": build_prompt(language, count) }]
            }]
        });

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status(status.as_u16()));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| GenerationError::Parse("no candidate text".into()))?;

        let mut messages = parse_messages(&text);
        messages.truncate(count as usize);

        tracing::debug!(
            "Generated {} {} messages",
            messages.len(),
            language.as_str()
        );

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_messages_strips_numbering() {
        let text = "1. You're awesome!\n2) Guess who?\n\n- \"Nice pic\"\n• hi";
        assert_eq!(
            parse_messages(text),
            vec!["You're awesome!", "Guess who?", "Nice pic", "hi"]
        );
    }

    #[test]
    fn test_parse_messages_ignores_blank_output() {
        assert!(parse_messages("\n  \n").is_empty());
    }

    #[test]
    fn test_prompt_mentions_count_and_language() {
        let prompt = build_prompt(Language::Hinglish, 3);
        assert!(prompt.contains("Generate 3"));
        assert!(prompt.contains("Hinglish"));
    }

    #[test]
    fn test_response_shape_deserializes() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"a\nb"}]}}]}"#;
        let body: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let text = body.candidates[0].content.as_ref().unwrap().parts[0]
            .text
            .clone()
            .unwrap();
        assert_eq!(parse_messages(&text), vec!["a", "b"]);
    }
}

//! Message generation capability and the degrade-not-fail policy around it.

use async_trait::async_trait;
use rand::Rng;

use crate::observability::METRICS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Hindi,
    Nepali,
    Russian,
    Hinglish,
}

impl Language {
    pub fn all() -> [Language; 5] {
        [
            Language::English,
            Language::Hindi,
            Language::Nepali,
            Language::Russian,
            Language::Hinglish,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hindi => "hindi",
            Language::Nepali => "nepali",
            Language::Russian => "russian",
            Language::Hinglish => "hinglish",
        }
    }

    pub fn parse(s: &str) -> Option<Language> {
        match s.to_lowercase().as_str() {
            "english" => Some(Language::English),
            "hindi" => Some(Language::Hindi),
            "nepali" => Some(Language::Nepali),
            "russian" => Some(Language::Russian),
            "hinglish" => Some(Language::Hinglish),
            _ => None,
        }
    }

    /// How the language is described to the model.
    pub fn prompt_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi (Devanagari script)",
            Language::Nepali => "Nepali (Devanagari script)",
            Language::Russian => "Russian",
            Language::Hinglish => "Hinglish (Hindi written in Latin script, mixed with English)",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Nepali => "Nepali",
            Language::Russian => "Russian",
            Language::Hinglish => "Hinglish",
        }
    }
}

#[derive(Debug)]
pub enum GenerationError {
    Request(reqwest::Error),
    Status(u16),
    Parse(String),
    NotConfigured,
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Request(e) => write!(f, "Request error: {}", e),
            GenerationError::Status(code) => write!(f, "Provider returned status {}", code),
            GenerationError::Parse(e) => write!(f, "Unexpected provider response: {}", e),
            GenerationError::NotConfigured => write!(f, "No generation provider configured"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<reqwest::Error> for GenerationError {
    fn from(error: reqwest::Error) -> Self {
        GenerationError::Request(error)
    }
}

#[async_trait]
pub trait MessageGenerator: Send + Sync {
    /// Produces up to `count` messages in order. May return fewer than requested.
    async fn generate(&self, language: Language, count: u32)
        -> Result<Vec<String>, GenerationError>;
}

/// Stand-in generator used when no provider key is configured.
pub struct OfflineGenerator;

#[async_trait]
impl MessageGenerator for OfflineGenerator {
    async fn generate(
        &self,
        _language: Language,
        _count: u32,
    ) -> Result<Vec<String>, GenerationError> {
        Err(GenerationError::NotConfigured)
    }
}

pub fn fallback_message() -> String {
    format!("Random message {}", rand::thread_rng().gen_range(1000..=9999))
}

/// Calls the generator and always returns exactly `count` messages, substituting fallback text for
/// anything the provider failed to deliver.
pub async fn generate_exact(
    generator: &dyn MessageGenerator,
    language: Language,
    count: u32,
) -> Vec<String> {
    let wanted = count as usize;

    let mut messages = match generator.generate(language, count).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::error!("Message generation failed ({}): {}", language.as_str(), e);
            Vec::new()
        }
    };

    messages.retain(|m| !m.trim().is_empty());
    messages.truncate(wanted);

    let missing = wanted - messages.len();
    if missing > 0 {
        tracing::warn!(
            "Generator returned {} of {} messages, padding with fallbacks",
            messages.len(),
            wanted
        );
        METRICS.add_generation_fallbacks(missing as u64);
        messages.extend((0..missing).map(|_| fallback_message()));
    }

    messages
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns numbered messages and counts how often it was called.
    pub struct ScriptedGenerator {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl ScriptedGenerator {
        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl MessageGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            language: Language,
            count: u32,
        ) -> Result<Vec<String>, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(GenerationError::Status(503));
            }
            Ok((1..=count)
                .map(|i| format!("{} message {} (round {})", language.display_name(), i, call))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedGenerator;
    use super::*;

    struct ShortGenerator;

    #[async_trait]
    impl MessageGenerator for ShortGenerator {
        async fn generate(
            &self,
            _language: Language,
            _count: u32,
        ) -> Result<Vec<String>, GenerationError> {
            Ok(vec!["only one".to_string(), "   ".to_string()])
        }
    }

    #[test]
    fn test_language_parse() {
        for language in Language::all() {
            assert_eq!(Language::parse(language.as_str()), Some(language));
        }
        assert_eq!(Language::parse("HINDI"), Some(Language::Hindi));
        assert_eq!(Language::parse("klingon"), None);
    }

    #[tokio::test]
    async fn test_generate_exact_passes_through_full_batch() {
        let generator = ScriptedGenerator::new();
        let messages = generate_exact(&generator, Language::English, 2).await;
        assert_eq!(
            messages,
            vec![
                "English message 1 (round 1)".to_string(),
                "English message 2 (round 1)".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_generate_exact_substitutes_on_failure() {
        let generator = ScriptedGenerator::failing();
        let messages = generate_exact(&generator, Language::Russian, 3).await;
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.starts_with("Random message ")));
    }

    #[tokio::test]
    async fn test_generate_exact_pads_short_and_blank_results() {
        let messages = generate_exact(&ShortGenerator, Language::Nepali, 3).await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], "only one");
        assert!(messages[1].starts_with("Random message "));
    }

    #[test]
    fn test_fallback_message_shape() {
        let message = fallback_message();
        let number: u32 = message
            .trim_start_matches("Random message ")
            .parse()
            .unwrap();
        assert!((1000..=9999).contains(&number));
    }
}

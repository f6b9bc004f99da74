// Language detection and translation to the working language (English)

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::middleware::AppError;
use crate::config::TranslationConfig;

pub const WORKING_LANGUAGE: &str = "en";

const ENGLISH_WORDS: &[&str] = &["show", "get", "list", "find", "what", "which", "orders", "customers", "products"];

/// Romanized Hindi query words
const HINDI_WORDS: &[&str] = &["dikhao", "dikhaiye", "batao", "sabhi", "kitne", "kya", "kaun", "grahak", "aadesh", "utpad"];

/// Romanized Kannada query words
const KANNADA_WORDS: &[&str] = &["torisu", "pade", "patti", "huduku", "enu", "yava", "adeshagalu", "grahakaru", "utpannagalu"];

fn in_range(ch: char, start: u32, end: u32) -> bool {
    (start..=end).contains(&(ch as u32))
}

/// Detect the language of `text` as an ISO 639-1 code
pub fn detect_language(text: &str) -> &'static str {
    if text.chars().any(|c| in_range(c, 0x0900, 0x097F)) {
        return "hi";
    }
    if text.chars().any(|c| in_range(c, 0x0C80, 0x0CFF)) {
        return "kn";
    }

    let lowered = text.to_lowercase();
    let count = |words: &[&str]| lowered.split_whitespace().filter(|t| words.contains(t)).count();
    let english = count(ENGLISH_WORDS);
    let hindi = count(HINDI_WORDS);
    let kannada = count(KANNADA_WORDS);

    if hindi > english && hindi > kannada {
        "hi"
    } else if kannada > english && kannada > hindi {
        "kn"
    } else {
        WORKING_LANGUAGE
    }
}

/// Machine translation into the working language
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source_lang: &str) -> Result<String>;
}

/// Google Cloud Translation v2 client
pub struct GoogleTranslator {
    api_url: String,
    api_key: Option<String>,
    http_client: HttpClient,
}

impl GoogleTranslator {
    pub fn new(config: &TranslationConfig) -> Self {
        Self::with_client(config, HttpClient::new())
    }

    pub fn with_client(config: &TranslationConfig, http_client: HttpClient) -> Self {
        Self {
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            http_client,
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, source_lang: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Translation API key is not configured"))?;

        let response = self
            .http_client
            .post(&self.api_url)
            .query(&[
                ("q", text),
                ("source", source_lang),
                ("target", WORKING_LANGUAGE),
                ("format", "text"),
                ("key", api_key),
            ])
            .send()
            .await
            .context("Failed to call translation service")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            bail!("Translation service returned error {}: {}", status, error_text);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse translation response")?;

        body["data"]["translations"][0]["translatedText"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Translation response has no translatedText"))
    }
}

/// Brings request text into the working language, degrading to the original
/// text whenever translation is unavailable
#[derive(Clone, Default)]
pub struct LanguageProcessor {
    translator: Option<Arc<dyn Translator>>,
}

impl LanguageProcessor {
    pub fn new(translator: Option<Arc<dyn Translator>>) -> Self {
        Self { translator }
    }

    pub async fn to_working_language(&self, text: &str) -> String {
        let language = detect_language(text);
        if language == WORKING_LANGUAGE {
            return text.to_string();
        }
        debug!("Detected language: {}", language);

        let Some(translator) = &self.translator else {
            warn!("Translation disabled; processing {} text untranslated", language);
            return text.to_string();
        };

        match translate(translator.as_ref(), text, language).await {
            Ok(translated) => {
                info!("Translated query from {}: {}", language, translated);
                translated
            }
            Err(e) => {
                warn!("{}; using original text", e);
                text.to_string()
            }
        }
    }
}

async fn translate(translator: &dyn Translator, text: &str, language: &str) -> Result<String, AppError> {
    translator
        .translate(text, language)
        .await
        .map_err(|e| AppError::Translation(format!("{:#}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTranslator(&'static str);

    #[async_trait]
    impl Translator for FixedTranslator {
        async fn translate(&self, _text: &str, _source_lang: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingTranslator;

    #[async_trait]
    impl Translator for FailingTranslator {
        async fn translate(&self, _text: &str, _source_lang: &str) -> Result<String> {
            Err(anyhow!("upstream unavailable"))
        }
    }

    fn config(api_key: Option<&str>) -> TranslationConfig {
        TranslationConfig {
            api_url: "http://127.0.0.1:9/translate".to_string(),
            api_key: api_key.map(str::to_string),
            enabled: true,
        }
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("show all orders"), "en");
        assert_eq!(detect_language("सभी ग्राहक दिखाओ"), "hi");
        assert_eq!(detect_language("ಗ್ರಾಹಕರು ತೋರಿಸು"), "kn");
        assert_eq!(detect_language("sabhi grahak dikhao"), "hi");
        assert_eq!(detect_language("grahakaru torisu"), "kn");
        assert_eq!(detect_language("123"), "en");
    }

    #[test]
    fn test_english_skips_translator() {
        let processor = LanguageProcessor::new(Some(Arc::new(FixedTranslator("translated"))));
        let text = tokio_test::block_on(processor.to_working_language("show orders"));
        assert_eq!(text, "show orders");
    }

    #[test]
    fn test_translation_applied() {
        let processor = LanguageProcessor::new(Some(Arc::new(FixedTranslator("show all customers"))));
        let text = tokio_test::block_on(processor.to_working_language("सभी ग्राहक दिखाओ"));
        assert_eq!(text, "show all customers");
    }

    #[test]
    fn test_failures_degrade_to_original_text() {
        let failing = LanguageProcessor::new(Some(Arc::new(FailingTranslator)));
        assert_eq!(
            tokio_test::block_on(failing.to_working_language("ग्राहक दिखाओ")),
            "ग्राहक दिखाओ"
        );

        let disabled = LanguageProcessor::default();
        assert_eq!(
            tokio_test::block_on(disabled.to_working_language("ग्राहक दिखाओ")),
            "ग्राहक दिखाओ"
        );
    }

    #[test]
    fn test_translator_failure_is_a_translation_error() {
        let err = tokio_test::block_on(translate(&FailingTranslator, "ग्राहक", "hi")).unwrap_err();
        assert!(matches!(err, AppError::Translation(ref msg) if msg == "upstream unavailable"));
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let translator = GoogleTranslator::new(&config(Some("")));
        let err = tokio_test::block_on(translator.translate("ग्राहक", "hi")).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}

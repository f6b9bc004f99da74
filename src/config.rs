use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub translation: TranslationConfig,
    pub nlp: NlpConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    /// When false, non-English text is passed through untranslated
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NlpConfig {
    /// Parse generated SQL with sqlparser and log a warning on failure
    pub validate_sql: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

impl Config {
    /// Defaults, then the optional TOML file named by `NLQ_CONFIG`, then environment overrides
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let file = env::var("NLQ_CONFIG").ok().map(PathBuf::from);
        Self::load(file.as_deref())
    }

    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default(
                "translation.api_url",
                "https://translation.googleapis.com/language/translate/v2",
            )?
            .set_default("translation.enabled", true)?
            .set_default("nlp.validate_sql", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }

        // Load from environment variables
        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(8000))?;
        }

        if let Ok(api_url) = env::var("TRANSLATE_API_URL") {
            builder = builder.set_override("translation.api_url", api_url)?;
        }

        if let Ok(api_key) = env::var("GOOGLE_API_KEY") {
            builder = builder.set_override("translation.api_key", Some(api_key))?;
        }

        if let Ok(enabled) = env::var("TRANSLATION_ENABLED") {
            builder = builder.set_override("translation.enabled", enabled.parse::<bool>().unwrap_or(true))?;
        }

        if let Ok(validate) = env::var("NLQ_VALIDATE_SQL") {
            builder = builder.set_override("nlp.validate_sql", validate.parse::<bool>().unwrap_or(true))?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        if let Ok(log_style) = env::var("RUST_LOG_STYLE") {
            builder = builder.set_override("logging.style", log_style)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

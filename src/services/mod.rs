pub mod intent;
pub mod language;
pub mod nl_query_service;
pub mod patterns;
pub mod query_renderer;
pub mod schema_model;
pub mod text_preprocessor; // Stopwords, punctuation and lemmatization

pub use intent::IntentExtractor;
pub use language::{GoogleTranslator, LanguageProcessor, Translator};
pub use nl_query_service::NlQueryService;
pub use patterns::PatternLibrary;
pub use query_renderer::QueryRenderer;
pub use schema_model::SchemaModel;
pub use text_preprocessor::TextPreprocessor;

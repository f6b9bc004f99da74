pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod validation;

pub use api::routes::{create_router, AppState};
pub use config::Config;
pub use models::{Intent, QueryRequest, QueryResponse, SelectStatement};
pub use services::{LanguageProcessor, NlQueryService, SchemaModel};
pub use validation::SqlValidator;

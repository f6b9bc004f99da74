use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::middleware::AppError;
use crate::models::{QueryRequest, QueryResponse};
use crate::services::intent::IntentExtractor;
use crate::services::language::LanguageProcessor;
use crate::services::patterns::PatternLibrary;
use crate::services::query_renderer::QueryRenderer;
use crate::services::schema_model::SchemaModel;
use crate::services::text_preprocessor::TextPreprocessor;
use crate::validation::SqlValidator;

/// Natural language to SQL pipeline: language, normalization, intent, rendering
#[derive(Clone)]
pub struct NlQueryService {
    language: LanguageProcessor,
    validate_sql: bool,
}

impl NlQueryService {
    pub fn new(language: LanguageProcessor, validate_sql: bool) -> Self {
        Self {
            language,
            validate_sql,
        }
    }

    /// Run the pipeline and map the outcome onto the wire response
    pub async fn process(&self, request: &QueryRequest) -> QueryResponse {
        let request_id = Uuid::new_v4();
        info!(%request_id, "Processing query: {}", request.query);

        match self.generate(request).await {
            Ok(sql) => {
                info!(%request_id, "Generated SQL: {}", sql);
                QueryResponse::success(sql)
            }
            Err(AppError::SchemaResolution(message)) => {
                warn!(%request_id, "Schema resolution failed: {}", message);
                QueryResponse::schema_failure(&message)
            }
            Err(e) => {
                error!(%request_id, "Query processing failed: {}", e);
                QueryResponse::failure(e.to_string())
            }
        }
    }

    async fn generate(&self, request: &QueryRequest) -> Result<String, AppError> {
        if request.query.trim().is_empty() {
            return Err(AppError::Validation("Query text cannot be empty".to_string()));
        }

        let text = self.language.to_working_language(&request.query).await;
        let schema = SchemaModel::from_request(request);
        let normalized = TextPreprocessor::new().clean_text(&text, &schema.vocabulary());
        debug!("Normalized text: {}", normalized);

        let sql = Self::generate_sql(&normalized, &schema)?;

        if self.validate_sql {
            if let Err(e) = SqlValidator::validate_select_only(&sql) {
                warn!("Generated SQL failed validation: {}", e);
            }
        }

        Ok(sql)
    }

    /// SQL for text that is already normalized
    pub fn generate_sql(normalized: &str, schema: &SchemaModel) -> Result<String, AppError> {
        let patterns = PatternLibrary::new(schema)?;
        let intent = IntentExtractor::new(schema, &patterns).extract(normalized);
        QueryRenderer::new().render(&intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ERROR_PREFIX;
    use serde_json::json;

    fn service() -> NlQueryService {
        NlQueryService::new(LanguageProcessor::default(), true)
    }

    fn request(value: serde_json::Value) -> QueryRequest {
        serde_json::from_value(value).unwrap()
    }

    fn shop(query: &str) -> QueryRequest {
        request(json!({
            "query": query,
            "schema": [
                {"customers": ["customer_id", "name", "email"]},
                {"orders": ["order_id", "customer_id", "order_date", "total_amount", "status"]}
            ],
            "relationships": [
                {"tables": ["customers", "orders"], "joinCondition": {"customers.customer_id": "orders.customer_id"}}
            ],
            "tableAliases": {"client": "customers"}
        }))
    }

    #[tokio::test]
    async fn test_show_customers() {
        let response = service()
            .process(&request(json!({
                "query": "Show customers",
                "schema": [{"customers": ["id", "name"]}]
            })))
            .await;
        assert!(response.success);
        assert_eq!(response.query.as_deref(), Some("SELECT \"customers\".* FROM \"customers\""));
        assert!(response.error.is_none());
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn test_how_many_orders() {
        let response = service()
            .process(&request(json!({
                "query": "How many orders?",
                "schema": [{"orders": ["order_id"]}]
            })))
            .await;
        assert_eq!(
            response.query.as_deref(),
            Some("SELECT COUNT(*) AS total_count FROM \"orders\"")
        );
    }

    #[tokio::test]
    async fn test_total_amount_filter_rendered_once() {
        let response = service()
            .process(&shop("Orders with total amount greater than 150 that are pending"))
            .await;
        let sql = response.query.unwrap();
        assert_eq!(sql.matches("\"orders\".\"total_amount\" > 150").count(), 1);
        assert!(!sql.contains("status"));
    }

    #[tokio::test]
    async fn test_top_customers() {
        let response = service().process(&shop("Top 5 customers by total orders")).await;
        let sql = response.query.unwrap();
        assert!(sql.contains("JOIN \"orders\""));
        assert!(sql.ends_with("ORDER BY COUNT(\"orders\".\"order_id\") DESC LIMIT 5"));
    }

    #[tokio::test]
    async fn test_singular_table_names() {
        let response = service()
            .process(&request(json!({
                "query": "show customers",
                "schema": [{"customer": ["id", "name"]}]
            })))
            .await;
        assert_eq!(response.query.as_deref(), Some("SELECT \"customer\".* FROM \"customer\""));

        let response = service()
            .process(&request(json!({
                "query": "list products",
                "schema": [{"product": ["id", "title"]}]
            })))
            .await;
        assert_eq!(response.query.as_deref(), Some("SELECT \"product\".* FROM \"product\""));
    }

    #[tokio::test]
    async fn test_alias_resolution() {
        let response = service().process(&shop("list each client")).await;
        assert_eq!(
            response.query.as_deref(),
            Some("SELECT \"customers\".* FROM \"customers\"")
        );
    }

    #[tokio::test]
    async fn test_blank_query() {
        let response = service().process(&shop("   ")).await;
        assert!(!response.success);
        assert!(response.query.is_none());
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn test_empty_schema() {
        let response = service()
            .process(&request(json!({"query": "show customers", "schema": []})))
            .await;
        assert!(!response.success);
        let query = response.query.unwrap();
        assert!(query.starts_with(ERROR_PREFIX));
        assert_eq!(response.error.as_deref(), Some("Could not determine target table from input."));
    }

    #[tokio::test]
    async fn test_repeated_requests_are_identical() {
        let service = service();
        let first = service.process(&shop("monthly total sales of orders this year")).await;
        let second = service.process(&shop("monthly total sales of orders this year")).await;
        assert!(first.success);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_success_iff_query_is_sql() {
        for query in ["show orders", "", "pending orders by status", "customers with email contains gmail"] {
            let response = service().process(&shop(query)).await;
            let is_sql = response
                .query
                .as_deref()
                .map(|q| !q.starts_with(ERROR_PREFIX))
                .unwrap_or(false);
            assert_eq!(response.success, is_sql, "{}", query);
        }
    }

    #[test]
    fn test_generate_sql_from_normalized_text() {
        let schema = SchemaModel::from_request(&shop(""));
        let sql = NlQueryService::generate_sql("orders status is shipped", &schema).unwrap();
        assert_eq!(
            sql,
            "SELECT \"orders\".\"status\" FROM \"orders\" WHERE \"orders\".\"status\" = 'shipped'"
        );
    }
}

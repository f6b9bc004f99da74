use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object in the caller's declaration order (`serde_json` is built with
/// `preserve_order`). Alias and vocabulary lookups are "first declared wins".
pub type JsonObject = Map<String, Value>;

/// Natural language query request together with the caller's schema description
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    /// One object per entry, `{ "tableName": ["col", ...] }`
    #[serde(default)]
    pub schema: Vec<JsonObject>,
    #[serde(default)]
    pub relationships: Vec<RelationshipSpec>,
    #[serde(default)]
    pub table_aliases: JsonObject,
    #[serde(default)]
    pub column_aliases: JsonObject,
    #[serde(default)]
    pub business_metrics: JsonObject,
    /// Time-period phrase -> SQL date predicate. Built-in phrases apply when absent.
    #[serde(default)]
    pub time_periods: Option<JsonObject>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipSpec {
    pub tables: Vec<String>,
    #[serde(default)]
    pub join_condition: JsonObject,
}

/// Response returned by `/process-query`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    /// Generated SQL, or an `ERROR:` sentinel when no table could be resolved
    pub query: Option<String>,
    /// Always null: this service never executes the generated query
    pub result: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

pub const ERROR_PREFIX: &str = "ERROR:";

impl QueryResponse {
    pub fn success(sql: String) -> Self {
        Self {
            query: Some(sql),
            result: None,
            success: true,
            error: None,
        }
    }

    /// No table could be resolved: the message doubles as the query payload.
    pub fn schema_failure(message: &str) -> Self {
        Self {
            query: Some(format!("{} {}", ERROR_PREFIX, message)),
            result: None,
            success: false,
            error: Some(message.to_string()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            query: None,
            result: None,
            success: false,
            error: Some(message.into()),
        }
    }
}

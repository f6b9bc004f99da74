use tracing::debug;

use crate::models::JoinDescriptor;
use crate::services::patterns::{PatternLibrary, JOIN_CUE};
use crate::services::schema_model::SchemaModel;

/// Table used when nothing in the text points anywhere else
const DEFAULT_TABLE: &str = "orders";

/// Domain keywords in a business-metric label and the table they imply
const METRIC_TABLE_HINTS: &[(&[&str], &str)] = &[
    (&["revenue", "sales", "income", "orders", "average order"], "orders"),
    (&["customer", "client"], "customers"),
    (&["product", "inventory"], "products"),
];

/// Tables referenced by the text, ordered by first mention.
///
/// Falls back to business-metric hints, then column-alias hints, then the
/// default table. An empty schema never yields a table.
pub fn extract_tables(text: &str, schema: &SchemaModel, patterns: &PatternLibrary) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for (term, _) in patterns.table_mentions(text) {
        if let Some(table) = schema.resolve_table(&term.to_lowercase()) {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
    }

    if tables.is_empty() {
        if let Some(table) = table_from_metrics(text, patterns) {
            debug!("Inferred table {} from business metric", table);
            tables.push(table.to_string());
        }
    }

    if tables.is_empty() {
        if let Some(table) = table_from_column_aliases(text, schema, patterns) {
            debug!("Inferred table {} from column alias", table);
            tables.push(table);
        }
    }

    if tables.is_empty() && !schema.is_empty() {
        tables.push(DEFAULT_TABLE.to_string());
    }

    tables
}

fn table_from_metrics(text: &str, patterns: &PatternLibrary) -> Option<&'static str> {
    // Only the first mentioned metric is consulted
    let metric = patterns.mentioned_metrics(text).into_iter().next()?;
    METRIC_TABLE_HINTS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| metric.term.contains(k)))
        .map(|(_, table)| *table)
}

/// Table owning a column whose name stem matches an aliased column in the text
fn table_from_column_aliases(
    text: &str,
    schema: &SchemaModel,
    patterns: &PatternLibrary,
) -> Option<String> {
    for (column, _) in schema.column_aliases() {
        if !patterns.mentions_column(text, column) {
            continue;
        }
        let stem = column.split('_').next().unwrap_or(column);
        let owner = schema.tables().find(|table| {
            schema.columns(table).iter().any(|c| {
                let candidate_stem = c.split('_').next().unwrap_or(c);
                column.contains(candidate_stem) || c.contains(stem)
            })
        });
        if let Some(table) = owner {
            return Some(table.to_string());
        }
    }
    None
}

/// Join chain over each adjacent pair of tables
pub fn extract_joins(text: &str, schema: &SchemaModel, tables: &[String]) -> Vec<JoinDescriptor> {
    if tables.len() > 1 {
        debug!("Multiple tables, join cue present: {}", JOIN_CUE.is_match(text));
    }

    let mut joins = Vec::new();
    for pair in tables.windows(2) {
        let chain = schema.find_relationship(&pair[0], &pair[1]);
        if chain.is_empty() {
            debug!("No join path between {} and {}", pair[0], pair[1]);
        }
        joins.extend(chain);
    }
    joins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::intent::tests::sample_schema;

    fn tables(text: &str, schema: &SchemaModel) -> Vec<String> {
        let patterns = PatternLibrary::new(schema).unwrap();
        extract_tables(text, schema, &patterns)
    }

    #[test]
    fn test_tables_in_mention_order() {
        let schema = sample_schema();
        assert_eq!(tables("orders placed by customers", &schema), vec!["orders", "customers"]);
        assert_eq!(tables("customers and orders and customers", &schema), vec!["customers", "orders"]);
    }

    #[test]
    fn test_alias_resolves_without_table_name() {
        let schema = sample_schema();
        assert_eq!(tables("list every client", &schema), vec!["customers"]);
    }

    #[test]
    fn test_metric_fallback() {
        let schema = sample_schema();
        assert_eq!(tables("show total revenue", &schema), vec!["orders"]);
    }

    #[test]
    fn test_column_alias_fallback() {
        let schema = sample_schema();
        assert_eq!(tables("what was the spend", &schema), vec!["orders"]);
    }

    #[test]
    fn test_default_table_needs_a_schema() {
        let schema = sample_schema();
        assert_eq!(tables("anything at all", &schema), vec!["orders"]);
        assert!(tables("anything at all", &SchemaModel::default()).is_empty());
    }

    #[test]
    fn test_joins_follow_adjacent_pairs() {
        let schema = sample_schema();
        let selected = vec!["customers".to_string(), "order_items".to_string()];
        let joins = extract_joins("customers with items", &schema, &selected);
        assert_eq!(joins.len(), 2);
        assert_eq!(joins[0].left_table, "customers");
        assert_eq!(joins[0].right_table, "orders");
        assert_eq!(joins[1].right_table, "order_items");
    }

    #[test]
    fn test_unreachable_pair_yields_no_join() {
        let schema = sample_schema();
        let selected = vec!["customers".to_string(), "products".to_string()];
        assert!(extract_joins("customers and products", &schema, &selected).is_empty());
    }
}

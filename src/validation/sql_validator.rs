use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::api::middleware::AppError;

/// Syntax check for generated SQL
pub struct SqlValidator;

impl SqlValidator {
    /// Parse `sql` with the PostgreSQL dialect and require exactly one SELECT
    pub fn validate_select_only(sql: &str) -> Result<(), AppError> {
        let dialect = PostgreSqlDialect {};
        let statements = Parser::parse_sql(&dialect, sql)
            .map_err(|e| AppError::InvalidSql(format!("SQL parsing error: {}", e)))?;

        match statements.as_slice() {
            [] => Err(AppError::InvalidSql("Empty SQL query".to_string())),
            [Statement::Query(_)] => Ok(()),
            [other] => Err(AppError::InvalidSql(format!(
                "Only SELECT queries are permitted. Found: {}",
                Self::statement_kind(other)
            ))),
            many => Err(AppError::InvalidSql(format!(
                "Expected a single statement, found {}",
                many.len()
            ))),
        }
    }

    fn statement_kind(statement: &Statement) -> String {
        // First keyword of the rendered statement
        statement
            .to_string()
            .split_whitespace()
            .next()
            .unwrap_or("statement")
            .to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_shapes_parse() {
        let queries = [
            "SELECT \"customers\".* FROM \"customers\"",
            "SELECT COUNT(*) AS total_count FROM \"orders\"",
            "SELECT COUNT(DISTINCT \"orders\".\"order_id\") AS count_order_id FROM \"orders\"",
            "SELECT \"orders\".* FROM \"orders\" WHERE \"orders\".\"order_date\" BETWEEN '2023-01-01'::date AND '2023-03-31'::date",
            "SELECT \"customers\".* FROM \"customers\" WHERE \"customers\".\"email\" ILIKE '%gmail%'",
            "SELECT DATE_TRUNC('month', \"orders\".\"order_date\"), SUM(\"orders\".\"total_amount\") AS sum_total_amount \
             FROM \"orders\" GROUP BY DATE_TRUNC('month', \"orders\".\"order_date\") \
             HAVING SUM(\"orders\".\"total_amount\") > 100 ORDER BY SUM(\"orders\".\"total_amount\") DESC LIMIT 5",
        ];
        for sql in queries {
            assert!(SqlValidator::validate_select_only(sql).is_ok(), "{}", sql);
        }
    }

    #[test]
    fn test_non_select_is_rejected() {
        let err = SqlValidator::validate_select_only("DELETE FROM orders").unwrap_err();
        assert!(err.to_string().contains("DELETE"));
        assert!(SqlValidator::validate_select_only("SELECT 1; SELECT 2").is_err());
    }

    #[test]
    fn test_malformed_sql_is_rejected() {
        let err = SqlValidator::validate_select_only("SELECT * FROM").unwrap_err();
        assert!(matches!(err, AppError::InvalidSql(_)));
        assert!(SqlValidator::validate_select_only("").is_err());
    }
}

use std::collections::HashSet;

use tracing::warn;

use crate::api::middleware::AppError;
use crate::models::{Expr, Intent, JoinClause, SelectStatement};

pub const UNRESOLVED_TABLE_MESSAGE: &str = "Could not determine target table from input.";

/// Lowers an [`Intent`] into a [`SelectStatement`] and prints it
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryRenderer;

impl QueryRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Quoted SQL for the intent
    pub fn render(&self, intent: &Intent) -> Result<String, AppError> {
        Ok(self.build(intent)?.to_sql())
    }

    pub fn build(&self, intent: &Intent) -> Result<SelectStatement, AppError> {
        let first = intent
            .tables
            .first()
            .ok_or_else(|| AppError::SchemaResolution(UNRESOLVED_TABLE_MESSAGE.to_string()))?;

        let (from, joins) = self.join_plan(first, intent);

        let mut group_by = intent.group_by.clone();
        if group_by.is_empty() && intent.has_aggregates() {
            group_by = intent
                .columns
                .iter()
                .filter(|item| !item.expr.is_aggregate() && !item.expr.is_wildcard())
                .filter(|item| !matches!(item.expr, Expr::Raw(_)))
                .map(|item| item.expr.clone())
                .collect();
        }

        Ok(SelectStatement {
            projection: intent.columns.clone(),
            from,
            joins,
            selection: intent.filter.clone(),
            group_by,
            having: intent.having.clone(),
            order_by: intent.order_by.clone(),
            limit: intent.limit,
        })
    }

    /// Source table plus JOIN clauses, each descriptor joining whichever side
    /// is not yet part of the accumulated source
    fn join_plan(&self, first: &str, intent: &Intent) -> (String, Vec<JoinClause>) {
        let mut from = first.to_string();
        let mut included: HashSet<String> = HashSet::from([from.clone()]);
        let mut joins: Vec<JoinClause> = Vec::new();

        let position = |table: &str| intent.tables.iter().position(|t| t == table).unwrap_or(usize::MAX);

        for join in &intent.joins {
            let left_in = included.contains(&join.left_table);
            let right_in = included.contains(&join.right_table);

            let target = match (left_in, right_in) {
                (true, true) => continue,
                (true, false) => join.right_table.clone(),
                (false, true) => join.left_table.clone(),
                (false, false) if joins.is_empty() => {
                    let (base, target) = if position(&join.left_table) <= position(&join.right_table) {
                        (&join.left_table, &join.right_table)
                    } else {
                        (&join.right_table, &join.left_table)
                    };
                    included.remove(&from);
                    from = base.clone();
                    included.insert(from.clone());
                    target.clone()
                }
                (false, false) => {
                    warn!(
                        "Skipping join {} <-> {}: not connected to {}",
                        join.left_table, join.right_table, from
                    );
                    continue;
                }
            };

            included.insert(target.clone());
            joins.push(JoinClause {
                table: target,
                on: join.conditions.clone(),
            });
        }

        (from, joins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Action, AggregateFunc, ColumnRef, CompareOp, JoinDescriptor, OrderByExpr, Predicate, SelectItem,
        SortDirection,
    };

    fn intent(tables: &[&str]) -> Intent {
        Intent {
            action: Action::Select,
            tables: tables.iter().map(|t| t.to_string()).collect(),
            joins: Vec::new(),
            columns: vec![SelectItem {
                expr: Expr::QualifiedWildcard(tables.first().unwrap_or(&"x").to_string()),
                alias: None,
            }],
            filter: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    fn descriptor(left: &str, right: &str, left_col: &str, right_col: &str) -> JoinDescriptor {
        JoinDescriptor {
            left_table: left.to_string(),
            right_table: right.to_string(),
            conditions: vec![(ColumnRef::new(left, left_col), ColumnRef::new(right, right_col))],
        }
    }

    #[test]
    fn test_missing_table_is_a_schema_error() {
        let err = QueryRenderer::new().render(&intent(&[])).unwrap_err();
        assert!(matches!(err, AppError::SchemaResolution(_)));
        assert_eq!(err.to_string(), UNRESOLVED_TABLE_MESSAGE);
    }

    #[test]
    fn test_wildcard_listing() {
        let sql = QueryRenderer::new().render(&intent(&["customers"])).unwrap();
        assert_eq!(sql, "SELECT \"customers\".* FROM \"customers\"");
    }

    #[test]
    fn test_full_clause_order() {
        let mut intent = intent(&["orders"]);
        intent.columns = vec![
            SelectItem {
                expr: Expr::column("orders", "status"),
                alias: None,
            },
            SelectItem {
                expr: Expr::count_star(),
                alias: Some("total_count".to_string()),
            },
        ];
        intent.filter = Predicate::and(vec![
            Predicate::compare(
                Expr::column("orders", "total_amount"),
                CompareOp::Gt,
                Expr::Number("10".to_string()),
            ),
            Predicate::Raw("orders.order_date >= DATE_TRUNC('month', CURRENT_DATE)".to_string()),
        ]);
        intent.having = Some(Predicate::compare(
            Expr::count_star(),
            CompareOp::GtEq,
            Expr::Number("2".to_string()),
        ));
        intent.order_by = vec![OrderByExpr {
            expr: Expr::aggregate(AggregateFunc::Count, Expr::column("orders", "order_id")),
            direction: SortDirection::Desc,
        }];
        intent.limit = Some(10);

        let sql = QueryRenderer::new().render(&intent).unwrap();
        assert_eq!(
            sql,
            "SELECT \"orders\".\"status\", COUNT(*) AS total_count FROM \"orders\" \
             WHERE \"orders\".\"total_amount\" > 10 AND orders.order_date >= DATE_TRUNC('month', CURRENT_DATE) \
             GROUP BY \"orders\".\"status\" HAVING COUNT(*) >= 2 \
             ORDER BY COUNT(\"orders\".\"order_id\") DESC LIMIT 10"
        );
    }

    #[test]
    fn test_join_targets_side_not_yet_included() {
        let mut intent = intent(&["orders", "customers"]);
        intent.joins = vec![descriptor("customers", "orders", "customer_id", "customer_id")];
        let stmt = QueryRenderer::new().build(&intent).unwrap();
        assert_eq!(stmt.from, "orders");
        assert_eq!(stmt.joins.len(), 1);
        assert_eq!(stmt.joins[0].table, "customers");
        assert_eq!(
            stmt.to_string(),
            "SELECT orders.* FROM orders JOIN customers ON customers.customer_id = orders.customer_id"
        );
    }

    #[test]
    fn test_two_hop_chain_renders_two_joins() {
        let mut intent = intent(&["customers", "order_items"]);
        intent.joins = vec![
            descriptor("customers", "orders", "customer_id", "customer_id"),
            descriptor("orders", "order_items", "order_id", "order_id"),
        ];
        let stmt = QueryRenderer::new().build(&intent).unwrap();
        assert_eq!(stmt.from, "customers");
        let targets: Vec<&str> = stmt.joins.iter().map(|j| j.table.as_str()).collect();
        assert_eq!(targets, vec!["orders", "order_items"]);
    }

    #[test]
    fn test_rebase_when_first_descriptor_skips_source() {
        let mut intent = intent(&["products", "orders", "customers"]);
        intent.joins = vec![descriptor("customers", "orders", "customer_id", "customer_id")];
        let stmt = QueryRenderer::new().build(&intent).unwrap();
        assert_eq!(stmt.from, "orders");
        assert_eq!(stmt.joins[0].table, "customers");
    }

    #[test]
    fn test_redundant_and_disconnected_joins_are_skipped() {
        let mut intent = intent(&["customers", "orders", "products", "suppliers"]);
        intent.joins = vec![
            descriptor("customers", "orders", "customer_id", "customer_id"),
            descriptor("orders", "customers", "customer_id", "customer_id"),
            descriptor("products", "suppliers", "supplier_id", "supplier_id"),
        ];
        let stmt = QueryRenderer::new().build(&intent).unwrap();
        assert_eq!(stmt.joins.len(), 1);
        assert_eq!(stmt.joins[0].table, "orders");
    }

    #[test]
    fn test_group_by_falls_back_to_plain_projection() {
        let mut intent = intent(&["customers"]);
        intent.columns = vec![
            SelectItem {
                expr: Expr::column("customers", "city"),
                alias: None,
            },
            SelectItem {
                expr: Expr::Raw("SUM(orders.total_amount)".to_string()),
                alias: Some("total revenue".to_string()),
            },
        ];
        let sql = QueryRenderer::new().render(&intent).unwrap();
        assert_eq!(
            sql,
            "SELECT \"customers\".\"city\", SUM(orders.total_amount) AS \"total revenue\" \
             FROM \"customers\" GROUP BY \"customers\".\"city\""
        );
    }
}

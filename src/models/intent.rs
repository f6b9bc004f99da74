use serde::Serialize;

use super::sql::{ColumnRef, Expr, OrderByExpr, Predicate, SelectItem};

/// Kind of request detected from the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Select,
    Count,
    Average,
    Sum,
    Min,
    Max,
}

/// Table pair plus the column equalities connecting them.
/// Which side becomes the JOIN target is decided at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinDescriptor {
    pub left_table: String,
    pub right_table: String,
    pub conditions: Vec<(ColumnRef, ColumnRef)>,
}

/// Structured representation of a parsed request
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: Action,
    /// Ordered by first mention in the text (or inferred)
    pub tables: Vec<String>,
    pub joins: Vec<JoinDescriptor>,
    pub columns: Vec<SelectItem>,
    pub filter: Option<Predicate>,
    /// Empty when the query is not grouped
    pub group_by: Vec<Expr>,
    pub having: Option<Predicate>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

impl Intent {
    pub fn has_aggregates(&self) -> bool {
        self.columns.iter().any(|c| c.expr.is_aggregate() || matches!(c.expr, Expr::Raw(_)))
    }
}

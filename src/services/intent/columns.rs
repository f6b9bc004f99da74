use crate::models::{AggregateFunc, ColumnRef, Expr, SelectItem};
use crate::services::patterns::{PatternLibrary, RuleContext, AGGREGATE_FUNCTIONS};

/// Measure columns synthesized under an aggregate when nothing was named
const NUMERIC_COLUMNS: &[&str] = &["total_amount", "price", "quantity", "stock_quantity"];

/// Named columns that may be wrapped in a detected aggregate
const AGGREGATABLE_COLUMNS: &[&str] = &[
    "total_amount",
    "price",
    "quantity",
    "stock_quantity",
    "customer_id",
    "order_id",
    "product_id",
];

/// Projection list for the selected tables
pub fn extract_columns(text: &str, ctx: &RuleContext<'_>, patterns: &PatternLibrary) -> Vec<SelectItem> {
    let tables = ctx.tables;
    if tables.is_empty() {
        return vec![SelectItem {
            expr: Expr::Wildcard,
            alias: None,
        }];
    }

    let metrics: Vec<SelectItem> = patterns
        .mentioned_metrics(text)
        .into_iter()
        .map(|metric| SelectItem {
            expr: Expr::Raw(metric.value.clone()),
            alias: Some(metric.term.replace(' ', "_")),
        })
        .collect();

    let mut columns: Vec<SelectItem> = Vec::new();
    for table in tables {
        for column in ctx.schema.columns(table) {
            if patterns.mentions_column(text, column) {
                columns.push(SelectItem {
                    expr: Expr::column(table.as_str(), column.as_str()),
                    alias: None,
                });
            }
        }
    }

    let mut synthesized: Vec<SelectItem> = Vec::new();
    for func in AGGREGATE_FUNCTIONS.per_rule(text, ctx) {
        if columns.is_empty() {
            synthesized.extend(synthesize(func, ctx));
        } else {
            for item in columns.iter_mut() {
                if let Some(wrapped) = wrap(func, item) {
                    *item = wrapped;
                }
            }
        }
    }

    // Metrics take precedence over plain columns
    let mut all: Vec<SelectItem> = metrics;
    all.extend(columns);
    all.extend(synthesized);

    if all.is_empty() {
        return vec![SelectItem {
            expr: Expr::QualifiedWildcard(tables[0].clone()),
            alias: None,
        }];
    }
    all
}

fn synthesize(func: AggregateFunc, ctx: &RuleContext<'_>) -> Vec<SelectItem> {
    if func == AggregateFunc::Count {
        return vec![SelectItem {
            expr: Expr::count_star(),
            alias: Some("total_count".to_string()),
        }];
    }

    ctx.tables
        .iter()
        .flat_map(|table| {
            ctx.schema
                .columns(table)
                .iter()
                .filter(|c| NUMERIC_COLUMNS.contains(&c.as_str()))
                .map(move |c| SelectItem {
                    expr: Expr::aggregate(func, Expr::column(table.as_str(), c.as_str())),
                    alias: Some(format!("{}_{}", func.alias_prefix(), c)),
                })
        })
        .collect()
}

/// Aggregate over a plain named column; `None` leaves the item as is
fn wrap(func: AggregateFunc, item: &SelectItem) -> Option<SelectItem> {
    let column: &ColumnRef = match &item.expr {
        Expr::Column(column) => column,
        _ => return None,
    };
    let name = column.column.as_str();
    if !AGGREGATABLE_COLUMNS.contains(&name) {
        return None;
    }

    let arg = Expr::Column(column.clone());
    let expr = if func == AggregateFunc::Count && name.contains("id") {
        Expr::count_distinct(arg)
    } else {
        Expr::aggregate(func, arg)
    };
    Some(SelectItem {
        expr,
        alias: Some(format!("{}_{}", func.alias_prefix(), name)),
    })
}

use regex::Captures;
use std::sync::LazyLock;

use crate::models::{AggregateFunc, ColumnRef, CompareOp, Expr, Predicate, SelectItem};
use crate::services::patterns::{
    comparison_operator, fixed_rule, PatternLibrary, RuleContext, RuleSet, AGGREGATION_CUE,
    GROUPING_CUE, TIME_GRAIN_RULES,
};

/// Columns worth grouping by, per table
const GROUPING_CANDIDATES: &[(&str, &[&str])] = &[
    ("customers", &["name", "customer_id"]),
    ("orders", &["status", "order_date"]),
    ("products", &["category", "name", "product_id"]),
    ("order_items", &["product_id"]),
];

/// GROUP BY expressions; empty when the text asks for no grouping
pub fn extract_group_by(
    text: &str,
    ctx: &RuleContext<'_>,
    patterns: &PatternLibrary,
    columns: &[SelectItem],
) -> Vec<Expr> {
    let has_grouping = GROUPING_CUE.is_match(text);
    let has_aggregation = AGGREGATION_CUE.is_match(text);
    if !has_grouping && !has_aggregation {
        return Vec::new();
    }

    let mut groups: Vec<Expr> = Vec::new();

    for table in ctx.tables {
        let candidates = GROUPING_CANDIDATES
            .iter()
            .find(|(name, _)| *name == table.as_str())
            .map(|(_, candidates)| *candidates)
            .unwrap_or(&[]);
        for candidate in candidates {
            if !ctx.schema.has_column(table, candidate) {
                continue;
            }
            let expr = Expr::column(table.as_str(), *candidate);
            let selected = columns.iter().any(|item| item.expr == expr);
            if selected || patterns.mentions_column(text, candidate) {
                push_unique(&mut groups, expr);
            }
        }
    }

    if ctx.has_table("orders") {
        for grain in TIME_GRAIN_RULES.per_rule(text, ctx) {
            push_unique(
                &mut groups,
                Expr::DateTrunc {
                    grain,
                    column: ColumnRef::new("orders", "order_date"),
                },
            );
        }
    }

    if groups.is_empty() && has_aggregation {
        for item in columns {
            if item.expr.is_aggregate() || item.expr.is_wildcard() || matches!(item.expr, Expr::Raw(_)) {
                continue;
            }
            push_unique(&mut groups, item.expr.clone());
        }
    }

    groups
}

fn push_unique(groups: &mut Vec<Expr>, expr: Expr) {
    if !groups.contains(&expr) {
        groups.push(expr);
    }
}

/// Aggregate implied by the keyword closest before `term`
fn inferred_aggregate(text: &str, term: &str) -> Option<AggregateFunc> {
    let position = text.find(term)?;
    [
        ("total", AggregateFunc::Sum),
        ("average", AggregateFunc::Avg),
        ("count", AggregateFunc::Count),
    ]
    .into_iter()
    .filter_map(|(keyword, func)| {
        text.find(keyword)
            .filter(|index| *index < position)
            .map(|index| (index, func))
    })
    .fold(None, |best: Option<(usize, AggregateFunc)>, candidate| match best {
        Some(current) if current.0 >= candidate.0 => Some(current),
        _ => Some(candidate),
    })
    .map(|(_, func)| func)
}

fn having_threshold(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Option<Predicate> {
    let term = caps.get(1)?.as_str();
    let op = comparison_operator(caps.get(2)?.as_str())?;
    let column = Expr::Column(ctx.schema.find_column_like(term)?);
    let left = match inferred_aggregate(&ctx.text.to_lowercase(), term) {
        Some(func) => Expr::aggregate(func, column),
        None => column,
    };
    Some(Predicate::compare(left, op, Expr::Number(caps.get(3)?.as_str().to_string())))
}

fn aggregate_threshold(caps: &Captures<'_>, ctx: &RuleContext<'_>, func: AggregateFunc) -> Option<Predicate> {
    let column = ctx.schema.find_column_like(caps.get(1)?.as_str())?;
    let op = comparison_operator(caps.get(2)?.as_str())?;
    Some(Predicate::compare(
        Expr::aggregate(func, Expr::Column(column)),
        op,
        Expr::Number(caps.get(3)?.as_str().to_string()),
    ))
}

/// Counted column for a noun like `orders` or `items`
fn counted_column(noun: &str) -> Option<Expr> {
    match noun {
        "order" | "orders" | "purchase" | "purchases" => Some(Expr::column("orders", "order_id")),
        "item" | "items" | "product" | "products" => Some(Expr::column("order_items", "item_id")),
        _ => None,
    }
}

fn count_threshold(caps: &Captures<'_>, _: &RuleContext<'_>) -> Option<Predicate> {
    let op = comparison_operator(caps.get(1)?.as_str())?;
    let column = counted_column(&caps.get(3)?.as_str().to_lowercase())?;
    Some(Predicate::compare(
        Expr::aggregate(AggregateFunc::Count, column),
        op,
        Expr::Number(caps.get(2)?.as_str().to_string()),
    ))
}

static HAVING_RULES: LazyLock<RuleSet<Predicate>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule(
            "having",
            r"(?i)having\s+(\w+)\s+(greater than|less than|at least|at most|equals|equal to|>=|<=|>|<|=)\s+(\d+)",
            having_threshold,
        ),
        fixed_rule(
            "where_total",
            r"(?i)where\s+total\s+(\w+)\s+is\s+(greater than|less than)\s+(\d+)",
            |c, x| aggregate_threshold(c, x, AggregateFunc::Sum),
        ),
        fixed_rule(
            "where_average",
            r"(?i)where\s+average\s+(\w+)\s+is\s+(greater than|less than)\s+(\d+)",
            |c, x| aggregate_threshold(c, x, AggregateFunc::Avg),
        ),
        fixed_rule(
            "with_count",
            r"(?i)with\s+(more than|at least|less than)\s+(\d+)\s+(\w+)",
            count_threshold,
        ),
        fixed_rule("ordered_times", r"(?i)who\s+ordered\s+more than\s+(\d+)\s+times?\b", |c, _| {
            Some(Predicate::compare(
                Expr::aggregate(AggregateFunc::Count, Expr::column("orders", "order_id")),
                CompareOp::Gt,
                Expr::Number(c.get(1)?.as_str().to_string()),
            ))
        }),
    ])
});

/// HAVING predicate; only grouped queries get one
pub fn extract_having(text: &str, ctx: &RuleContext<'_>, group_by: &[Expr]) -> Option<Predicate> {
    if group_by.is_empty() {
        return None;
    }

    let mut atoms: Vec<Predicate> = Vec::new();
    for predicate in HAVING_RULES.all(text, ctx) {
        if !atoms.contains(&predicate) {
            atoms.push(predicate);
        }
    }
    Predicate::and(atoms)
}

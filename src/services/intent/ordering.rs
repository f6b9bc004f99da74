use regex::Regex;
use std::sync::LazyLock;

use crate::models::{AggregateFunc, ColumnRef, Expr, OrderByExpr, SortDirection};
use crate::services::patterns::{
    RuleContext, BOTTOM_CUE, DESCENDING_CUE, LIMIT_RULES, ORDERING_AGGREGATE_CUES, RANKING_WORD, TOP_CUE,
};

static EXPLICIT_ORDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:order|ordered|sort|sorted|arrange|arranged|rank|ranked)\s+by\s+(\w+)")
        .expect("order-by pattern must compile")
});

/// ORDER BY keys. Direction is one global choice for the whole text.
pub fn extract_order(text: &str, ctx: &RuleContext<'_>) -> Vec<OrderByExpr> {
    let lowered = text.to_lowercase();
    let direction = if DESCENDING_CUE.is_match(text) {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };

    let mut order_by = Vec::new();

    if let Some(caps) = EXPLICIT_ORDER.captures(text) {
        let term = caps.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        if let Some(expr) = explicit_key(&term, &lowered, ctx) {
            order_by.push(OrderByExpr { expr, direction });
        }
    } else if TOP_CUE.is_match(text) {
        order_by.push(OrderByExpr {
            expr: guessed_measure(&lowered),
            direction: SortDirection::Desc,
        });
    } else if BOTTOM_CUE.is_match(text) {
        order_by.push(OrderByExpr {
            expr: guessed_measure(&lowered),
            direction: SortDirection::Asc,
        });
    }

    if order_by.is_empty() && RANKING_WORD.is_match(text) {
        if let Some(expr) = ranking_fallback(&lowered, ctx) {
            order_by.push(OrderByExpr {
                expr,
                direction: SortDirection::Desc,
            });
        }
    }

    order_by
}

/// Column named after `order by`, else an aliased column under a cue aggregate
fn explicit_key(term: &str, text: &str, ctx: &RuleContext<'_>) -> Option<Expr> {
    if let Some(column) = ctx.schema.find_column_like(term) {
        return Some(Expr::Column(column));
    }

    let canonical = ctx.schema.resolve_column(term, None);
    if canonical == term {
        return None;
    }
    let (table, column) = ctx.schema.all_columns().find(|(_, c)| *c == canonical)?;
    let column = Expr::column(table, column);
    Some(match ORDERING_AGGREGATE_CUES.first(text, ctx) {
        Some(func) => Expr::aggregate(func, column),
        None => column,
    })
}

/// Measure for a top/bottom N request without an explicit sort phrase
fn guessed_measure(text: &str) -> Expr {
    for keyword in ["revenue", "sales", "amount", "price", "quantity"] {
        if !text.contains(keyword) {
            continue;
        }
        return match keyword {
            "price" if text.contains("products") => Expr::column("products", "price"),
            "price" => Expr::column("order_items", "price"),
            "quantity" => Expr::column("order_items", "quantity"),
            _ => Expr::column("orders", "total_amount"),
        };
    }

    if text.contains("customer") {
        Expr::aggregate(AggregateFunc::Count, Expr::column("orders", "order_id"))
    } else if text.contains("product") {
        Expr::aggregate(AggregateFunc::Sum, Expr::column("order_items", "quantity"))
    } else {
        Expr::column("orders", "total_amount")
    }
}

fn ranking_fallback(text: &str, ctx: &RuleContext<'_>) -> Option<Expr> {
    if text.contains("recent") && ctx.schema.has_table("orders") {
        Some(Expr::Column(ColumnRef::new("orders", "order_date")))
    } else if ["sales", "revenue", "amount"].iter().any(|k| text.contains(k)) {
        Some(Expr::column("orders", "total_amount"))
    } else if text.contains("price") {
        Some(Expr::column("products", "price"))
    } else {
        None
    }
}

/// Row limit; zero is never a limit
pub fn extract_limit(text: &str, ctx: &RuleContext<'_>) -> Option<u64> {
    LIMIT_RULES.first(text, ctx)
}

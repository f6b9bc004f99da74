// WHERE predicate extraction.
//
// A "total amount" comparison short-circuits every other family. Otherwise
// predicates from each family are accumulated into one flat conjunction.

use regex::Captures;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{ColumnRef, CompareOp, Expr, Predicate};
use crate::services::patterns::{
    comparison_operator, fixed_rule, is_comparison_word, normalize_status, PatternLibrary, RuleContext,
    RuleSet,
};

macro_rules! comparison_phrase {
    () => {
        r"(greater than|more than|above|over|exceeding|less than|below|under|at least|at most|equal to|equals|>=|<=|>|<|=)"
    };
}

macro_rules! number {
    () => {
        r"(\d+(?:\.\d+)?)"
    };
}

fn total_amount(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Option<Predicate> {
    if !ctx.has_table("orders") {
        return None;
    }
    let op = comparison_operator(caps.get(1)?.as_str())?;
    Some(Predicate::compare(
        Expr::column("orders", "total_amount"),
        op,
        Expr::Number(caps.get(2)?.as_str().to_string()),
    ))
}

static TOTAL_AMOUNT_RULES: LazyLock<RuleSet<Predicate>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule(
            "total_amount",
            concat!(r"(?i)\btotal\s+(?:order\s+)?amount\s+(?:is\s+)?", comparison_phrase!(), r"\s+", number!()),
            total_amount,
        ),
        fixed_rule(
            "order_amount",
            concat!(r"(?i)\borders?\s+(?:with\s+)?amount\s+(?:is\s+)?", comparison_phrase!(), r"\s+", number!()),
            total_amount,
        ),
        fixed_rule(
            "order_total",
            concat!(r"(?i)\b(?:orders?\s+)?total\s+(?:is\s+)?", comparison_phrase!(), r"\s+", number!()),
            total_amount,
        ),
    ])
});

static AMOUNT_RULES: LazyLock<RuleSet<Predicate>> = LazyLock::new(|| {
    RuleSet::new(vec![fixed_rule(
        "amount",
        concat!(
            r"(?i)\b(?:amount|price|sum|value|cost)\s+(?:is\s+)?",
            r"(greater than|more than|above|over|less than|below|under|at least|at most|>=|<=|>|<)\s+",
            number!()
        ),
        total_amount,
    )])
});

/// Column of a selected table that `term` names
fn selected_column(term: &str, ctx: &RuleContext<'_>) -> Option<ColumnRef> {
    if is_comparison_word(term) {
        return None;
    }
    ctx.tables.iter().find_map(|table| {
        let column = ctx.schema.resolve_column(term, Some(table));
        ctx.schema
            .has_column(table, &column)
            .then(|| ColumnRef::new(table.as_str(), column))
    })
}

/// Digits with at most one inner `.`
fn is_numeric(value: &str) -> bool {
    let mut parts = value.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
    digits(whole) && parts.next().map_or(true, digits)
}

fn literal(value: &str) -> Expr {
    if is_numeric(value) {
        Expr::Number(value.to_string())
    } else {
        Expr::Text(value.to_string())
    }
}

fn comparison(caps: &Captures<'_>, ctx: &RuleContext<'_>, op: CompareOp) -> Option<Predicate> {
    let column = selected_column(caps.get(1)?.as_str(), ctx)?;
    let mut value = caps.get(2)?.as_str();
    if is_comparison_word(value) {
        return None;
    }
    if column.column == "status" {
        value = normalize_status(value).unwrap_or(value);
    }
    Some(Predicate::compare(Expr::Column(column), op, literal(value)))
}

static COMPARISON_RULES: LazyLock<RuleSet<Predicate>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule("is", r"(?i)(\w+)\s+is\s+(\w+)", |c, x| comparison(c, x, CompareOp::Eq)),
        fixed_rule("equals", r"(?i)(\w+)\s+equals\s+(\w+)", |c, x| comparison(c, x, CompareOp::Eq)),
        fixed_rule("eq_symbol", r"(?i)(\w+)\s+=\s+(\w+)", |c, x| comparison(c, x, CompareOp::Eq)),
        fixed_rule("equal_to", r"(?i)(\w+)\s+equal to\s+(\w+)", |c, x| comparison(c, x, CompareOp::Eq)),
        fixed_rule("greater_than", r"(?i)(\w+)\s+(?:is\s+)?greater than\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::Gt)),
        fixed_rule("more_than", r"(?i)(\w+)\s+(?:is\s+)?more than\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::Gt)),
        fixed_rule("above", r"(?i)(\w+)\s+(?:is\s+)?above\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::Gt)),
        fixed_rule("gt_symbol", r"(?i)(\w+)\s+(?:is\s+)?>\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::Gt)),
        fixed_rule("less_than", r"(?i)(\w+)\s+(?:is\s+)?less than\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::Lt)),
        fixed_rule("below", r"(?i)(\w+)\s+(?:is\s+)?below\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::Lt)),
        fixed_rule("lt_symbol", r"(?i)(\w+)\s+(?:is\s+)?<\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::Lt)),
        fixed_rule("at_least", r"(?i)(\w+)\s+(?:is\s+)?at least\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::GtEq)),
        fixed_rule("gte_symbol", r"(?i)(\w+)\s+(?:is\s+)?>=\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::GtEq)),
        fixed_rule("at_most", r"(?i)(\w+)\s+(?:is\s+)?at most\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::LtEq)),
        fixed_rule("lte_symbol", r"(?i)(\w+)\s+(?:is\s+)?<=\s+(\d+(?:\.\d+)?)", |c, x| comparison(c, x, CompareOp::LtEq)),
        fixed_rule("not_equal_to", r"(?i)(\w+)\s+not equal to\s+(\w+)", |c, x| comparison(c, x, CompareOp::NotEq)),
        fixed_rule("neq_symbol", r"(?i)(\w+)\s+!=\s+(\w+)", |c, x| comparison(c, x, CompareOp::NotEq)),
        fixed_rule("different_from", r"(?i)(\w+)\s+different from\s+(\w+)", |c, x| comparison(c, x, CompareOp::NotEq)),
    ])
});

fn date_range(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Option<Predicate> {
    let column = selected_column(caps.get(1)?.as_str(), ctx)?;
    Some(Predicate::DateBetween {
        column,
        start: caps.get(2)?.as_str().to_string(),
        end: caps.get(3)?.as_str().to_string(),
    })
}

static DATE_RANGE_RULES: LazyLock<RuleSet<Predicate>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule("between", r"(?i)(\w+)\s+between\s+([\w.-]+)\s+and\s+([\w.-]+)", date_range),
        fixed_rule("from_to", r"(?i)(\w+)\s+from\s+([\w.-]+)\s+to\s+([\w.-]+)", date_range),
    ])
});

fn substring(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Option<Predicate> {
    let column = selected_column(caps.get(1)?.as_str(), ctx)?;
    Some(Predicate::ILike {
        column,
        needle: caps.get(2)?.as_str().to_string(),
    })
}

static SUBSTRING_RULES: LazyLock<RuleSet<Predicate>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule("contains", r"(?i)(\w+)\s+contains\s+(\w+)", substring),
        fixed_rule("like", r"(?i)(\w+)\s+like\s+(\w+)", substring),
        fixed_rule("in_it", r"(?i)(\w+)\s+with\s+(\w+)\s+in\s+it\b", substring),
    ])
});

fn status(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Option<Predicate> {
    if !ctx.has_table("orders") {
        return None;
    }
    // Last group holds the status word
    let value = caps.iter().flatten().last()?.as_str();
    let normalized = normalize_status(value)?;
    Some(Predicate::compare(
        Expr::column("orders", "status"),
        CompareOp::Eq,
        Expr::Text(normalized.to_string()),
    ))
}

static STATUS_RULES: LazyLock<RuleSet<Predicate>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule("column_status", r"(?i)(\w+)\s+status\s+is\s+(\w+)", status),
        fixed_rule("status", r"(?i)status\s+is\s+(\w+)", status),
        fixed_rule("status_orders", r"(?i)(\w+)\s+orders\b", status),
    ])
});

/// WHERE predicate for the selected tables
pub fn extract_filter(text: &str, ctx: &RuleContext<'_>, patterns: &PatternLibrary) -> Option<Predicate> {
    if ctx.tables.is_empty() {
        return None;
    }

    if let Some(predicate) = TOTAL_AMOUNT_RULES.first(text, ctx) {
        debug!("Total amount comparison short-circuits filter extraction");
        return Some(predicate);
    }

    let mut atoms: Vec<Predicate> = Vec::new();

    if ctx.has_table("orders") {
        if let Some(period) = patterns.time_period(text) {
            atoms.push(Predicate::Raw(period.value.clone()));
        }
    }

    let families = [
        AMOUNT_RULES.all(text, ctx),
        COMPARISON_RULES.all(text, ctx),
        DATE_RANGE_RULES.all(text, ctx),
        SUBSTRING_RULES.all(text, ctx),
        STATUS_RULES.all(text, ctx),
    ];
    for predicate in families.into_iter().flatten() {
        if !atoms.contains(&predicate) {
            atoms.push(predicate);
        }
    }

    Predicate::and(atoms)
}

// Pattern library
//
// Ordered rule sets per grammatical category, evaluated by one generic rule
// engine. Fixed English cue vocabularies are compiled once per process;
// schema vocabulary (tables, aliases, metrics, time phrases) is compiled per
// request into a `PatternLibrary`.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::trace;

use crate::api::middleware::AppError;
use crate::models::{Action, AggregateFunc, CompareOp, TimeGrain};
use crate::services::schema_model::SchemaModel;

/// Inputs available to rule actions
pub struct RuleContext<'a> {
    pub schema: &'a SchemaModel,
    pub tables: &'a [String],
    pub text: &'a str,
}

impl<'a> RuleContext<'a> {
    pub fn new(schema: &'a SchemaModel, tables: &'a [String], text: &'a str) -> Self {
        Self { schema, tables, text }
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }
}

/// Rule action: turns a match into a value, or declines with `None`
pub type RuleAction<T> = fn(&Captures<'_>, &RuleContext<'_>) -> Option<T>;

/// A `(predicate, action)` pair
pub struct Rule<T> {
    pub name: &'static str,
    pattern: Regex,
    action: RuleAction<T>,
}

impl<T> Rule<T> {
    pub fn new(name: &'static str, pattern: &str, action: RuleAction<T>) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            action,
        })
    }

    /// Every value this rule produces on `text`, in text order
    fn fire_all(&self, text: &str, ctx: &RuleContext<'_>) -> Vec<T> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| (self.action)(&caps, ctx))
            .collect()
    }

    fn fire_first(&self, text: &str, ctx: &RuleContext<'_>) -> Option<T> {
        self.pattern
            .captures_iter(text)
            .find_map(|caps| (self.action)(&caps, ctx))
    }
}

/// Rule over a compile-time constant pattern
pub fn fixed_rule<T>(name: &'static str, pattern: &'static str, action: RuleAction<T>) -> Rule<T> {
    Rule::new(name, pattern, action).expect("fixed rule pattern must compile")
}

/// Ordered rules; declaration order is precedence
pub struct RuleSet<T> {
    rules: Vec<Rule<T>>,
}

impl<T> RuleSet<T> {
    pub fn new(rules: Vec<Rule<T>>) -> Self {
        Self { rules }
    }

    /// Value of the first rule that fires
    pub fn first(&self, text: &str, ctx: &RuleContext<'_>) -> Option<T> {
        self.rules.iter().find_map(|rule| {
            let value = rule.fire_first(text, ctx)?;
            trace!(rule = rule.name, "Rule fired");
            Some(value)
        })
    }

    /// Every value of every rule: rule order, then text order
    pub fn all(&self, text: &str, ctx: &RuleContext<'_>) -> Vec<T> {
        self.rules
            .iter()
            .flat_map(|rule| rule.fire_all(text, ctx))
            .collect()
    }

    /// At most one value per rule, in rule order
    pub fn per_rule(&self, text: &str, ctx: &RuleContext<'_>) -> Vec<T> {
        self.rules
            .iter()
            .filter_map(|rule| rule.fire_first(text, ctx))
            .collect()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.rules.iter().any(|rule| rule.pattern.is_match(text))
    }
}

fn cue(pattern: &str) -> Regex {
    Regex::new(pattern).expect("fixed cue pattern must compile")
}

// ---------------------------------------------------------------------------
// Fixed categories
// ---------------------------------------------------------------------------

pub static ACTION_RULES: LazyLock<RuleSet<Action>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule(
            "select",
            r"(?i)\b(show|list|display|get|find|search|select|query|retrieve|give me|what are|what is)\b",
            |_, _| Some(Action::Select),
        ),
        fixed_rule("count", r"(?i)\b(count|how many|total number|number of)\b", |_, _| Some(Action::Count)),
        fixed_rule("average", r"(?i)\b(average|avg|mean|typical)\b", |_, _| Some(Action::Average)),
        fixed_rule("sum", r"(?i)\b(sum|total|add up|overall)\b", |_, _| Some(Action::Sum)),
        fixed_rule("min", r"(?i)\b(minimum|min|smallest|lowest|least)\b", |_, _| Some(Action::Min)),
        fixed_rule("max", r"(?i)\b(maximum|max|largest|highest|most|greatest)\b", |_, _| Some(Action::Max)),
    ])
});

pub static JOIN_CUE: LazyLock<Regex> = LazyLock::new(|| {
    cue(r"(?i)\b(with|along with|including|related|associated|linked to|joined with|from|and their|who have)\b")
});

pub static GROUPING_CUE: LazyLock<Regex> = LazyLock::new(|| {
    cue(r"(?i)\b(group by|grouped by|per|by|categorized by|segmented by|broken down by)\b")
});

pub static AGGREGATION_CUE: LazyLock<Regex> =
    LazyLock::new(|| cue(r"(?i)\b(total|average|count|sum|min|max|mean|highest|lowest)\b"));

/// Aggregate function cues, evaluated per rule in this order
pub static AGGREGATE_FUNCTIONS: LazyLock<RuleSet<AggregateFunc>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule("count", r"(?i)\b(count|how many|number of)\b", |_, _| Some(AggregateFunc::Count)),
        fixed_rule("avg", r"(?i)\b(average|avg|mean)\b", |_, _| Some(AggregateFunc::Avg)),
        fixed_rule("sum", r"(?i)\b(sum|total|add up)\b", |_, _| Some(AggregateFunc::Sum)),
        fixed_rule("min", r"(?i)\b(minimum|min|smallest|lowest)\b", |_, _| Some(AggregateFunc::Min)),
        fixed_rule("max", r"(?i)\b(maximum|max|largest|highest|greatest)\b", |_, _| Some(AggregateFunc::Max)),
    ])
});

/// Aggregate guessed from cue words when an ORDER BY term names no column
pub static ORDERING_AGGREGATE_CUES: LazyLock<RuleSet<AggregateFunc>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule("total", r"(?i)total", |_, _| Some(AggregateFunc::Sum)),
        fixed_rule("sum", r"(?i)sum", |_, _| Some(AggregateFunc::Sum)),
        fixed_rule("average", r"(?i)average", |_, _| Some(AggregateFunc::Avg)),
        fixed_rule("avg", r"(?i)avg", |_, _| Some(AggregateFunc::Avg)),
        fixed_rule("count", r"(?i)count", |_, _| Some(AggregateFunc::Count)),
        fixed_rule("number", r"(?i)number", |_, _| Some(AggregateFunc::Count)),
    ])
});

/// Map a comparison phrase to its operator
pub fn comparison_operator(phrase: &str) -> Option<CompareOp> {
    let phrase = phrase.trim().to_lowercase();
    let op = match phrase.as_str() {
        "is" | "equals" | "equal to" | "=" => CompareOp::Eq,
        "greater than" | "more than" | "above" | "over" | "exceeding" | ">" => CompareOp::Gt,
        "less than" | "below" | "under" | "<" => CompareOp::Lt,
        "at least" | ">=" => CompareOp::GtEq,
        "at most" | "<=" => CompareOp::LtEq,
        "not equal to" | "!=" | "different from" => CompareOp::NotEq,
        _ => return None,
    };
    Some(op)
}

/// Words that belong to comparison phrasing and are never values or columns
pub fn is_comparison_word(word: &str) -> bool {
    matches!(
        word,
        "greater"
            | "less"
            | "more"
            | "than"
            | "not"
            | "at"
            | "least"
            | "most"
            | "equal"
            | "equals"
            | "to"
            | "is"
            | "above"
            | "below"
            | "over"
            | "under"
            | "between"
            | "different"
            | "from"
            | "where"
            | "with"
            | "and"
    )
}

/// Normalize a status word to its stored value
pub fn normalize_status(value: &str) -> Option<&'static str> {
    let status = match value.to_lowercase().as_str() {
        "complete" | "completed" => "completed",
        "pending" => "pending",
        "shipped" => "shipped",
        "cancelled" | "canceled" => "cancelled",
        "processing" => "processing",
        "new" => "new",
        "delivered" => "delivered",
        _ => return None,
    };
    Some(status)
}

pub static DESCENDING_CUE: LazyLock<Regex> = LazyLock::new(|| {
    cue(r"(?i)\b(descending|decrease|descend|drop|highest|best|top)\b")
});

pub static TOP_CUE: LazyLock<Regex> =
    LazyLock::new(|| cue(r"(?i)\b(top|highest|best|most)\s+\d+"));

pub static BOTTOM_CUE: LazyLock<Regex> =
    LazyLock::new(|| cue(r"(?i)\b(bottom|lowest|worst|least)\s+\d+"));

pub static RANKING_WORD: LazyLock<Regex> =
    LazyLock::new(|| cue(r"(?i)(top|highest|best|bottom|lowest|worst)"));

/// Time granularity phrases for GROUP BY, singular and plural
pub static TIME_GRAIN_RULES: LazyLock<RuleSet<TimeGrain>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule("daily", r"(?i)\b(daily|day|days)\b", |_, _| Some(TimeGrain::Day)),
        fixed_rule("monthly", r"(?i)\b(monthly|month|months)\b", |_, _| Some(TimeGrain::Month)),
        fixed_rule("yearly", r"(?i)\b(yearly|year|years)\b", |_, _| Some(TimeGrain::Year)),
        fixed_rule("quarterly", r"(?i)\b(quarterly|quarter|quarters)\b", |_, _| Some(TimeGrain::Quarter)),
        fixed_rule("weekly", r"(?i)\b(weekly|week|weeks)\b", |_, _| Some(TimeGrain::Week)),
    ])
});

fn positive_count(caps: &Captures<'_>) -> Option<u64> {
    caps.get(1)?.as_str().parse::<u64>().ok().filter(|n| *n > 0)
}

/// `first N` / `last N` followed by a time unit is a time phrase, not a limit
fn count_not_followed_by_time_unit(caps: &Captures<'_>, _: &RuleContext<'_>) -> Option<u64> {
    let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    if matches!(
        unit,
        "day" | "days" | "week" | "weeks" | "month" | "months" | "quarter" | "quarters" | "year" | "years"
    ) {
        return None;
    }
    positive_count(caps)
}

pub static LIMIT_RULES: LazyLock<RuleSet<u64>> = LazyLock::new(|| {
    RuleSet::new(vec![
        fixed_rule("limit", r"(?i)\blimit\s+(\d+)\b", |caps, _| positive_count(caps)),
        fixed_rule("top", r"(?i)\btop\s+(\d+)\b", |caps, _| positive_count(caps)),
        fixed_rule("first", r"(?i)\bfirst\s+(\d+)\b(?:\s+(\w+))?", count_not_followed_by_time_unit),
        fixed_rule("bottom", r"(?i)\bbottom\s+(\d+)\b", |caps, _| positive_count(caps)),
        fixed_rule("last", r"(?i)\blast\s+(\d+)\b(?:\s+(\w+))?", count_not_followed_by_time_unit),
        fixed_rule("highest", r"(?i)\bhighest\s+(\d+)\b", |caps, _| positive_count(caps)),
        fixed_rule("lowest", r"(?i)\blowest\s+(\d+)\b", |caps, _| positive_count(caps)),
        fixed_rule("best", r"(?i)\bbest\s+(\d+)\b", |caps, _| positive_count(caps)),
        fixed_rule("worst", r"(?i)\bworst\s+(\d+)\b", |caps, _| positive_count(caps)),
    ])
});

// ---------------------------------------------------------------------------
// Schema vocabulary
// ---------------------------------------------------------------------------

/// Whole-word, case-insensitive matcher for a schema phrase
#[derive(Debug, Clone)]
pub struct Phrase {
    pub term: String,
    pub value: String,
    regex: Regex,
}

impl Phrase {
    fn new(term: &str, value: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            term: term.to_string(),
            value: value.to_string(),
            regex: Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term)))?,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn find(&self, text: &str) -> Option<usize> {
        self.regex.find(text).map(|m| m.start())
    }
}

/// Column and the phrases it can be mentioned by
#[derive(Debug, Clone)]
struct ColumnPhrases {
    column: String,
    forms: Regex,
}

/// Request-scoped pattern library
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    /// Alternation of table names then table aliases, in declaration order
    table_reference: Option<Regex>,
    metrics: Vec<Phrase>,
    time_periods: Vec<Phrase>,
    columns: Vec<ColumnPhrases>,
}

impl PatternLibrary {
    pub fn new(schema: &SchemaModel) -> Result<Self, AppError> {
        let terms: Vec<String> = schema
            .tables()
            .map(str::to_string)
            .chain(schema.table_aliases().iter().map(|(alias, _)| alias.clone()))
            .filter(|t| !t.is_empty())
            .map(|t| regex::escape(&t))
            .collect();

        let table_reference = if terms.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"(?i)\b({})\b", terms.join("|")))?)
        };

        let metrics = schema
            .business_metrics()
            .iter()
            .map(|(name, expr)| Phrase::new(name, expr))
            .collect::<Result<Vec<_>, _>>()?;

        let time_periods = schema
            .time_periods()
            .iter()
            .map(|(phrase, sql)| Phrase::new(phrase, sql))
            .collect::<Result<Vec<_>, _>>()?;

        let mut columns: Vec<ColumnPhrases> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        let names = schema
            .all_columns()
            .map(|(_, column)| column.to_string())
            .chain(schema.column_aliases().iter().map(|(column, _)| column.clone()));
        for column in names {
            if seen.contains(&column) {
                continue;
            }
            let forms: Vec<String> = schema
                .aliases_for(&column)
                .iter()
                .filter(|f| !f.is_empty())
                .map(|f| regex::escape(f))
                .collect();
            columns.push(ColumnPhrases {
                forms: Regex::new(&format!(r"(?i)\b({})\b", forms.join("|")))?,
                column: column.clone(),
            });
            seen.push(column);
        }

        Ok(Self {
            table_reference,
            metrics,
            time_periods,
            columns,
        })
    }

    /// Every table or alias mention as `(term, byte offset)`, in text order
    pub fn table_mentions<'t>(&self, text: &'t str) -> Vec<(&'t str, usize)> {
        match &self.table_reference {
            Some(regex) => regex
                .find_iter(text)
                .map(|m| (m.as_str(), m.start()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Business metrics mentioned in the text, in declaration order
    pub fn mentioned_metrics(&self, text: &str) -> Vec<&Phrase> {
        self.metrics.iter().filter(|m| m.is_match(text)).collect()
    }

    /// First declared time phrase present in the text
    pub fn time_period(&self, text: &str) -> Option<&Phrase> {
        self.time_periods.iter().find(|p| p.is_match(text))
    }

    /// Whether `column` is mentioned by its name or any alias
    pub fn mentions_column(&self, text: &str, column: &str) -> bool {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.forms.is_match(text))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryRequest;

    fn schema() -> SchemaModel {
        let request: QueryRequest = serde_json::from_value(serde_json::json!({
            "query": "",
            "schema": [
                {"customers": ["customer_id", "name"]},
                {"orders": ["order_id", "customer_id", "total_amount", "status"]}
            ],
            "tableAliases": {"client": "customers"},
            "columnAliases": {"total_amount": ["amount", "order value"]},
            "businessMetrics": {"total revenue": "SUM(orders.total_amount)", "order count": "COUNT(orders.order_id)"}
        }))
        .unwrap();
        SchemaModel::from_request(&request)
    }

    #[test]
    fn test_action_precedence() {
        let ctx_schema = SchemaModel::default();
        let ctx = RuleContext::new(&ctx_schema, &[], "");
        assert_eq!(ACTION_RULES.first("show the count", &ctx), Some(Action::Select));
        assert_eq!(ACTION_RULES.first("how many orders", &ctx), Some(Action::Count));
        assert_eq!(ACTION_RULES.first("average price", &ctx), Some(Action::Average));
        assert_eq!(ACTION_RULES.first("orders", &ctx), None);
        assert_eq!(ACTION_RULES.first("largest order", &ctx), Some(Action::Max));
    }

    #[test]
    fn test_per_rule_keeps_rule_order() {
        let schema = SchemaModel::default();
        let ctx = RuleContext::new(&schema, &[], "");
        let funcs = AGGREGATE_FUNCTIONS.per_rule("total count of orders", &ctx);
        assert_eq!(funcs, vec![AggregateFunc::Count, AggregateFunc::Sum]);
    }

    #[test]
    fn test_limit_rules() {
        let schema = SchemaModel::default();
        let ctx = RuleContext::new(&schema, &[], "");
        assert_eq!(LIMIT_RULES.first("top 5 customers", &ctx), Some(5));
        assert_eq!(LIMIT_RULES.first("limit 0", &ctx), None);
        assert_eq!(LIMIT_RULES.first("orders last 7 days", &ctx), None);
        assert_eq!(LIMIT_RULES.first("last 3 orders", &ctx), Some(3));
        assert_eq!(LIMIT_RULES.first("show orders", &ctx), None);
    }

    #[test]
    fn test_comparison_vocabulary() {
        assert_eq!(comparison_operator("greater than"), Some(CompareOp::Gt));
        assert_eq!(comparison_operator("at most"), Some(CompareOp::LtEq));
        assert_eq!(comparison_operator("!="), Some(CompareOp::NotEq));
        assert_eq!(comparison_operator("maybe"), None);
        assert_eq!(normalize_status("Canceled"), Some("cancelled"));
        assert_eq!(normalize_status("lost"), None);
        assert!(is_comparison_word("than"));
    }

    #[test]
    fn test_table_mentions_include_aliases() {
        let library = PatternLibrary::new(&schema()).unwrap();
        let mentions = library.table_mentions("orders for each client");
        assert_eq!(mentions, vec![("orders", 0), ("client", 16)]);
        assert!(library.table_mentions("nothing here").is_empty());
    }

    #[test]
    fn test_schema_phrases() {
        let library = PatternLibrary::new(&schema()).unwrap();
        let metrics = library.mentioned_metrics("show total revenue by client");
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].value, "SUM(orders.total_amount)");

        assert!(library.mentions_column("orders with order value above 10", "total_amount"));
        assert!(library.mentions_column("customer name", "name"));
        assert!(!library.mentions_column("customer", "name"));
        assert!(library.mentions_column("amount and name", "total_amount"));

        assert_eq!(library.time_period("orders this month").map(|p| p.term.as_str()), Some("this month"));
    }

    #[test]
    fn test_empty_schema_has_no_table_pattern() {
        let library = PatternLibrary::new(&SchemaModel::default()).unwrap();
        assert!(library.table_mentions("orders").is_empty());
    }

    #[test]
    fn test_cues() {
        assert!(GROUPING_CUE.is_match("sales per region"));
        assert!(AGGREGATION_CUE.is_match("total sales"));
        assert!(JOIN_CUE.is_match("customers along with orders"));
        assert!(DESCENDING_CUE.is_match("best sellers"));
        assert!(TOP_CUE.is_match("top 3"));
        assert!(BOTTOM_CUE.is_match("worst 2 products"));
        assert!(!TOP_CUE.is_match("top products"));
    }
}

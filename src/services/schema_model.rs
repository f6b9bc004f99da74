use std::collections::HashSet;

use serde_json::Value;

use crate::models::{ColumnRef, JsonObject, JoinDescriptor, QueryRequest};

/// Built-in time phrases used when the request carries none
const DEFAULT_TIME_PERIODS: &[(&str, &str)] = &[
    ("today", "orders.order_date::date = CURRENT_DATE"),
    ("yesterday", "orders.order_date::date = CURRENT_DATE - INTERVAL '1 day'"),
    ("last 7 days", "orders.order_date >= CURRENT_DATE - INTERVAL '7 days'"),
    ("last 30 days", "orders.order_date >= CURRENT_DATE - INTERVAL '30 days'"),
    ("this week", "orders.order_date >= DATE_TRUNC('week', CURRENT_DATE)"),
    (
        "last week",
        "orders.order_date >= DATE_TRUNC('week', CURRENT_DATE) - INTERVAL '1 week' AND orders.order_date < DATE_TRUNC('week', CURRENT_DATE)",
    ),
    ("this month", "orders.order_date >= DATE_TRUNC('month', CURRENT_DATE)"),
    (
        "last month",
        "orders.order_date >= DATE_TRUNC('month', CURRENT_DATE) - INTERVAL '1 month' AND orders.order_date < DATE_TRUNC('month', CURRENT_DATE)",
    ),
    ("this quarter", "orders.order_date >= DATE_TRUNC('quarter', CURRENT_DATE)"),
    ("this year", "orders.order_date >= DATE_TRUNC('year', CURRENT_DATE)"),
    (
        "last year",
        "orders.order_date >= DATE_TRUNC('year', CURRENT_DATE) - INTERVAL '1 year' AND orders.order_date < DATE_TRUNC('year', CURRENT_DATE)",
    ),
];

/// String-valued entries of `object` in declaration order; other values are skipped
fn string_entries(object: &JsonObject) -> impl Iterator<Item = (&String, &str)> {
    object.iter().filter_map(|(key, value)| match value.as_str() {
        Some(text) => Some((key, text)),
        None => {
            tracing::warn!("Ignoring non-string value for {}: {}", key, value);
            None
        }
    })
}

/// Strings of a JSON array (a lone string counts as a one-element list)
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => vec![text.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        other => {
            tracing::warn!("Expected a list of names, got {}", other);
            Vec::new()
        }
    }
}

/// Declared join between two tables
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub left: String,
    pub right: String,
    pub conditions: Vec<(ColumnRef, ColumnRef)>,
}

/// Request-scoped view of the caller's schema: tables, aliases,
/// relationships, business metrics and time phrases.
///
/// Every collection keeps declaration order; lookups return the first
/// declared match.
#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    tables: Vec<(String, Vec<String>)>,
    table_aliases: Vec<(String, String)>,
    column_aliases: Vec<(String, Vec<String>)>,
    relationships: Vec<Relationship>,
    business_metrics: Vec<(String, String)>,
    time_periods: Vec<(String, String)>,
}

impl SchemaModel {
    pub fn from_request(request: &QueryRequest) -> Self {
        let mut model = Self::default();

        for entry in &request.schema {
            for (table, columns) in entry {
                model.add_table(table, &string_list(columns));
            }
        }

        model.table_aliases = string_entries(&request.table_aliases)
            .map(|(alias, table)| (alias.to_lowercase(), table.to_string()))
            .collect();

        model.column_aliases = request
            .column_aliases
            .iter()
            .map(|(column, aliases)| {
                let aliases: Vec<String> = string_list(aliases).iter().map(|a| a.to_lowercase()).collect();
                (column.clone(), aliases)
            })
            .collect();

        for spec in &request.relationships {
            let [left, right] = match spec.tables.as_slice() {
                [left, right] => [left.clone(), right.clone()],
                other => {
                    tracing::warn!("Skipping relationship over {} tables: {:?}", other.len(), other);
                    continue;
                }
            };
            let conditions = string_entries(&spec.join_condition)
                .map(|(l, r)| (Self::qualify(l, &left), Self::qualify(r, &right)))
                .collect();
            model.relationships.push(Relationship {
                left,
                right,
                conditions,
            });
        }

        model.business_metrics = string_entries(&request.business_metrics)
            .map(|(name, expr)| (name.to_lowercase(), expr.to_string()))
            .collect();

        model.time_periods = match &request.time_periods {
            Some(periods) => string_entries(periods)
                .map(|(phrase, sql)| (phrase.to_lowercase(), sql.to_string()))
                .collect(),
            None => DEFAULT_TIME_PERIODS
                .iter()
                .map(|(phrase, sql)| (phrase.to_string(), sql.to_string()))
                .collect(),
        };

        model
    }

    /// Add a table; a repeated table merges its new columns into the first declaration
    pub fn add_table(&mut self, table: &str, columns: &[String]) {
        let index = match self.tables.iter().position(|(name, _)| name == table) {
            Some(index) => index,
            None => {
                self.tables.push((table.to_string(), Vec::new()));
                self.tables.len() - 1
            }
        };
        let existing = &mut self.tables[index].1;
        for column in columns {
            if !existing.contains(column) {
                existing.push(column.clone());
            }
        }
    }

    fn qualify(reference: &str, table: &str) -> ColumnRef {
        let column = ColumnRef::parse(reference);
        if column.table.is_some() {
            column
        } else {
            ColumnRef::new(table, column.column)
        }
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.iter().any(|(name, _)| name == table)
    }

    /// Columns of `table` in declaration order (empty when unknown)
    pub fn columns(&self, table: &str) -> &[String] {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, columns)| columns.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns(table).iter().any(|c| c == column)
    }

    /// Every `(table, column)` pair in declaration order
    pub fn all_columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tables.iter().flat_map(|(table, columns)| {
            columns.iter().map(move |c| (table.as_str(), c.as_str()))
        })
    }

    pub fn table_aliases(&self) -> &[(String, String)] {
        &self.table_aliases
    }

    pub fn column_aliases(&self) -> &[(String, Vec<String>)] {
        &self.column_aliases
    }

    /// Text forms a column can be mentioned by: its aliases, plus its own name
    pub fn aliases_for(&self, column: &str) -> Vec<String> {
        let mut forms = vec![column.to_string()];
        if let Some((_, aliases)) = self.column_aliases.iter().find(|(c, _)| c == column) {
            for alias in aliases {
                if !forms.contains(alias) {
                    forms.push(alias.clone());
                }
            }
        }
        forms
    }

    pub fn business_metrics(&self) -> &[(String, String)] {
        &self.business_metrics
    }

    pub fn time_periods(&self) -> &[(String, String)] {
        &self.time_periods
    }

    /// exact name -> alias -> naive plural (`term + "s"`)
    pub fn resolve_table(&self, term: &str) -> Option<String> {
        if self.has_table(term) {
            return Some(term.to_string());
        }
        if let Some((_, table)) = self.table_aliases.iter().find(|(alias, _)| alias == term) {
            return Some(table.clone());
        }
        let plural = format!("{}s", term);
        if self.has_table(&plural) {
            return Some(plural);
        }
        None
    }

    /// Canonical column for `term`.
    ///
    /// Exact or alias match first; with a table scope, substring containment
    /// against that table's columns. Unresolved terms come back unchanged.
    pub fn resolve_column(&self, term: &str, table: Option<&str>) -> String {
        for (column, aliases) in &self.column_aliases {
            if term == column || aliases.iter().any(|a| a == term) {
                return column.clone();
            }
        }

        if let Some(table) = table {
            if !term.is_empty() {
                if let Some(column) = self
                    .columns(table)
                    .iter()
                    .find(|c| c.contains(term) || term.contains(c.as_str()))
                {
                    return column.clone();
                }
            }
        }

        term.to_string()
    }

    /// First column anywhere in the schema containing, or contained by, `term`
    pub fn find_column_like(&self, term: &str) -> Option<ColumnRef> {
        if term.is_empty() {
            return None;
        }
        self.all_columns()
            .find(|(_, column)| column.contains(term) || term.contains(column))
            .map(|(table, column)| ColumnRef::new(table, column))
    }

    fn direct_relationship(&self, a: &str, b: &str) -> Option<&Relationship> {
        self.relationships
            .iter()
            .find(|r| r.left == a && r.right == b)
            .or_else(|| self.relationships.iter().find(|r| r.left == b && r.right == a))
    }

    /// Join chain connecting `a` to `b`.
    ///
    /// Direct relationship (either orientation), else a two-hop chain through
    /// the first intermediate table in declaration order. Longer chains are not
    /// searched and yield an empty vec.
    pub fn find_relationship(&self, a: &str, b: &str) -> Vec<JoinDescriptor> {
        if let Some(rel) = self.direct_relationship(a, b) {
            return vec![JoinDescriptor {
                left_table: a.to_string(),
                right_table: b.to_string(),
                conditions: rel.conditions.clone(),
            }];
        }

        for middle in self.tables() {
            if middle == a || middle == b {
                continue;
            }
            if let (Some(first), Some(second)) = (
                self.direct_relationship(a, middle),
                self.direct_relationship(middle, b),
            ) {
                return vec![
                    JoinDescriptor {
                        left_table: a.to_string(),
                        right_table: middle.to_string(),
                        conditions: first.conditions.clone(),
                    },
                    JoinDescriptor {
                        left_table: middle.to_string(),
                        right_table: b.to_string(),
                        conditions: second.conditions.clone(),
                    },
                ];
            }
        }

        Vec::new()
    }

    /// Every word the schema can be mentioned by
    pub fn vocabulary(&self) -> HashSet<String> {
        let mut words = HashSet::new();
        let mut add = |phrase: &str| {
            for word in phrase.split_whitespace() {
                words.insert(word.to_lowercase());
            }
        };

        for (table, columns) in &self.tables {
            add(table);
            for column in columns {
                add(column);
            }
        }
        for (alias, table) in &self.table_aliases {
            add(alias);
            add(table);
        }
        for (column, aliases) in &self.column_aliases {
            add(column);
            for alias in aliases {
                add(alias);
            }
        }
        for (name, _) in &self.business_metrics {
            add(name);
        }
        for (phrase, _) in &self.time_periods {
            add(phrase);
        }

        words
    }
}

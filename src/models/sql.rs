// Typed SQL statement tree
//
// Intents are lowered into this tree and printed by a single printer. The
// same printer produces two forms: the quoted SQL sent back to the caller and
// an unquoted form (`orders.total_amount > 150`) used by `Display` for logs
// and assertions.

use std::fmt;

/// Column reference, optionally qualified with its table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    pub fn bare(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    /// Parse `table.column` (split on the first dot) or a bare column name
    pub fn parse(reference: &str) -> Self {
        match reference.split_once('.') {
            Some((table, column)) => Self::new(table.trim(), column.trim()),
            None => Self::bare(reference.trim()),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::plain().column(self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }

    /// Lowercase name used to build result aliases (`sum_total_amount`)
    pub fn alias_prefix(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
        }
    }
}

/// Date truncation granularity for time-based grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeGrain {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeGrain {
    fn unit(&self) -> &'static str {
        match self {
            TimeGrain::Day => "day",
            TimeGrain::Week => "week",
            TimeGrain::Month => "month",
            TimeGrain::Quarter => "quarter",
            TimeGrain::Year => "year",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    /// `*`
    Wildcard,
    /// `table.*`
    QualifiedWildcard(String),
    /// Aggregate call; `arg: None` renders `COUNT(*)`
    Aggregate {
        func: AggregateFunc,
        distinct: bool,
        arg: Option<Box<Expr>>,
    },
    DateTrunc {
        grain: TimeGrain,
        column: ColumnRef,
    },
    Number(String),
    Text(String),
    /// Caller-supplied SQL fragment (business metrics), spliced verbatim
    Raw(String),
}

impl Expr {
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::new(table, column))
    }

    pub fn aggregate(func: AggregateFunc, arg: Expr) -> Self {
        Expr::Aggregate {
            func,
            distinct: false,
            arg: Some(Box::new(arg)),
        }
    }

    pub fn count_star() -> Self {
        Expr::Aggregate {
            func: AggregateFunc::Count,
            distinct: false,
            arg: None,
        }
    }

    pub fn count_distinct(arg: Expr) -> Self {
        Expr::Aggregate {
            func: AggregateFunc::Count,
            distinct: true,
            arg: Some(Box::new(arg)),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Aggregate { .. })
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Expr::Wildcard | Expr::QualifiedWildcard(_))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::plain().expr(self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::GtEq => ">=",
            CompareOp::LtEq => "<=",
        }
    }
}

/// Filter predicate. Extraction only ever builds a flat conjunction of atoms.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        left: Expr,
        op: CompareOp,
        right: Expr,
    },
    /// `col BETWEEN 'start'::date AND 'end'::date`
    DateBetween {
        column: ColumnRef,
        start: String,
        end: String,
    },
    /// Case-insensitive substring match
    ILike {
        column: ColumnRef,
        needle: String,
    },
    /// Caller-supplied SQL fragment (time periods), spliced verbatim
    Raw(String),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(left: Expr, op: CompareOp, right: Expr) -> Self {
        Predicate::Compare { left, op, right }
    }

    /// Conjunction of `atoms`; `None` when empty, the atom itself when single
    pub fn and(mut atoms: Vec<Predicate>) -> Option<Predicate> {
        match atoms.len() {
            0 => None,
            1 => atoms.pop(),
            _ => Some(Predicate::And(atoms)),
        }
    }

    /// Atomic predicates of a (flat) conjunction
    pub fn atoms(&self) -> Vec<&Predicate> {
        match self {
            Predicate::And(items) => items.iter().flat_map(|p| p.atoms()).collect(),
            other => vec![other],
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::plain().predicate(self))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl fmt::Display for OrderByExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, self.direction.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub table: String,
    pub on: Vec<(ColumnRef, ColumnRef)>,
}

/// A complete SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub projection: Vec<SelectItem>,
    pub from: String,
    pub joins: Vec<JoinClause>,
    pub selection: Option<Predicate>,
    pub group_by: Vec<Expr>,
    pub having: Option<Predicate>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

impl SelectStatement {
    /// Render with every identifier quoted
    pub fn to_sql(&self) -> String {
        Printer::quoted().statement(self)
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::plain().statement(self))
    }
}

/// Quote an identifier, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn is_plain_alias(alias: &str) -> bool {
    let mut chars = alias.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// SQL printer; `quote` controls identifier quoting
struct Printer {
    quote: bool,
}

impl Printer {
    fn quoted() -> Self {
        Self { quote: true }
    }

    fn plain() -> Self {
        Self { quote: false }
    }

    fn ident(&self, name: &str) -> String {
        if self.quote {
            quote_identifier(name)
        } else {
            name.to_string()
        }
    }

    fn column(&self, column: &ColumnRef) -> String {
        match &column.table {
            Some(table) => format!("{}.{}", self.ident(table), self.ident(&column.column)),
            None => self.ident(&column.column),
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Column(column) => self.column(column),
            Expr::Wildcard => "*".to_string(),
            Expr::QualifiedWildcard(table) => format!("{}.*", self.ident(table)),
            Expr::Aggregate { func, distinct, arg } => {
                let inner = match arg {
                    Some(arg) => self.expr(arg),
                    None => "*".to_string(),
                };
                if *distinct {
                    format!("{}(DISTINCT {})", func.as_sql(), inner)
                } else {
                    format!("{}({})", func.as_sql(), inner)
                }
            }
            Expr::DateTrunc { grain, column } => match grain {
                TimeGrain::Day => format!("DATE({})", self.column(column)),
                other => format!("DATE_TRUNC('{}', {})", other.unit(), self.column(column)),
            },
            Expr::Number(value) => value.clone(),
            Expr::Text(value) => quote_literal(value),
            Expr::Raw(sql) => sql.clone(),
        }
    }

    fn predicate(&self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Compare { left, op, right } => {
                format!("{} {} {}", self.expr(left), op.as_str(), self.expr(right))
            }
            Predicate::DateBetween { column, start, end } => format!(
                "{} BETWEEN {}::date AND {}::date",
                self.column(column),
                quote_literal(start),
                quote_literal(end)
            ),
            Predicate::ILike { column, needle } => format!(
                "{} ILIKE {}",
                self.column(column),
                quote_literal(&format!("%{}%", needle))
            ),
            Predicate::Raw(sql) => sql.clone(),
            Predicate::And(items) => items
                .iter()
                .map(|p| self.predicate(p))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }

    fn select_item(&self, item: &SelectItem) -> String {
        let expr = self.expr(&item.expr);
        match &item.alias {
            Some(alias) if is_plain_alias(alias) => format!("{} AS {}", expr, alias),
            Some(alias) => format!("{} AS {}", expr, quote_identifier(alias)),
            None => expr,
        }
    }

    fn statement(&self, stmt: &SelectStatement) -> String {
        let projection = if stmt.projection.is_empty() {
            "*".to_string()
        } else {
            stmt.projection
                .iter()
                .map(|item| self.select_item(item))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", projection, self.ident(&stmt.from));

        for join in &stmt.joins {
            let on = join
                .on
                .iter()
                .map(|(left, right)| format!("{} = {}", self.column(left), self.column(right)))
                .collect::<Vec<_>>()
                .join(" AND ");
            sql.push_str(&format!(" JOIN {} ON {}", self.ident(&join.table), on));
        }

        if let Some(selection) = &stmt.selection {
            sql.push_str(&format!(" WHERE {}", self.predicate(selection)));
        }

        if !stmt.group_by.is_empty() {
            let cols = stmt
                .group_by
                .iter()
                .map(|e| self.expr(e))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" GROUP BY {}", cols));
        }

        if let Some(having) = &stmt.having {
            sql.push_str(&format!(" HAVING {}", self.predicate(having)));
        }

        if !stmt.order_by.is_empty() {
            let keys = stmt
                .order_by
                .iter()
                .map(|o| format!("{} {}", self.expr(&o.expr), o.direction.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {}", keys));
        }

        if let Some(limit) = stmt.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }
}

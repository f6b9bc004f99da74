// Intent extraction
//
// Each stage is a stateless function over the normalized text, the request's
// schema model and pattern library. Stages run in a fixed order and later
// stages consume earlier results.

mod columns;
mod filters;
mod grouping;
mod ordering;
mod tables;

use tracing::debug;

use crate::models::{Action, Intent};
use crate::services::patterns::{PatternLibrary, RuleContext, ACTION_RULES};
use crate::services::schema_model::SchemaModel;

pub use columns::extract_columns;
pub use filters::extract_filter;
pub use grouping::{extract_group_by, extract_having};
pub use ordering::{extract_limit, extract_order};
pub use tables::{extract_joins, extract_tables};

/// Turns normalized text into an [`Intent`] for one request
pub struct IntentExtractor<'a> {
    schema: &'a SchemaModel,
    patterns: &'a PatternLibrary,
}

impl<'a> IntentExtractor<'a> {
    pub fn new(schema: &'a SchemaModel, patterns: &'a PatternLibrary) -> Self {
        Self { schema, patterns }
    }

    pub fn extract(&self, text: &str) -> Intent {
        let action = ACTION_RULES
            .first(text, &RuleContext::new(self.schema, &[], text))
            .unwrap_or(Action::Select);

        let tables = extract_tables(text, self.schema, self.patterns);
        let joins = extract_joins(text, self.schema, &tables);

        let ctx = RuleContext::new(self.schema, &tables, text);
        let columns = extract_columns(text, &ctx, self.patterns);
        let filter = extract_filter(text, &ctx, self.patterns);
        let group_by = extract_group_by(text, &ctx, self.patterns, &columns);
        let having = extract_having(text, &ctx, &group_by);
        let order_by = extract_order(text, &ctx);
        let limit = extract_limit(text, &ctx);

        let intent = Intent {
            action,
            tables,
            joins,
            columns,
            filter,
            group_by,
            having,
            order_by,
            limit,
        };
        debug!("Extracted intent: {:?}", intent);
        intent
    }
}

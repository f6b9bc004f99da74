pub mod intent;
pub mod query;
pub mod sql;

pub use intent::*;
pub use query::*;
pub use sql::*;

pub mod error;
pub mod pivot;
pub mod plan;
pub mod query_builder;
pub mod response_builder;
pub mod rows;
pub mod source;
pub mod sql;

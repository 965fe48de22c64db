//! SQL text builders, one function per statement.

pub mod conditions;
pub mod ddl;
pub mod devices;
pub mod metadata;

/// Expected database schema version
/// Databases created with a different layout are refused at startup
pub const EXPECTED_DB_VERSION: &str = "1";

/// Default number of conditions returned by the condition list endpoint
pub const CONDITION_LIMIT: u32 = 20;

/// Score weights per condition level used by the graph view
pub const SCORE_CONDITION_LEVEL_INFO: i64 = 3;
pub const SCORE_CONDITION_LEVEL_WARNING: i64 = 2;
pub const SCORE_CONDITION_LEVEL_CRITICAL: i64 = 1;

/// Width of one graph bucket in seconds
pub const GRAPH_BUCKET_SECS: i64 = 60 * 60;

/// Number of hourly buckets in one graph response
pub const GRAPH_BUCKETS_PER_DAY: i64 = 24;

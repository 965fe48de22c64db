use sea_query::Iden;

/// Metadata table - key-value store for database configuration
#[derive(Iden)]
pub enum Metadata {
    Table,
    Key,
    Value,
}

/// Registered devices; rows are written by the registration service
#[derive(Iden)]
pub enum Isu {
    Table,
    Id,
    JiaIsuUuid,
    Name,
    Character,
    JiaUserId,
    CreatedAt,
    UpdatedAt,
}

/// Persisted condition readings
#[derive(Iden)]
pub enum IsuCondition {
    Table,
    Id,
    JiaIsuUuid,
    Timestamp,
    IsSitting,
    Condition,
    Message,
    ConditionLevel,
    CreatedAt,
}

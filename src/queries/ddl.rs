use sea_query::{ColumnDef, Index, SqliteQueryBuilder, Table};

use crate::schema::{Isu, IsuCondition, Metadata};

/// CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)
pub fn create_metadata_table() -> String {
    Table::create()
        .table(Metadata::Table)
        .if_not_exists()
        .col(ColumnDef::new(Metadata::Key).string().primary_key())
        .col(ColumnDef::new(Metadata::Value).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS isu (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     jia_isu_uuid TEXT NOT NULL UNIQUE,
///     name TEXT NOT NULL,
///     character TEXT NOT NULL DEFAULT '',
///     jia_user_id TEXT NOT NULL,
///     created_at INTEGER NOT NULL,
///     updated_at INTEGER NOT NULL
/// )
pub fn create_isu_table() -> String {
    Table::create()
        .table(Isu::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Isu::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(Isu::JiaIsuUuid).string().not_null().unique_key())
        .col(ColumnDef::new(Isu::Name).string().not_null())
        .col(ColumnDef::new(Isu::Character).string().not_null().default(""))
        .col(ColumnDef::new(Isu::JiaUserId).string().not_null())
        .col(ColumnDef::new(Isu::CreatedAt).big_integer().not_null())
        .col(ColumnDef::new(Isu::UpdatedAt).big_integer().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS isu_condition (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     jia_isu_uuid TEXT NOT NULL,
///     timestamp INTEGER NOT NULL,
///     is_sitting INTEGER NOT NULL,
///     condition TEXT NOT NULL,
///     message TEXT NOT NULL,
///     condition_level TEXT NOT NULL,
///     created_at INTEGER NOT NULL
/// )
pub fn create_isu_condition_table() -> String {
    Table::create()
        .table(IsuCondition::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(IsuCondition::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(IsuCondition::JiaIsuUuid).string().not_null())
        .col(
            ColumnDef::new(IsuCondition::Timestamp)
                .big_integer()
                .not_null(),
        )
        .col(ColumnDef::new(IsuCondition::IsSitting).integer().not_null())
        .col(ColumnDef::new(IsuCondition::Condition).string().not_null())
        .col(ColumnDef::new(IsuCondition::Message).string().not_null())
        .col(
            ColumnDef::new(IsuCondition::ConditionLevel)
                .string()
                .not_null(),
        )
        .col(
            ColumnDef::new(IsuCondition::CreatedAt)
                .big_integer()
                .not_null(),
        )
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_isu_condition_uuid_timestamp ON isu_condition(jia_isu_uuid, timestamp)
pub fn create_isu_condition_uuid_timestamp_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_isu_condition_uuid_timestamp")
        .table(IsuCondition::Table)
        .col(IsuCondition::JiaIsuUuid)
        .col(IsuCondition::Timestamp)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_isu_character ON isu(character)
pub fn create_isu_character_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_isu_character")
        .table(Isu::Table)
        .col(Isu::Character)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_isu_user ON isu(jia_user_id)
pub fn create_isu_user_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_isu_user")
        .table(Isu::Table)
        .col(Isu::JiaUserId)
        .to_string(SqliteQueryBuilder)
}

use sea_query::{Expr, Func, Order, Query, SelectStatement, SqliteQueryBuilder};

use crate::classify::ConditionLevel;
use crate::models::NewCondition;
use crate::schema::IsuCondition;

const CONDITION_COLUMNS: [IsuCondition; 8] = [
    IsuCondition::Id,
    IsuCondition::JiaIsuUuid,
    IsuCondition::Timestamp,
    IsuCondition::IsSitting,
    IsuCondition::Condition,
    IsuCondition::Message,
    IsuCondition::ConditionLevel,
    IsuCondition::CreatedAt,
];

fn select_conditions_of(jia_isu_uuid: &str) -> SelectStatement {
    Query::select()
        .columns(CONDITION_COLUMNS)
        .from(IsuCondition::Table)
        .and_where(Expr::col(IsuCondition::JiaIsuUuid).eq(jia_isu_uuid))
        .to_owned()
}

/// INSERT INTO isu_condition (jia_isu_uuid, timestamp, is_sitting, condition, message, condition_level, created_at)
/// VALUES (...), (...), ...
///
/// Returns None for an empty batch.
pub fn insert_batch(batch: &[NewCondition], created_at: i64) -> Option<String> {
    if batch.is_empty() {
        return None;
    }

    let mut query = Query::insert();
    query.into_table(IsuCondition::Table).columns([
        IsuCondition::JiaIsuUuid,
        IsuCondition::Timestamp,
        IsuCondition::IsSitting,
        IsuCondition::Condition,
        IsuCondition::Message,
        IsuCondition::ConditionLevel,
        IsuCondition::CreatedAt,
    ]);

    for record in batch {
        query.values_panic([
            record.jia_isu_uuid.as_str().into(),
            record.timestamp.into(),
            (record.is_sitting as i32).into(),
            record.condition.as_str().into(),
            record.message.as_str().into(),
            record.condition_level.as_str().into(),
            created_at.into(),
        ]);
    }

    Some(query.to_string(SqliteQueryBuilder))
}

/// SELECT ... FROM isu_condition WHERE jia_isu_uuid = ?
///   AND timestamp < ? [AND ? <= timestamp] AND condition_level IN (...)
/// ORDER BY timestamp DESC LIMIT ?
pub fn select_page(
    jia_isu_uuid: &str,
    end_time: i64,
    start_time: Option<i64>,
    levels: &[ConditionLevel],
    limit: u32,
) -> String {
    let mut query = select_conditions_of(jia_isu_uuid);
    query.and_where(Expr::col(IsuCondition::Timestamp).lt(end_time));
    if let Some(start_time) = start_time {
        query.and_where(Expr::col(IsuCondition::Timestamp).gte(start_time));
    }
    query
        .and_where(
            Expr::col(IsuCondition::ConditionLevel).is_in(levels.iter().map(|l| l.as_str())),
        )
        .order_by(IsuCondition::Timestamp, Order::Desc)
        .limit(limit as u64)
        .to_string(SqliteQueryBuilder)
}

/// SELECT ... FROM isu_condition WHERE jia_isu_uuid = ? ORDER BY timestamp ASC, id ASC
pub fn select_all_ascending(jia_isu_uuid: &str) -> String {
    select_conditions_of(jia_isu_uuid)
        .order_by(IsuCondition::Timestamp, Order::Asc)
        .order_by(IsuCondition::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT ... FROM isu_condition WHERE jia_isu_uuid = ? ORDER BY timestamp DESC, id DESC LIMIT 1
pub fn select_latest(jia_isu_uuid: &str) -> String {
    select_conditions_of(jia_isu_uuid)
        .order_by(IsuCondition::Timestamp, Order::Desc)
        .order_by(IsuCondition::Id, Order::Desc)
        .limit(1)
        .to_string(SqliteQueryBuilder)
}

/// SELECT COUNT(*) FROM isu_condition WHERE jia_isu_uuid = ?
pub fn count_for_device(jia_isu_uuid: &str) -> String {
    Query::select()
        .expr(Func::count(Expr::col(IsuCondition::Id)))
        .from(IsuCondition::Table)
        .and_where(Expr::col(IsuCondition::JiaIsuUuid).eq(jia_isu_uuid))
        .to_string(SqliteQueryBuilder)
}

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use crate::schema::Isu;

const DEVICE_COLUMNS: [Isu; 5] = [
    Isu::Id,
    Isu::JiaIsuUuid,
    Isu::Name,
    Isu::Character,
    Isu::JiaUserId,
];

/// SELECT id FROM isu WHERE jia_isu_uuid = ? LIMIT 1
pub fn select_id_by_uuid(jia_isu_uuid: &str) -> String {
    Query::select()
        .column(Isu::Id)
        .from(Isu::Table)
        .and_where(Expr::col(Isu::JiaIsuUuid).eq(jia_isu_uuid))
        .limit(1)
        .to_string(SqliteQueryBuilder)
}

/// SELECT id, jia_isu_uuid, name, character, jia_user_id FROM isu
/// WHERE jia_isu_uuid = ? AND jia_user_id = ?
pub fn select_for_user(jia_isu_uuid: &str, jia_user_id: &str) -> String {
    Query::select()
        .columns(DEVICE_COLUMNS)
        .from(Isu::Table)
        .and_where(Expr::col(Isu::JiaIsuUuid).eq(jia_isu_uuid))
        .and_where(Expr::col(Isu::JiaUserId).eq(jia_user_id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT id, jia_isu_uuid, name, character, jia_user_id FROM isu
/// WHERE jia_user_id = ? ORDER BY id DESC
pub fn select_all_for_user(jia_user_id: &str) -> String {
    Query::select()
        .columns(DEVICE_COLUMNS)
        .from(Isu::Table)
        .and_where(Expr::col(Isu::JiaUserId).eq(jia_user_id))
        .order_by(Isu::Id, Order::Desc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT DISTINCT character FROM isu ORDER BY character
pub fn select_characters() -> String {
    Query::select()
        .distinct()
        .column(Isu::Character)
        .from(Isu::Table)
        .order_by(Isu::Character, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT id, jia_isu_uuid FROM isu WHERE character = ? ORDER BY id
pub fn select_by_character(character: &str) -> String {
    Query::select()
        .columns([Isu::Id, Isu::JiaIsuUuid])
        .from(Isu::Table)
        .and_where(Expr::col(Isu::Character).eq(character))
        .order_by(Isu::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// INSERT INTO isu (jia_isu_uuid, name, character, jia_user_id, created_at, updated_at)
/// VALUES (?, ?, ?, ?, ?, ?)
pub fn insert(
    jia_isu_uuid: &str,
    name: &str,
    character: &str,
    jia_user_id: &str,
    now: i64,
) -> String {
    Query::insert()
        .into_table(Isu::Table)
        .columns([
            Isu::JiaIsuUuid,
            Isu::Name,
            Isu::Character,
            Isu::JiaUserId,
            Isu::CreatedAt,
            Isu::UpdatedAt,
        ])
        .values_panic([
            jia_isu_uuid.into(),
            name.into(),
            character.into(),
            jia_user_id.into(),
            now.into(),
            now.into(),
        ])
        .to_string(SqliteQueryBuilder)
}

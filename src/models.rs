//! Row and wire types shared by ingestion, storage and the API.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::classify::ConditionLevel;

/// One reading as posted by a device (wire format)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostIsuConditionRequest {
    pub is_sitting: bool,
    pub condition: String,
    pub message: String,
    /// Unix seconds
    pub timestamp: i64,
}

/// A classified reading waiting in the ingestion buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCondition {
    pub jia_isu_uuid: String,
    pub timestamp: i64,
    pub is_sitting: bool,
    pub condition: String,
    pub message: String,
    pub condition_level: ConditionLevel,
}

impl NewCondition {
    pub fn from_request(
        jia_isu_uuid: &str,
        req: PostIsuConditionRequest,
        condition_level: ConditionLevel,
    ) -> Self {
        Self {
            jia_isu_uuid: jia_isu_uuid.to_string(),
            timestamp: req.timestamp,
            is_sitting: req.is_sitting,
            condition: req.condition,
            message: req.message,
            condition_level,
        }
    }
}

/// A persisted condition row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionRow {
    pub id: i64,
    pub jia_isu_uuid: String,
    pub timestamp: i64,
    pub is_sitting: bool,
    pub condition: String,
    pub message: String,
    pub condition_level: ConditionLevel,
    pub created_at: i64,
}

impl ConditionRow {
    /// Decode a row selected with the full isu_condition column list
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let level: String = row.try_get("condition_level")?;
        let condition_level = level
            .parse::<ConditionLevel>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "condition_level".to_string(),
                source: e.into(),
            })?;
        let is_sitting: i64 = row.try_get("is_sitting")?;

        Ok(Self {
            id: row.try_get("id")?,
            jia_isu_uuid: row.try_get("jia_isu_uuid")?,
            timestamp: row.try_get("timestamp")?,
            is_sitting: is_sitting != 0,
            condition: row.try_get("condition")?,
            message: row.try_get("message")?,
            condition_level,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A registered device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub id: i64,
    pub jia_isu_uuid: String,
    pub name: String,
    pub character: String,
    #[serde(skip)]
    pub jia_user_id: String,
}

impl Device {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            jia_isu_uuid: row.try_get("jia_isu_uuid")?,
            name: row.try_get("name")?,
            character: row.try_get("character")?,
            jia_user_id: row.try_get("jia_user_id")?,
        })
    }
}

/// One entry of the condition list endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetIsuConditionResponse {
    pub jia_isu_uuid: String,
    pub isu_name: String,
    pub timestamp: i64,
    pub is_sitting: bool,
    pub condition: String,
    pub condition_level: ConditionLevel,
    pub message: String,
}

impl GetIsuConditionResponse {
    pub fn from_row(row: ConditionRow, isu_name: &str) -> Self {
        Self {
            jia_isu_uuid: row.jia_isu_uuid,
            isu_name: isu_name.to_string(),
            timestamp: row.timestamp,
            is_sitting: row.is_sitting,
            condition: row.condition,
            condition_level: row.condition_level,
            message: row.message,
        }
    }
}

/// One entry of the device list endpoint
#[derive(Debug, Clone, Serialize)]
pub struct GetIsuListResponse {
    pub id: i64,
    pub jia_isu_uuid: String,
    pub name: String,
    pub character: String,
    pub latest_isu_condition: Option<GetIsuConditionResponse>,
}

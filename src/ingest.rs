//! Accepting posted readings into the ingestion buffer.

use log::warn;
use std::fmt;

use crate::buffer::{BufferFull, ConditionBuffer};
use crate::classify::{calculate_condition_level, parse_condition, ConditionFormatError};
use crate::graph::graph_day;
use crate::models::{NewCondition, PostIsuConditionRequest};
use crate::validity::{DeviceRegistry, ValidityCache, ValidityError};

#[derive(Debug)]
pub enum IngestError {
    /// The request carried no readings
    EmptyBatch,
    /// The device is not registered
    UnknownDevice,
    /// The registry lookup itself failed
    Registry(sqlx::Error),
    /// A reading had a malformed condition string; earlier readings stay queued
    MalformedCondition {
        index: usize,
        enqueued: usize,
        source: ConditionFormatError,
    },
    /// A reading's timestamp cannot be placed on an hourly graph; earlier
    /// readings stay queued
    TimestampOutOfRange {
        index: usize,
        enqueued: usize,
        timestamp: i64,
    },
    /// The buffer refused a reading; earlier readings stay queued
    BufferFull { enqueued: usize, source: BufferFull },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::EmptyBatch => write!(f, "bad request body: empty batch"),
            IngestError::UnknownDevice => write!(f, "not found: isu"),
            IngestError::Registry(e) => write!(f, "db error: {}", e),
            IngestError::MalformedCondition { index, source, .. } => {
                write!(f, "bad request body: condition #{}: {}", index, source)
            }
            IngestError::TimestampOutOfRange {
                index, timestamp, ..
            } => write!(
                f,
                "bad request body: condition #{}: timestamp {} out of range",
                index, timestamp
            ),
            IngestError::BufferFull { source, .. } => write!(f, "{}", source),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Registry(e) => Some(e),
            IngestError::MalformedCondition { source, .. } => Some(source),
            IngestError::BufferFull { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ValidityError> for IngestError {
    fn from(err: ValidityError) -> Self {
        match err {
            ValidityError::NotFound => IngestError::UnknownDevice,
            ValidityError::Lookup(e) => IngestError::Registry(e),
        }
    }
}

/// Outcome of a fully accepted submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSummary {
    pub enqueued: usize,
    /// Readings skipped because classification failed after validation
    pub skipped: usize,
}

/// Validate, classify and enqueue one device's batch of readings
///
/// Readings are processed in request order. The first malformed condition
/// or out-of-range timestamp aborts the submission without removing readings
/// already enqueued by it.
pub async fn submit_batch<R: DeviceRegistry>(
    validity: &ValidityCache<R>,
    buffer: &ConditionBuffer,
    jia_isu_uuid: &str,
    readings: Vec<PostIsuConditionRequest>,
) -> Result<IngestSummary, IngestError> {
    if readings.is_empty() {
        return Err(IngestError::EmptyBatch);
    }

    validity.ensure_known(jia_isu_uuid).await?;

    let mut summary = IngestSummary::default();
    for (index, reading) in readings.into_iter().enumerate() {
        if graph_day(reading.timestamp).is_none() {
            return Err(IngestError::TimestampOutOfRange {
                index,
                enqueued: summary.enqueued,
                timestamp: reading.timestamp,
            });
        }
        if let Err(source) = parse_condition(&reading.condition) {
            return Err(IngestError::MalformedCondition {
                index,
                enqueued: summary.enqueued,
                source,
            });
        }

        let level = match calculate_condition_level(&reading.condition) {
            Ok(level) => level,
            Err(e) => {
                warn!(
                    "Skipping condition #{} of {}: {}",
                    index, jia_isu_uuid, e
                );
                summary.skipped += 1;
                continue;
            }
        };

        let record = NewCondition::from_request(jia_isu_uuid, reading, level);
        if let Err(source) = buffer.push(record).await {
            return Err(IngestError::BufferFull {
                enqueued: summary.enqueued,
                source,
            });
        }
        summary.enqueued += 1;
    }

    Ok(summary)
}

//! Hourly condition graph for one device.
//!
//! The device's full history is streamed oldest first and folded into
//! hour-aligned groups in a single pass. A group is closed into its summary
//! and timestamp list as soon as the hour changes; rows themselves are never
//! retained. The requested day is cut out of the finished groups afterwards,
//! which keeps hours that straddle the window edge intact.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classify::{parse_condition, ClassifyError, ConditionFormatError, ConditionLevel};
use crate::constants::{GRAPH_BUCKETS_PER_DAY, GRAPH_BUCKET_SECS};
use crate::db::ConditionStore;
use crate::models::ConditionRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionsPercentage {
    pub sitting: i64,
    pub is_broken: i64,
    pub is_dirty: i64,
    pub is_overweight: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDataPoint {
    pub score: i64,
    pub percentage: ConditionsPercentage,
}

/// One hourly slot of the graph response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphResponse {
    pub start_at: i64,
    pub end_at: i64,
    pub data: Option<GraphDataPoint>,
    pub condition_timestamps: Vec<i64>,
}

/// A closed hour group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourlyDataPoint {
    pub start_at: i64,
    pub data: GraphDataPoint,
    pub condition_timestamps: Vec<i64>,
}

#[derive(Debug)]
pub enum GraphError {
    /// A stored condition string does not follow the flag grammar
    InvalidConditionFormat {
        timestamp: i64,
        source: ConditionFormatError,
    },
    Classify(ClassifyError),
    /// A stored timestamp has no representable hour start
    TimestampOutOfRange(i64),
    /// The requested day does not fit 24 hourly slots
    DayOutOfRange(i64),
    Db(sqlx::Error),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::InvalidConditionFormat { timestamp, source } => {
                write!(f, "invalid condition format at {}: {}", timestamp, source)
            }
            GraphError::Classify(e) => write!(f, "{}", e),
            GraphError::TimestampOutOfRange(ts) => {
                write!(f, "condition timestamp {} is out of range", ts)
            }
            GraphError::DayOutOfRange(day) => write!(f, "graph day {} is out of range", day),
            GraphError::Db(e) => write!(f, "db error: {}", e),
        }
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GraphError::InvalidConditionFormat { source, .. } => Some(source),
            GraphError::Classify(e) => Some(e),
            GraphError::Db(e) => Some(e),
            GraphError::TimestampOutOfRange(_) | GraphError::DayOutOfRange(_) => None,
        }
    }
}

impl From<sqlx::Error> for GraphError {
    fn from(err: sqlx::Error) -> Self {
        GraphError::Db(err)
    }
}

const DAY_SPAN_SECS: i64 = GRAPH_BUCKET_SECS * GRAPH_BUCKETS_PER_DAY;

/// Start of the hour containing `timestamp` (unix seconds)
///
/// `None` when the hour start falls below `i64::MIN`.
pub fn truncate_to_hour(timestamp: i64) -> Option<i64> {
    timestamp.checked_sub(timestamp.rem_euclid(GRAPH_BUCKET_SECS))
}

/// First slot of the graph requested for `datetime`
///
/// `None` unless the hour start and the end of its 24 slots are representable.
pub fn graph_day(datetime: i64) -> Option<i64> {
    let day = truncate_to_hour(datetime)?;
    day.checked_add(DAY_SPAN_SECS).map(|_| day)
}

/// Running counters for one hour
#[derive(Debug, Default, Clone, Copy)]
struct HourTally {
    count: i64,
    raw_score: i64,
    sitting: i64,
    is_dirty: i64,
    is_overweight: i64,
    is_broken: i64,
}

impl HourTally {
    fn add(&mut self, timestamp: i64, is_sitting: bool, condition: &str) -> Result<(), GraphError> {
        let flags = parse_condition(condition)
            .map_err(|source| GraphError::InvalidConditionFormat { timestamp, source })?;
        let level =
            ConditionLevel::from_true_count(flags.true_count()).map_err(GraphError::Classify)?;

        self.count += 1;
        self.raw_score += level.score();
        self.sitting += is_sitting as i64;
        self.is_dirty += flags.is_dirty as i64;
        self.is_overweight += flags.is_overweight as i64;
        self.is_broken += flags.is_broken as i64;
        Ok(())
    }

    /// Integer score and percentages; callers guarantee `count > 0`
    fn data_point(&self) -> GraphDataPoint {
        let n = self.count;
        GraphDataPoint {
            score: self.raw_score * 100 / 3 / n,
            percentage: ConditionsPercentage {
                sitting: self.sitting * 100 / n,
                is_broken: self.is_broken * 100 / n,
                is_dirty: self.is_dirty * 100 / n,
                is_overweight: self.is_overweight * 100 / n,
            },
        }
    }
}

/// Score and percentages of a non-empty group of conditions
pub fn calculate_graph_data_point(rows: &[ConditionRow]) -> Result<Option<GraphDataPoint>, GraphError> {
    let mut tally = HourTally::default();
    for row in rows {
        tally.add(row.timestamp, row.is_sitting, &row.condition)?;
    }
    Ok((tally.count > 0).then(|| tally.data_point()))
}

/// Single-pass fold of time-ordered conditions into hour groups
#[derive(Debug, Default)]
pub struct HourBucketer {
    open: Option<(i64, HourTally, Vec<i64>)>,
    closed: Vec<HourlyDataPoint>,
}

impl HourBucketer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next condition; input must be ordered by timestamp ascending
    pub fn push(&mut self, timestamp: i64, is_sitting: bool, condition: &str) -> Result<(), GraphError> {
        let hour =
            truncate_to_hour(timestamp).ok_or(GraphError::TimestampOutOfRange(timestamp))?;

        let same_hour = matches!(&self.open, Some((start, _, _)) if *start == hour);
        if !same_hour {
            self.close_open();
            self.open = Some((hour, HourTally::default(), Vec::new()));
        }

        if let Some((_, tally, timestamps)) = self.open.as_mut() {
            tally.add(timestamp, is_sitting, condition)?;
            timestamps.push(timestamp);
        }
        Ok(())
    }

    fn close_open(&mut self) {
        if let Some((start_at, tally, condition_timestamps)) = self.open.take() {
            if tally.count > 0 {
                self.closed.push(HourlyDataPoint {
                    start_at,
                    data: tally.data_point(),
                    condition_timestamps,
                });
            }
        }
    }

    /// Close the last group and return every group in hour order
    pub fn finish(mut self) -> Vec<HourlyDataPoint> {
        self.close_open();
        self.closed
    }
}

/// Groups whose hour starts inside `[day, day + 24h)`
///
/// `points` must be sorted by `start_at`.
pub fn select_day(points: &[HourlyDataPoint], day: i64) -> &[HourlyDataPoint] {
    let end = day.saturating_add(DAY_SPAN_SECS);
    let start_index = points.partition_point(|p| p.start_at < day);
    let end_index = points.partition_point(|p| p.start_at < end);
    &points[start_index..end_index.max(start_index)]
}

/// Lay the day's groups onto 24 consecutive hourly slots
///
/// Slot bounds saturate for a `day` rejected by [`graph_day`].
pub fn generate_graph_response(points: &[HourlyDataPoint], day: i64) -> Vec<GraphResponse> {
    let in_day = select_day(points, day);
    let mut index = 0;

    (0..GRAPH_BUCKETS_PER_DAY)
        .map(|slot| {
            let start_at = day.saturating_add(slot * GRAPH_BUCKET_SECS);
            let mut response = GraphResponse {
                start_at,
                end_at: start_at.saturating_add(GRAPH_BUCKET_SECS),
                data: None,
                condition_timestamps: Vec::new(),
            };

            if let Some(point) = in_day.get(index) {
                if point.start_at == start_at {
                    response.data = Some(point.data);
                    response.condition_timestamps = point.condition_timestamps.clone();
                    index += 1;
                }
            }
            response
        })
        .collect()
}

/// Build the 24-slot graph of one device starting at `day`
///
/// `day` is used as given; callers truncate it to an hour boundary.
pub async fn build_graph(
    store: &ConditionStore,
    jia_isu_uuid: &str,
    day: i64,
) -> Result<Vec<GraphResponse>, GraphError> {
    if day.checked_add(DAY_SPAN_SECS).is_none() {
        return Err(GraphError::DayOutOfRange(day));
    }

    let mut bucketer = HourBucketer::new();
    store
        .stream_conditions_asc(jia_isu_uuid, |row| {
            bucketer.push(row.timestamp, row.is_sitting, &row.condition)
        })
        .await?;

    Ok(generate_graph_response(&bucketer.finish(), day))
}

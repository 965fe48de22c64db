use condition_monitor::classify::{calculate_condition_level, ConditionLevel};
use condition_monitor::db::ConditionStore;
use condition_monitor::graph::{build_graph, GraphError};
use condition_monitor::models::NewCondition;

const DEVICE: &str = "5f0d6ae8-0bb5-4e6b-bd47-fc3d14a7d4b1";
const OTHER_DEVICE: &str = "c2b1f1c8-6a4f-4a6e-9a55-2f0e7b7b2d11";
const INFO: &str = "is_dirty=false,is_overweight=false,is_broken=false";
const WARNING: &str = "is_dirty=true,is_overweight=false,is_broken=false";
const CRITICAL: &str = "is_dirty=true,is_overweight=true,is_broken=true";

// 2021-08-01T00:00:00Z
const DAY: i64 = 1_627_776_000;
const HOUR: i64 = 3600;

/// Returns (store, _guard) - keep _guard alive to prevent temp file deletion
async fn create_test_store() -> (ConditionStore, tempfile::TempDir) {
    let (pool, guard) = condition_monitor::db::create_test_connection_in_temporary_file()
        .await
        .unwrap();
    condition_monitor::db::init_database_schema(&pool)
        .await
        .unwrap();
    (ConditionStore::new(pool), guard)
}

fn condition(device: &str, timestamp: i64, is_sitting: bool, flags: &str) -> NewCondition {
    NewCondition {
        jia_isu_uuid: device.to_string(),
        timestamp,
        is_sitting,
        condition: flags.to_string(),
        message: String::new(),
        condition_level: calculate_condition_level(flags).unwrap_or(ConditionLevel::Info),
    }
}

#[tokio::test]
async fn test_graph_without_data_has_24_empty_slots() {
    let (store, _guard) = create_test_store().await;

    let graph = build_graph(&store, DEVICE, DAY).await.unwrap();

    assert_eq!(graph.len(), 24);
    assert_eq!(graph[0].start_at, DAY);
    assert_eq!(graph[23].end_at, DAY + 24 * HOUR);
    assert!(graph.iter().all(|slot| slot.data.is_none()));
    assert!(graph.iter().all(|slot| slot.condition_timestamps.is_empty()));
}

#[tokio::test]
async fn test_graph_buckets_by_hour() {
    let (store, _guard) = create_test_store().await;

    // inserted out of order; the scan sorts by timestamp
    let batch = vec![
        condition(DEVICE, DAY + 3 * HOUR + 30, false, CRITICAL),
        condition(DEVICE, DAY + 3 * HOUR + 10, true, INFO),
        condition(DEVICE, DAY + 3 * HOUR + 20, false, WARNING),
        condition(DEVICE, DAY + 10 * HOUR, true, INFO),
        condition(DEVICE, DAY - HOUR, false, CRITICAL),
        condition(DEVICE, DAY + 24 * HOUR, false, CRITICAL),
        condition(OTHER_DEVICE, DAY + 3 * HOUR, false, CRITICAL),
    ];
    store.insert_conditions(&batch).await.unwrap();

    let graph = build_graph(&store, DEVICE, DAY).await.unwrap();
    assert_eq!(graph.len(), 24);

    let slot = &graph[3];
    assert_eq!(slot.start_at, DAY + 3 * HOUR);
    assert_eq!(
        slot.condition_timestamps,
        vec![DAY + 3 * HOUR + 10, DAY + 3 * HOUR + 20, DAY + 3 * HOUR + 30]
    );
    let data = slot.data.unwrap();
    assert_eq!(data.score, 66);
    assert_eq!(data.percentage.sitting, 33);
    assert_eq!(data.percentage.is_dirty, 66);
    assert_eq!(data.percentage.is_overweight, 33);
    assert_eq!(data.percentage.is_broken, 33);

    let data = graph[10].data.unwrap();
    assert_eq!(data.score, 100);
    assert_eq!(data.percentage.sitting, 100);

    let filled: Vec<usize> = graph
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.data.is_some())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(filled, vec![3, 10]);
}

#[tokio::test]
async fn test_graph_of_previous_day_sees_edge_hours() {
    let (store, _guard) = create_test_store().await;

    let batch = vec![
        condition(DEVICE, DAY - HOUR + 5, false, WARNING),
        condition(DEVICE, DAY + 5, false, INFO),
    ];
    store.insert_conditions(&batch).await.unwrap();

    let graph = build_graph(&store, DEVICE, DAY - 24 * HOUR).await.unwrap();
    assert_eq!(graph[23].condition_timestamps, vec![DAY - HOUR + 5]);
    assert!(graph[..23].iter().all(|slot| slot.data.is_none()));
}

#[tokio::test]
async fn test_invalid_stored_condition_fails_graph() {
    let (store, _guard) = create_test_store().await;

    let mut bad = condition(DEVICE, DAY + 20, false, INFO);
    bad.condition = "is_dirty=false,is_overweight=false".to_string();
    store
        .insert_conditions(&[condition(DEVICE, DAY + 10, false, INFO), bad])
        .await
        .unwrap();

    let err = build_graph(&store, DEVICE, DAY).await.unwrap_err();
    assert!(matches!(
        err,
        GraphError::InvalidConditionFormat { timestamp, .. } if timestamp == DAY + 20
    ));
}

#[tokio::test]
async fn test_graph_rejects_day_without_room_for_24_slots() {
    let (store, _guard) = create_test_store().await;

    let day = i64::MAX - i64::MAX.rem_euclid(HOUR);
    let err = build_graph(&store, DEVICE, day).await.unwrap_err();
    assert!(matches!(err, GraphError::DayOutOfRange(d) if d == day));
}

#[tokio::test]
async fn test_stored_timestamp_without_hour_start_fails_graph() {
    let (store, _guard) = create_test_store().await;

    store
        .insert_conditions(&[
            condition(DEVICE, i64::MIN, false, INFO),
            condition(DEVICE, DAY, false, INFO),
        ])
        .await
        .unwrap();

    let err = build_graph(&store, DEVICE, DAY).await.unwrap_err();
    assert!(matches!(err, GraphError::TimestampOutOfRange(ts) if ts == i64::MIN));
}

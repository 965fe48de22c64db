use condition_monitor::classify::ConditionLevel;
use condition_monitor::db::ConditionStore;
use condition_monitor::models::NewCondition;
use condition_monitor::trend::{compute_trend, TrendCache, TrendCondition};

const INFO: &str = "is_dirty=false,is_overweight=false,is_broken=false";
const WARNING: &str = "is_dirty=true,is_overweight=false,is_broken=false";
const CRITICAL: &str = "is_dirty=true,is_overweight=true,is_broken=true";

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

fn condition(device: &str, timestamp: i64, flags: &str, level: ConditionLevel) -> NewCondition {
    NewCondition {
        jia_isu_uuid: device.to_string(),
        timestamp,
        is_sitting: false,
        condition: flags.to_string(),
        message: String::new(),
        condition_level: level,
    }
}

/// Two categories: "calm" with three reporting devices, "shy" with one silent device
async fn seed(store: &ConditionStore) -> (i64, i64, i64) {
    let a = store.insert_device("isu-a", "a", "calm", "user-1").await.unwrap();
    let b = store.insert_device("isu-b", "b", "calm", "user-1").await.unwrap();
    let c = store.insert_device("isu-c", "c", "calm", "user-2").await.unwrap();
    store.insert_device("isu-d", "d", "shy", "user-2").await.unwrap();

    store
        .insert_conditions(&[
            // only the latest reading of each device counts
            condition("isu-a", 100, CRITICAL, ConditionLevel::Critical),
            condition("isu-a", 200, INFO, ConditionLevel::Info),
            condition("isu-b", 300, INFO, ConditionLevel::Info),
            condition("isu-c", 150, WARNING, ConditionLevel::Warning),
        ])
        .await
        .unwrap();
    (a, b, c)
}

#[tokio::test]
async fn test_trend_groups_latest_condition_per_device() {
    let (store, _guard) = create_test_store().await;
    let (a, b, c) = seed(&store).await;

    let trend = compute_trend(&store).await.unwrap();
    assert_eq!(trend.len(), 2);

    let calm = trend.iter().find(|t| t.character == "calm").unwrap();
    assert_eq!(
        calm.info,
        vec![
            TrendCondition { isu_id: b, timestamp: 300 },
            TrendCondition { isu_id: a, timestamp: 200 },
        ]
    );
    assert_eq!(calm.warning, vec![TrendCondition { isu_id: c, timestamp: 150 }]);
    assert!(calm.critical.is_empty());

    let shy = trend.iter().find(|t| t.character == "shy").unwrap();
    assert!(shy.info.is_empty() && shy.warning.is_empty() && shy.critical.is_empty());
}

#[tokio::test]
async fn test_cache_only_changes_on_refresh() {
    let (store, _guard) = create_test_store().await;
    seed(&store).await;
    let cache = TrendCache::new();

    assert!(cache.get().is_empty());
    assert_eq!(cache.refresh(&store).await.unwrap(), 2);
    let first = cache.get();

    store
        .insert_conditions(&[condition("isu-b", 400, CRITICAL, ConditionLevel::Critical)])
        .await
        .unwrap();
    // new data is invisible until the next refresh
    assert_eq!(cache.get(), first);

    cache.refresh(&store).await.unwrap();
    let calm = cache
        .get()
        .iter()
        .find(|t| t.character == "calm")
        .cloned()
        .unwrap();
    assert_eq!(calm.critical.len(), 1);
    assert_eq!(calm.critical[0].timestamp, 400);
    assert_eq!(calm.info.len(), 1);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_summary() {
    let (store, _guard) = create_test_store().await;
    seed(&store).await;
    let cache = TrendCache::new();
    cache.refresh(&store).await.unwrap();
    let before = cache.get();

    store.pool().close().await;

    assert!(cache.refresh(&store).await.is_err());
    assert_eq!(cache.get(), before);
    assert_eq!(cache.get().len(), 2);
}

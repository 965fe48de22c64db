//! Cross-device trend summary, recomputed in the background.
//!
//! Readers only ever clone the currently published `Arc`; the refresh task
//! builds a complete new summary and swaps it in under the write lock.

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::classify::ConditionLevel;
use crate::db::ConditionStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendCondition {
    pub isu_id: i64,
    pub timestamp: i64,
}

/// Latest severities of every device in one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendResponse {
    pub character: String,
    pub info: Vec<TrendCondition>,
    pub warning: Vec<TrendCondition>,
    pub critical: Vec<TrendCondition>,
}

impl TrendResponse {
    fn new(character: String) -> Self {
        Self {
            character,
            info: Vec::new(),
            warning: Vec::new(),
            critical: Vec::new(),
        }
    }

    fn push(&mut self, level: ConditionLevel, condition: TrendCondition) {
        match level {
            ConditionLevel::Info => self.info.push(condition),
            ConditionLevel::Warning => self.warning.push(condition),
            ConditionLevel::Critical => self.critical.push(condition),
        }
    }

    fn sort_newest_first(&mut self) {
        for list in [&mut self.info, &mut self.warning, &mut self.critical] {
            list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }
    }
}

/// Compute a fresh summary from storage
///
/// Devices without any condition are left out. Categories are kept even
/// when none of their devices has reported yet.
pub async fn compute_trend(store: &ConditionStore) -> Result<Vec<TrendResponse>, sqlx::Error> {
    let characters = store.select_characters().await?;
    let mut summary = Vec::with_capacity(characters.len());

    for character in characters {
        let devices = store.select_devices_by_character(&character).await?;
        let mut entry = TrendResponse::new(character);

        for (isu_id, jia_isu_uuid) in devices {
            if let Some(latest) = store.latest_condition(&jia_isu_uuid).await? {
                entry.push(
                    latest.condition_level,
                    TrendCondition {
                        isu_id,
                        timestamp: latest.timestamp,
                    },
                );
            }
        }

        entry.sort_newest_first();
        summary.push(entry);
    }

    Ok(summary)
}

/// The published trend summary
#[derive(Debug, Default)]
pub struct TrendCache {
    published: RwLock<Arc<Vec<TrendResponse>>>,
}

impl TrendCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current summary; never triggers a computation
    pub fn get(&self) -> Arc<Vec<TrendResponse>> {
        let guard = self.published.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Replace the summary as a whole
    pub fn publish(&self, summary: Vec<TrendResponse>) {
        let summary = Arc::new(summary);
        let mut guard = self.published.write().unwrap_or_else(|e| e.into_inner());
        *guard = summary;
    }

    /// Recompute and publish; on error the previous summary stays in place
    pub async fn refresh(&self, store: &ConditionStore) -> Result<usize, sqlx::Error> {
        let summary = compute_trend(store).await?;
        let categories = summary.len();
        self.publish(summary);
        Ok(categories)
    }
}

/// Spawn the trend refresh task
///
/// The first refresh runs immediately so the cache is warm shortly after start.
pub fn spawn_trend_task(
    cache: Arc<TrendCache>,
    store: ConditionStore,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match cache.refresh(&store).await {
                        Ok(categories) => debug!("Trend refreshed ({} categories)", categories),
                        Err(e) => error!("Trend refresh failed, keeping previous summary: {}", e),
                    }
                }
            }
        }
        info!("Trend worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(character: &str, info: &[(i64, i64)]) -> TrendResponse {
        let mut response = TrendResponse::new(character.to_string());
        for (isu_id, timestamp) in info {
            response.push(
                ConditionLevel::Info,
                TrendCondition {
                    isu_id: *isu_id,
                    timestamp: *timestamp,
                },
            );
        }
        response
    }

    #[test]
    fn test_empty_cache_before_first_publish() {
        let cache = TrendCache::new();
        assert!(cache.get().is_empty());
    }

    #[test]
    fn test_publish_swaps_whole_summary() {
        let cache = TrendCache::new();
        cache.publish(vec![entry("a", &[(1, 10)]), entry("b", &[])]);
        let before = cache.get();

        cache.publish(vec![entry("c", &[(2, 20)])]);
        let after = cache.get();

        // readers holding the old snapshot keep seeing it unchanged
        assert_eq!(before.len(), 2);
        assert_eq!(before[0].character, "a");
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].character, "c");
    }

    #[test]
    fn test_lists_sorted_newest_first() {
        let mut response = entry("a", &[(1, 100), (2, 300), (3, 200)]);
        response.push(ConditionLevel::Critical, TrendCondition { isu_id: 4, timestamp: 5 });
        response.push(ConditionLevel::Critical, TrendCondition { isu_id: 5, timestamp: 50 });
        response.sort_newest_first();

        let info: Vec<i64> = response.info.iter().map(|c| c.isu_id).collect();
        assert_eq!(info, vec![2, 3, 1]);
        let critical: Vec<i64> = response.critical.iter().map(|c| c.isu_id).collect();
        assert_eq!(critical, vec![5, 4]);
        assert!(response.warning.is_empty());
    }
}

//! Migration ledger: one record per legacy user id.
//!
//! The ledger deduplicates exchanges. A record is created on the first
//! successful exchange for a legacy id and only its last-exchange timestamp
//! changes afterwards. Records are never deleted.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Outcome of a completed migration for one legacy user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Legacy provider user id (ledger key).
    pub legacy_user_id: String,

    /// Target provider account id.
    pub target_account_id: String,

    /// Identifier used for the target account (email or phone).
    pub identifier: String,

    /// Time of the first successful exchange.
    pub first_migrated_at: DateTime<Utc>,

    /// Time of the most recent successful exchange.
    pub last_exchange_at: DateTime<Utc>,
}

/// Storage for migration records.
///
/// Implementations must guarantee at most one record per legacy user id,
/// including under concurrent `upsert` calls for the same id.
#[async_trait::async_trait]
pub trait MigrationLedger: Send + Sync {
    /// Record for `legacy_user_id`, if any.
    async fn get(&self, legacy_user_id: &str) -> Option<MigrationRecord>;

    /// Insert a record if none exists, then set its last-exchange time to `now`.
    ///
    /// The last-exchange time never moves backwards. An existing record keeps its target account id, identifier, and
    /// first-migration time. Returns the stored record.
    async fn upsert(
        &self,
        legacy_user_id: &str,
        target_account_id: &str,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> MigrationRecord;

    /// Number of records.
    async fn count(&self) -> usize;
}

/// Process-lifetime ledger behind a single reader/writer lock.
#[derive(Default)]
pub struct InMemoryLedger {
    records: RwLock<HashMap<String, MigrationRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MigrationLedger for InMemoryLedger {
    async fn get(&self, legacy_user_id: &str) -> Option<MigrationRecord> {
        self.records.read().await.get(legacy_user_id).cloned()
    }

    async fn upsert(
        &self,
        legacy_user_id: &str,
        target_account_id: &str,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> MigrationRecord {
        let mut records = self.records.write().await;
        let record = records
            .entry(legacy_user_id.to_string())
            .or_insert_with(|| MigrationRecord {
                legacy_user_id: legacy_user_id.to_string(),
                target_account_id: target_account_id.to_string(),
                identifier: identifier.to_string(),
                first_migrated_at: now,
                last_exchange_at: now,
            });
        // Clock readings from concurrent callers can arrive out of order.
        record.last_exchange_at = record.last_exchange_at.max(now);
        record.clone()
    }

    async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    #[tokio::test]
    async fn test_get_missing_record() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.get("psg_1").await.is_none());
        assert_eq!(ledger.count().await, 0);
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates_last_exchange() {
        let ledger = InMemoryLedger::new();

        let first = ledger.upsert("psg_1", "auth0|a", "a@example.com", t(0)).await;
        assert_eq!(first.first_migrated_at, t(0));
        assert_eq!(first.last_exchange_at, t(0));

        let second = ledger
            .upsert("psg_1", "auth0|other", "other@example.com", t(60))
            .await;
        assert_eq!(second.target_account_id, "auth0|a");
        assert_eq!(second.identifier, "a@example.com");
        assert_eq!(second.first_migrated_at, t(0));
        assert_eq!(second.last_exchange_at, t(60));
        assert!(second.first_migrated_at <= second.last_exchange_at);

        assert_eq!(ledger.count().await, 1);
        assert_eq!(ledger.get("psg_1").await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_distinct_ids_are_counted() {
        let ledger = InMemoryLedger::new();
        for i in 0..5 {
            ledger
                .upsert(&format!("psg_{i}"), "auth0|x", "x@example.com", t(i))
                .await;
        }
        assert_eq!(ledger.count().await, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_never_duplicate() {
        let ledger = Arc::new(InMemoryLedger::new());
        let start = t(0);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .upsert("psg_same", "auth0|a", "a@example.com", start + Duration::seconds(i))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.count().await, 1);
        let record = ledger.get("psg_same").await.unwrap();
        assert!(record.first_migrated_at <= record.last_exchange_at);
    }
}

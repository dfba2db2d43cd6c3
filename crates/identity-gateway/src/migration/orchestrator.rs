//! Token exchange: legacy token in, target account out.
//!
//! ```text
//! exchange(token)
//!   -> SourceTokenValidator::validate      (legacy provider, 2 calls)
//!   -> MigrationLedger::get                (read lock, optimistic)
//!   -> TargetAccountProvisioner::find_or_create (target provider, 2-3 calls)
//!   -> MigrationLedger::upsert             (write lock, re-checked)
//! ```
//!
//! `is_new_migration` comes from the optimistic read, so two concurrent
//! first-time exchanges for one legacy id may both report `true`. The ledger
//! itself never holds more than one record per id.

use crate::errors::MigrationError;
use crate::migration::ledger::{MigrationLedger, MigrationRecord};
use crate::migration::provisioner::TargetAccountProvisioner;
use crate::migration::source::SourceTokenValidator;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Time source for ledger timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Result of a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub target_account_id: String,

    /// Email, or phone when the legacy user has no email.
    pub identifier: String,

    /// No ledger record existed when the exchange started.
    pub is_new_migration: bool,
}

/// Ledger counters. Both fields equal the number of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    pub total_migrated_users: usize,
    pub cache_size: usize,
}

/// Composes legacy validation, target provisioning, and the ledger.
pub struct MigrationOrchestrator {
    source: Arc<dyn SourceTokenValidator>,
    provisioner: Arc<dyn TargetAccountProvisioner>,
    ledger: Arc<dyn MigrationLedger>,
    clock: Clock,
}

impl MigrationOrchestrator {
    pub fn new(
        source: Arc<dyn SourceTokenValidator>,
        provisioner: Arc<dyn TargetAccountProvisioner>,
        ledger: Arc<dyn MigrationLedger>,
    ) -> Self {
        Self {
            source,
            provisioner,
            ledger,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Exchange a legacy token for a target-provider account.
    ///
    /// # Errors
    ///
    /// - `LegacyValidationFailed` - legacy token or profile lookup rejected
    /// - `NoIdentifier` - legacy user has neither email nor phone (target
    ///   provider is not contacted)
    /// - `ManagementAuthFailed` / `AccountCreationFailed` - target provider failure
    #[instrument(skip_all, name = "gateway.migration.exchange")]
    pub async fn exchange(&self, source_token: &str) -> Result<ExchangeOutcome, MigrationError> {
        let start = Instant::now();
        let result = self.exchange_inner(source_token).await;

        match &result {
            Ok(outcome) => {
                let label = if outcome.is_new_migration { "new" } else { "repeat" };
                metrics::record_migration_exchange("success", label, start.elapsed());
                tracing::info!(
                    target: "gateway.migration.orchestrator",
                    is_new_migration = outcome.is_new_migration,
                    "Token exchange completed"
                );
            }
            Err(e) => {
                metrics::record_migration_exchange("error", e.outcome(), start.elapsed());
                tracing::warn!(
                    target: "gateway.migration.orchestrator",
                    outcome = e.outcome(),
                    "Token exchange failed"
                );
            }
        }

        result
    }

    async fn exchange_inner(&self, source_token: &str) -> Result<ExchangeOutcome, MigrationError> {
        let legacy = self.source.validate(source_token).await?;

        let (identifier, verified) = legacy
            .preferred_identifier()
            .ok_or(MigrationError::NoIdentifier)?;

        let is_new_migration = self.ledger.get(&legacy.id).await.is_none();

        let account = self.provisioner.find_or_create(identifier, verified).await?;

        let record = self
            .ledger
            .upsert(&legacy.id, &account.user_id, identifier, (self.clock)())
            .await;
        metrics::set_ledger_records(self.ledger.count().await);

        tracing::debug!(
            target: "gateway.migration.orchestrator",
            legacy_user_id = %record.legacy_user_id,
            first_migrated_at = %record.first_migrated_at,
            "Ledger updated"
        );

        Ok(ExchangeOutcome {
            target_account_id: account.user_id,
            identifier: identifier.to_string(),
            is_new_migration,
        })
    }

    /// Ledger record for a legacy user id.
    pub async fn status(&self, legacy_user_id: &str) -> Option<MigrationRecord> {
        self.ledger.get(legacy_user_id).await
    }

    pub async fn stats(&self) -> MigrationStats {
        let count = self.ledger.count().await;
        MigrationStats {
            total_migrated_users: count,
            cache_size: count,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::migration::ledger::InMemoryLedger;
    use crate::migration::provisioner::mock::MockProvisioner;
    use crate::migration::source::mock::MockSourceValidator;
    use crate::migration::source::LegacyIdentity;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn legacy(id: &str, email: &str, phone: &str) -> LegacyIdentity {
        LegacyIdentity {
            id: id.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            email_verified: true,
            phone_verified: false,
        }
    }

    /// Clock that advances one minute per reading.
    fn ticking_clock() -> Clock {
        let tick = Arc::new(AtomicI64::new(0));
        Arc::new(move || {
            let n = tick.fetch_add(1, Ordering::SeqCst);
            Utc.timestamp_opt(1_700_000_000 + n * 60, 0).unwrap()
        })
    }

    struct Harness {
        orchestrator: MigrationOrchestrator,
        source: Arc<MockSourceValidator>,
        provisioner: Arc<MockProvisioner>,
    }

    fn harness(identity: LegacyIdentity) -> Harness {
        let source = Arc::new(MockSourceValidator::returning(identity));
        let provisioner = Arc::new(MockProvisioner::returning("auth0|target"));
        let orchestrator = MigrationOrchestrator::new(
            source.clone(),
            provisioner.clone(),
            Arc::new(InMemoryLedger::new()),
        )
        .with_clock(ticking_clock());

        Harness {
            orchestrator,
            source,
            provisioner,
        }
    }

    #[tokio::test]
    async fn test_repeat_exchange_is_not_new_and_keeps_first_timestamp() {
        let h = harness(legacy("psg_1", "a@example.com", ""));

        let first = h.orchestrator.exchange("token").await.unwrap();
        assert!(first.is_new_migration);
        assert_eq!(first.target_account_id, "auth0|target");
        assert_eq!(first.identifier, "a@example.com");
        let after_first = h.orchestrator.status("psg_1").await.unwrap();

        let second = h.orchestrator.exchange("token").await.unwrap();
        assert!(!second.is_new_migration);
        let after_second = h.orchestrator.status("psg_1").await.unwrap();

        assert_eq!(after_second.first_migrated_at, after_first.first_migrated_at);
        assert!(after_second.last_exchange_at > after_first.last_exchange_at);
        assert_eq!(h.orchestrator.stats().await.total_migrated_users, 1);
    }

    #[tokio::test]
    async fn test_no_identifier_rejected_before_provisioning() {
        let h = harness(legacy("psg_1", "", ""));

        let err = h.orchestrator.exchange("token").await.unwrap_err();

        assert_eq!(err, MigrationError::NoIdentifier);
        assert_eq!(h.source.call_count(), 1);
        assert_eq!(h.provisioner.call_count(), 0);
        assert!(h.orchestrator.status("psg_1").await.is_none());
    }

    #[tokio::test]
    async fn test_phone_used_when_email_missing_with_phone_flag() {
        let h = harness(legacy("psg_1", "", "+15550100"));

        let outcome = h.orchestrator.exchange("token").await.unwrap();

        assert_eq!(outcome.identifier, "+15550100");
        // phone_verified is false in the fixture; email_verified is true.
        assert_eq!(h.provisioner.calls(), vec![("+15550100".to_string(), false)]);
    }

    #[tokio::test]
    async fn test_legacy_failure_propagates() {
        let source = Arc::new(MockSourceValidator::failing(
            MigrationError::LegacyValidationFailed("expired".to_string()),
        ));
        let provisioner = Arc::new(MockProvisioner::returning("auth0|x"));
        let orchestrator = MigrationOrchestrator::new(
            source,
            provisioner.clone(),
            Arc::new(InMemoryLedger::new()),
        );

        let err = orchestrator.exchange("token").await.unwrap_err();
        assert_eq!(err.to_string(), "invalid passage token: expired");
        assert_eq!(provisioner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provisioning_failure_leaves_ledger_untouched() {
        let source = Arc::new(MockSourceValidator::returning(legacy(
            "psg_1",
            "a@example.com",
            "",
        )));
        let provisioner = Arc::new(MockProvisioner::failing(
            MigrationError::AccountCreationFailed("409 Conflict".to_string()),
        ));
        let orchestrator =
            MigrationOrchestrator::new(source, provisioner, Arc::new(InMemoryLedger::new()));

        assert!(orchestrator.exchange("token").await.is_err());
        assert_eq!(orchestrator.stats().await.total_migrated_users, 0);
    }

    #[tokio::test]
    async fn test_stats_count_distinct_users() {
        let ledger = Arc::new(InMemoryLedger::new());
        let provisioner = Arc::new(MockProvisioner::returning("auth0|x"));

        for i in 0..3 {
            let source = Arc::new(MockSourceValidator::returning(legacy(
                &format!("psg_{i}"),
                &format!("user{i}@example.com"),
                "",
            )));
            let orchestrator =
                MigrationOrchestrator::new(source, provisioner.clone(), ledger.clone());
            orchestrator.exchange("token").await.unwrap();
        }

        let orchestrator = MigrationOrchestrator::new(
            Arc::new(MockSourceValidator::failing(MigrationError::NoIdentifier)),
            provisioner,
            ledger,
        );
        assert_eq!(
            orchestrator.stats().await,
            MigrationStats {
                total_migrated_users: 3,
                cache_size: 3
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_exchanges_create_one_record() {
        let h = harness(legacy("psg_race", "race@example.com", ""));
        let orchestrator = Arc::new(h.orchestrator);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move { orchestrator.exchange("token").await })
            })
            .collect();

        let outcomes = futures::future::join_all(handles).await;
        let new_count = outcomes
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .filter(|outcome| outcome.is_new_migration)
            .count();

        assert!(new_count >= 1);
        assert_eq!(orchestrator.stats().await.total_migrated_users, 1);
    }
}

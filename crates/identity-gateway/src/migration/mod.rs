//! Passage to Auth0 account migration.
//!
//! # Components
//!
//! - `source` - legacy token validation and profile lookup
//! - `provisioner` - target account find-or-create
//! - `ledger` - per-legacy-user deduplication records
//! - `orchestrator` - the exchange workflow

pub mod ledger;
pub mod orchestrator;
pub mod provisioner;
pub mod source;

pub use ledger::{InMemoryLedger, MigrationLedger, MigrationRecord};
pub use orchestrator::{Clock, ExchangeOutcome, MigrationOrchestrator, MigrationStats};
pub use provisioner::{Auth0Provisioner, ProvisionedAccount, TargetAccountProvisioner};
pub use source::{LegacyIdentity, PassageValidator, SourceTokenValidator};

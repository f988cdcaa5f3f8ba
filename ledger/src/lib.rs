//! StreamLedger Engine
//!
//! Payment streams that vest linearly from a sender to a receiver, with an
//! explicit create / accept / claim / cancel lifecycle over a pluggable vault.

pub mod engine;
pub mod stream;
pub mod vesting;
pub mod vault;
pub mod journal;
pub mod config;
pub mod metrics;

pub use engine::{CancelOutcome, LedgerSnapshot, StreamLedger};
pub use stream::{Stream, StreamInfo, StreamStatus, StreamStore};
pub use vesting::vested_amount;
pub use vault::{InMemoryVault, Vault};
pub use journal::{EntryKind, Journal, JournalEntry, JournalTotals};
pub use config::LedgerConfig;
pub use metrics::{Metrics, MetricsSnapshot};

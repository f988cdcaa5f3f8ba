//! Journal of value movements into and out of streams.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use streamledger_common::{AccountId, Amount, StreamKey, Timestamp};

/// Kind of value movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// Sender funds locked into a new stream.
    Lock,
    /// Vested funds paid to the receiver (claim or cancel).
    Payout,
    /// Unvested funds returned to the sender on cancel.
    Refund,
}

/// A single journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique entry ID (time-ordered).
    pub id: Uuid,
    /// Stream the movement belongs to.
    pub stream: StreamKey,
    /// Account debited (lock) or credited (payout/refund).
    pub account: AccountId,
    /// Kind of movement.
    pub kind: EntryKind,
    /// Amount moved.
    pub amount: Amount,
    /// Ledger clock reading when the movement happened.
    pub recorded_at: Timestamp,
}

impl JournalEntry {
    /// Funds locked from the sender.
    pub fn lock(stream: StreamKey, amount: Amount, recorded_at: Timestamp) -> Self {
        let account = stream.sender.clone();
        Self::new(stream, account, EntryKind::Lock, amount, recorded_at)
    }

    /// Funds paid out to the receiver.
    pub fn payout(stream: StreamKey, amount: Amount, recorded_at: Timestamp) -> Self {
        let account = stream.receiver.clone();
        Self::new(stream, account, EntryKind::Payout, amount, recorded_at)
    }

    /// Funds refunded to the sender.
    pub fn refund(stream: StreamKey, amount: Amount, recorded_at: Timestamp) -> Self {
        let account = stream.sender.clone();
        Self::new(stream, account, EntryKind::Refund, amount, recorded_at)
    }

    fn new(
        stream: StreamKey,
        account: AccountId,
        kind: EntryKind,
        amount: Amount,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            stream,
            account,
            kind,
            amount,
            recorded_at,
        }
    }
}

/// Per-stream totals derived from the journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalTotals {
    /// Value moved from the sender into the stream.
    pub locked: u128,
    /// Value paid to the receiver.
    pub paid_out: u128,
    /// Value returned to the sender.
    pub refunded: u128,
}

impl JournalTotals {
    /// Check that everything locked is either paid out, refunded or still held.
    pub fn is_balanced(&self, held: Amount) -> bool {
        self.locked == self.paid_out + self.refunded + held as u128
    }

    fn add(&mut self, entry: &JournalEntry) {
        let amount = entry.amount as u128;
        match entry.kind {
            EntryKind::Lock => self.locked += amount,
            EntryKind::Payout => self.paid_out += amount,
            EntryKind::Refund => self.refunded += amount,
        }
    }
}

/// Append-only, in-memory journal.
///
/// Running totals are kept per sender and stream alongside the entries, so
/// audits never rescan the entry log.
#[derive(Debug, Default)]
pub struct Journal {
    entries: RwLock<Vec<JournalEntry>>,
    totals: RwLock<HashMap<AccountId, HashMap<StreamKey, JournalTotals>>>,
}

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append entries. Zero-amount movements are not recorded.
    pub fn record(&self, entries: impl IntoIterator<Item = JournalEntry>) {
        let mut log = self.entries.write();
        let mut totals = self.totals.write();
        for entry in entries.into_iter().filter(|e| e.amount > 0) {
            totals
                .entry(entry.stream.sender.clone())
                .or_default()
                .entry(entry.stream.clone())
                .or_default()
                .add(&entry);
            log.push(entry);
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All entries for one stream, in recording order.
    pub fn entries_for(&self, stream: &StreamKey) -> Vec<JournalEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| &e.stream == stream)
            .cloned()
            .collect()
    }

    /// Totals for one stream.
    pub fn totals_for(&self, stream: &StreamKey) -> JournalTotals {
        self.totals
            .read()
            .get(&stream.sender)
            .and_then(|streams| streams.get(stream))
            .copied()
            .unwrap_or_default()
    }

    /// Totals for every stream `sender` ever funded.
    pub fn totals_for_sender(&self, sender: &AccountId) -> HashMap<StreamKey, JournalTotals> {
        self.totals.read().get(sender).cloned().unwrap_or_default()
    }

    /// Totals for every stream that ever moved value.
    pub fn totals(&self) -> HashMap<StreamKey, JournalTotals> {
        self.totals
            .read()
            .values()
            .flat_map(|streams| streams.iter().map(|(k, t)| (k.clone(), *t)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> StreamKey {
        StreamKey::new("alice".into(), "bob".into())
    }

    #[test]
    fn test_balanced_stream() {
        let journal = Journal::new();
        journal.record([
            JournalEntry::lock(key(), 1000, 10),
            JournalEntry::payout(key(), 300, 20),
            JournalEntry::refund(key(), 500, 30),
        ]);

        let totals = journal.totals_for(&key());
        assert_eq!(totals.locked, 1000);
        assert_eq!(totals.paid_out, 300);
        assert_eq!(totals.refunded, 500);
        assert!(totals.is_balanced(200));
        assert!(!totals.is_balanced(0));
    }

    #[test]
    fn test_entry_accounts() {
        let lock = JournalEntry::lock(key(), 1, 0);
        let payout = JournalEntry::payout(key(), 1, 0);
        let refund = JournalEntry::refund(key(), 1, 0);

        assert_eq!(lock.account, AccountId::new("alice"));
        assert_eq!(payout.account, AccountId::new("bob"));
        assert_eq!(refund.account, AccountId::new("alice"));
    }

    #[test]
    fn test_zero_amounts_skipped() {
        let journal = Journal::new();
        journal.record([
            JournalEntry::lock(key(), 100, 0),
            JournalEntry::payout(key(), 0, 1),
        ]);

        assert_eq!(journal.len(), 1);
        assert_eq!(journal.entries_for(&key())[0].kind, EntryKind::Lock);
    }

    #[test]
    fn test_totals_by_stream() {
        let other = StreamKey::new("alice".into(), "carol".into());
        let journal = Journal::new();
        journal.record([
            JournalEntry::lock(key(), 100, 0),
            JournalEntry::lock(other.clone(), 40, 0),
            JournalEntry::payout(other.clone(), 40, 5),
        ]);

        assert_eq!(journal.totals_for_sender(&"bob".into()).len(), 0);
        assert_eq!(journal.totals_for_sender(&"alice".into()).len(), 2);

        let totals = journal.totals();
        assert_eq!(totals.len(), 2);
        assert!(totals[&key()].is_balanced(100));
        assert!(totals[&other].is_balanced(0));
    }

    #[test]
    fn test_running_totals_match_entry_log() {
        let journal = Journal::new();
        for i in 0..50u64 {
            journal.record([
                JournalEntry::lock(key(), 10, i),
                JournalEntry::payout(key(), i % 10, i),
                JournalEntry::refund(key(), 10 - i % 10, i),
            ]);
        }

        let mut rebuilt = JournalTotals::default();
        for entry in journal.entries_for(&key()) {
            rebuilt.add(&entry);
        }
        assert_eq!(journal.totals_for(&key()), rebuilt);
        assert!(rebuilt.is_balanced(0));
        let unknown = StreamKey::new("bob".into(), "alice".into());
        assert_eq!(journal.totals_for(&unknown), JournalTotals::default());
    }
}

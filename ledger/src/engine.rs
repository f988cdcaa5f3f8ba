//! Core stream ledger implementation.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use streamledger_common::{
    AccountId, Amount, Clock, Result, StreamError, StreamKey, Timestamp,
};

use crate::config::LedgerConfig;
use crate::journal::{Journal, JournalEntry};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::stream::{Stream, StreamInfo, StreamStore};
use crate::vault::Vault;

/// Where the value of a cancelled stream went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    /// Vested, unclaimed value paid to the receiver.
    pub to_receiver: Amount,
    /// Unvested value returned to the sender.
    pub to_sender: Amount,
}

/// Point-in-time dump of every stream in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Ledger clock reading when the snapshot was taken.
    pub taken_at: Timestamp,
    /// Streams ordered by (sender, receiver).
    pub streams: Vec<StreamInfo>,
    /// Counters at the time of the snapshot.
    pub metrics: MetricsSnapshot,
}

type SharedStore = Arc<Mutex<StreamStore>>;

/// The stream ledger: per-sender stream stores plus the four lifecycle
/// operations (create, accept, claim, cancel).
///
/// Every operation holds the sender's store lock for its whole duration, so
/// operations on streams of the same sender never interleave. All
/// preconditions are checked before value moves; an `Err` leaves balances,
/// streams and the journal untouched.
pub struct StreamLedger {
    /// Stream stores keyed by sender.
    stores: DashMap<AccountId, SharedStore>,
    /// Custody of account balances.
    vault: Arc<dyn Vault>,
    /// Time source for acceptance and vesting.
    clock: Arc<dyn Clock>,
    /// Configuration.
    config: LedgerConfig,
    /// Audit trail of value movements.
    journal: Journal,
    /// Operation counters.
    metrics: Arc<Metrics>,
}

impl StreamLedger {
    /// Create a ledger over the given vault and clock.
    pub fn new(config: LedgerConfig, vault: Arc<dyn Vault>, clock: Arc<dyn Clock>) -> Self {
        Self {
            stores: DashMap::new(),
            vault,
            clock,
            config,
            journal: Journal::new(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Lock `amount` from `caller` into a new pending stream to `receiver`.
    #[instrument(skip(self))]
    pub fn create(
        &self,
        caller: &AccountId,
        receiver: &AccountId,
        amount: Amount,
        duration: u64,
    ) -> Result<()> {
        let result = self.try_create(caller, receiver, amount, duration);
        self.observe("create", result)
    }

    /// Accept the stream `sender` opened to `caller`, starting its vesting.
    ///
    /// The stream is looked up by the caller's own identity, so only the
    /// designated receiver can ever find it.
    #[instrument(skip(self))]
    pub fn accept(&self, caller: &AccountId, sender: &AccountId) -> Result<()> {
        let result = self.try_accept(caller, sender);
        self.observe("accept", result)
    }

    /// Pay `caller` everything vested and not yet claimed on the stream from
    /// `sender`. Returns the amount paid.
    #[instrument(skip(self))]
    pub fn claim(&self, caller: &AccountId, sender: &AccountId) -> Result<Amount> {
        let result = self.try_claim(caller, sender);
        self.observe("claim", result)
    }

    /// Terminate the stream `sender -> receiver`. Either party may cancel.
    ///
    /// A pending stream refunds everything to the sender. An active stream
    /// pays the vested, unclaimed part to the receiver and refunds the rest.
    #[instrument(skip(self))]
    pub fn cancel(
        &self,
        caller: &AccountId,
        sender: &AccountId,
        receiver: &AccountId,
    ) -> Result<CancelOutcome> {
        let result = self.try_cancel(caller, sender, receiver);
        self.observe("cancel", result)
    }

    /// `(length_in_seconds, start_time, remaining_value)` of a stream.
    pub fn get_stream(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
    ) -> Result<(u64, Timestamp, Amount)> {
        self.with_stream(sender, receiver, |stream| {
            Ok((stream.length_in_seconds, stream.start_time, stream.remaining()))
        })
    }

    /// Full view of a stream as of now.
    pub fn stream_info(&self, sender: &AccountId, receiver: &AccountId) -> Result<StreamInfo> {
        let now = self.clock.now();
        self.with_stream(sender, receiver, |stream| stream.info(now))
    }

    /// What a claim by the receiver would pay right now.
    pub fn claimable_amount(&self, sender: &AccountId, receiver: &AccountId) -> Result<Amount> {
        let now = self.clock.now();
        self.with_stream(sender, receiver, |stream| stream.claimable(now))
    }

    /// What a cancel would return to the sender right now.
    pub fn refundable_amount(&self, sender: &AccountId, receiver: &AccountId) -> Result<Amount> {
        let now = self.clock.now();
        self.with_stream(sender, receiver, |stream| {
            Ok(stream.remaining() - stream.claimable(now)?)
        })
    }

    /// Check whether a stream exists for the pair.
    pub fn stream_exists(&self, sender: &AccountId, receiver: &AccountId) -> bool {
        self.store(sender)
            .map(|store| store.lock().contains(receiver))
            .unwrap_or(false)
    }

    /// All outgoing streams of `sender`, ordered by receiver.
    pub fn streams_of(&self, sender: &AccountId) -> Result<Vec<StreamInfo>> {
        let now = self.clock.now();
        let store = self.store(sender)?;
        let store = store.lock();

        let mut streams = store
            .streams()
            .map(|stream| stream.info(now))
            .collect::<Result<Vec<_>>>()?;
        streams.sort_by(|a, b| a.receiver.cmp(&b.receiver));
        Ok(streams)
    }

    /// Total value currently locked across all streams.
    pub fn total_held(&self) -> u128 {
        self.shared_stores()
            .iter()
            .map(|store| {
                store
                    .lock()
                    .streams()
                    .map(|s| s.remaining() as u128)
                    .sum::<u128>()
            })
            .sum()
    }

    /// Check, per stream, that everything ever locked is accounted for as
    /// paid out, refunded or still held.
    pub fn verify_conservation(&self) -> bool {
        for store in self.shared_stores() {
            let store = store.lock();
            let totals = self.journal.totals_for_sender(store.sender());

            for (key, totals) in &totals {
                let held = store
                    .get(&key.receiver)
                    .map(|stream| stream.remaining())
                    .unwrap_or(0);

                if !totals.is_balanced(held) {
                    warn!(stream = %key, ?totals, held, "Conservation check failed");
                    return false;
                }
            }

            // Every live stream must have been funded through the journal.
            for stream in store.streams() {
                if stream.deposited > 0 && !totals.contains_key(&stream.key()) {
                    warn!(stream = %stream.key(), "Stream missing from journal");
                    return false;
                }
            }
        }
        true
    }

    /// Dump every stream.
    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        let now = self.clock.now();
        let mut streams = Vec::new();

        for store in self.shared_stores() {
            let store = store.lock();
            for stream in store.streams() {
                streams.push(stream.info(now)?);
            }
        }
        streams.sort_by(|a, b| (&a.sender, &a.receiver).cmp(&(&b.sender, &b.receiver)));

        Ok(LedgerSnapshot {
            taken_at: now,
            streams,
            metrics: self.metrics.snapshot(),
        })
    }

    /// The ledger's journal.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// The ledger's metrics.
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// The ledger's configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // --- Private methods ---

    fn try_create(
        &self,
        caller: &AccountId,
        receiver: &AccountId,
        amount: Amount,
        duration: u64,
    ) -> Result<()> {
        if caller == receiver {
            return Err(StreamError::SenderEqualsReceiver(caller.clone()));
        }
        if let Some(account) = [caller, receiver].into_iter().find(|a| !a.is_valid()) {
            return Err(StreamError::InvalidAccount(account.clone()));
        }
        if amount == 0 {
            return Err(StreamError::InvalidAmount(amount));
        }
        if !self.config.accepts_duration(duration) {
            return Err(StreamError::InvalidDuration(duration));
        }

        let key = StreamKey::new(caller.clone(), receiver.clone());

        match self.stores.entry(caller.clone()) {
            Entry::Occupied(entry) => {
                let store = entry.get().clone();
                drop(entry);
                let mut store = store.lock();

                if store.contains(receiver) {
                    return Err(StreamError::StreamAlreadyExists(key));
                }
                let stream = self.fund_stream(caller, receiver, amount, duration)?;
                if let Err((err, mut stream)) = store.insert(stream) {
                    self.vault.deposit(caller, stream.drain());
                    return Err(err);
                }
                self.journal
                    .record([JournalEntry::lock(key.clone(), amount, self.clock.now())]);
            }
            Entry::Vacant(entry) => {
                // The shard stays locked until the new store is published.
                let stream = self.fund_stream(caller, receiver, amount, duration)?;
                let mut store = StreamStore::new(caller.clone());
                if let Err((err, mut stream)) = store.insert(stream) {
                    self.vault.deposit(caller, stream.drain());
                    return Err(err);
                }
                self.journal
                    .record([JournalEntry::lock(key.clone(), amount, self.clock.now())]);
                entry.insert(Arc::new(Mutex::new(store)));
                info!(sender = %caller, "Stream store initialized");
            }
        }

        self.metrics.stream_created(amount);
        info!(stream = %key, amount, duration, "Stream created");
        Ok(())
    }

    fn try_accept(&self, caller: &AccountId, sender: &AccountId) -> Result<()> {
        let store = self.store(sender)?;
        let mut store = store.lock();
        let stream = store.get_mut(caller)?;

        let now = self.clock.now();
        stream.activate(now)?;

        self.metrics.stream_accepted();
        info!(stream = %stream.key(), start_time = stream.start_time, "Stream accepted");
        Ok(())
    }

    fn try_claim(&self, caller: &AccountId, sender: &AccountId) -> Result<Amount> {
        if caller == sender {
            return Err(StreamError::SenderEqualsReceiver(caller.clone()));
        }

        let store = self.store(sender)?;
        let mut store = store.lock();
        let stream = store.get_mut(caller)?;

        if stream.is_pending() {
            return Err(StreamError::StreamNotActive(stream.key()));
        }

        let now = self.clock.now();
        let amount = stream.claimable(now)?;
        let payout = stream.pay_out(amount)?;
        let key = stream.key();
        let remaining = stream.remaining();

        self.vault.deposit(caller, payout);
        self.journal.record([JournalEntry::payout(key.clone(), amount, now)]);

        if remaining == 0 && !self.config.retain_exhausted_streams {
            store.remove(caller);
            info!(stream = %key, "Exhausted stream removed");
        }

        self.metrics.claimed(amount);
        info!(stream = %key, amount, remaining, "Stream claimed");
        Ok(amount)
    }

    fn try_cancel(
        &self,
        caller: &AccountId,
        sender: &AccountId,
        receiver: &AccountId,
    ) -> Result<CancelOutcome> {
        let key = StreamKey::new(sender.clone(), receiver.clone());
        if !key.involves(caller) {
            return Err(StreamError::NotParticipant {
                caller: caller.clone(),
                stream: key,
            });
        }
        if sender == receiver {
            return Err(StreamError::SenderEqualsReceiver(sender.clone()));
        }

        let store = self.store(sender)?;
        let mut store = store.lock();
        let stream = store.get_mut(receiver)?;

        let now = self.clock.now();
        let to_receiver = if stream.is_pending() {
            0
        } else {
            stream.claimable(now)?
        };
        let payout = stream.pay_out(to_receiver)?;
        let refund = stream.drain();
        let to_sender = refund.value();

        self.vault.deposit(receiver, payout);
        self.vault.deposit(sender, refund);
        self.journal.record([
            JournalEntry::payout(key.clone(), to_receiver, now),
            JournalEntry::refund(key.clone(), to_sender, now),
        ]);

        if !self.config.retain_exhausted_streams {
            store.remove(receiver);
        }

        self.metrics.cancelled(to_receiver, to_sender);
        info!(
            stream = %key,
            cancelled_by = %caller,
            to_receiver,
            to_sender,
            "Stream cancelled"
        );
        Ok(CancelOutcome {
            to_receiver,
            to_sender,
        })
    }

    fn fund_stream(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        amount: Amount,
        duration: u64,
    ) -> Result<Stream> {
        let funds = self.vault.withdraw(sender, amount)?;
        Ok(Stream::new(
            sender.clone(),
            receiver.clone(),
            duration,
            funds,
            self.clock.now(),
        ))
    }

    fn store(&self, sender: &AccountId) -> Result<SharedStore> {
        self.stores
            .get(sender)
            .map(|store| store.clone())
            .ok_or_else(|| StreamError::StoreNotFound(sender.clone()))
    }

    fn shared_stores(&self) -> Vec<SharedStore> {
        self.stores.iter().map(|store| store.value().clone()).collect()
    }

    fn with_stream<T>(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        f: impl FnOnce(&Stream) -> Result<T>,
    ) -> Result<T> {
        let store = self.store(sender)?;
        let store = store.lock();
        f(store.get(receiver)?)
    }

    fn observe<T>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.metrics.rejected();
            warn!(operation, code = e.error_code(), error = %e, "Operation rejected");
        }
        result
    }
}

//! Stream records and the per-sender stream store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use streamledger_common::{
    AccountId, Amount, Coin, Result, StreamError, StreamKey, Timestamp,
};

use crate::vesting::vested_amount;

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    /// Created, waiting for the receiver to accept.
    Pending,
    /// Accepted; value is vesting to the receiver.
    Active,
    /// Nothing left in the stream.
    Exhausted,
}

/// A single sender-to-receiver vesting commitment.
#[derive(Debug)]
pub struct Stream {
    /// Funding account.
    pub sender: AccountId,
    /// Account the funds vest to.
    pub receiver: AccountId,
    /// Vesting duration.
    pub length_in_seconds: u64,
    /// Zero while pending, acceptance time once active.
    pub start_time: Timestamp,
    /// Amount locked at creation.
    pub deposited: Amount,
    /// Amount paid to the receiver so far.
    pub withdrawn: Amount,
    /// When the stream was created.
    pub created_at: Timestamp,
    held: Coin,
}

impl Stream {
    /// Create a pending stream holding `funds`.
    pub fn new(
        sender: AccountId,
        receiver: AccountId,
        length_in_seconds: u64,
        funds: Coin,
        created_at: Timestamp,
    ) -> Self {
        Self {
            sender,
            receiver,
            length_in_seconds,
            start_time: 0,
            deposited: funds.value(),
            withdrawn: 0,
            created_at,
            held: funds,
        }
    }

    /// The (sender, receiver) key of this stream.
    pub fn key(&self) -> StreamKey {
        StreamKey::new(self.sender.clone(), self.receiver.clone())
    }

    /// Value still locked in the stream.
    pub fn remaining(&self) -> Amount {
        self.held.value()
    }

    /// Check if the stream has not been accepted yet.
    pub fn is_pending(&self) -> bool {
        self.start_time == 0
    }

    /// Current lifecycle state.
    pub fn status(&self) -> StreamStatus {
        if self.held.is_zero() {
            StreamStatus::Exhausted
        } else if self.is_pending() {
            StreamStatus::Pending
        } else {
            StreamStatus::Active
        }
    }

    /// Mark the stream active as of `now`.
    pub fn activate(&mut self, now: Timestamp) -> Result<()> {
        if !self.is_pending() {
            return Err(StreamError::StreamAlreadyActive(self.key()));
        }
        // start_time == 0 is reserved for pending streams.
        self.start_time = now.max(1);
        Ok(())
    }

    /// Amount of the deposit vested at `now`; zero while pending.
    pub fn vested(&self, now: Timestamp) -> Result<Amount> {
        if self.is_pending() {
            return Ok(0);
        }
        vested_amount(self.deposited, self.start_time, self.length_in_seconds, now)
    }

    /// Amount the receiver is owed at `now` and that the stream can still pay.
    pub fn claimable(&self, now: Timestamp) -> Result<Amount> {
        let owed = self.vested(now)?.saturating_sub(self.withdrawn);
        Ok(owed.min(self.remaining()))
    }

    /// Split `amount` off for the receiver, recording the withdrawal.
    pub fn pay_out(&mut self, amount: Amount) -> Result<Coin> {
        let withdrawn = self
            .withdrawn
            .checked_add(amount)
            .ok_or(StreamError::ArithmeticOverflow("withdrawn amount"))?;
        let coin = self.held.extract(amount)?;
        self.withdrawn = withdrawn;
        Ok(coin)
    }

    /// Take all remaining value out of the stream.
    pub fn drain(&mut self) -> Coin {
        self.held.extract_all()
    }

    /// Read-only projection of the stream at `now`.
    pub fn info(&self, now: Timestamp) -> Result<StreamInfo> {
        Ok(StreamInfo {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            length_in_seconds: self.length_in_seconds,
            start_time: self.start_time,
            deposited: self.deposited,
            withdrawn: self.withdrawn,
            remaining: self.remaining(),
            claimable: self.claimable(now)?,
            status: self.status(),
            created_at: self.created_at,
        })
    }
}

/// Serializable view of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub length_in_seconds: u64,
    pub start_time: Timestamp,
    pub deposited: Amount,
    pub withdrawn: Amount,
    pub remaining: Amount,
    /// What a claim would pay at the time the view was taken.
    pub claimable: Amount,
    pub status: StreamStatus,
    pub created_at: Timestamp,
}

/// All outgoing streams of one sender, keyed by receiver.
#[derive(Debug)]
pub struct StreamStore {
    sender: AccountId,
    streams: HashMap<AccountId, Stream>,
}

impl StreamStore {
    /// Create an empty store for `sender`.
    pub fn new(sender: AccountId) -> Self {
        Self {
            sender,
            streams: HashMap::new(),
        }
    }

    /// The sender owning this store.
    pub fn sender(&self) -> &AccountId {
        &self.sender
    }

    /// Check whether a stream to `receiver` exists.
    pub fn contains(&self, receiver: &AccountId) -> bool {
        self.streams.contains_key(receiver)
    }

    /// Insert a stream, rejecting a second stream to the same receiver.
    ///
    /// On rejection the stream is handed back so its funds are not lost.
    pub fn insert(&mut self, stream: Stream) -> std::result::Result<(), (StreamError, Stream)> {
        if self.streams.contains_key(&stream.receiver) {
            return Err((StreamError::StreamAlreadyExists(stream.key()), stream));
        }
        self.streams.insert(stream.receiver.clone(), stream);
        Ok(())
    }

    /// Look up the stream to `receiver`.
    pub fn get(&self, receiver: &AccountId) -> Result<&Stream> {
        self.streams
            .get(receiver)
            .ok_or_else(|| self.not_found(receiver))
    }

    /// Look up the stream to `receiver` for mutation.
    pub fn get_mut(&mut self, receiver: &AccountId) -> Result<&mut Stream> {
        let err = self.not_found(receiver);
        self.streams.get_mut(receiver).ok_or(err)
    }

    /// Remove the stream to `receiver`.
    pub fn remove(&mut self, receiver: &AccountId) -> Option<Stream> {
        self.streams.remove(receiver)
    }

    /// All streams in the store.
    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    fn not_found(&self, receiver: &AccountId) -> StreamError {
        StreamError::StreamNotFound(StreamKey::new(self.sender.clone(), receiver.clone()))
    }
}

impl Drop for StreamStore {
    fn drop(&mut self) {
        // Stores live as long as the ledger; value still locked at teardown
        // goes with it.
        for stream in self.streams.values_mut() {
            let _ = stream.drain().into_value();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Timestamp = 1_700_000_000;

    fn pending_stream(amount: Amount) -> Stream {
        Stream::new(
            AccountId::new("alice"),
            AccountId::new("bob"),
            100,
            Coin::mint(amount),
            T,
        )
    }

    fn release(mut stream: Stream) -> Amount {
        stream.drain().into_value()
    }

    #[test]
    fn test_new_stream_is_pending() {
        let stream = pending_stream(1000);

        assert_eq!(stream.status(), StreamStatus::Pending);
        assert_eq!(stream.start_time, 0);
        assert_eq!(stream.deposited, 1000);
        assert_eq!(stream.remaining(), 1000);
        assert_eq!(stream.claimable(T + 1_000).unwrap(), 0);
        release(stream);
    }

    #[test]
    fn test_activate_once() {
        let mut stream = pending_stream(1000);
        stream.activate(T).unwrap();

        assert_eq!(stream.status(), StreamStatus::Active);
        assert_eq!(stream.start_time, T);

        let err = stream.activate(T + 5).unwrap_err();
        assert!(matches!(err, StreamError::StreamAlreadyActive(_)));
        assert_eq!(stream.start_time, T);
        release(stream);
    }

    #[test]
    fn test_activate_at_epoch_zero() {
        let mut stream = pending_stream(1000);
        stream.activate(0).unwrap();
        assert!(!stream.is_pending());
        release(stream);
    }

    #[test]
    fn test_claimable_subtracts_withdrawn() {
        let mut stream = pending_stream(1000);
        stream.activate(T).unwrap();

        assert_eq!(stream.claimable(T + 50).unwrap(), 500);
        let paid = stream.pay_out(500).unwrap();
        assert_eq!(paid.into_value(), 500);

        assert_eq!(stream.claimable(T + 50).unwrap(), 0);
        assert_eq!(stream.claimable(T + 75).unwrap(), 250);
        assert_eq!(stream.claimable(T + 500).unwrap(), 500);
        assert_eq!(release(stream), 500);
    }

    #[test]
    fn test_drain_exhausts() {
        let mut stream = pending_stream(10);
        let coin = stream.drain();

        assert_eq!(coin.into_value(), 10);
        assert_eq!(stream.status(), StreamStatus::Exhausted);
    }

    #[test]
    fn test_store_rejects_duplicate_receiver() {
        let mut store = StreamStore::new(AccountId::new("alice"));
        store.insert(pending_stream(10)).unwrap();

        let (err, returned) = store.insert(pending_stream(20)).unwrap_err();
        assert!(matches!(err, StreamError::StreamAlreadyExists(_)));
        assert_eq!(release(returned), 20);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&AccountId::new("bob")).unwrap().remaining(), 10);
    }

    #[test]
    fn test_store_lookup_missing() {
        let store = StreamStore::new(AccountId::new("alice"));
        let err = store.get(&AccountId::new("carol")).unwrap_err();

        assert_eq!(
            err,
            StreamError::StreamNotFound(StreamKey::new("alice".into(), "carol".into()))
        );
    }

    #[test]
    fn test_info_projection() {
        let mut stream = pending_stream(1000);
        stream.activate(T).unwrap();
        let info = stream.info(T + 25).unwrap();

        assert_eq!(info.claimable, 250);
        assert_eq!(info.status, StreamStatus::Active);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["status"], "ACTIVE");
        release(stream);
    }

    #[test]
    fn test_store_teardown_releases_held_value() {
        let mut store = StreamStore::new(AccountId::new("alice"));
        store.insert(pending_stream(10)).unwrap();
        drop(store);
    }
}

//! Identifier types for StreamLedger entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated identity of an account (sender, receiver or caller).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the account ID format.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 64
            && self
                .0
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Logical primary key of a stream: one stream per (sender, receiver) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    /// The funding account.
    pub sender: AccountId,
    /// The account the funds vest to.
    pub receiver: AccountId,
}

impl StreamKey {
    /// Create a new stream key.
    pub fn new(sender: AccountId, receiver: AccountId) -> Self {
        Self { sender, receiver }
    }

    /// Check whether `account` is one of the two parties.
    pub fn involves(&self, account: &AccountId) -> bool {
        &self.sender == account || &self.receiver == account
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.sender, self.receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_validation() {
        assert!(AccountId::new("alice").is_valid());
        assert!(AccountId::new("0xA1b2.c3-d4_e5").is_valid());
        assert!(!AccountId::new("").is_valid());
        assert!(!AccountId::new("has space").is_valid());
        assert!(!AccountId::new("x".repeat(65)).is_valid());
    }

    #[test]
    fn test_stream_key_display() {
        let key = StreamKey::new(AccountId::new("alice"), AccountId::new("bob"));
        assert_eq!(key.to_string(), "alice->bob");
    }

    #[test]
    fn test_stream_key_json() {
        let key = StreamKey::new("alice".into(), "bob".into());
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"sender":"alice","receiver":"bob"}"#);

        let parsed: StreamKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_stream_key_involves() {
        let key = StreamKey::new("alice".into(), "bob".into());
        assert!(key.involves(&"alice".into()));
        assert!(key.involves(&"bob".into()));
        assert!(!key.involves(&"mallory".into()));
    }
}

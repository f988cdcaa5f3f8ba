//! Simulated stream participants.

use streamledger_common::AccountId;
use streamledger_ledger::{InMemoryVault, Vault};

/// A simulated account that can send and receive streams.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Account identifier.
    pub id: AccountId,
    /// Display name.
    pub name: String,
}

impl Participant {
    /// Create a new participant.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(id.into()),
            name: name.into(),
        }
    }

    /// Current vault balance.
    pub fn balance(&self, vault: &InMemoryVault) -> u64 {
        vault.balance(&self.id)
    }
}

/// Factory for simulated participants.
pub struct ParticipantFactory;

impl ParticipantFactory {
    /// Create N participants.
    pub fn create(count: usize) -> Vec<Participant> {
        let names = [
            ("alice", "Alice"),
            ("bob", "Bob"),
            ("carol", "Carol"),
            ("dave", "Dave"),
            ("erin", "Erin"),
            ("frank", "Frank"),
            ("grace", "Grace"),
            ("heidi", "Heidi"),
            ("ivan", "Ivan"),
            ("judy", "Judy"),
        ];

        (0..count)
            .map(|i| match names.get(i) {
                Some((id, name)) => Participant::new(*id, *name),
                None => Participant::new(format!("participant_{}", i + 1), format!("Participant {}", i + 1)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_names() {
        let participants = ParticipantFactory::create(12);

        assert_eq!(participants.len(), 12);
        assert_eq!(participants[0].id, AccountId::new("alice"));
        assert_eq!(participants[11].id, AccountId::new("participant_12"));
        assert!(participants.iter().all(|p| p.id.is_valid()));
    }
}

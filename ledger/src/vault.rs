//! Value custody: the vault collaborator and an in-memory implementation.

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use streamledger_common::{AccountId, Amount, Coin, Result, StreamError};

/// Custody of account balances.
///
/// `withdraw` is the only fallible operation; deposits always succeed.
pub trait Vault: Send + Sync {
    /// Take `amount` out of `account` as an owned coin.
    fn withdraw(&self, account: &AccountId, amount: Amount) -> Result<Coin>;

    /// Credit a coin to `account`.
    fn deposit(&self, account: &AccountId, coin: Coin);

    /// Current balance of `account`.
    fn balance(&self, account: &AccountId) -> Amount;
}

/// Thread-safe in-memory vault.
#[derive(Debug, Default)]
pub struct InMemoryVault {
    balances: DashMap<AccountId, Amount>,
    /// Total value ever minted; never exceeds `u64::MAX`.
    minted: Mutex<Amount>,
}

impl InMemoryVault {
    /// Create an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` of new value into `account`.
    ///
    /// Supply is capped at `u64::MAX` so that no later deposit can overflow
    /// a balance.
    pub fn fund(&self, account: &AccountId, amount: Amount) -> Result<()> {
        let mut minted = self.minted.lock();
        *minted = minted
            .checked_add(amount)
            .ok_or(StreamError::ArithmeticOverflow("vault supply"))?;

        *self.balances.entry(account.clone()).or_insert(0) += amount;
        info!(account = %account, amount, "Account funded");
        Ok(())
    }

    /// Total value minted by [`InMemoryVault::fund`].
    pub fn minted(&self) -> Amount {
        *self.minted.lock()
    }

    /// Sum of all account balances. Value withdrawn into coins is not counted.
    pub fn total_balances(&self) -> Amount {
        self.balances.iter().map(|b| *b.value()).sum()
    }
}

impl Vault for InMemoryVault {
    fn withdraw(&self, account: &AccountId, amount: Amount) -> Result<Coin> {
        let Some(mut balance) = self.balances.get_mut(account) else {
            return Err(StreamError::InsufficientFunds {
                required: amount,
                available: 0,
            });
        };

        if *balance < amount {
            return Err(StreamError::InsufficientFunds {
                required: amount,
                available: *balance,
            });
        }

        *balance -= amount;
        debug!(account = %account, amount, remaining = *balance, "Withdrew from vault");
        Ok(Coin::mint(amount))
    }

    fn deposit(&self, account: &AccountId, coin: Coin) {
        let amount = coin.into_value();
        let mut balance = self.balances.entry(account.clone()).or_insert(0);
        // Minted supply is bounded by u64::MAX, so no balance can overflow.
        *balance = balance.saturating_add(amount);
        debug!(account = %account, amount, balance = *balance, "Deposited to vault");
    }

    fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).map(|b| *b).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdraw_and_deposit() {
        let vault = InMemoryVault::new();
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");
        vault.fund(&alice, 1000).unwrap();

        let coin = vault.withdraw(&alice, 400).unwrap();
        assert_eq!(coin.value(), 400);
        assert_eq!(vault.balance(&alice), 600);

        vault.deposit(&bob, coin);
        assert_eq!(vault.balance(&bob), 400);
        assert_eq!(vault.total_balances(), 600 + 400);
        assert_eq!(vault.minted(), 1000);
    }

    #[test]
    fn test_insufficient_funds_leaves_balance() {
        let vault = InMemoryVault::new();
        let alice = AccountId::new("alice");
        vault.fund(&alice, 100).unwrap();

        let err = vault.withdraw(&alice, 101).unwrap_err();
        assert_eq!(
            err,
            StreamError::InsufficientFunds {
                required: 101,
                available: 100
            }
        );
        assert_eq!(vault.balance(&alice), 100);
    }

    #[test]
    fn test_supply_cap() {
        let vault = InMemoryVault::new();
        vault.fund(&AccountId::new("alice"), u64::MAX).unwrap();
        assert!(vault.fund(&AccountId::new("bob"), 1).is_err());
        assert_eq!(vault.balance(&AccountId::new("bob")), 0);
        assert_eq!(vault.minted(), u64::MAX);
    }

    #[test]
    fn test_coins_in_flight_not_counted() {
        let vault = InMemoryVault::new();
        let alice = AccountId::new("alice");
        vault.fund(&alice, 500).unwrap();

        let coin = vault.withdraw(&alice, 200).unwrap();
        assert_eq!(vault.total_balances(), 300);
        assert_eq!(vault.minted(), 500);

        vault.deposit(&alice, coin);
        assert_eq!(vault.total_balances(), 500);
    }

    #[test]
    fn test_unknown_account_has_zero_balance() {
        let vault = InMemoryVault::new();
        assert_eq!(vault.balance(&AccountId::new("nobody")), 0);
    }

    #[test]
    fn test_failed_withdraw_by_unknown_account_leaves_no_entry() {
        let vault = InMemoryVault::new();
        let nobody = AccountId::new("nobody");

        for _ in 0..3 {
            let err = vault.withdraw(&nobody, 5).unwrap_err();
            assert_eq!(
                err,
                StreamError::InsufficientFunds {
                    required: 5,
                    available: 0
                }
            );
        }
        assert!(vault.balances.is_empty());
    }
}

//! Value types for StreamLedger.

use std::fmt;

use crate::{Result, StreamError};

/// An amount of value in base units.
pub type Amount = u64;

/// Owned, move-only value.
///
/// A `Coin` is never cloned: value moves between owners by splitting off a
/// new coin with [`Coin::extract`] and handing it to a vault deposit, so the
/// sum over all coins and balances only changes when a vault mints. Coins are
/// minted only by vault implementations via [`Coin::mint`].
///
/// Dropping a coin that still holds value is a bug; debug builds panic.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a Coin holds value; deposit it or hand it to an owner"]
pub struct Coin {
    value: Amount,
}

impl Coin {
    /// Mint a coin. Reserved for vault implementations.
    pub fn mint(value: Amount) -> Self {
        Self { value }
    }

    /// The value held by this coin.
    pub fn value(&self) -> Amount {
        self.value
    }

    /// Check if this coin holds nothing.
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Split `amount` off into a new coin.
    pub fn extract(&mut self, amount: Amount) -> Result<Coin> {
        if amount > self.value {
            return Err(StreamError::InsufficientFunds {
                required: amount,
                available: self.value,
            });
        }
        self.value -= amount;
        Ok(Coin { value: amount })
    }

    /// Take everything out of this coin, leaving it empty.
    pub fn extract_all(&mut self) -> Coin {
        Coin {
            value: std::mem::take(&mut self.value),
        }
    }

    /// Consume the coin, returning its value. Reserved for vault implementations.
    pub fn into_value(mut self) -> Amount {
        std::mem::take(&mut self.value)
    }
}

impl Drop for Coin {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(self.value == 0, "coin holding {} dropped", self.value);
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_extract() {
        let mut coin = Coin::mint(1000);
        let part = coin.extract(300).unwrap();

        assert_eq!(part.value(), 300);
        assert_eq!(coin.value(), 700);
        assert_eq!(part.into_value() + coin.into_value(), 1000);
    }

    #[test]
    fn test_coin_extract_too_much() {
        let mut coin = Coin::mint(100);
        let err = coin.extract(101).unwrap_err();

        assert_eq!(
            err,
            StreamError::InsufficientFunds {
                required: 101,
                available: 100
            }
        );
        assert_eq!(coin.value(), 100);
        assert_eq!(coin.into_value(), 100);
    }

    #[test]
    fn test_coin_extract_all() {
        let mut coin = Coin::mint(42);
        let all = coin.extract_all();

        assert_eq!(all.value(), 42);
        assert!(coin.is_zero());
        assert_eq!(all.into_value(), 42);
    }

    #[test]
    fn test_empty_coin_drops_quietly() {
        let mut coin = Coin::mint(7);
        let _ = coin.extract_all().into_value();
        drop(coin);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "coin holding 5 dropped")]
    fn test_dropping_value_panics() {
        let coin = Coin::mint(5);
        drop(coin);
    }
}

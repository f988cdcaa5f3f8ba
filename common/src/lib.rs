//! StreamLedger Common Types
//!
//! This crate contains shared types used across StreamLedger, including
//! account identifiers, the move-only `Coin` value type, the error taxonomy
//! and the clock abstraction.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;

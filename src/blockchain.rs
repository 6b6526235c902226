// Thin re-export module: implementation lives under `blockchain/core/` split
// into chain management, UTXO state transitions and validation.

pub mod core;
pub use self::core::*;

//! utxo-ledger - the trust-and-consistency core of an account-free ledger
//!
//! # Architecture
//!
//! ## Cryptography
//! - [`crypto`] - ed25519 keys, signatures and address derivation
//!
//! ## Digests
//! - [`block`] - Block headers, header hashing and proposer signatures
//! - [`transaction`] - Transactions, unsigned digests and input signatures
//! - [`merkle`] - Merkle trees over transaction digests
//!
//! ## Storage
//! - [`persistence`] - Block, transaction and UTXO store interfaces with in-memory backends
//!
//! ## Chain
//! - [`blockchain`] - Header list, genesis bootstrap, validation and UTXO transitions
//!
//! ## Configuration & Utilities
//! - [`config`] - Genesis configuration
//! - [`error`] - Error types

#![forbid(unsafe_code)]

pub mod block;
pub mod blockchain;
pub mod merkle;
pub mod transaction;

pub mod crypto;

pub mod persistence;

pub mod config;
pub mod error;

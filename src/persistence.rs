//! Storage interfaces for blocks, transactions and unspent outputs.
//!
//! Each store is a narrow key-value contract so that durable backends can be
//! swapped in. The in-memory implementations guard their maps with
//! reader/writer locks; atomicity across keys is the chain's job.

use crate::block::{hash_to_hex, Block};
use crate::blockchain::Utxo;
use crate::error::ChainError;
use crate::transaction::Transaction;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Blocks keyed by the hex-encoded header hash.
pub trait BlockStore: Send + Sync {
    fn put(&self, block: &Block) -> Result<(), ChainError>;
    fn get(&self, hash_hex: &str) -> Result<Block, ChainError>;
}

/// Transactions keyed by the hex-encoded unsigned digest.
pub trait TransactionStore: Send + Sync {
    fn put(&self, tx: &Transaction) -> Result<(), ChainError>;
    fn get(&self, hash_hex: &str) -> Result<Transaction, ChainError>;
}

/// Unspent-output records keyed by `"{tx_hash_hex}_{output_index}"`.
pub trait UtxoStore: Send + Sync {
    fn put(&self, utxo: &Utxo) -> Result<(), ChainError>;
    fn get(&self, key: &str) -> Result<Utxo, ChainError>;
}

#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<String, Block>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockStore for MemoryBlockStore {
    fn put(&self, block: &Block) -> Result<(), ChainError> {
        let hash = hash_to_hex(&block.hash());
        self.blocks.write().insert(hash, block.clone());
        Ok(())
    }

    fn get(&self, hash_hex: &str) -> Result<Block, ChainError> {
        self.blocks
            .read()
            .get(hash_hex)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("block with hash [{}] does not exist", hash_hex)))
    }
}

#[derive(Debug, Default)]
pub struct MemoryTransactionStore {
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionStore for MemoryTransactionStore {
    fn put(&self, tx: &Transaction) -> Result<(), ChainError> {
        self.transactions.write().insert(tx.hash_str(), tx.clone());
        Ok(())
    }

    fn get(&self, hash_hex: &str) -> Result<Transaction, ChainError> {
        self.transactions
            .read()
            .get(hash_hex)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("could not find tx with hash {}", hash_hex)))
    }
}

#[derive(Debug, Default)]
pub struct MemoryUtxoStore {
    utxos: RwLock<HashMap<String, Utxo>>,
}

impl MemoryUtxoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.utxos.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UtxoStore for MemoryUtxoStore {
    fn put(&self, utxo: &Utxo) -> Result<(), ChainError> {
        self.utxos.write().insert(utxo.key(), utxo.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Utxo, ChainError> {
        self.utxos
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("could not find utxo with key {}", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use std::sync::Arc;

    fn sample_utxo(index: u32) -> Utxo {
        Utxo {
            tx_hash: [3u8; 32],
            out_index: index,
            amount: 42,
            address: [9u8; 20],
            spent: false,
        }
    }

    #[test]
    fn test_block_store_roundtrip() {
        let store = MemoryBlockStore::new();
        let mut block = Block::new(1, 0, None, Vec::new());
        block.sign(&KeyPair::generate());

        store.put(&block).unwrap();
        assert_eq!(store.get(&block.hash_str()).unwrap(), block);
        assert_eq!(store.len(), 1);
        assert!(matches!(store.get("deadbeef"), Err(ChainError::NotFound(_))));
    }

    #[test]
    fn test_transaction_store_keys_by_unsigned_hash() {
        let store = MemoryTransactionStore::new();
        let tx = Transaction::coinbase(1, [1u8; 20], 10);
        store.put(&tx).unwrap();
        assert_eq!(store.get(&tx.hash_str()).unwrap(), tx);
        assert!(store.get(&hex::encode([0u8; 32])).is_err());
    }

    #[test]
    fn test_utxo_store_overwrites_same_key() {
        let store = MemoryUtxoStore::new();
        let mut utxo = sample_utxo(0);
        store.put(&utxo).unwrap();
        store.put(&sample_utxo(1)).unwrap();

        utxo.spent = true;
        store.put(&utxo).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get(&utxo.key()).unwrap().spent);
        assert!(!store.get(&sample_utxo(1).key()).unwrap().spent);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let store = Arc::new(MemoryUtxoStore::new());
        let writers: Vec<_> = (0..4u32)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.put(&sample_utxo(t * 100 + i)).unwrap();
                        let _ = store.get(&sample_utxo(i).key());
                    }
                })
            })
            .collect();
        for handle in writers {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 200);
    }
}

use crate::block::Sha256Hash;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::persistence::UtxoStore;
use crate::transaction::Transaction;
use std::collections::HashSet;

/// Store key of the output `index` of the transaction with digest `tx_hash`.
pub fn utxo_key(tx_hash: &Sha256Hash, index: u32) -> String {
    format!("{}_{}", hex::encode(tx_hash), index)
}

/// Unspent-output record. Created once, flagged spent once, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Utxo {
    pub tx_hash: Sha256Hash,
    pub out_index: u32,
    pub amount: u64,
    pub address: Address,
    pub spent: bool,
}

impl Utxo {
    pub fn key(&self) -> String {
        utxo_key(&self.tx_hash, self.out_index)
    }
}

/// The writes a block makes to the UTXO set, resolved before any of them happen.
#[derive(Debug, Default)]
pub struct UtxoChanges {
    pub created: Vec<Utxo>,
    pub spent: Vec<Utxo>,
}

impl UtxoChanges {
    /// Resolves every output to create and every input to flag. Fails without
    /// touching the store if a referenced record is missing or already spent,
    /// or if an output key is already taken, which after validation means the
    /// store is inconsistent.
    pub fn for_transactions(
        store: &dyn UtxoStore,
        transactions: &[Transaction],
    ) -> Result<Self, ChainError> {
        let mut changes = UtxoChanges::default();
        let mut created_keys = HashSet::new();

        for tx in transactions {
            let tx_hash = tx.hash();

            for (index, output) in tx.outputs.iter().enumerate() {
                let key = utxo_key(&tx_hash, index as u32);
                if !created_keys.insert(key.clone()) {
                    return Err(ChainError::StorageInconsistency(format!(
                        "output {} created twice in one batch",
                        key
                    )));
                }
                match store.get(&key) {
                    Ok(_) => {
                        return Err(ChainError::StorageInconsistency(format!(
                            "output {} already exists",
                            key
                        )))
                    }
                    Err(ChainError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
                changes.created.push(Utxo {
                    tx_hash,
                    out_index: index as u32,
                    amount: output.amount,
                    address: output.address,
                    spent: false,
                });
            }

            for input in &tx.inputs {
                let key = input.utxo_key();
                let mut utxo = store.get(&key).map_err(|e| {
                    ChainError::StorageInconsistency(format!("validated input {} vanished: {}", key, e))
                })?;
                if utxo.spent {
                    return Err(ChainError::StorageInconsistency(format!(
                        "validated input {} is already spent",
                        key
                    )));
                }
                utxo.spent = true;
                changes.spent.push(utxo);
            }
        }

        Ok(changes)
    }

    pub fn commit(self, store: &dyn UtxoStore) -> Result<(), ChainError> {
        for utxo in self.created.iter().chain(self.spent.iter()) {
            store.put(utxo)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryUtxoStore;
    use crate::transaction::{TxInput, TxOutput};

    #[test]
    fn test_utxo_key_format() {
        let key = utxo_key(&[0xab; 32], 7);
        assert_eq!(key, format!("{}_7", "ab".repeat(32)));
    }

    #[test]
    fn test_changes_create_and_spend() {
        let store = MemoryUtxoStore::new();
        let coinbase = Transaction::coinbase(1, [1u8; 20], 50);
        UtxoChanges::for_transactions(&store, std::slice::from_ref(&coinbase))
            .unwrap()
            .commit(&store)
            .unwrap();

        let spend = Transaction::new(
            1,
            vec![TxInput::new(coinbase.hash(), 0, [2u8; 32])],
            vec![TxOutput {
                amount: 50,
                address: [2u8; 20],
            }],
        );
        let changes = UtxoChanges::for_transactions(&store, std::slice::from_ref(&spend)).unwrap();
        assert_eq!(changes.created.len(), 1);
        assert_eq!(changes.spent.len(), 1);
        changes.commit(&store).unwrap();

        assert!(store.get(&utxo_key(&coinbase.hash(), 0)).unwrap().spent);
        assert!(!store.get(&utxo_key(&spend.hash(), 0)).unwrap().spent);
    }

    #[test]
    fn test_missing_input_aborts_before_writing() {
        let store = MemoryUtxoStore::new();
        let spend = Transaction::new(
            1,
            vec![TxInput::new([4u8; 32], 0, [2u8; 32])],
            vec![TxOutput {
                amount: 1,
                address: [2u8; 20],
            }],
        );
        let result = UtxoChanges::for_transactions(&store, &[spend]);
        assert!(matches!(result, Err(ChainError::StorageInconsistency(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_existing_output_is_never_overwritten() {
        let store = MemoryUtxoStore::new();
        let coinbase = Transaction::coinbase(1, [1u8; 20], 0);
        UtxoChanges::for_transactions(&store, std::slice::from_ref(&coinbase))
            .unwrap()
            .commit(&store)
            .unwrap();

        let mut spent = store.get(&utxo_key(&coinbase.hash(), 0)).unwrap();
        spent.spent = true;
        store.put(&spent).unwrap();

        let result = UtxoChanges::for_transactions(&store, std::slice::from_ref(&coinbase));
        assert!(matches!(result, Err(ChainError::StorageInconsistency(_))));
        assert!(store.get(&utxo_key(&coinbase.hash(), 0)).unwrap().spent);

        let fresh = MemoryUtxoStore::new();
        let twice = [coinbase.clone(), coinbase];
        let result = UtxoChanges::for_transactions(&fresh, &twice);
        assert!(matches!(result, Err(ChainError::StorageInconsistency(_))));
        assert!(fresh.is_empty());
    }
}

use crate::block::Block;
use crate::crypto::{derive_address, PUBLIC_KEY_LEN};
use crate::error::ChainError;
use crate::persistence::UtxoStore;
use crate::transaction::Transaction;
use std::collections::{HashMap, HashSet};

use super::state::utxo_key;
use tracing::debug;

/// Rejects a block in which two inputs consume the same output.
pub fn validate_no_double_spend(block: &Block) -> Result<(), ChainError> {
    let mut seen_inputs = HashMap::new();
    for tx in &block.transactions {
        let tx_hash = tx.hash_str();
        for (index, input) in tx.inputs.iter().enumerate() {
            let key = input.utxo_key();
            if let Some(first_spender) = seen_inputs.insert(key.clone(), tx_hash.clone()) {
                debug!(utxo = %key, first = %first_spender, second = %tx_hash, "output spent twice in one block");
                return Err(ChainError::DoubleSpend {
                    tx: tx_hash,
                    input: index,
                    key,
                });
            }
        }
    }
    Ok(())
}

/// Rejects a block that carries the same transaction digest twice.
pub fn validate_unique_transactions(block: &Block) -> Result<(), ChainError> {
    let mut seen = HashSet::new();
    for tx in &block.transactions {
        let tx_hash = tx.hash_str();
        if !seen.insert(tx_hash.clone()) {
            return Err(ChainError::DuplicateTransaction { tx: tx_hash });
        }
    }
    Ok(())
}

/// Validates `tx` against the UTXO set without modifying it.
///
/// Each input resolves the output `(prev_tx_hash, prev_out_index)`; the
/// output must exist, be unspent and belong to the input's public key. Inputs
/// must cover outputs; any surplus is an untracked fee. None of the outputs
/// may already be recorded.
pub fn validate_transaction(store: &dyn UtxoStore, tx: &Transaction) -> Result<(), ChainError> {
    tx.validate_stateless()?;

    let digest = tx.hash();
    let tx_hash = hex::encode(digest);

    for index in 0..tx.outputs.len() {
        match store.get(&utxo_key(&digest, index as u32)) {
            Ok(_) => return Err(ChainError::DuplicateTransaction { tx: tx_hash }),
            Err(ChainError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let mut inputs_total: u64 = 0;

    for (index, input) in tx.inputs.iter().enumerate() {
        let key = input.utxo_key();
        let utxo = match store.get(&key) {
            Ok(utxo) => utxo,
            Err(ChainError::NotFound(_)) => {
                return Err(ChainError::UnknownUtxo {
                    tx: tx_hash,
                    input: index,
                    key,
                })
            }
            Err(e) => return Err(e),
        };

        if utxo.spent {
            return Err(ChainError::DoubleSpend {
                tx: tx_hash,
                input: index,
                key,
            });
        }

        // Length was checked by the signature pass.
        let public_key: [u8; PUBLIC_KEY_LEN] = input
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| ChainError::InvalidEncoding(format!("input {} public key", index)))?;
        if derive_address(&public_key) != utxo.address {
            return Err(ChainError::UnauthorizedSpend {
                tx: tx_hash,
                input: index,
                key,
            });
        }

        inputs_total = inputs_total
            .checked_add(utxo.amount)
            .ok_or_else(|| ChainError::AmountOverflow { tx: tx_hash.clone() })?;
    }

    let outputs_total = tx
        .total_output()
        .ok_or_else(|| ChainError::AmountOverflow { tx: tx_hash.clone() })?;

    if inputs_total < outputs_total {
        return Err(ChainError::InsufficientFunds {
            tx: tx_hash,
            inputs: inputs_total,
            outputs: outputs_total,
        });
    }

    debug!(tx = %tx_hash, inputs = inputs_total, outputs = outputs_total, "transaction valid");
    Ok(())
}

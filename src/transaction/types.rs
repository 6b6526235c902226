/// Transaction types for the ledger
use crate::block::Sha256Hash;
use crate::blockchain::utxo_key;
use crate::crypto::{Address, KeyPair, Signature, PUBLIC_KEY_LEN};
use crate::error::ChainError;
use sha2::{Digest, Sha256};

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Reference to a previously created output, plus the spender's authorization.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxInput {
    pub prev_tx_hash: Sha256Hash,
    pub prev_out_index: u32,
    pub public_key: Vec<u8>,
    pub signature: Option<Vec<u8>>,
}

impl TxInput {
    pub fn new(prev_tx_hash: Sha256Hash, prev_out_index: u32, public_key: [u8; PUBLIC_KEY_LEN]) -> Self {
        TxInput {
            prev_tx_hash,
            prev_out_index,
            public_key: public_key.to_vec(),
            signature: None,
        }
    }

    /// Key of the UTXO this input consumes.
    pub fn utxo_key(&self) -> String {
        utxo_key(&self.prev_tx_hash, self.prev_out_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    pub fn new(version: u32, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Transaction {
            version,
            inputs,
            outputs,
        }
    }

    /// A transaction with no inputs crediting `address`. Only genesis mints value this way.
    pub fn coinbase(version: u32, address: Address, amount: u64) -> Self {
        Transaction {
            version,
            inputs: Vec::new(),
            outputs: vec![TxOutput { amount, address }],
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Digest of the transaction with every input signature left out.
    ///
    /// This is both the signing payload and the transaction's identity; it
    /// does not change when signatures are attached.
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update((self.inputs.len() as u64).to_le_bytes());
        for input in &self.inputs {
            hasher.update(input.prev_tx_hash);
            hasher.update(input.prev_out_index.to_le_bytes());
            hasher.update((input.public_key.len() as u64).to_le_bytes());
            hasher.update(&input.public_key);
        }
        hasher.update((self.outputs.len() as u64).to_le_bytes());
        for output in &self.outputs {
            hasher.update(output.amount.to_le_bytes());
            hasher.update(output.address);
        }
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }

    /// Signs the unsigned digest with `keypair` and attaches it to input `index`.
    ///
    /// Public keys are part of the digest, so every input's key must be set
    /// before any input is signed.
    pub fn sign_input(&mut self, index: usize, keypair: &KeyPair) -> Result<Signature, ChainError> {
        let digest = self.hash();
        let tx = hex::encode(digest);
        let input = self
            .inputs
            .get_mut(index)
            .ok_or_else(|| ChainError::NotFound(format!("input {} of tx {}", index, tx)))?;

        let signature = keypair.sign(&digest);
        input.signature = Some(signature.to_vec());
        Ok(signature)
    }

    /// Signs every input with the same key.
    pub fn sign_inputs(&mut self, keypair: &KeyPair) {
        let signature = keypair.sign(&self.hash());
        for input in &mut self.inputs {
            input.signature = Some(signature.to_vec());
        }
    }

    /// Sum of all output amounts, `None` on overflow.
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, output| acc.checked_add(output.amount))
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let size = bincode::serialized_size(self)? as usize;
        if size > MAX_TRANSACTION_SIZE {
            return Err(ChainError::TransactionTooLarge {
                size,
                max: MAX_TRANSACTION_SIZE,
            });
        }
        Ok(())
    }
}

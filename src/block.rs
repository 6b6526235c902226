//! Block structure, header hashing and proposer signatures

use crate::crypto::{verify_signature, KeyPair, Signature, PUBLIC_KEY_LEN, SIGNATURE_LEN};
use crate::error::ChainError;
use crate::merkle::MerkleTree;
use crate::transaction::Transaction;
use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

pub fn hash_to_hex(hash: &Sha256Hash) -> String {
    hex::encode(hash)
}

fn update_optional(hasher: &mut Sha256, field: &Option<Sha256Hash>) {
    match field {
        Some(hash) => {
            hasher.update([1u8]);
            hasher.update(hash);
        }
        None => hasher.update([0u8]),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub height: u64,
    pub timestamp: u64,
    /// `None` only for genesis.
    pub previous_hash: Option<Sha256Hash>,
    /// `None` when the block carries no transactions.
    pub merkle_root: Option<Sha256Hash>,
}

impl BlockHeader {
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        update_optional(&mut hasher, &self.previous_hash);
        update_optional(&mut hasher, &self.merkle_root);
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Block {
    /// Unsigned block stamped with the current time. Call [`Block::sign`] before submitting it.
    pub fn new(
        version: u32,
        height: u64,
        previous_hash: Option<Sha256Hash>,
        transactions: Vec<Transaction>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let merkle_root = MerkleTree::from_transactions(&transactions).map(|tree| tree.root());

        Block {
            header: BlockHeader {
                version,
                height,
                timestamp,
                previous_hash,
                merkle_root,
            },
            transactions,
            public_key: Vec::new(),
            signature: Vec::new(),
        }
    }

    /// Chain-link value and signing payload.
    pub fn hash(&self) -> Sha256Hash {
        self.header.hash()
    }

    pub fn hash_str(&self) -> String {
        hash_to_hex(&self.hash())
    }

    pub fn merkle_tree(&self) -> Option<MerkleTree> {
        MerkleTree::from_transactions(&self.transactions)
    }

    /// Writes the Merkle root into the header, then signs the header hash.
    pub fn sign(&mut self, keypair: &KeyPair) -> Signature {
        self.header.merkle_root = self.merkle_tree().map(|tree| tree.root());

        let signature = keypair.sign(&self.hash());
        self.public_key = keypair.public_key_bytes().to_vec();
        self.signature = signature.to_vec();
        signature
    }

    /// Rebuilds the tree from the transactions and compares it with the header root.
    /// Fails closed when there is nothing to build a tree from.
    pub fn verify_merkle_root(&self) -> bool {
        match self.merkle_tree() {
            Some(tree) => tree.verify() && self.header.merkle_root == Some(tree.root()),
            None => false,
        }
    }

    /// Self-contained well-formedness: Merkle root, key/signature lengths and the
    /// proposer signature over the header hash. Does not look at the chain.
    pub fn verify(&self) -> Result<(), ChainError> {
        let root_valid = if self.transactions.is_empty() {
            self.header.merkle_root.is_none()
        } else {
            self.verify_merkle_root()
        };
        if !root_valid {
            return Err(ChainError::InvalidMerkleRoot);
        }
        if self.public_key.len() != PUBLIC_KEY_LEN {
            return Err(ChainError::InvalidBlockSignature(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                self.public_key.len()
            )));
        }
        if self.signature.len() != SIGNATURE_LEN {
            return Err(ChainError::InvalidBlockSignature(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_LEN,
                self.signature.len()
            )));
        }

        let valid = verify_signature(&self.public_key, &self.hash(), &self.signature)
            .map_err(|e| ChainError::InvalidBlockSignature(e.to_string()))?;
        if !valid {
            return Err(ChainError::InvalidBlockSignature(format!(
                "signature does not match header {}",
                self.hash_str()
            )));
        }
        Ok(())
    }
}

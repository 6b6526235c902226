//! Binary Merkle tree over transaction digests.
//!
//! Behavior:
//! - An empty list of leaves has no tree; blocks without transactions carry no root.
//! - A node is `SHA-256(left || right)`.
//! - A node without a right sibling is paired with itself, at every level,
//!   so a single leaf still goes through one round of hashing.

use crate::block::Sha256Hash;
use crate::transaction::Transaction;
use sha2::{Digest, Sha256};

fn hash_pair(left: &Sha256Hash, right: &Sha256Hash) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn next_level(nodes: &[Sha256Hash]) -> Vec<Sha256Hash> {
    nodes
        .chunks(2)
        .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// `levels[0]` holds the leaves, the last level holds only the root.
    levels: Vec<Vec<Sha256Hash>>,
}

impl MerkleTree {
    /// Builds the tree over the given leaves. Returns `None` for an empty list.
    pub fn new(leaves: Vec<Sha256Hash>) -> Option<Self> {
        if leaves.is_empty() {
            return None;
        }

        let mut levels = vec![leaves];
        loop {
            let next = next_level(&levels[levels.len() - 1]);
            let done = next.len() == 1;
            levels.push(next);
            if done {
                break;
            }
        }

        Some(MerkleTree { levels })
    }

    /// Builds the tree whose leaves are the unsigned digests of `transactions`.
    pub fn from_transactions(transactions: &[Transaction]) -> Option<Self> {
        Self::new(transactions.iter().map(Transaction::hash).collect())
    }

    pub fn root(&self) -> Sha256Hash {
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaves(&self) -> &[Sha256Hash] {
        &self.levels[0]
    }

    /// Recomputes every level from the one below and checks that it matches.
    pub fn verify(&self) -> bool {
        if self.levels.len() < 2 || self.levels[0].is_empty() {
            return false;
        }
        if self.levels[self.levels.len() - 1].len() != 1 {
            return false;
        }
        self.levels
            .windows(2)
            .all(|pair| next_level(&pair[0]) == pair[1])
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaves().len() {
            return None;
        }

        let mut steps = Vec::with_capacity(self.levels.len() - 1);
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let step = if position % 2 == 0 {
                let sibling = level.get(position + 1).unwrap_or(&level[position]);
                ProofStep::Right(*sibling)
            } else {
                ProofStep::Left(level[position - 1])
            };
            steps.push(step);
            position /= 2;
        }

        Some(MerkleProof { index, steps })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofStep {
    Left(Sha256Hash),
    Right(Sha256Hash),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub index: usize,
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    pub fn verify(&self, leaf: &Sha256Hash, root: &Sha256Hash) -> bool {
        if self.steps.is_empty() {
            return false;
        }
        let computed = self.steps.iter().fold(*leaf, |acc, step| match step {
            ProofStep::Left(sibling) => hash_pair(sibling, &acc),
            ProofStep::Right(sibling) => hash_pair(&acc, sibling),
        });
        &computed == root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> Sha256Hash {
        Sha256::digest([n]).into()
    }

    #[test]
    fn empty_leaves_have_no_tree() {
        assert!(MerkleTree::new(Vec::new()).is_none());
        assert!(MerkleTree::from_transactions(&[]).is_none());
    }

    #[test]
    fn single_leaf_is_paired_with_itself() {
        let tree = MerkleTree::new(vec![leaf(1)]).unwrap();
        assert_eq!(tree.root(), hash_pair(&leaf(1), &leaf(1)));
        assert!(tree.verify());
    }

    #[test]
    fn odd_level_duplicates_last_node() {
        let tree = MerkleTree::new(vec![leaf(1), leaf(2), leaf(3)]).unwrap();
        let left = hash_pair(&leaf(1), &leaf(2));
        let right = hash_pair(&leaf(3), &leaf(3));
        assert_eq!(tree.root(), hash_pair(&left, &right));
    }

    #[test]
    fn root_depends_on_order() {
        let a = MerkleTree::new(vec![leaf(1), leaf(2)]).unwrap();
        let b = MerkleTree::new(vec![leaf(2), leaf(1)]).unwrap();
        assert_ne!(a.root(), b.root());
        assert_eq!(a, MerkleTree::new(vec![leaf(1), leaf(2)]).unwrap());
    }

    #[test]
    fn verify_detects_corrupted_level() {
        let mut tree = MerkleTree::new(vec![leaf(1), leaf(2), leaf(3), leaf(4)]).unwrap();
        assert!(tree.verify());
        tree.levels[1][0][0] ^= 0xff;
        assert!(!tree.verify());
    }

    #[test]
    fn proofs_verify_for_every_leaf() {
        let leaves: Vec<_> = (0..7).map(leaf).collect();
        let tree = MerkleTree::new(leaves.clone()).unwrap();
        for (i, l) in leaves.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(proof.verify(l, &tree.root()));
            assert!(!proof.verify(&leaf(100), &tree.root()));
        }
        assert!(tree.proof(7).is_none());
    }

    #[test]
    fn empty_proof_fails_closed() {
        let proof = MerkleProof {
            index: 0,
            steps: Vec::new(),
        };
        assert!(!proof.verify(&leaf(1), &leaf(1)));
    }
}

use crate::block::{hash_to_hex, Block, BlockHeader, Sha256Hash};
use crate::config::ChainConfig;
use crate::error::ChainError;
use crate::persistence::{
    BlockStore, MemoryBlockStore, MemoryTransactionStore, MemoryUtxoStore, TransactionStore,
    UtxoStore,
};
use crate::transaction::Transaction;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use super::state::{utxo_key, Utxo, UtxoChanges};
use super::validation::{
    validate_no_double_spend, validate_transaction, validate_unique_transactions,
};

/// Append-only list of headers; the index of a header is its height.
#[derive(Debug, Clone, Default)]
pub struct HeaderList {
    headers: Vec<BlockHeader>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, height: u64) -> Option<&BlockHeader> {
        self.headers.get(usize::try_from(height).ok()?)
    }

    pub fn add(&mut self, header: BlockHeader) {
        self.headers.push(header);
    }

    /// `len - 1`, or `None` before genesis.
    pub fn height(&self) -> Option<u64> {
        (self.headers.len() as u64).checked_sub(1)
    }

    pub fn last(&self) -> Option<&BlockHeader> {
        self.headers.last()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// The ledger: headers plus the block, transaction and UTXO stores.
///
/// All appends go through [`Chain::add_block`], which holds the header write
/// lock across validation and application. Readers take the read lock and so
/// never see a block half applied.
pub struct Chain {
    headers: RwLock<HeaderList>,
    block_store: Arc<dyn BlockStore>,
    tx_store: Arc<dyn TransactionStore>,
    utxo_store: Arc<dyn UtxoStore>,
}

impl Chain {
    /// Create a new `Chain` backed by in-memory stores.
    pub fn in_memory(config: &ChainConfig) -> Result<Self, ChainError> {
        Self::new(
            config,
            Arc::new(MemoryBlockStore::new()),
            Arc::new(MemoryTransactionStore::new()),
            Arc::new(MemoryUtxoStore::new()),
        )
    }

    /// Create a new `Chain` over the given stores and apply the genesis block.
    pub fn new(
        config: &ChainConfig,
        block_store: Arc<dyn BlockStore>,
        tx_store: Arc<dyn TransactionStore>,
        utxo_store: Arc<dyn UtxoStore>,
    ) -> Result<Self, ChainError> {
        let genesis_block = Self::create_genesis_block(config)?;
        // Genesis is trusted: no parent to link to, only its own signature and root.
        genesis_block.verify()?;

        let chain = Chain {
            headers: RwLock::new(HeaderList::new()),
            block_store,
            tx_store,
            utxo_store,
        };

        {
            let mut headers = chain.headers.write();
            chain.apply_block(&mut headers, genesis_block)?;
        }

        info!("Genesis block applied: {}", hex::encode(chain.head_hash()?));
        Ok(chain)
    }

    /// Genesis: a single coinbase crediting the genesis key's address, signed by that key.
    pub fn create_genesis_block(config: &ChainConfig) -> Result<Block, ChainError> {
        let genesis = &config.genesis;
        let keypair = genesis.keypair()?;
        let coinbase_tx = Transaction::coinbase(genesis.version, keypair.address(), genesis.amount);

        let mut block = Block {
            header: BlockHeader {
                version: genesis.version,
                height: 0,
                timestamp: genesis.timestamp,
                previous_hash: None,
                merkle_root: None,
            },
            transactions: vec![coinbase_tx],
            public_key: Vec::new(),
            signature: Vec::new(),
        };
        block.sign(&keypair);
        Ok(block)
    }

    pub fn height(&self) -> u64 {
        self.headers.read().height().unwrap_or_default()
    }

    /// Hash of the current head header.
    pub fn head_hash(&self) -> Result<Sha256Hash, ChainError> {
        self.headers
            .read()
            .last()
            .map(BlockHeader::hash)
            .ok_or_else(|| ChainError::StorageInconsistency("chain has no headers".to_string()))
    }

    /// Validates `block` and, only if it is valid, applies it as the new head.
    pub fn add_block(&self, block: Block) -> Result<(), ChainError> {
        let mut headers = self.headers.write();

        if let Err(e) = self.validate_block_with(&headers, &block) {
            warn!("Rejected block {}: {}", block.hash_str(), e);
            return Err(e);
        }

        let hash = block.hash_str();
        self.apply_block(&mut headers, block)?;
        info!("Accepted block {} at height {}", hash, headers.height().unwrap_or_default());
        Ok(())
    }

    /// Read-only check of `block` against the current head and UTXO set.
    pub fn validate_block(&self, block: &Block) -> Result<(), ChainError> {
        let headers = self.headers.read();
        self.validate_block_with(&headers, block)
    }

    /// Read-only check of a single transaction against the current UTXO set.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<(), ChainError> {
        let _headers = self.headers.read();
        validate_transaction(self.utxo_store.as_ref(), tx)
    }

    fn validate_block_with(&self, headers: &HeaderList, block: &Block) -> Result<(), ChainError> {
        let height = headers
            .height()
            .ok_or_else(|| ChainError::StorageInconsistency("chain has no headers".to_string()))?;
        let current_block = self.block_at(headers, height).map_err(|e| {
            ChainError::StorageInconsistency(format!("head block at height {} unavailable: {}", height, e))
        })?;

        block.verify()?;

        let expected = current_block.hash();
        if block.header.previous_hash != Some(expected) {
            return Err(ChainError::InvalidPrevHash {
                expected: hash_to_hex(&expected),
                got: block
                    .header
                    .previous_hash
                    .as_ref()
                    .map_or_else(|| "<none>".to_string(), hash_to_hex),
            });
        }

        if block.header.height != height + 1 {
            return Err(ChainError::InvalidHeight {
                expected: height + 1,
                got: block.header.height,
            });
        }

        validate_unique_transactions(block)?;
        validate_no_double_spend(block)?;
        for tx in &block.transactions {
            let tx_hash = tx.hash_str();
            match self.tx_store.get(&tx_hash) {
                Ok(_) => return Err(ChainError::DuplicateTransaction { tx: tx_hash }),
                Err(ChainError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            validate_transaction(self.utxo_store.as_ref(), tx)?;
        }

        Ok(())
    }

    /// The only path that mutates ledger state. Callers must hold the header write lock.
    ///
    /// Nothing is written until every UTXO change has been resolved. A store
    /// write that fails after that point is not rolled back: records already
    /// written stay behind, the header is not appended and the height does not
    /// move. Backends that can fail must provide their own atomicity.
    fn apply_block(&self, headers: &mut HeaderList, block: Block) -> Result<(), ChainError> {
        let changes = UtxoChanges::for_transactions(self.utxo_store.as_ref(), &block.transactions)?;

        let written = self.write_block(&block, changes);
        if let Err(e) = written {
            warn!(
                "Store write failed while applying block {}; stores may hold partial state: {}",
                block.hash_str(),
                e
            );
            return Err(e);
        }

        headers.add(block.header);
        Ok(())
    }

    fn write_block(&self, block: &Block, changes: UtxoChanges) -> Result<(), ChainError> {
        for tx in &block.transactions {
            self.tx_store.put(tx)?;
        }
        changes.commit(self.utxo_store.as_ref())?;
        self.block_store.put(block)
    }

    pub fn get_block_by_hash(&self, hash: &Sha256Hash) -> Result<Block, ChainError> {
        let _headers = self.headers.read();
        self.block_store.get(&hash_to_hex(hash))
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Block, ChainError> {
        let headers = self.headers.read();
        self.block_at(&headers, height)
    }

    fn block_at(&self, headers: &HeaderList, height: u64) -> Result<Block, ChainError> {
        let header = headers.get(height).ok_or_else(|| ChainError::HeightOutOfRange {
            requested: height,
            height: headers.height().unwrap_or_default(),
        })?;
        self.block_store.get(&hash_to_hex(&header.hash()))
    }

    pub fn get_transaction(&self, hash: &Sha256Hash) -> Result<Transaction, ChainError> {
        let _headers = self.headers.read();
        self.tx_store.get(&hex::encode(hash))
    }

    pub fn get_utxo(&self, tx_hash: &Sha256Hash, index: u32) -> Result<Utxo, ChainError> {
        let _headers = self.headers.read();
        self.utxo_store.get(&utxo_key(tx_hash, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn random_block(chain: &Chain) -> Block {
        let keypair = KeyPair::generate();
        let mut block = Block::new(1, chain.height() + 1, Some(chain.head_hash().unwrap()), Vec::new());
        block.sign(&keypair);
        block
    }

    #[test]
    fn test_new_chain() {
        let chain = Chain::in_memory(&ChainConfig::default()).unwrap();
        assert_eq!(chain.height(), 0);
        assert!(chain.get_block_by_height(0).is_ok());
        assert!(matches!(
            chain.get_block_by_height(1),
            Err(ChainError::HeightOutOfRange { requested: 1, height: 0 })
        ));
    }

    #[test]
    fn test_genesis_is_deterministic() {
        let config = ChainConfig::default();
        let a = Chain::in_memory(&config).unwrap();
        let b = Chain::in_memory(&config).unwrap();
        assert_eq!(a.head_hash().unwrap(), b.head_hash().unwrap());
        assert_eq!(
            Chain::create_genesis_block(&config).unwrap(),
            a.get_block_by_height(0).unwrap()
        );
    }

    #[test]
    fn test_chain_height() {
        let chain = Chain::in_memory(&ChainConfig::default()).unwrap();
        for i in 0..100 {
            let block = random_block(&chain);
            chain.add_block(block).unwrap();
            assert_eq!(chain.height(), i + 1);
        }
    }

    #[test]
    fn test_add_block() {
        let chain = Chain::in_memory(&ChainConfig::default()).unwrap();
        for i in 0..100 {
            let block = random_block(&chain);
            let block_hash = block.hash();

            chain.add_block(block.clone()).unwrap();

            assert_eq!(chain.get_block_by_hash(&block_hash).unwrap(), block);
            assert_eq!(chain.get_block_by_height(i + 1).unwrap(), block);
        }
    }

    #[test]
    fn test_wrong_prev_hash_rejected() {
        let chain = Chain::in_memory(&ChainConfig::default()).unwrap();
        let mut block = Block::new(1, 1, Some([7u8; 32]), Vec::new());
        block.sign(&KeyPair::generate());
        assert!(matches!(chain.add_block(block), Err(ChainError::InvalidPrevHash { .. })));

        let mut orphan = Block::new(1, 1, None, Vec::new());
        orphan.sign(&KeyPair::generate());
        assert!(matches!(chain.add_block(orphan), Err(ChainError::InvalidPrevHash { .. })));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn test_wrong_height_rejected() {
        let chain = Chain::in_memory(&ChainConfig::default()).unwrap();
        let mut block = Block::new(1, 5, Some(chain.head_hash().unwrap()), Vec::new());
        block.sign(&KeyPair::generate());
        assert_eq!(
            chain.add_block(block),
            Err(ChainError::InvalidHeight { expected: 1, got: 5 })
        );
    }

    #[test]
    fn test_unsigned_block_rejected() {
        let chain = Chain::in_memory(&ChainConfig::default()).unwrap();
        let block = Block::new(1, 1, Some(chain.head_hash().unwrap()), Vec::new());
        assert!(matches!(chain.add_block(block), Err(ChainError::InvalidBlockSignature(_))));
    }

    struct FailingUtxoStore {
        inner: MemoryUtxoStore,
        fail: AtomicBool,
    }

    impl UtxoStore for FailingUtxoStore {
        fn put(&self, utxo: &Utxo) -> Result<(), ChainError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ChainError::StorageInconsistency("disk full".to_string()));
            }
            self.inner.put(utxo)
        }

        fn get(&self, key: &str) -> Result<Utxo, ChainError> {
            self.inner.get(key)
        }
    }

    #[test]
    fn test_failed_store_write_keeps_height() {
        let config = ChainConfig::default();
        let utxo_store = Arc::new(FailingUtxoStore {
            inner: MemoryUtxoStore::new(),
            fail: AtomicBool::new(false),
        });
        let chain = Chain::new(
            &config,
            Arc::new(MemoryBlockStore::new()),
            Arc::new(MemoryTransactionStore::new()),
            utxo_store.clone(),
        )
        .unwrap();

        let alice = config.genesis.keypair().unwrap();
        let genesis_tx = chain.get_block_by_height(0).unwrap().transactions[0].clone();
        let mut tx = Transaction::new(
            1,
            vec![crate::transaction::TxInput::new(genesis_tx.hash(), 0, alice.public_key_bytes())],
            vec![crate::transaction::TxOutput {
                amount: 1000,
                address: alice.address(),
            }],
        );
        tx.sign_inputs(&alice);
        let mut block = Block::new(1, 1, Some(chain.head_hash().unwrap()), vec![tx]);
        block.sign(&alice);
        let block_hash = block.hash();

        utxo_store.fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            chain.add_block(block),
            Err(ChainError::StorageInconsistency(_))
        ));
        assert_eq!(chain.height(), 0);
        assert!(chain.get_block_by_hash(&block_hash).is_err());
        assert!(!chain.get_utxo(&genesis_tx.hash(), 0).unwrap().spent);
    }

    #[test]
    fn test_header_list_height() {
        let mut list = HeaderList::new();
        assert_eq!(list.height(), None);
        assert!(list.is_empty());
        list.add(Block::new(1, 0, None, Vec::new()).header);
        assert_eq!(list.height(), Some(0));
        assert_eq!(list.len(), 1);
        assert!(list.get(1).is_none());
    }
}

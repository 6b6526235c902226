/// Stateless validation for transactions, separated from type definitions
use crate::crypto::verify_signature;
use crate::error::ChainError;
use crate::transaction::types::Transaction;

impl Transaction {
    /// Checks that every input is signed over the unsigned digest by its embedded key.
    pub fn verify_signatures(&self) -> Result<(), ChainError> {
        let digest = self.hash();

        for (index, input) in self.inputs.iter().enumerate() {
            let signature = match input.signature.as_deref() {
                Some(sig) if !sig.is_empty() => sig,
                _ => {
                    return Err(ChainError::MissingSignature {
                        tx: hex::encode(digest),
                        input: index,
                    })
                }
            };

            if !verify_signature(&input.public_key, &digest, signature)? {
                return Err(ChainError::InvalidTransactionSignature {
                    tx: hex::encode(digest),
                    input: index,
                });
            }
        }

        Ok(())
    }

    /// Everything that can be checked without the UTXO set.
    pub fn validate_stateless(&self) -> Result<(), ChainError> {
        self.validate_size()?;
        self.verify_signatures()
    }
}

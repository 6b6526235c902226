//! Cryptographic primitives: ed25519 keys, signatures and address derivation

use crate::error::ChainError;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;

pub const PRIVATE_KEY_LEN: usize = 64;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;
pub const SEED_LEN: usize = 32;
pub const ADDRESS_LEN: usize = 20;

/// Type alias for an address: the trailing 20 bytes of a public key.
pub type Address = [u8; ADDRESS_LEN];

/// Raw ed25519 signature bytes.
pub type Signature = [u8; SIGNATURE_LEN];

/// Projects a public key onto its address. Not invertible.
pub fn derive_address(public_key: &[u8; PUBLIC_KEY_LEN]) -> Address {
    let mut address = [0u8; ADDRESS_LEN];
    address.copy_from_slice(&public_key[PUBLIC_KEY_LEN - ADDRESS_LEN..]);
    address
}

/// Convert an address to a hex string for display.
pub fn address_to_hex(addr: &Address) -> String {
    hex::encode(addr)
}

/// Convert a hex string to an address.
pub fn address_from_hex(hex_str: &str) -> Result<Address, ChainError> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| ChainError::InvalidEncoding(format!("Invalid hex address: {}", e)))?;
    bytes.as_slice().try_into().map_err(|_| {
        ChainError::InvalidEncoding(format!(
            "Address must be {} bytes, got {}",
            ADDRESS_LEN,
            bytes.len()
        ))
    })
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generates a new KeyPair from a random seed drawn from the OS.
    ///
    /// Panics if the OS entropy source fails; there is no safe fallback.
    pub fn generate() -> Self {
        let mut seed = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut seed);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Deterministically derives a KeyPair from a 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, ChainError> {
        let seed: [u8; SEED_LEN] = seed.try_into().map_err(|_| ChainError::InvalidSeedLength {
            expected: SEED_LEN,
            got: seed.len(),
        })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Derives a KeyPair from a hex-encoded seed.
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self, ChainError> {
        let seed = hex::decode(seed_hex)
            .map_err(|e| ChainError::InvalidEncoding(format!("Invalid hex seed: {}", e)))?;
        Self::from_seed(&seed)
    }

    /// Seed followed by the derived public key.
    pub fn private_key_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.signing_key.to_keypair_bytes()
    }

    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn address(&self) -> Address {
        derive_address(&self.public_key_bytes())
    }

    /// Signs the raw message bytes. ed25519 signing is deterministic.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message).to_bytes()
    }
}

/// Verifies a signature given the raw public key bytes, message, and signature bytes.
///
/// Returns `Ok(false)` for a well-formed signature that does not match. Only
/// byte lengths other than 32 (key) and 64 (signature) are reported as errors.
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<bool, ChainError> {
    let public_key: [u8; PUBLIC_KEY_LEN] = public_key_bytes.try_into().map_err(|_| {
        ChainError::InvalidEncoding(format!(
            "Public key must be exactly {} bytes, got {}",
            PUBLIC_KEY_LEN,
            public_key_bytes.len()
        ))
    })?;
    let signature: Signature = signature_bytes.try_into().map_err(|_| {
        ChainError::InvalidEncoding(format!(
            "Signature must be exactly {} bytes, got {}",
            SIGNATURE_LEN,
            signature_bytes.len()
        ))
    })?;

    // 32 bytes that do not decode to a curve point cannot have signed anything.
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key) else {
        return Ok(false);
    };
    let signature = ed25519_dalek::Signature::from_bytes(&signature);

    Ok(verifying_key.verify_strict(message, &signature).is_ok())
}

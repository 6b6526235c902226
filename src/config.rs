//! Configuration for chain construction

use crate::crypto::KeyPair;
use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Well-known seed from which every default chain derives the same genesis identity.
pub const DEFAULT_GENESIS_SEED: &str =
    "3d5b34a57112d5a91ae0d4ce57c4b99cdae3a7b12842cbb0a0e0289468df10d7";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ChainConfig {
    #[serde(default)]
    pub genesis: GenesisConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GenesisConfig {
    /// Hex-encoded 32-byte seed of the genesis proposer, who also receives the coinbase.
    #[serde(default = "default_seed_hex")]
    pub seed_hex: String,
    #[serde(default = "default_amount")]
    pub amount: u64,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Milliseconds since the Unix epoch.
    #[serde(default = "default_timestamp")]
    pub timestamp: u64,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            seed_hex: default_seed_hex(),
            amount: default_amount(),
            version: default_version(),
            timestamp: default_timestamp(),
        }
    }
}

impl GenesisConfig {
    pub fn keypair(&self) -> Result<KeyPair, ChainError> {
        KeyPair::from_seed_hex(&self.seed_hex)
    }
}

fn default_seed_hex() -> String {
    DEFAULT_GENESIS_SEED.to_string()
}

fn default_amount() -> u64 {
    1000
}

fn default_version() -> u32 {
    1
}

fn default_timestamp() -> u64 {
    1672531200000
}

/// Loads a TOML config. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<ChainConfig, ChainError> {
    let path = path.as_ref();
    let config: ChainConfig = match fs::read_to_string(path) {
        Ok(config_str) => toml::from_str(&config_str)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ChainConfig::default(),
        Err(e) => {
            return Err(ChainError::Config(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    // Validate critical values
    config.genesis.keypair().map_err(|e| {
        ChainError::Config(format!("genesis.seed_hex is not a usable seed: {}", e))
    })?;

    Ok(config)
}

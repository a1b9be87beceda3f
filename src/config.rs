//! Configuration management for TokenChain

use crate::blockchain::{ChainParams, SummaryBlock, FORK_CUT, TRUST};
use crate::crypto::Identity;
use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub node: NodeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_zero_criteria")]
    pub zero_criteria: u8,
    #[serde(default = "default_trust_depth")]
    pub trust_depth: u64,
    #[serde(default = "default_fork_cut")]
    pub fork_cut: u64,
    /// Hex-encoded public key of the only identity allowed to issue new tokens.
    #[serde(default)]
    pub trusted_issuer: String,
    /// Hex-encoded hash the initial bedrock is anchored to.
    #[serde(default = "default_genesis_hash")]
    pub genesis_hash: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            zero_criteria: default_zero_criteria(),
            trust_depth: default_trust_depth(),
            fork_cut: default_fork_cut(),
            trusted_issuer: String::new(),
            genesis_hash: default_genesis_hash(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
        }
    }
}

fn default_zero_criteria() -> u8 {
    30
}

fn default_trust_depth() -> u64 {
    TRUST
}

fn default_fork_cut() -> u64 {
    FORK_CUT
}

fn default_genesis_hash() -> String {
    hex::encode([0u8; 32])
}

fn default_database_path() -> String {
    "./data/tokenchain.db".to_string()
}

fn default_command_buffer() -> usize {
    256
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ChainError> {
        if self.database.path.is_empty() {
            return Err(ChainError::Configuration("database.path must be set".to_string()));
        }
        if self.chain.fork_cut < self.chain.trust_depth {
            return Err(ChainError::Configuration(format!(
                "chain.fork_cut ({}) must not be below chain.trust_depth ({})",
                self.chain.fork_cut, self.chain.trust_depth
            )));
        }
        if self.node.command_buffer == 0 {
            return Err(ChainError::Configuration("node.command_buffer must be positive".to_string()));
        }
        hex::decode(&self.chain.trusted_issuer)?;
        hex::decode(&self.chain.genesis_hash)?;
        Ok(())
    }

    pub fn chain_params(&self) -> Result<ChainParams, ChainError> {
        Ok(ChainParams {
            zero_criteria: self.chain.zero_criteria,
            trust: self.chain.trust_depth,
            fork_cut: self.chain.fork_cut,
            trusted_issuer: Identity::from_hex(&self.chain.trusted_issuer)?,
        })
    }

    /// The bedrock a fresh ledger starts from.
    pub fn genesis(&self) -> Result<SummaryBlock, ChainError> {
        Ok(SummaryBlock::genesis(hex::decode(&self.chain.genesis_hash)?))
    }
}

/// Loads `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    match fs::read_to_string(path.as_ref()) {
        Ok(contents) => Config::from_toml(&contents),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_BASE_CHUNK_SIZE, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_POOL_SIZE, DEFAULT_THRESHOLD_MS,
    TransferError,
};

/// How the file fingerprint is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// First and last 2 MiB in full plus 6 probe bytes per interior stride.
    #[default]
    Sample,
    /// Every byte of the file.
    All,
}

impl fmt::Display for HashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashMode::Sample => f.write_str("sample"),
            HashMode::All => f.write_str("all"),
        }
    }
}

impl FromStr for HashMode {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sample" => Ok(HashMode::Sample),
            "all" => Ok(HashMode::All),
            other => Err(TransferError::InvalidConfig(format!(
                "unknown hash mode: {other} (expected \"sample\" or \"all\")"
            ))),
        }
    }
}

/// Slow-start window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WindowConfig {
    /// Base unit `B`: the initial chunk size and the floor.
    pub base_chunk_size: u64,
    /// Round-trips slower than this count as congestion.
    pub threshold_ms: u64,
    /// Ceiling for quadratic growth.
    pub max_chunk_size: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            base_chunk_size: DEFAULT_BASE_CHUNK_SIZE,
            threshold_ms: DEFAULT_THRESHOLD_MS,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

impl WindowConfig {
    /// A window that never moves: every chunk is `size` bytes.
    pub fn fixed(size: u64) -> Self {
        Self {
            base_chunk_size: size,
            threshold_ms: DEFAULT_THRESHOLD_MS,
            max_chunk_size: size,
        }
    }
}

/// Transfer engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferConfig {
    pub hash_mode: HashMode,
    pub window: WindowConfig,
    /// Capacity of the request pool built from this config.
    pub pool_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            hash_mode: HashMode::default(),
            window: WindowConfig::default(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl TransferConfig {
    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.window.base_chunk_size == 0 {
            return Err(TransferError::InvalidConfig(
                "baseChunkSize must be greater than zero".into(),
            ));
        }
        if self.window.max_chunk_size < self.window.base_chunk_size {
            return Err(TransferError::InvalidConfig(format!(
                "maxChunkSize ({}) is smaller than baseChunkSize ({})",
                self.window.max_chunk_size, self.window.base_chunk_size
            )));
        }
        if self.window.threshold_ms == 0 {
            return Err(TransferError::InvalidConfig(
                "thresholdMs must be greater than zero".into(),
            ));
        }
        if self.pool_size == 0 {
            return Err(TransferError::InvalidConfig(
                "poolSize must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

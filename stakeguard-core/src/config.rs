//! Network parameters for kernel validation
//!
//! A `ConsensusParams` value is built once at start-up (from a preset, or a
//! preset layered with a TOML file and `STAKEGUARD_*` environment overrides)
//! and then only ever borrowed.

use crate::consensus::modifier::selection_interval;
use config::{Config, Environment, File, FileFormat, Source};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while building or validating network parameters
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Network types with their own activation schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Regtest,
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Testnet => "testnet",
            NetworkType::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

/// Wall-clock activation time of each timestamp-gated rule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationTimes {
    pub v03: u32,
    pub v04: u32,
    pub v05: u32,
    /// Earliest predecessor time for V06; the super-majority must also hold
    pub v06: u32,
    pub v07: u32,
    pub btc16: u32,
    pub v09: u32,
}

impl ActivationTimes {
    fn ordered(&self) -> [(&'static str, u32); 7] {
        [
            ("v03", self.v03),
            ("v04", self.v04),
            ("v05", self.v05),
            ("v06", self.v06),
            ("v07", self.v07),
            ("btc16", self.btc16),
            ("v09", self.v09),
        ]
    }
}

/// Version super-majority needed before V06 rules apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperMajorityRule {
    pub min_version: i32,
    pub required: u32,
    pub window: u32,
}

/// Hardcoded stake modifier checksum at a given height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierCheckpoint {
    pub height: u32,
    pub checksum: u32,
}

/// Consensus parameters consumed by every kernel operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub network: NetworkType,

    /// Seconds between stake modifier regenerations
    pub modifier_interval: u32,

    /// Minimum age of a staked output, in seconds
    pub stake_min_age: u32,

    /// Age after which coin-age weight stops growing, in seconds
    pub stake_max_age: u32,

    /// Confirmations a staked output needs before it may be spent
    pub stake_min_confirmations: u32,

    /// Allowed gap between coinstake time and block time, in seconds
    pub coinstake_max_drift: u32,

    pub activation: ActivationTimes,

    pub v06_majority: SuperMajorityRule,

    /// Sorted by height. Only checksums this engine has produced on the
    /// network belong here; a foreign value stops the chain at its height.
    pub checkpoints: Vec<ModifierCheckpoint>,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self::for_network(NetworkType::Mainnet)
    }
}

impl ConsensusParams {
    /// Parameter preset for a specific network
    pub fn for_network(network: NetworkType) -> Self {
        match network {
            NetworkType::Mainnet => Self {
                network,
                modifier_interval: 6 * 60 * 60,
                stake_min_age: 60 * 60 * 24 * 30,
                stake_max_age: 60 * 60 * 24 * 90,
                stake_min_confirmations: 500,
                coinstake_max_drift: 2 * 60 * 60,
                activation: ActivationTimes {
                    v03: 1_363_800_000,
                    v04: 1_399_300_000,
                    v05: 1_461_700_000,
                    v06: 1_513_050_000,
                    v07: 1_552_392_000,
                    btc16: 1_569_931_200,
                    v09: 1_591_617_600,
                },
                v06_majority: SuperMajorityRule {
                    min_version: 2,
                    required: 900,
                    window: 1000,
                },
                checkpoints: Vec::new(),
            },
            NetworkType::Testnet => Self {
                network,
                modifier_interval: 20 * 60,
                stake_min_age: 60 * 60 * 24,
                stake_max_age: 60 * 60 * 24 * 90,
                stake_min_confirmations: 60,
                coinstake_max_drift: 2 * 60 * 60,
                activation: ActivationTimes {
                    v03: 1_359_781_000,
                    v04: 1_395_700_000,
                    v05: 1_447_700_000,
                    v06: 1_508_198_400,
                    v07: 1_541_505_600,
                    btc16: 1_554_811_200,
                    v09: 1_581_940_800,
                },
                v06_majority: SuperMajorityRule {
                    min_version: 2,
                    required: 90,
                    window: 100,
                },
                checkpoints: Vec::new(),
            },
            NetworkType::Regtest => Self {
                network,
                modifier_interval: 60,
                stake_min_age: 60 * 60,
                stake_max_age: 60 * 60 * 24 * 90,
                stake_min_confirmations: 10,
                coinstake_max_drift: 2 * 60 * 60,
                activation: ActivationTimes {
                    v03: 0,
                    v04: 0,
                    v05: 0,
                    v06: 0,
                    v07: 0,
                    btc16: 0,
                    v09: 0,
                },
                v06_majority: SuperMajorityRule {
                    min_version: 2,
                    required: 9,
                    window: 10,
                },
                checkpoints: Vec::new(),
            },
        }
    }

    /// Load parameters from a TOML file.
    ///
    /// The file's `network` key picks the preset that the remaining keys
    /// override; `STAKEGUARD_*` environment variables override both.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading consensus parameters from: {:?}", path);
        Self::build(File::from(path).required(true))
    }

    /// Same layering as [`ConsensusParams::load`] for an in-memory document
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        Self::build(File::from_str(document, FileFormat::Toml))
    }

    fn build<S>(source: S) -> Result<Self, ConfigError>
    where
        S: Source + Clone + Send + Sync + 'static,
    {
        #[derive(Deserialize)]
        struct NetworkSelector {
            #[serde(default)]
            network: Option<NetworkType>,
        }

        let selector: NetworkSelector = Config::builder()
            .add_source(source.clone())
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;
        let network = selector.network.unwrap_or(NetworkType::Mainnet);

        let params: ConsensusParams = Config::builder()
            .add_source(Config::try_from(&Self::for_network(network))?)
            .add_source(source)
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;

        params.validate()?;
        debug!(network = %params.network, "Consensus parameters loaded");
        Ok(params)
    }

    fn environment() -> Environment {
        Environment::with_prefix("STAKEGUARD")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Render the parameters as a TOML document suitable for `load`
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modifier_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "modifier_interval must be positive".to_string(),
            ));
        }
        if self.stake_min_age > self.stake_max_age {
            return Err(ConfigError::InvalidValue(format!(
                "stake_min_age {} exceeds stake_max_age {}",
                self.stake_min_age, self.stake_max_age
            )));
        }

        // The kernel modifier is looked up one selection interval inside
        // the minimum age, which needs room to exist.
        let selection = selection_interval(self.modifier_interval);
        if i64::from(self.stake_min_age) <= selection {
            return Err(ConfigError::InvalidValue(format!(
                "stake_min_age {} does not exceed the modifier selection interval {}",
                self.stake_min_age, selection
            )));
        }

        // Rules may only switch on in order, so a later rule can never be
        // active while an earlier one is not.
        let ordered = self.activation.ordered();
        for pair in ordered.windows(2) {
            if pair[1].1 < pair[0].1 {
                return Err(ConfigError::InvalidValue(format!(
                    "activation.{} ({}) precedes activation.{} ({})",
                    pair[1].0, pair[1].1, pair[0].0, pair[0].1
                )));
            }
        }

        let majority = &self.v06_majority;
        if majority.window == 0 || majority.required > majority.window {
            return Err(ConfigError::InvalidValue(format!(
                "v06_majority requires {} of {} blocks",
                majority.required, majority.window
            )));
        }

        for pair in self.checkpoints.windows(2) {
            if pair[1].height <= pair[0].height {
                return Err(ConfigError::InvalidValue(format!(
                    "checkpoint heights not strictly increasing at {}",
                    pair[1].height
                )));
            }
        }

        Ok(())
    }

    /// Hardcoded modifier checksum for `height`, if it is checkpointed
    pub fn checkpoint_checksum(&self, height: u32) -> Option<u32> {
        self.checkpoints
            .binary_search_by_key(&height, |cp| cp.height)
            .ok()
            .map(|idx| self.checkpoints[idx].checksum)
    }
}

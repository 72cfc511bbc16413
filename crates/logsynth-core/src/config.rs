use crate::error::ConfigError;
use crate::event::is_valid_operation;
use crate::rank::RankDistribution;
use crate::session::SessionModel;
use serde::{Deserialize, Serialize};

/// Largest universe whose keys fit a 32-bit id or address.
pub const MAX_32BIT_UNIVERSE: u64 = 1 << 32;

/// Everything a [`LogGenerator`](crate::generator::LogGenerator) needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_users")]
    pub users: KeySpace,
    #[serde(default)]
    pub addresses: AddressSpace,
    #[serde(default)]
    pub operations: Operations,
    #[serde(default)]
    pub time: SessionModel,
    /// Seed for reproducible output. Unset means seeded from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// A universe of integer keys with rank-biased popularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySpace {
    pub size: u64,
    #[serde(default = "default_skew")]
    pub skew: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSpace {
    #[serde(default = "default_address_count")]
    pub size: u64,
    #[serde(default = "default_skew")]
    pub skew: f64,
    /// Probability that a session comes from the user's home address rather
    /// than a freshly drawn one.
    #[serde(default = "default_home_probability")]
    pub home_probability: f64,
}

/// The operation vocabulary and its popularity.
///
/// With `weights` set, token `i` is drawn with probability proportional to
/// `weights[i]`; otherwise tokens are ranked in listed order with `skew`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operations {
    #[serde(default = "default_tokens")]
    pub tokens: Vec<String>,
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    #[serde(default = "default_skew")]
    pub skew: f64,
    /// Operation emitted first in every session.
    #[serde(default = "default_opening")]
    pub opening: Option<String>,
}

impl GeneratorConfig {
    /// Check every parameter. Generators refuse to build from a config that
    /// fails here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_universe("user", self.users.size)?;
        RankDistribution::new(self.users.skew)?;

        check_universe("address", self.addresses.size)?;
        RankDistribution::new(self.addresses.skew)?;
        let p = self.addresses.home_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidProbability {
                name: "home_probability",
                value: p,
            });
        }

        self.operations.validate()?;
        self.time.validate()
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            users: default_users(),
            addresses: AddressSpace::default(),
            operations: Operations::default(),
            time: SessionModel::default(),
            seed: None,
        }
    }
}

impl Operations {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.is_empty() {
            return Err(ConfigError::EmptyVocabulary);
        }
        if let Some(bad) = self
            .tokens
            .iter()
            .chain(self.opening.iter())
            .find(|t| !is_valid_operation(t))
        {
            return Err(ConfigError::InvalidOperation(bad.clone()));
        }
        match &self.weights {
            Some(weights) if weights.len() != self.tokens.len() => {
                Err(ConfigError::InvalidWeights(format!(
                    "{} weights given for {} tokens",
                    weights.len(),
                    self.tokens.len()
                )))
            }
            Some(_) => Ok(()),
            None => RankDistribution::new(self.skew).map(|_| ()),
        }
    }
}

impl Default for Operations {
    fn default() -> Self {
        Self {
            tokens: default_tokens(),
            weights: None,
            skew: default_skew(),
            opening: default_opening(),
        }
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self {
            size: default_address_count(),
            skew: default_skew(),
            home_probability: default_home_probability(),
        }
    }
}

fn check_universe(name: &'static str, size: u64) -> Result<(), ConfigError> {
    if size == 0 {
        return Err(ConfigError::EmptyUniverse(name));
    }
    if size > MAX_32BIT_UNIVERSE {
        return Err(ConfigError::UniverseTooLarge {
            name,
            size,
            max: MAX_32BIT_UNIVERSE,
        });
    }
    Ok(())
}

fn default_users() -> KeySpace {
    KeySpace {
        size: 100_000,
        skew: default_skew(),
    }
}
fn default_address_count() -> u64 {
    50_000
}
fn default_skew() -> f64 {
    0.5
}
fn default_home_probability() -> f64 {
    0.9
}
fn default_opening() -> Option<String> {
    Some("login".to_string())
}
fn default_tokens() -> Vec<String> {
    [
        "static/image-0",
        "static/image-1",
        "static/image-2",
        "static/image-3",
        "static/image-4",
        "home",
        "search",
        "profile",
        "settings",
        "logout",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

//! Construction-time configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tranche_types::{Amount, Identity, SourceHash};

use crate::error::GateError;
use crate::period::Thresholds;

/// Gate configuration. Fixed at creation; guardian and source hash are
/// later mutable through guarded operations, the rest never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Reference to the stable token the pool is denominated in
    #[serde(default = "default_stable_token")]
    pub stable_token: String,

    /// Reference to the external attestor registry
    #[serde(default = "default_attestor_registry")]
    pub attestor_registry: String,

    /// Initial guardian identity
    #[serde(default = "default_guardian")]
    pub guardian: Identity,

    /// Ledger account holding pooled funds
    #[serde(default = "default_pool_account")]
    pub pool_account: Identity,

    /// Initial integrity anchor
    #[serde(default)]
    pub source_hash: SourceHash,

    /// Corridor hours required per period
    #[serde(default = "default_hours_target")]
    pub hours_target: u64,

    /// Kilograms required per period
    #[serde(default = "default_kg_target")]
    pub kg_target: u64,

    /// Fixed payout per period (minor units)
    #[serde(default = "default_tranche")]
    pub tranche: u64,

    /// Delay between governance request and finalize, in seconds
    #[serde(default = "default_timelock_secs")]
    pub timelock_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            stable_token: default_stable_token(),
            attestor_registry: default_attestor_registry(),
            guardian: default_guardian(),
            pool_account: default_pool_account(),
            source_hash: SourceHash::default(),
            hours_target: default_hours_target(),
            kg_target: default_kg_target(),
            tranche: default_tranche(),
            timelock_secs: default_timelock_secs(),
        }
    }
}

// Default value helpers
fn default_stable_token() -> String {
    "stable:usd".to_string()
}

fn default_attestor_registry() -> String {
    "registry:attestors".to_string()
}

fn default_guardian() -> Identity {
    Identity::derive("guardian")
}

fn default_pool_account() -> Identity {
    Identity::derive("tranche-pool")
}

fn default_hours_target() -> u64 {
    60
}

fn default_kg_target() -> u64 {
    1_500_000
}

fn default_tranche() -> u64 {
    1_000_000_000
}

fn default_timelock_secs() -> u64 {
    259_200
}

impl GateConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `TRANCHE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, GateError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&GateConfig::default()).map_err(config_err)?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TRANCHE").try_parsing(true),
        );

        let loaded: GateConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_err)?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), GateError> {
        if self.guardian.is_null() {
            return Err(GateError::Config("guardian must not be the null identity".into()));
        }
        if self.pool_account.is_null() {
            return Err(GateError::Config("pool_account must not be the null identity".into()));
        }
        if self.hours_target == 0 || self.kg_target == 0 {
            return Err(GateError::Config("targets must be non-zero".into()));
        }
        if self.tranche == 0 {
            return Err(GateError::Config("tranche must be non-zero".into()));
        }
        if self.timelock_secs == 0 {
            return Err(GateError::Config("timelock_secs must be non-zero".into()));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            hours_target: self.hours_target,
            kg_target: self.kg_target,
        }
    }

    pub fn tranche_amount(&self) -> Amount {
        Amount::from(self.tranche)
    }

    pub fn timelock(&self) -> Duration {
        Duration::from_secs(self.timelock_secs)
    }
}

fn config_err(err: config::ConfigError) -> GateError {
    GateError::Config(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = GateConfig::default();
        assert_eq!(config.hours_target, 60);
        assert_eq!(config.kg_target, 1_500_000);
        assert_eq!(config.tranche_amount(), 1_000_000_000);
        assert_eq!(config.timelock(), Duration::from_secs(259_200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let mut config = GateConfig {
            guardian: Identity::NULL,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.guardian = Identity::derive("g");
        config.tranche = 0;
        assert!(config.validate().is_err());

        config.tranche = 1;
        config.timelock_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config: GateConfig = serde_json::from_str(r#"{ "hours_target": 10 }"#).unwrap();
        assert_eq!(config.hours_target, 10);
        assert_eq!(config.kg_target, 1_500_000);
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "guardian = \"@ops-guardian\"\nhours_target = 12\ntimelock_secs = 600"
        )
        .unwrap();

        let config = GateConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.guardian, Identity::derive("ops-guardian"));
        assert_eq!(config.hours_target, 12);
        assert_eq!(config.timelock_secs, 600);
        assert_eq!(config.kg_target, 1_500_000);
    }

    #[test]
    fn load_rejects_invalid_file_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "tranche = 0").unwrap();
        assert!(matches!(
            GateConfig::load(Some(file.path())),
            Err(GateError::Config(_))
        ));
    }
}

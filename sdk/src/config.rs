use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    client::{ConfirmationPolicy, FundingPolicy},
    core::{ConfirmationStatus, SdkError, SdkResult, DEFAULT_RPC_URL},
    prelude::*,
};

/// Client configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// RPC endpoint URL
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Escrow program ID
    #[serde(with = "pubkey_serde")]
    pub program_id: Pubkey,

    /// Keypair file of the party opening trades
    pub initializer_keypair_path: String,

    /// Initializer's token account for the offered asset
    #[serde(with = "pubkey_serde")]
    pub initializer_x_token_account: Pubkey,

    /// Initializer's token account for the counter-asset
    #[serde(with = "pubkey_serde")]
    pub initializer_y_token_account: Pubkey,

    /// Keypair file of the party taking trades
    pub taker_keypair_path: String,

    /// Taker's token account receiving the offered asset
    #[serde(with = "pubkey_serde")]
    pub taker_x_token_account: Pubkey,

    /// Taker's token account paying the counter-asset
    #[serde(with = "pubkey_serde")]
    pub taker_y_token_account: Pubkey,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    #[serde(default)]
    pub funding: FundingPolicy,
}

/// Confirmation wait settings
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    pub commitment: ConfirmationStatus,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            commitment: ConfirmationStatus::Confirmed,
            timeout_secs: 60,
            poll_interval_ms: 500,
        }
    }
}

impl ConfirmationConfig {
    pub fn policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            commitment: self.commitment,
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    fn validate(&self) -> SdkResult<()> {
        if self.timeout_secs == 0 {
            return Err(SdkError::ConfigError(
                "confirmation.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(SdkError::ConfigError(
                "confirmation.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval_ms > self.timeout_secs.saturating_mul(1000) {
            return Err(SdkError::ConfigError(format!(
                "confirmation.poll_interval_ms ({}) exceeds the timeout ({}s)",
                self.poll_interval_ms, self.timeout_secs
            )));
        }
        Ok(())
    }
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SdkError::ConfigError(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration
    pub fn from_toml_str(content: &str) -> SdkResult<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| SdkError::ConfigError(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> SdkResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| SdkError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content).map_err(|e| {
            SdkError::ConfigError(format!("failed to write config file {}: {}", path.display(), e))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> SdkResult<()> {
        if self.rpc_url.is_empty() {
            return Err(SdkError::ConfigError("rpc_url must not be empty".to_string()));
        }
        if self.initializer_keypair_path.is_empty() {
            return Err(SdkError::ConfigError(
                "initializer_keypair_path must not be empty".to_string(),
            ));
        }
        if self.taker_keypair_path.is_empty() {
            return Err(SdkError::ConfigError(
                "taker_keypair_path must not be empty".to_string(),
            ));
        }

        let token_accounts = [
            self.initializer_x_token_account,
            self.initializer_y_token_account,
            self.taker_x_token_account,
            self.taker_y_token_account,
        ];
        for (i, a) in token_accounts.iter().enumerate() {
            if token_accounts[i + 1..].contains(a) {
                return Err(SdkError::ConfigError(format!(
                    "token account {} is configured more than once",
                    a
                )));
            }
        }

        self.confirmation.validate()
    }
}

// Custom serde module for Pubkey
mod pubkey_serde {
    use super::*;
    use serde::{Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(pubkey: &Pubkey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&pubkey.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Pubkey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> String {
        format!(
            r#"
program_id = "{}"
initializer_keypair_path = "~/.config/solana/alice.json"
initializer_x_token_account = "{}"
initializer_y_token_account = "{}"
taker_keypair_path = "~/.config/solana/bob.json"
taker_x_token_account = "{}"
taker_y_token_account = "{}"
"#,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
        )
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_toml_str(&sample_toml()).unwrap();
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.confirmation.commitment, ConfirmationStatus::Confirmed);
        assert_eq!(config.confirmation.policy().timeout, Duration::from_secs(60));
        assert_eq!(config.funding, FundingPolicy::default());
        assert!(!config.funding.airdrop);
    }

    #[test]
    fn test_sections_override_defaults() {
        let content = format!(
            "{}\n[confirmation]\ncommitment = \"finalized\"\ntimeout_secs = 5\n\n[funding]\nairdrop = true\n",
            sample_toml()
        );
        let config = AppConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.confirmation.commitment, ConfirmationStatus::Finalized);
        assert_eq!(config.confirmation.timeout_secs, 5);
        assert_eq!(config.confirmation.poll_interval_ms, 500);
        assert!(config.funding.airdrop);
        assert_eq!(config.funding.signature_headroom, 100);
    }

    #[test]
    fn test_invalid_pubkey_rejected() {
        let content = sample_toml().replacen("program_id = \"", "program_id = \"not-a-key", 1);
        assert!(matches!(
            AppConfig::from_toml_str(&content),
            Err(SdkError::ConfigError(_))
        ));
    }

    #[test]
    fn test_duplicate_token_accounts_rejected() {
        let mut config = AppConfig::from_toml_str(&sample_toml()).unwrap();
        config.taker_x_token_account = config.initializer_x_token_account;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let content = format!("{}\n[confirmation]\ntimeout_secs = 0\n", sample_toml());
        assert!(AppConfig::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_poll_interval_longer_than_timeout_rejected() {
        let content = format!(
            "{}\n[confirmation]\ntimeout_secs = 1\npoll_interval_ms = 1500\n",
            sample_toml()
        );
        assert!(AppConfig::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_load_and_save_roundtrip_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();

        let out = tempfile::NamedTempFile::new().unwrap();
        config.save(out.path()).unwrap();
        let reloaded = AppConfig::load(out.path()).unwrap();
        assert_eq!(reloaded.program_id, config.program_id);
        assert_eq!(reloaded.taker_y_token_account, config.taker_y_token_account);
    }

    #[test]
    fn test_example_config_uses_no_well_known_addresses() {
        let config = AppConfig::from_toml_str(include_str!("../escrow.example.toml")).unwrap();
        let well_known = [
            solana_sdk::system_program::id(),
            spl_token::id(),
            sysvar::rent::id(),
        ];
        for address in [
            config.program_id,
            config.initializer_x_token_account,
            config.initializer_y_token_account,
            config.taker_x_token_account,
            config.taker_y_token_account,
        ] {
            assert!(!well_known.contains(&address), "{} is a real program id", address);
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AppConfig::load("/nonexistent/escrow.toml"),
            Err(SdkError::ConfigError(_))
        ));
    }
}

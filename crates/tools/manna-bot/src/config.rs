use anyhow::{Context, Result};
use manna_ledger::PurchasePricing;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration for the manna bot
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    /// Directory of the Sled database holding player records.
    pub storage_path: PathBuf,

    /// Manna the GM receives for each completed mission.
    pub gm_manna: u64,

    /// Prefix that marks a message as a bot command.
    pub command_prefix: String,

    /// Price checked when buying upgrades.
    pub pricing: PurchasePricing,

    /// Optional log level string (e.g., "info", "debug", "manna_ledger=trace").
    pub log_level: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("data/players"),
            gm_manna: 100,
            command_prefix: ">".to_string(),
            pricing: PurchasePricing::default(),
            log_level: None,
        }
    }
}

impl BotConfig {
    /// Load the configuration file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {:?}", path))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse configuration file: {:?}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: BotConfig = toml::from_str(contents)?;
        anyhow::ensure!(
            !config.command_prefix.trim().is_empty(),
            "command_prefix must not be empty"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(BotConfig::from_toml("").unwrap(), BotConfig::default());
    }

    #[test]
    fn parses_every_field() {
        let config = BotConfig::from_toml(
            r#"
            storage_path = "/var/lib/manna"
            gm_manna = 150
            command_prefix = "!"
            pricing = "flat_licence"
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/var/lib/manna"));
        assert_eq!(config.gm_manna, 150);
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.pricing, PurchasePricing::FlatLicence);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn rejects_unknown_fields_and_empty_prefix() {
        assert!(BotConfig::from_toml("token = \"abc\"").is_err());
        assert!(BotConfig::from_toml("command_prefix = \" \"").is_err());
    }

    #[test]
    fn load_reads_file_or_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert_eq!(BotConfig::load(&missing).unwrap(), BotConfig::default());

        let path = dir.path().join("bot.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "gm_manna = 75").unwrap();
        assert_eq!(BotConfig::load(&path).unwrap().gm_manna, 75);
    }
}

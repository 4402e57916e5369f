//! Application config: cauldron plus ledger, from YAML or JSON

use std::path::Path;

use dagda_cauldron::{CauldronConfig, QuickGameConfig};
use dagda_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};

use crate::{Result, TableError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cauldron: CauldronConfig,
    pub quick: QuickGameConfig,
    pub ledger: LedgerConfig,
}

impl AppConfig {
    /// Load by extension: `.yaml`/`.yml` as YAML, anything else as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let config = if is_yaml {
            Self::from_yaml(&raw)?
        } else {
            Self::from_json(&raw)?
        };

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yml::from_str(yaml).map_err(|e| TableError::ConfigFile(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(json).map_err(|e| TableError::ConfigFile(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self).map_err(|e| TableError::ConfigFile(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.cauldron.validate()?;
        self.quick.validate()?;
        Ok(())
    }
}

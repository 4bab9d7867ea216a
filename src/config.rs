// Configuration store: base URL and API key of the Colander server, kept as
// JSON in `~/.config/pirogue/colander-config.json`.

use crate::api::ApiClient;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "colander-config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct StoredConfiguration {
    base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub base_url: String,
    pub api_key: String,
    is_valid: bool,
}

/// `~/.config/pirogue/colander-config.json`, falling back to the current
/// directory when there is no home.
pub fn default_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(".config").join("pirogue").join(CONFIG_FILE_NAME)
}

impl Configuration {
    pub fn load() -> Result<Self> {
        Self::load_from(&default_path())
    }

    /// A missing file yields an unconfigured (invalid) store; a file lacking
    /// either key is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Configuration::default());
        }
        let data = std::fs::read_to_string(path)?;
        let stored: StoredConfiguration = serde_json::from_str(&data)?;
        match (stored.base_url, stored.api_key) {
            (Some(base_url), Some(api_key)) => Ok(Configuration {
                base_url,
                api_key,
                is_valid: true,
            }),
            _ => Err(Error::InvalidConfiguration(format!(
                "the configuration stored in {} is invalid",
                path.display()
            ))),
        }
    }

    pub fn save(&mut self, base_url: &str, api_key: &str) -> Result<()> {
        self.save_to(&default_path(), base_url, api_key)
    }

    pub fn save_to(&mut self, path: &Path, base_url: &str, api_key: &str) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let stored = StoredConfiguration {
            base_url: Some(base_url.to_string()),
            api_key: Some(api_key.to_string()),
        };
        std::fs::write(path, serde_json::to_string_pretty(&stored)?)?;
        self.base_url = base_url.to_string();
        self.api_key = api_key.to_string();
        self.is_valid = true;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Build the HTTP client, refusing to do so without credentials.
    pub fn client(&self) -> Result<ApiClient> {
        if !self.is_valid {
            return Err(Error::InvalidConfiguration(
                "run `pirogue-colander config` to set the server URL and API key".into(),
            ));
        }
        ApiClient::new(&self.base_url, &self.api_key)
    }
}

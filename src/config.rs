use crate::error::{CompressioError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER_URL: &str = "https://compressio-production.up.railway.app";
pub const DEFAULT_API_KEY: &str = "demo-key-123";
const DEFAULT_DOWNLOAD_DIR: &str = "~/Downloads/compressio";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CompressioConfig {
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(rename = "serverUrl", skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(rename = "downloadDir", skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
    /// Compressions allowed without a signed-in user; unlimited when unset
    #[serde(rename = "anonymousLimit", skip_serializing_if = "Option::is_none")]
    pub anonymous_limit: Option<u32>,
    #[serde(rename = "connectTimeoutSecs", skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

impl CompressioConfig {
    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or(DEFAULT_API_KEY)
    }

    pub fn server_url(&self) -> &str {
        self.server_url
            .as_deref()
            .unwrap_or(DEFAULT_SERVER_URL)
            .trim_end_matches('/')
    }

    pub fn download_dir(&self) -> PathBuf {
        let raw = self.download_dir.as_deref().unwrap_or(DEFAULT_DOWNLOAD_DIR);
        expand_path(raw)
    }

    /// Apply command line / environment overrides on top of the file values
    pub fn with_overrides(
        mut self,
        api_key: Option<String>,
        server_url: Option<String>,
        download_dir: Option<String>,
    ) -> Self {
        if api_key.is_some() {
            self.api_key = api_key;
        }
        if server_url.is_some() {
            self.server_url = server_url;
        }
        if download_dir.is_some() {
            self.download_dir = download_dir;
        }
        self
    }

    /// Set a single key by its config file name
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "apiKey" => self.api_key = Some(value.to_string()),
            "serverUrl" => {
                url::Url::parse(value).map_err(|e| {
                    CompressioError::Config(format!("Invalid server URL '{}': {}", value, e))
                })?;
                self.server_url = Some(value.to_string());
            }
            "downloadDir" => self.download_dir = Some(value.to_string()),
            "anonymousLimit" => {
                let limit = value.parse::<u32>().map_err(|_| {
                    CompressioError::Config(format!("anonymousLimit must be a number, got '{}'", value))
                })?;
                self.anonymous_limit = Some(limit);
            }
            "connectTimeoutSecs" => {
                let secs = value.parse::<u64>().map_err(|_| {
                    CompressioError::Config(format!(
                        "connectTimeoutSecs must be a number, got '{}'",
                        value
                    ))
                })?;
                self.connect_timeout_secs = Some(secs);
            }
            other => {
                return Err(CompressioError::Config(format!("Unknown config key: {}", other)));
            }
        }
        Ok(())
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

pub fn get_config_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("COMPRESSIO_HOME") {
        return Ok(expand_path(&home));
    }
    if let Some(home_dir) = dirs::home_dir() {
        Ok(home_dir.join(".compressio"))
    } else {
        Err(CompressioError::Config("Could not find home directory".to_string()))
    }
}

pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn get_logs_dir() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("logs"))
}

/// Path of the local key-value store holding history, language and user
pub fn get_store_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("local_storage.json"))
}

/// Create a directory readable only by the owner
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;

        // Set permissions to 700 (read/write/execute for owner only) on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(dir)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(dir, permissions)?;
        }
    }
    Ok(())
}

pub fn ensure_config_dir() -> Result<()> {
    ensure_private_dir(&get_config_dir()?)
}

pub fn ensure_logs_dir() -> Result<()> {
    ensure_private_dir(&get_logs_dir()?)
}

pub fn load_config() -> Result<CompressioConfig> {
    ensure_config_dir()?;
    load_config_from(&get_config_file_path()?)
}

pub fn load_config_from(config_file: &Path) -> Result<CompressioConfig> {
    if config_file.exists() {
        let content = fs::read_to_string(config_file)?;
        let config: CompressioConfig = serde_json::from_str(&content)?;
        Ok(config)
    } else {
        Ok(CompressioConfig::default())
    }
}

pub fn save_config(config: &CompressioConfig) -> Result<()> {
    ensure_config_dir()?;
    save_config_to(config, &get_config_file_path()?)
}

pub fn save_config_to(config: &CompressioConfig, config_file: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;

    fs::write(config_file, content)?;

    // Set permissions to 600 (read/write for owner only) on Unix systems
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(config_file)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(config_file, permissions)?;
    }

    Ok(())
}

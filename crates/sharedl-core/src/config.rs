use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::job::DownloadMethod;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

const DEFAULT_SHARE_API_BASE: &str = "https://terabox-dl.qtcloud.workers.dev/";

/// Global configuration loaded from `~/.config/sharedl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedlConfig {
    /// Number of jobs executed in parallel (worker pool size).
    pub max_concurrent_downloads: usize,
    /// Split each file into `chunk_count` concurrent Range requests.
    pub chunked_download: bool,
    /// Segments per file when `chunked_download` is on.
    pub chunk_count: usize,
    /// User-Agent sent to resolvers and file hosts.
    pub user_agent: String,
    /// Staging directory for files before delivery. None = XDG data dir `downloads/`.
    #[serde(default)]
    pub downloads_path: Option<PathBuf>,
    /// Root of the filesystem front end (status messages, delivered files). None = XDG data dir `outbox/`.
    #[serde(default)]
    pub outbox_path: Option<PathBuf>,
    /// Download method assigned to chats seen for the first time.
    #[serde(default)]
    pub default_download_method: DownloadMethod,
    /// Base URL of the share-info / download-link API used by `share_api`.
    #[serde(default = "default_share_api_base")]
    pub share_api_base: String,
    /// Accept any http(s) link on submission, not only share-host links.
    #[serde(default)]
    pub accept_any_host: bool,
}

fn default_share_api_base() -> String {
    DEFAULT_SHARE_API_BASE.to_string()
}

impl Default for SharedlConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 1,
            chunked_download: false,
            chunk_count: 1,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            downloads_path: None,
            outbox_path: None,
            default_download_method: DownloadMethod::default(),
            share_api_base: default_share_api_base(),
            accept_any_host: false,
        }
    }
}

impl SharedlConfig {
    /// Reject values the scheduler and transfer engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            anyhow::bail!("max_concurrent_downloads must be at least 1");
        }
        if self.chunk_count == 0 {
            anyhow::bail!("chunk_count must be at least 1");
        }
        if self.user_agent.trim().is_empty() {
            anyhow::bail!("user_agent must not be empty");
        }
        Ok(())
    }

    /// Effective staging directory.
    pub fn downloads_dir(&self) -> Result<PathBuf> {
        match &self.downloads_path {
            Some(p) => Ok(p.clone()),
            None => Ok(data_home()?.join("downloads")),
        }
    }

    /// Effective outbox directory for the filesystem front end.
    pub fn outbox_dir(&self) -> Result<PathBuf> {
        match &self.outbox_path {
            Some(p) => Ok(p.clone()),
            None => Ok(data_home()?.join("outbox")),
        }
    }
}

fn data_home() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sharedl")?;
    Ok(xdg_dirs.get_data_home())
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sharedl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SharedlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SharedlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SharedlConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}

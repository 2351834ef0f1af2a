//! Persistent configuration model and defaults.

use std::path::{Path, PathBuf};

use log::{info, warn};

const DEFAULT_PROXY_HOST: &str = "127.0.0.1";
const DEFAULT_OUTPUT_DIRECTORY: &str = "output";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36";

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Network and proxy preferences.
    pub network: NetworkConfig,
    #[serde(default)]
    /// Report and preview output preferences.
    pub output: OutputConfig,
}

/// Network access preferences shared by every request.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub enable_proxy: bool,
    #[serde(default = "default_proxy_host")]
    pub proxy_host: String,
    #[serde(default)]
    pub proxy_port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Clear proxy environment variables for the duration of a run.
    #[serde(default)]
    pub bypass_env_proxy: bool,
}

/// Where results are written.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: String,
    /// Image copied in place of a missing preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_image: Option<String>,
    #[serde(default = "default_true")]
    pub print_details: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enable_proxy: false,
            proxy_host: default_proxy_host(),
            proxy_port: 0,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            bypass_env_proxy: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            placeholder_image: None,
            print_details: true,
        }
    }
}

impl NetworkConfig {
    /// Proxy routing handed to the fetcher, `None` when proxying is off.
    pub fn proxy_url(&self) -> Option<String> {
        if !self.enable_proxy {
            return None;
        }
        if self.proxy_port == 0 {
            warn!("network.proxy_port must be a positive port number, proxy disabled");
            return None;
        }
        Some(format!("http://{}:{}", self.proxy_host, self.proxy_port))
    }
}

fn default_true() -> bool {
    true
}

fn default_proxy_host() -> String {
    DEFAULT_PROXY_HOST.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_output_directory() -> String {
    DEFAULT_OUTPUT_DIRECTORY.to_string()
}

/// Clamps values that would make requests or output paths unusable.
pub fn sanitize_config(config: Config) -> Config {
    let mut sanitized = config;
    sanitized.network.timeout_secs = sanitized.network.timeout_secs.max(1);
    let host = sanitized.network.proxy_host.trim();
    sanitized.network.proxy_host = if host.is_empty() {
        default_proxy_host()
    } else {
        host.to_string()
    };
    if sanitized.network.user_agent.trim().is_empty() {
        sanitized.network.user_agent = default_user_agent();
    }
    if sanitized.output.directory.trim().is_empty() {
        sanitized.output.directory = default_output_directory();
    }
    sanitized.output.placeholder_image = sanitized
        .output
        .placeholder_image
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty());
    sanitized
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|path| path.join("vincenzo").join("config.toml"))
}

/// Loads `config_file`, writing defaults first when it does not exist.
pub fn load_or_create(config_file: &Path) -> Result<Config, String> {
    if !config_file.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        if let Some(parent) = config_file.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    err
                )
            })?;
        }
        let default_text = toml::to_string(&Config::default())
            .map_err(|err| format!("Failed to serialize default config: {err}"))?;
        std::fs::write(config_file, default_text).map_err(|err| {
            format!(
                "Failed to write default config {}: {}",
                config_file.display(),
                err
            )
        })?;
    }

    let config_content = std::fs::read_to_string(config_file)
        .map_err(|err| format!("Failed to read config {}: {}", config_file.display(), err))?;
    let config = match toml::from_str::<Config>(&config_content) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Config file is invalid, using defaults. path={} error={}",
                config_file.display(),
                err
            );
            Config::default()
        }
    };
    Ok(sanitize_config(config))
}

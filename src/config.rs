use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Port for the plaintext listener
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Port for the TLS listener (only bound when a keypair is present)
    #[serde(default = "default_https_port")]
    pub https_port: u16,

    /// Dump full inbound and upstream requests to the log
    #[serde(default)]
    pub verbose: bool,

    /// GitLab projects API root; the project id is appended directly
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    #[serde(default = "default_cert_path")]
    pub cert_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

fn default_http_port() -> u16 {
    80
}

fn default_https_port() -> u16 {
    443
}

fn default_api_url() -> String {
    "https://gitlab.com/api/v4/projects/".to_string()
}

fn default_cert_path() -> String {
    "tls/tls.crt".to_string()
}

fn default_key_path() -> String {
    "tls/tls.key".to_string()
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: default_cert_path(),
            key_path: default_key_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            https_port: default_https_port(),
            verbose: false,
            api_url: default_api_url(),
            tls: TlsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            anyhow::bail!("HTTP port cannot be zero");
        }

        if self.https_port == 0 {
            anyhow::bail!("HTTPS port cannot be zero");
        }

        reqwest::Url::parse(&self.api_url)
            .with_context(|| format!("Invalid api_url: {}", self.api_url))?;

        if self.tls.cert_path.is_empty() || self.tls.key_path.is_empty() {
            anyhow::bail!("TLS certificate and key paths cannot be empty");
        }

        Ok(())
    }
}

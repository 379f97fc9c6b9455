//! Server-side configuration.
//!
//! Reads `/etc/workbridge/<name>.toml` (or an explicit path).

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Server configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address; the `--listen` flag overrides it.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Development mode. Relaxes the JWT secret requirement.
    #[serde(default)]
    pub dev: bool,

    pub storage: StorageConfig,

    #[serde(default)]
    pub jwt: JwtConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the SQLite database.
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HMAC signing secret for bearer tokens.
    #[serde(default)]
    pub secret: String,

    /// Token lifetime in seconds.
    #[serde(default = "default_expire_secs")]
    pub expire_secs: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            expire_secs: default_expire_secs(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_expire_secs() -> i64 {
    86400
}

impl ServerConfig {
    /// Resolve a config argument to a file path. A bare name looks in
    /// `/etc/workbridge/<name>.toml`; anything with a `/` or `.` is
    /// used as a path directly.
    pub fn resolve_path(arg: &str) -> PathBuf {
        if arg.contains('/') || arg.contains('.') {
            PathBuf::from(arg)
        } else {
            PathBuf::from(format!("/etc/workbridge/{arg}.toml"))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Refuse configurations that cannot run safely.
    pub fn verify(&self) -> anyhow::Result<()> {
        if self.storage.data_dir.is_empty() {
            anyhow::bail!("storage data_dir is empty in configuration");
        }
        if self.jwt.secret.is_empty() && !self.dev {
            anyhow::bail!(
                "JWT secret is empty in configuration; set [jwt] secret, or dev = true for local use"
            );
        }
        Ok(())
    }

    /// The SQLite database file, inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join("workbridge.db")
    }
}

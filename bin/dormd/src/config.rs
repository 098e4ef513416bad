//! Server configuration, loaded from a TOML context file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the SQLite database and any future stores.
    pub data_dir: String,
}

impl ServerConfig {
    /// Resolve a context name or path to a config file path.
    ///
    /// A bare name maps to `/etc/dormd/<name>.toml`; anything containing
    /// `/` or `.` is treated as a path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(format!("/etc/dormd/{}.toml", name_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            ServerConfig::resolve_path("prod"),
            PathBuf::from("/etc/dormd/prod.toml"),
        );
        assert_eq!(
            ServerConfig::resolve_path("./dev.toml"),
            PathBuf::from("./dev.toml"),
        );
        assert_eq!(
            ServerConfig::resolve_path("/opt/dormd/server.toml"),
            PathBuf::from("/opt/dormd/server.toml"),
        );
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(
            &path,
            "[storage]\ndata_dir = \"/var/lib/dormd\"\n",
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.storage.data_dir, "/var/lib/dormd");
    }

    #[test]
    fn test_load_rejects_missing_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "listen = \"0.0.0.0:8080\"\n").unwrap();
        assert!(ServerConfig::load(&path).is_err());
    }
}

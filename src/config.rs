use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime configuration for the pantry server.
///
/// Values are layered: built-in defaults, then an optional `pantry.toml`
/// next to the working directory, then environment variables
/// (`PANTRY_PORT`, `PANTRY_DB`, `PANTRY_MEDIA_DIR`), then CLI flags.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            db_path: PathBuf::from(".pantry/pantry.db"),
            media_dir: PathBuf::from(".pantry/media"),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server: Option<ServerSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    port: Option<u16>,
    db: Option<PathBuf>,
    media_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from `pantry.toml` (when present) and the
    /// environment, on top of the defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut config = Self::default();

        let file = dir.join("pantry.toml");
        if file.exists() {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let parsed: FileConfig = toml::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            if let Some(server) = parsed.server {
                if let Some(port) = server.port {
                    config.port = port;
                }
                if let Some(db) = server.db {
                    config.db_path = db;
                }
                if let Some(media_dir) = server.media_dir {
                    config.media_dir = media_dir;
                }
            }
        }

        if let Ok(port) = std::env::var("PANTRY_PORT") {
            config.port = port.parse().context("Invalid PANTRY_PORT")?;
        }
        if let Ok(db) = std::env::var("PANTRY_DB") {
            config.db_path = PathBuf::from(db);
        }
        if let Ok(media) = std::env::var("PANTRY_MEDIA_DIR") {
            config.media_dir = PathBuf::from(media);
        }

        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }
        std::fs::create_dir_all(&self.media_dir).context("Failed to create media directory")?;
        Ok(())
    }
}

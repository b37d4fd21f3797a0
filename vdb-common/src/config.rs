use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest message an Arrow IPC length prefix can address.
pub const IPC_MESSAGE_LIMIT: u64 = i32::MAX as u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: u64,
    #[serde(default = "default_sync")]
    pub sync: bool, // fsync the temp file before renaming it into place
    #[serde(default = "default_extension")]
    pub file_extension: String,
}

fn default_max_chunk_bytes() -> u64 {
    IPC_MESSAGE_LIMIT
}
fn default_sync() -> bool {
    true
}
fn default_extension() -> String {
    "vdbsnap".into()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: default_max_chunk_bytes(),
            sync: default_sync(),
            file_extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String, // EnvFilter directive; RUST_LOG wins when set
}

fn default_filter() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vdb")
            .join("config.toml")
    }

    pub fn load() -> crate::Result<Self> {
        let path = if let Ok(env_path) = std::env::var("VDB_CONFIG") {
            PathBuf::from(env_path) // $VDB_CONFIG overrides default config path
        } else {
            Self::config_path()
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let cfg: Self =
            toml::from_str(&content).map_err(|e| crate::VdbError::Config(e.to_string()))?;
        if cfg.snapshot.max_chunk_bytes == 0 || cfg.snapshot.max_chunk_bytes > IPC_MESSAGE_LIMIT {
            return Err(crate::VdbError::Config(format!(
                "snapshot.max_chunk_bytes must be in 1..={IPC_MESSAGE_LIMIT}, got {}",
                cfg.snapshot.max_chunk_bytes
            )));
        }
        Ok(cfg)
    }

    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::VdbError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

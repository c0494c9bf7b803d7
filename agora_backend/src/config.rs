use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AgoraConfig {
    pub api_port: u16,
    pub paths: AgoraPaths,
    pub media: MediaConfig,
    pub listing: ListingConfig,
}

impl AgoraConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("AGORA_HOME") {
            Ok(raw) if !raw.trim().is_empty() => AgoraPaths::from_base_dir(raw.trim())?,
            _ => AgoraPaths::discover()?,
        };
        let api_port = env::var("AGORA_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        Ok(Self {
            api_port,
            paths,
            media: MediaConfig::from_env(),
            listing: ListingConfig::from_env(),
        })
    }

    pub fn new(api_port: u16, paths: AgoraPaths) -> Self {
        Self {
            api_port,
            paths,
            media: MediaConfig::default(),
            listing: ListingConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub max_upload_bytes: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl MediaConfig {
    pub fn from_env() -> Self {
        let max_upload_bytes = env::var("AGORA_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|bytes| *bytes > 0)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        Self { max_upload_bytes }
    }
}

/// Pagination bounds for every `limit`/`offset` listing.
#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl ListingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_limit = env::var("AGORA_PAGE_LIMIT_MAX")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(defaults.max_limit);
        Self {
            default_limit: defaults.default_limit.min(max_limit),
            max_limit,
        }
    }

    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgoraPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub files_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl AgoraPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("agora.db");
        let files_dir = base.join("files");
        let uploads_dir = files_dir.join("uploads");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            files_dir,
            uploads_dir,
            logs_dir,
        })
    }
}

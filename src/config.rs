use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WORKDIR_NAME: &str = ".birdtag";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const SESSION_FILE_NAME: &str = "session.json";

#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl Debug for StorageCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityConfig {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Contents of `config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConfig {
    pub region: String,
    pub bucket_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub aws: StorageCredentials,
    pub api_url: String,
    pub identity: IdentityConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            region: "ap-southeast-2".to_string(),
            bucket_name: String::new(),
            endpoint: None,
            aws: StorageCredentials::default(),
            api_url: String::new(),
            identity: IdentityConfig::default(),
        }
    }
}

impl FileConfig {
    pub fn identity_endpoint(&self) -> String {
        self.identity.endpoint.clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.region))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub workdir: PathBuf,
    pub config_path: PathBuf,
    pub session_path: PathBuf,
    pub file_config: FileConfig,
}

impl AppConfig {
    pub fn load(workdir: Option<PathBuf>, config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let workdir = match workdir {
            Some(x) => x,
            None => home::home_dir()
                .context("failed to find home directory")?
                .join(DEFAULT_WORKDIR_NAME),
        };
        let workdir = get_or_create_workdir(&workdir)?;
        let config_path = config_path.unwrap_or_else(|| workdir.join(CONFIG_FILE_NAME));
        let file_config = read_file_config(&config_path)?;
        let session_path = workdir.join(SESSION_FILE_NAME);
        Ok(Self { workdir, config_path, session_path, file_config })
    }
}

fn get_or_create_workdir(workdir: &Path) -> anyhow::Result<PathBuf> {
    if !workdir.exists() {
        std::fs::create_dir_all(workdir)?;
    }
    if !workdir.is_dir() {
        anyhow::bail!("workdir is not a directory");
    }
    let workdir = workdir.canonicalize()?;
    info!("workdir: {}", workdir.display());
    Ok(workdir)
}

pub fn read_file_config(config_path: &Path) -> anyhow::Result<FileConfig> {
    if !config_path.exists() {
        info!("no config at {}, using defaults", config_path.display());
        return Ok(FileConfig::default());
    }
    if !config_path.is_file() {
        anyhow::bail!("config path is not a file");
    }
    let file_str = std::fs::read_to_string(config_path)?;
    let file_config = serde_json::from_str(&file_str)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(file_config)
}

pub fn write_file_config(config_path: &Path, file_config: &FileConfig) -> anyhow::Result<()> {
    let serialized = serde_json::to_string_pretty(file_config)?;
    std::fs::write(config_path, serialized)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    Ok(())
}

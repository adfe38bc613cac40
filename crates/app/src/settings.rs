use std::path::{Path, PathBuf};

use anyhow::Context as _;
use progress_core::model::UserId;
use serde::Deserialize;

/// Runtime configuration for the `progress` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// JSON file standing in for browser local storage.
    #[serde(default = "default_local_store_path")]
    pub local_store_path: PathBuf,
    /// `SQLite` URL of the remote per-user tables.
    #[serde(default = "default_remote_db_url")]
    pub remote_db_url: String,
    /// Signed-in user; absent means anonymous.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

fn default_local_store_path() -> PathBuf {
    PathBuf::from("local-storage.json")
}

fn default_remote_db_url() -> String {
    "sqlite://progress-remote.sqlite3".to_owned()
}

impl AppConfig {
    /// Layer `PROGRESS_*` environment variables over an optional TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or a value has the wrong type.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("PROGRESS"))
            .build()
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        settings
            .try_deserialize()
            .context("failed to deserialise AppConfig")
    }
}

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file (and parent directories) so the pool can open it.
///
/// # Errors
///
/// Returns an error if the URL has no path or the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> anyhow::Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .with_context(|| format!("unsupported database url: {db_url}"))?;
    let path = path.split('?').next().unwrap_or(path);
    anyhow::ensure!(!path.is_empty(), "database url has no path: {db_url}");

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
    }
    Ok(())
}

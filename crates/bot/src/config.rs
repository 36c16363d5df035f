use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use config::{Config, Environment, File};
use serde::Deserialize;
use shared::domain::{UserId, DEFAULT_LANGUAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Polling,
    Webhook,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bot_token: String,
    pub database_url: String,
    pub admin_ids: Vec<i64>,
    pub page_size: usize,
    pub default_language: String,
    pub mode: RunMode,
    pub poll_timeout_seconds: u64,
    pub webhook_bind: String,
    pub webhook_secret: Option<String>,
    pub telegram_api_url: String,
    pub store_timeout_ms: Option<u64>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            database_url: "sqlite://./data/faq.db".into(),
            admin_ids: Vec::new(),
            page_size: 5,
            default_language: DEFAULT_LANGUAGE.into(),
            mode: RunMode::Polling,
            poll_timeout_seconds: 30,
            webhook_bind: "127.0.0.1:8080".into(),
            webhook_secret: None,
            telegram_api_url: "https://api.telegram.org".into(),
            store_timeout_ms: None,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn admins(&self) -> impl Iterator<Item = UserId> + '_ {
        self.admin_ids.iter().copied().map(UserId)
    }

    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_ms.map(Duration::from_millis)
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.webhook_bind
            .parse()
            .with_context(|| format!("invalid webhook_bind '{}'", self.webhook_bind))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bot_token.trim().is_empty() {
            bail!("bot_token is required (set APP__BOT_TOKEN)");
        }
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        if self.default_language.trim().is_empty() {
            bail!("default_language cannot be empty");
        }
        self.bind_addr()?;
        Ok(())
    }
}

/// Defaults, then `config/config_<profile>.toml` if present, then `APP__*`.
pub fn load_settings(profile: &str) -> anyhow::Result<Settings> {
    load_settings_from(Path::new("config"), profile)
}

pub fn load_settings_from(dir: &Path, profile: &str) -> anyhow::Result<Settings> {
    let file = dir.join(format!("config_{profile}.toml"));
    let raw = Config::builder()
        .add_source(File::from(file.as_path()).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("admin_ids")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read configuration profile '{profile}'"))?;

    raw.try_deserialize()
        .with_context(|| format!("invalid configuration in profile '{profile}'"))
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

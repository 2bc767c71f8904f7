use std::{fs, io, path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_SETTINGS_FILE: &str = "console.toml";

/// What to do with a coordinated fetch that resolves after a newer one was issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleResponsePolicy {
    /// Drop results whose generation is not the latest issued.
    #[default]
    Discard,
    /// Commit whatever resolves last, even for an older query.
    LastWriterWins,
}

impl FromStr for StaleResponsePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "discard" => Ok(StaleResponsePolicy::Discard),
            "last_writer_wins" => Ok(StaleResponsePolicy::LastWriterWins),
            other => Err(format!("unknown stale response policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub search_debounce_ms: u64,
    pub stale_responses: StaleResponsePolicy,
    pub read_retries: u32,
    pub retry_delay_ms: u64,
    pub log_filter: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".into(),
            auth_token: None,
            search_debounce_ms: 300,
            stale_responses: StaleResponsePolicy::Discard,
            read_retries: 0,
            retry_delay_ms: 250,
            log_filter: "info".into(),
        }
    }
}

impl ConsoleSettings {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_base_url: Option<String>,
    auth_token: Option<String>,
    search_debounce_ms: Option<u64>,
    stale_responses: Option<StaleResponsePolicy>,
    read_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    log_filter: Option<String>,
}

/// Defaults, then the settings file (if present), then environment overrides.
pub fn load_settings(path: impl AsRef<Path>) -> anyhow::Result<ConsoleSettings> {
    let path = path.as_ref();
    let mut settings = ConsoleSettings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()));
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings.api_base_url = normalize_base_url(&settings.api_base_url);
    Ok(settings)
}

fn apply_file(settings: &mut ConsoleSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.auth_token {
        settings.auth_token = Some(v);
    }
    if let Some(v) = file_cfg.search_debounce_ms {
        settings.search_debounce_ms = v;
    }
    if let Some(v) = file_cfg.stale_responses {
        settings.stale_responses = v;
    }
    if let Some(v) = file_cfg.read_retries {
        settings.read_retries = v;
    }
    if let Some(v) = file_cfg.retry_delay_ms {
        settings.retry_delay_ms = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
}

fn apply_env(settings: &mut ConsoleSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("CONSOLE_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("CONSOLE_AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }
    if let Some(v) = lookup("APP__AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }

    if let Some(v) = lookup("APP__SEARCH_DEBOUNCE_MS") {
        parse_into(&mut settings.search_debounce_ms, "APP__SEARCH_DEBOUNCE_MS", &v);
    }
    if let Some(v) = lookup("APP__STALE_RESPONSES") {
        parse_into(&mut settings.stale_responses, "APP__STALE_RESPONSES", &v);
    }
    if let Some(v) = lookup("APP__READ_RETRIES") {
        parse_into(&mut settings.read_retries, "APP__READ_RETRIES", &v);
    }
    if let Some(v) = lookup("APP__RETRY_DELAY_MS") {
        parse_into(&mut settings.retry_delay_ms, "APP__RETRY_DELAY_MS", &v);
    }
    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

fn parse_into<T: FromStr>(slot: &mut T, key: &str, raw: &str) {
    match raw.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!(key, value = raw, "config: ignoring unparseable override"),
    }
}

pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        ConsoleSettings::default().api_base_url
    } else {
        trimmed.to_string()
    }
}

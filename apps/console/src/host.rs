//! Terminal implementations of the controller's host seams.

use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use async_trait::async_trait;
use console_core::{
    load_settings, BackendError, ConfirmationPrompt, HttpConsoleBackend, SessionReloader,
};
use shared::protocol::AdminRosterEntry;
use tracing::{info, warn};

/// Reads one line from stdin without blocking the runtime. `None` on EOF.
pub async fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        let read = io::stdin()
            .read_line(&mut line)
            .context("failed to read from stdin")?;
        Ok((read > 0).then(|| line.trim_end_matches(['\r', '\n']).to_string()))
    })
    .await
    .context("stdin reader task failed")?
}

pub struct TerminalConfirmation {
    assume_yes: bool,
}

impl TerminalConfirmation {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

#[async_trait]
impl ConfirmationPrompt for TerminalConfirmation {
    async fn confirm_demotion(&self, entry: &AdminRosterEntry) -> bool {
        if self.assume_yes {
            return true;
        }
        match read_line(&format!("Demote {} to member? [y/N] ", entry.email)).await {
            Ok(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "console: confirmation prompt failed");
                false
            }
        }
    }
}

/// Re-reads the settings file and environment and swaps in the current token,
/// so entitlements issued after a plan change are picked up.
pub struct SettingsSession {
    settings_path: PathBuf,
    backend: Arc<HttpConsoleBackend>,
}

impl SettingsSession {
    pub fn new(settings_path: PathBuf, backend: Arc<HttpConsoleBackend>) -> Self {
        Self {
            settings_path,
            backend,
        }
    }
}

#[async_trait]
impl SessionReloader for SettingsSession {
    async fn reload_session(&self) -> Result<(), BackendError> {
        let settings = load_settings(&self.settings_path)
            .map_err(|err| BackendError::Decode(format!("{err:#}")))?;
        let has_token = settings.auth_token.is_some();
        self.backend.set_auth_token(settings.auth_token).await;
        info!(has_token, "console: session reloaded from settings");
        Ok(())
    }
}

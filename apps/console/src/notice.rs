//! User-facing classification of console failures.

use console_core::{BackendError, ConsoleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeCategory {
    Auth,
    Transport,
    Validation,
    NotFound,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct UserNotice {
    category: NoticeCategory,
    message: String,
}

impl UserNotice {
    pub fn from_console_error(err: &ConsoleError) -> Self {
        let category = match err {
            ConsoleError::Validation(_) => NoticeCategory::Validation,
            other => classify_backend_errors(&other.backend_errors()),
        };
        Self {
            category,
            message: err.to_string(),
        }
    }

    /// Fallback for errors that reach the host without a typed source.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
        {
            NoticeCategory::Auth
        } else if lower.contains("not found") {
            NoticeCategory::NotFound
        } else if lower.contains("invalid") || lower.contains("malformed") {
            NoticeCategory::Validation
        } else if lower.contains("connection")
            || lower.contains("timed out")
            || lower.contains("dns")
            || lower.contains("request failed")
        {
            NoticeCategory::Transport
        } else {
            NoticeCategory::Unknown
        };
        Self { category, message }
    }

    pub fn category(&self) -> NoticeCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == NoticeCategory::Auth
    }

    pub fn headline(&self) -> &'static str {
        match self.category {
            NoticeCategory::Auth => "Not authorized; check the auth token and run `reload`.",
            NoticeCategory::Transport => "Admin API unreachable; check the URL/network and retry.",
            NoticeCategory::Validation => "Request rejected before sending.",
            NoticeCategory::NotFound => "Not found.",
            NoticeCategory::Unknown => "Admin API error.",
        }
    }
}

fn classify_backend_errors(errors: &[&BackendError]) -> NoticeCategory {
    if errors.iter().any(|err| err.requires_reauth()) {
        NoticeCategory::Auth
    } else if errors.iter().any(|err| err.is_not_found()) {
        NoticeCategory::NotFound
    } else if errors.iter().any(|err| err.is_transport()) {
        NoticeCategory::Transport
    } else {
        NoticeCategory::Unknown
    }
}

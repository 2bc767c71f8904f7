//! Access gate: derives the caller's administrative tier from the freshest
//! roster payload. Nothing here is cached; every check reads a `ViewState`.

use std::fmt;

use shared::protocol::AdminRoster;

use crate::{error::ValidationFailure, view::ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessLevel {
    Member,
    Admin,
    Superadmin,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessLevel::Member => "member",
            AccessLevel::Admin => "admin",
            AccessLevel::Superadmin => "superadmin",
        })
    }
}

pub struct AccessGate;

impl AccessGate {
    /// A roster response is only served to admins, so its presence alone means `Admin`.
    pub fn derive(roster: &AdminRoster) -> AccessLevel {
        if roster.caller_is_superadmin {
            AccessLevel::Superadmin
        } else {
            AccessLevel::Admin
        }
    }

    pub fn level(view: &ViewState) -> AccessLevel {
        if !view.loaded {
            AccessLevel::Member
        } else if view.caller_is_superadmin {
            AccessLevel::Superadmin
        } else {
            AccessLevel::Admin
        }
    }

    pub fn shows_admin_management(view: &ViewState) -> bool {
        Self::level(view) == AccessLevel::Superadmin
    }

    pub fn require(view: &ViewState, required: AccessLevel) -> Result<(), ValidationFailure> {
        let actual = Self::level(view);
        if actual >= required {
            Ok(())
        } else {
            Err(ValidationFailure::InsufficientAccess { required, actual })
        }
    }
}

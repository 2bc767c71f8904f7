//! Types shared between the admin console core and its hosts.

pub mod domain;
pub mod error;
pub mod protocol;

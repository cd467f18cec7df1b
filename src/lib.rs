//! # Roster
//!
//! Client for an employee-management backend. An employer signs up or logs in,
//! then lists, creates, edits and deletes the employees of their organization.
//!
//! The interesting part is session upkeep: the access token is a JWT whose `exp`
//! claim drives a refresh chain that swaps the stored refresh token for a new
//! access token shortly before expiry (see [`session::refresh`]). A failed refresh
//! signs the session out.
//!
//! - [`token`]: JWT payload decoding and the expiry checks built on it.
//! - [`session`]: credential storage, the refresh chain and the session holder.
//! - [`api`]: HTTP client for the auth and employee endpoints.
//! - [`forms`]: field rules for the employee and registration forms.
//! - [`cli`]: the `roster` command line.

pub mod api;
pub mod cli;
pub mod forms;
pub mod session;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH_SHORT {
    Some(hash) => hash,
    None => "unknown",
};

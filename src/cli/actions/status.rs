use crate::{cli::globals::GlobalArgs, session::Session, token, GIT_COMMIT_HASH};
use anyhow::Result;
use secrecy::ExposeSecret;
use std::fmt::Write as _;

/// Describes the stored session without touching the network.
#[must_use]
pub fn report(session: &Session) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "roster {} ({})",
        env!("CARGO_PKG_VERSION"),
        GIT_COMMIT_HASH
    );
    let _ = writeln!(out, "api:           {}", session.api().base_url());

    match session.token() {
        None => {
            let _ = writeln!(out, "session:       signed out");
        }
        Some(access) => {
            let _ = writeln!(out, "session:       signed in");

            match token::expires_at_ms(access.expose_secret()) {
                Ok(exp) => {
                    let _ = writeln!(out, "expires at:    {} (unix ms)", exp);
                }
                Err(e) => {
                    let _ = writeln!(out, "expires at:    unknown ({e})");
                }
            }

            let _ = writeln!(out, "expiring soon: {}", session.is_expiring_soon());
        }
    }

    let _ = write!(out, "refresh token: {}", if session.has_refresh_token() { "stored" } else { "none" });
    out
}

/// # Errors
/// Returns an error if the session cannot be opened.
pub fn execute(globals: &GlobalArgs) -> Result<()> {
    let session = globals.open_session()?;
    println!("{}", report(&session));
    Ok(())
}

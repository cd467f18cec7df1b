pub mod auth;
pub mod employees;
pub mod keepalive;
pub mod status;

// Internal "interpreter" for `Action`.
mod run;

use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use secrecy::SecretString;

#[derive(Debug)]
pub enum Action {
    Login(auth::LoginArgs),
    Register(auth::RegisterArgs),
    Logout,
    Status,
    KeepAlive,
    Employees(employees::EmployeeAction),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self, globals: &GlobalArgs) -> Result<()> {
        run::execute(self, globals).await
    }
}

/// Prompts on the terminal for a secret without echoing it.
pub(crate) fn prompt_secret(label: &str) -> Result<SecretString> {
    let value = rpassword::prompt_password(format!("{label}: "))
        .with_context(|| format!("failed to read {}", label.to_lowercase()))?;

    Ok(SecretString::from(value))
}

/// Uses the secret given on the command line or environment, prompting otherwise.
pub(crate) fn secret_or_prompt(given: Option<&SecretString>, label: &str) -> Result<SecretString> {
    match given {
        Some(secret) => Ok(secret.clone()),
        None => prompt_secret(label),
    }
}

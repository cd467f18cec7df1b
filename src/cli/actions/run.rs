use crate::cli::{
    actions::{auth, employees, keepalive, status, Action},
    globals::GlobalArgs,
};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Login(args) => auth::login(args, globals).await,
        Action::Register(args) => auth::register(args, globals).await,
        Action::Logout => auth::logout(globals),
        Action::Status => status::execute(globals),
        Action::KeepAlive => keepalive::execute(globals).await,
        Action::Employees(action) => employees::execute(action, globals).await,
    }
}

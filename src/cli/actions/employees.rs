use crate::{
    api::{ApiError, Employee, EmployeeInput, EmployeePatch},
    cli::globals::GlobalArgs,
    forms::{validate_employee, validate_employee_patch},
    session::Session,
};
use anyhow::{bail, Result};
use std::fmt::Write as _;

#[derive(Debug)]
pub enum EmployeeAction {
    List { name: Option<String> },
    Get { id: i64 },
    Create(EmployeeInput),
    Update { id: i64, patch: EmployeePatch },
    Delete { id: i64 },
}

fn render_table(employees: &[Employee]) -> String {
    if employees.is_empty() {
        return "No employees found".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<6} {:<24} {:<20} {:<16} {}", "ID", "NAME", "CITY", "STATE", "COUNTRY");
    for e in employees {
        let _ = writeln!(
            out,
            "{:<6} {:<24} {:<20} {:<16} {}",
            e.id, e.name, e.city, e.state, e.country
        );
    }
    out.trim_end().to_string()
}

fn render_one(employee: &Employee) -> Result<String> {
    Ok(serde_json::to_string_pretty(employee)?)
}

/// Runs one employee action against the session, returning what to print.
///
/// A 401/403 from the API signs the session out before the error is returned.
///
/// # Errors
/// Returns form errors, a missing session, or the API error.
pub async fn run(session: &Session, action: EmployeeAction) -> Result<String> {
    match &action {
        EmployeeAction::Create(input) => validate_employee(input)?,
        EmployeeAction::Update { patch, .. } => {
            if patch.is_empty() {
                bail!("nothing to update");
            }
            validate_employee_patch(patch)?;
        }
        _ => {}
    }

    let token = session.ensure_fresh().await?;
    let api = session.api();

    let result: Result<String, ApiError> = match action {
        EmployeeAction::List { name } => api
            .list_employees(&token, name.as_deref())
            .await
            .map(|employees| render_table(&employees)),
        EmployeeAction::Get { id } => api.get_employee(&token, id).await.map(|e| {
            render_one(&e).unwrap_or_else(|_| format!("{} {}", e.id, e.name))
        }),
        EmployeeAction::Create(input) => api
            .create_employee(&token, &input)
            .await
            .map(|e| format!("Created employee {} ({})", e.id, e.name)),
        EmployeeAction::Update { id, patch } => api
            .update_employee(&token, id, &patch)
            .await
            .map(|e| format!("Updated employee {} ({})", e.id, e.name)),
        EmployeeAction::Delete { id } => api
            .delete_employee(&token, id)
            .await
            .map(|()| format!("Deleted employee {id}")),
    };

    match result {
        Ok(output) => Ok(output),
        Err(e) => {
            if e.is_unauthorized() {
                session.expire();
            }
            Err(e.into())
        }
    }
}

/// # Errors
/// Returns an error if the session cannot be opened or the action fails.
pub async fn execute(action: EmployeeAction, globals: &GlobalArgs) -> Result<()> {
    let session = globals.open_session()?;
    println!("{}", run(&session, action).await?);
    Ok(())
}

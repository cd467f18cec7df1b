use crate::{
    api::{EmployeeInput, EmployeePatch},
    cli::{
        actions::{
            auth::{LoginArgs, RegisterArgs},
            employees::EmployeeAction,
            Action,
        },
        globals::GlobalArgs,
    },
};
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

fn value(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn required(matches: &ArgMatches, id: &str) -> Result<String> {
    value(matches, id).with_context(|| format!("missing required argument: --{id}"))
}

fn secret(matches: &ArgMatches, id: &str) -> Option<SecretString> {
    value(matches, id).map(SecretString::from)
}

fn employee_id(matches: &ArgMatches) -> Result<i64> {
    matches
        .get_one::<i64>("id")
        .copied()
        .context("missing required argument: <id>")
}

fn globals(matches: &ArgMatches) -> Result<GlobalArgs> {
    let mut globals = GlobalArgs::new(
        required(matches, "api-url").context("set --api-url or ROSTER_API_URL")?,
    );

    if let Some(state_file) = value(matches, "state-file") {
        globals.state_file = PathBuf::from(state_file);
    }
    if let Some(secs) = matches.get_one::<u64>("refresh-threshold") {
        globals.refresh_threshold = Duration::from_secs(*secs);
    }
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        globals.timeout = Duration::from_secs(*secs);
    }

    Ok(globals)
}

fn employees(matches: &ArgMatches) -> Result<EmployeeAction> {
    let action = match matches.subcommand() {
        Some(("list", m)) => EmployeeAction::List {
            name: value(m, "name"),
        },
        Some(("get", m)) => EmployeeAction::Get { id: employee_id(m)? },
        Some(("create", m)) => EmployeeAction::Create(EmployeeInput {
            name: required(m, "name")?,
            ssn: required(m, "ssn")?,
            address1: required(m, "address1")?,
            address2: value(m, "address2").unwrap_or_default(),
            city: required(m, "city")?,
            state: required(m, "state")?,
            zip: required(m, "zip")?,
            country: required(m, "country")?,
        }),
        Some(("update", m)) => EmployeeAction::Update {
            id: employee_id(m)?,
            patch: EmployeePatch {
                name: value(m, "name"),
                ssn: value(m, "ssn"),
                address1: value(m, "address1"),
                address2: value(m, "address2"),
                city: value(m, "city"),
                state: value(m, "state"),
                zip: value(m, "zip"),
                country: value(m, "country"),
            },
        },
        Some(("delete", m)) => EmployeeAction::Delete { id: employee_id(m)? },
        _ => bail!("unknown employees command"),
    };

    Ok(action)
}

/// Maps parsed arguments to the action to run and the settings it runs with.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &ArgMatches) -> Result<(Action, GlobalArgs)> {
    let globals = globals(matches)?;

    let action = match matches.subcommand() {
        Some(("login", m)) => Action::Login(LoginArgs {
            email: required(m, "email")?,
            password: secret(m, "password"),
        }),
        Some(("register", m)) => Action::Register(RegisterArgs {
            name: required(m, "name")?,
            email: required(m, "email")?,
            password: secret(m, "password"),
            confirm_password: secret(m, "confirm-password"),
        }),
        Some(("logout", _)) => Action::Logout,
        Some(("status", _)) => Action::Status,
        Some(("keepalive", _)) => Action::KeepAlive,
        Some(("employees", m)) => Action::Employees(employees(m)?),
        _ => bail!("unknown command"),
    };

    Ok((action, globals))
}

use crate::forms::{COUNTRIES, US_STATES};
use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        PossibleValuesParser, ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

fn employee_id() -> Arg {
    Arg::new("id")
        .help("Employee id")
        .required(true)
        .value_parser(clap::value_parser!(i64))
}

// Shared by create (all required but address2) and update (all optional).
fn employee_fields(required: bool) -> Vec<Arg> {
    let field = |name: &'static str, help: &'static str| {
        Arg::new(name).long(name).help(help).required(required)
    };

    vec![
        field("name", "Employee name"),
        field("ssn", "Social security number"),
        field("address1", "Address line 1"),
        Arg::new("address2").long("address2").help("Address line 2"),
        field("city", "City"),
        field("state", "State, e.g. Illinois").value_parser(PossibleValuesParser::new(US_STATES)),
        field("zip", "Zip code"),
        field("country", "Country").value_parser(PossibleValuesParser::new(COUNTRIES)),
    ]
}

fn employees() -> Command {
    Command::new("employees")
        .about("Manage employees")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("list").about("List employees").arg(
                Arg::new("name")
                    .short('n')
                    .long("name")
                    .help("Only employees whose name matches"),
            ),
        )
        .subcommand(
            Command::new("get")
                .about("Show one employee")
                .arg(employee_id()),
        )
        .subcommand(
            Command::new("create")
                .about("Add an employee")
                .args(employee_fields(true)),
        )
        .subcommand(
            Command::new("update")
                .about("Edit an employee")
                .arg(employee_id())
                .args(employee_fields(false)),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete an employee")
                .arg(employee_id()),
        )
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("roster")
        .about("Employee management client")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("api-url")
                .short('u')
                .long("api-url")
                .help("Base URL of the employee API, example: https://api.roster.tld")
                .env("ROSTER_API_URL")
                .global(true),
        )
        .arg(
            Arg::new("state-file")
                .short('s')
                .long("state-file")
                .help("File where session tokens are kept")
                .default_value("roster-session.json")
                .env("ROSTER_STATE_FILE")
                .global(true),
        )
        .arg(
            Arg::new("refresh-threshold")
                .long("refresh-threshold")
                .help("Seconds before token expiry at which it is refreshed")
                .default_value("180")
                .env("ROSTER_REFRESH_THRESHOLD")
                .global(true)
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .help("HTTP request timeout in seconds")
                .default_value("10")
                .env("ROSTER_TIMEOUT")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("ROSTER_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in as an employer")
                .arg(
                    Arg::new("email")
                        .short('e')
                        .long("email")
                        .help("Work email")
                        .env("ROSTER_EMAIL")
                        .required(true),
                )
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("Password, prompted for when omitted")
                        .env("ROSTER_PASSWORD")
                        .hide_env_values(true),
                ),
        )
        .subcommand(
            Command::new("register")
                .about("Create an employer account")
                .arg(
                    Arg::new("name")
                        .long("name")
                        .help("Company name")
                        .required(true),
                )
                .arg(
                    Arg::new("email")
                        .short('e')
                        .long("email")
                        .help("Work email")
                        .env("ROSTER_EMAIL")
                        .required(true),
                )
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("Password, prompted for when omitted")
                        .env("ROSTER_PASSWORD")
                        .hide_env_values(true),
                )
                .arg(
                    Arg::new("confirm-password")
                        .long("confirm-password")
                        .help("Password again, prompted for when omitted"),
                ),
        )
        .subcommand(Command::new("logout").about("Sign out and forget stored tokens"))
        .subcommand(Command::new("status").about("Show the current session"))
        .subcommand(
            Command::new("keepalive")
                .about("Keep the session refreshed until interrupted"),
        )
        .subcommand(employees())
}

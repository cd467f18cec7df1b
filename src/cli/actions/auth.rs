use crate::{
    api::Employer,
    cli::{actions::secret_or_prompt, globals::GlobalArgs},
    forms::validate_registration,
    session::{Session, SessionError},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug)]
pub struct LoginArgs {
    pub email: String,
    pub password: Option<SecretString>,
}

#[derive(Debug)]
pub struct RegisterArgs {
    pub name: String,
    pub email: String,
    pub password: Option<SecretString>,
    pub confirm_password: Option<SecretString>,
}

fn describe(error: SessionError) -> anyhow::Error {
    match error {
        SessionError::Api(e) if e.is_unauthorized() => {
            anyhow::anyhow!("invalid email or password: {e}")
        }
        other => other.into(),
    }
}

/// Signs in and stores the issued tokens.
///
/// # Errors
/// Returns an error if the credentials are rejected.
pub async fn sign_in(session: &Session, args: &LoginArgs, password: &SecretString) -> Result<String> {
    session
        .login(args.email.trim(), password)
        .await
        .map_err(describe)?;

    Ok(format!("Signed in as {}", args.email.trim()))
}

/// Validates the registration form, then creates the account.
///
/// # Errors
/// Returns the failing form fields, or the API error.
pub async fn sign_up(
    session: &Session,
    args: &RegisterArgs,
    password: &SecretString,
    confirm_password: &SecretString,
) -> Result<String> {
    let employer = Employer {
        id: None,
        name: args.name.trim().to_string(),
        email: args.email.trim().to_string(),
        password: Some(password.expose_secret().to_string()),
    };

    validate_registration(&employer, confirm_password.expose_secret())?;

    session.register(&employer).await?;

    Ok(format!("Account created for {}", employer.name))
}

/// # Errors
/// Returns an error if the password cannot be read or sign-in fails.
pub async fn login(args: LoginArgs, globals: &GlobalArgs) -> Result<()> {
    let session = globals.open_session()?;

    let password = secret_or_prompt(args.password.as_ref(), "Password")?;

    println!("{}", sign_in(&session, &args, &password).await?);
    Ok(())
}

/// # Errors
/// Returns an error if the form is invalid or the account cannot be created.
pub async fn register(args: RegisterArgs, globals: &GlobalArgs) -> Result<()> {
    let session = globals.open_session()?;

    let password = secret_or_prompt(args.password.as_ref(), "Password")?;
    let confirm_password = secret_or_prompt(args.confirm_password.as_ref(), "Confirm password")?;

    println!(
        "{}",
        sign_up(&session, &args, &password, &confirm_password).await?
    );
    Ok(())
}

/// # Errors
/// Returns an error if the stored tokens cannot be removed.
pub fn logout(globals: &GlobalArgs) -> Result<()> {
    let session = globals.open_session()?;
    session.logout().context("failed to clear the stored session")?;
    println!("Signed out");
    Ok(())
}

//! Command parsing and execution.

use anyhow::{bail, Context, Result};
use tracing::warn;

use qmail_auth_core::{
    ApiClient, AuthorizedClient, Config, Navigator, Route, RouteGuard, SessionStore,
};

/// Password source for non-interactive use
const ENV_PASSWORD: &str = "QMAIL_AUTH_PASSWORD";

pub const USAGE: &str = "\
Usage: qmail-auth <command> [args]

Commands:
  login [email]                 Sign in with email and password
  logout                        Sign out and forget the stored session
  status                        Show who is signed in
  refresh                       Exchange the refresh token for a new session
  register <email> [name]       Create an account
  google-url                    Print the Google sign-in URL
  google-callback <url>         Finish Google sign-in from the redirect URL
  forgot-password <email>       Send password reset instructions
  verify-code <email> <code>    Check a password reset code
  reset-password <token>        Set a new password using a recovery token
  profile                       Show the signed-in user's profile
  help                          Show this message

Environment:
  QMAIL_AUTH_API_URL, QMAIL_AUTH_STORAGE (file|keyring|memory),
  QMAIL_AUTH_TIMEOUT_SECS, QMAIL_AUTH_PASSWORD, QMAIL_AUTH_LOG_FILE=1, RUST_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: Option<String> },
    Logout,
    Status,
    Refresh,
    Register { email: String, name: Option<String> },
    GoogleUrl,
    GoogleCallback { url: String },
    ForgotPassword { email: String },
    VerifyCode { email: String, code: String },
    ResetPassword { token: String },
    Profile,
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut args = args.iter().map(String::as_str);
        let name = args.next().unwrap_or("help");
        let mut required = |what: &str| -> Result<String> {
            args.next()
                .map(str::to_string)
                .with_context(|| format!("`{}` requires <{}>", name, what))
        };

        let command = match name {
            "login" => Command::Login { email: required("email").ok() },
            "logout" => Command::Logout,
            "status" => Command::Status,
            "refresh" => Command::Refresh,
            "register" => {
                let email = required("email")?;
                Command::Register { email, name: required("name").ok() }
            }
            "google-url" => Command::GoogleUrl,
            "google-callback" => Command::GoogleCallback { url: required("url")? },
            "forgot-password" => Command::ForgotPassword { email: required("email")? },
            "verify-code" => {
                let email = required("email")?;
                Command::VerifyCode { email, code: required("code")? }
            }
            "reset-password" => Command::ResetPassword { token: required("token")? },
            "profile" => Command::Profile,
            "help" | "--help" | "-h" => Command::Help,
            other => bail!("Unknown command: {}", other),
        };
        Ok(command)
    }
}

/// Redirects become hints on stderr; there is no view to switch to.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        match &route {
            Route::Login { error: Some(error) } => eprintln!("-> {} ({})", route.path(), error),
            _ => eprintln!("-> {}", route.path()),
        }
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => rpassword::prompt_password(prompt).context("Failed to read password"),
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    use std::io::Write;

    eprint!("{}", prompt);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub async fn run(
    command: Command,
    config: &mut Config,
    store: &SessionStore<ApiClient>,
    client: &AuthorizedClient<ApiClient>,
    guard: &RouteGuard<ApiClient>,
) -> Result<()> {
    match command {
        Command::Login { email } => {
            if guard.resolve(Route::login()).await == Route::Home {
                if let Some(user) = store.user() {
                    println!("Already signed in as {}", user.email);
                    return Ok(());
                }
            }

            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt_line("Email: ")?,
            };
            let password = prompt_password("Password: ")?;

            let payload = store.login(&email, &password).await?;
            let name = payload
                .user
                .as_ref()
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| email.clone());
            println!("Signed in as {}", name);

            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }
        Command::Logout => {
            guard.resolve(Route::Home).await;
            store.logout().await;
            println!("Signed out");
        }
        Command::Status => {
            if guard.resolve(Route::Home).await != Route::Home {
                println!("Not signed in");
                return Ok(());
            }
            if let Some(user) = store.user() {
                println!("Signed in as {} <{}>", user.display_name(), user.email);
            }
            if let Some(session) = store.session() {
                match session.minutes_until_expiry() {
                    _ if session.is_expired() => println!("Access token expired; it is refreshed on the next request"),
                    Some(minutes) => println!("Access token expires in {} min", minutes),
                    None => println!("Access token has no recorded expiry"),
                }
            }
        }
        Command::Refresh => {
            guard.resolve(Route::Home).await;
            if store.refresh_token().await {
                println!("Session refreshed");
            } else {
                bail!("Session could not be refreshed; please sign in again");
            }
        }
        Command::Register { email, name } => {
            let password = prompt_password("Choose a password: ")?;
            let payload = store.register(&email, &password, name.as_deref()).await?;
            println!(
                "{}",
                payload
                    .message
                    .unwrap_or_else(|| "Registration successful. Please check your email for verification.".to_string())
            );
        }
        Command::GoogleUrl => {
            let url = store.google_sign_in_url().await?;
            println!("{}", url);
        }
        Command::GoogleCallback { url } => {
            guard.resolve(Route::Callback).await;
            let payload = store.handle_google_callback_url(&url).await?;
            if let Some(user) = payload.user {
                println!("Signed in as {}", user.display_name());
            }
        }
        Command::ForgotPassword { email } => {
            let response = store.request_password_reset(&email).await?;
            println!("{}", response.message);
        }
        Command::VerifyCode { email, code } => {
            let response = store.verify_reset_code(&email, &code).await?;
            if response.message.is_empty() {
                println!("Code accepted");
            } else {
                println!("{}", response.message);
            }
        }
        Command::ResetPassword { token } => {
            let password = prompt_password("New password: ")?;
            let confirm = prompt_password("Confirm new password: ")?;
            if password != confirm {
                bail!("Passwords do not match");
            }
            let response = store.reset_password(&password, &token).await?;
            println!("{}", response.message);
        }
        Command::Profile => {
            if guard.resolve(Route::Home).await != Route::Home {
                bail!("Not signed in");
            }
            let profile = client.profile().await?;
            eprintln!("Profile of {}", profile.preferred_name());
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Help => println!("{}", USAGE),
    }
    Ok(())
}

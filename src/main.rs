use anyhow::{Context, Result, anyhow};
use autumnus::{FormatterOption, Options, highlight, themes};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use dialoguer::Password;
use iocraft::prelude::*;
use std::{
    fmt::Display,
    io::{self, IsTerminal, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    time::{Duration, Instant},
};
use streamable::{AuthErrorKind, Session, StreamableClient, UploadResult, default_title};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::config::{Config, ConfigFile};
use crate::ui::{
    ConfigHeader, ErrorMessage, InputPrompt, SuccessMessage, UploadSpinner, UploadSummary,
    WarningMessage,
};

mod config;
mod ui;

/// Exit code for failures outside of login, kept apart from the login codes.
const EXIT_OTHER_FAILURE: u8 = 4;

#[derive(Parser)]
#[command(name = "streamable")]
#[command(version)]
#[command(about = "Interact with Streamable")]
struct Cli {
    /// Log HTTP requests and upload steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a video
    Upload {
        /// File to be uploaded
        #[arg(value_hint = ValueHint::FilePath, value_parser = existing_file)]
        file: PathBuf,
        /// Video title, defaults to the file name without its extension
        #[arg(short, long)]
        title: Option<String>,
        /// Streamable username. If not provided, the upload will be anonymous
        #[arg(short, long)]
        user: Option<String>,
        /// Streamable password. If not provided and user is provided, it will prompt for the password
        #[arg(short, long)]
        password: Option<String>,
        /// Ignore the configured default username and upload anonymously
        #[arg(short, long, conflicts_with_all = ["user", "password"])]
        anonymous: bool,
        /// Copy video url to clipboard after upload
        #[arg(short, long)]
        clipboard: bool,
        /// Print the upload result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure streamable interactively
    Config,
    /// Store a password in the OS keyring
    SetPassword { username: String },
}

/// A failure while logging in, kept apart from upload failures so it maps to
/// its own exit code.
#[derive(Debug)]
struct LoginFailed(streamable::Error);

impl Display for LoginFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.auth_kind() {
            Some(AuthErrorKind::UserNotFound) => write!(f, "User not found"),
            Some(AuthErrorKind::IncorrectPassword) => write!(f, "Incorrect password"),
            Some(AuthErrorKind::Other(_)) => write!(f, "Login failed: {}", self.0),
            None => write!(f, "An error occurred during login: {}", self.0),
        }
    }
}

impl std::error::Error for LoginFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<LoginFailed>() {
        Some(LoginFailed(inner)) => match inner.auth_kind() {
            Some(AuthErrorKind::UserNotFound) => 1,
            Some(AuthErrorKind::IncorrectPassword) => 2,
            _ => 3,
        },
        None => EXIT_OTHER_FAILURE,
    }
}

fn existing_file(file: &str) -> std::result::Result<PathBuf, String> {
    let path = PathBuf::from(file);
    if !path.exists() {
        return Err(format!("File {} does not exist", file));
    }
    Ok(path)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = match e.downcast_ref::<LoginFailed>() {
                Some(login) => login.to_string(),
                None => format!("{:#}", e),
            };
            element!(ErrorMessage(message: message)).print();
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    rt.block_on(async {
        match cli.command {
            Commands::Config => interactive_config(),
            Commands::SetPassword { username } => set_password(&username),
            Commands::Upload {
                file,
                title,
                user,
                password,
                anonymous,
                clipboard,
                json,
            } => {
                let config = config::read_config()?;
                let client = StreamableClient::new(config.base_url.clone());

                let user = if anonymous {
                    None
                } else {
                    user.or(config.username.clone())
                };
                let session = match user {
                    Some(user) => Some(handle_login(&client, &config, &user, password).await?),
                    None => None,
                };

                let title = title.filter(|t| !t.is_empty());
                upload_video(
                    &client,
                    session.as_ref(),
                    &file,
                    title,
                    clipboard || config.clipboard,
                    json,
                )
                .await
            }
        }
    })
}

/// `STREAMABLE_PASSWORD` belongs to the configured username only.
fn configured_password(config: &Config, user: &str) -> Option<String> {
    if config.username.as_deref() == Some(user) {
        config.password.clone()
    } else {
        None
    }
}

fn resolve_password(config: &Config, user: &str, password: Option<String>) -> Result<String> {
    if let Some(password) = password.or_else(|| configured_password(config, user)) {
        return Ok(password);
    }
    if let Some(password) = config::get_password_keyring(user) {
        debug!(user, "Using password from OS keyring");
        return Ok(password);
    }
    let password = Password::new()
        .with_prompt(format!("Password for {}", user))
        .interact()?;
    Ok(password)
}

async fn handle_login(
    client: &StreamableClient,
    config: &Config,
    user: &str,
    password: Option<String>,
) -> Result<Session> {
    let password = resolve_password(config, user, password)?;
    client
        .login(user, &password)
        .await
        .map_err(|e| anyhow::Error::new(LoginFailed(e)))
}

async fn upload_video(
    client: &StreamableClient,
    session: Option<&Session>,
    file: &Path,
    title: Option<String>,
    clipboard: bool,
    json: bool,
) -> Result<()> {
    if !json {
        println!("Uploading file {}", file.display());
    }

    let started = Instant::now();
    let upload = client.upload(session, file, title.as_deref());

    let result = if !json && io::stdout().is_terminal() {
        let mut spinner = element!(UploadSpinner(file: file.display().to_string()));
        tokio::select! {
            result = upload => result?,
            _ = spinner.render_loop() => {
                unreachable!("render_loop should not terminate")
            }
        }
    } else {
        upload.await?
    };
    let elapsed = display_duration(started.elapsed());

    if json {
        print_json(&result)?;
    } else {
        element! {
            UploadSummary(
                shortcode: result.shortcode.clone(),
                url: result.url.clone(),
                title: title.or_else(|| default_title(file)),
                elapsed: Some(humantime::format_duration(elapsed).to_string())
            )
        }
        .print();
    }

    if clipboard {
        match copy_to_clipboard(&result.url) {
            Ok(()) => {
                if !json {
                    element!(SuccessMessage(message: "URL copied to clipboard".to_string()))
                        .print();
                }
            }
            Err(e) => {
                warn!(error = %e, "Clipboard copy failed");
                element!(WarningMessage(message: format!("Unable to copy URL to clipboard: {:#}", e)))
                    .print();
            }
        }
    }

    Ok(())
}

/// Trims to whole milliseconds so short uploads still show a duration.
fn display_duration(elapsed: Duration) -> Duration {
    Duration::from_millis(elapsed.as_millis() as u64)
}

fn print_json(result: &UploadResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    if !io::stdout().is_terminal() {
        println!("{}", json);
        return Ok(());
    }

    let output = highlight(
        &json,
        Options {
            formatter: FormatterOption::Terminal {
                theme: Some(themes::get("ayu_light").expect("Syntax highlighting theme not found")),
            },
            lang_or_file: Some("json"),
        },
    );
    println!("{}", output);
    Ok(())
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("Clipboard unavailable")?;
    clipboard.set_text(text.to_string())?;
    Ok(())
}

fn set_password(username: &str) -> Result<()> {
    let password = Password::new()
        .with_prompt(format!("Password for {}", username))
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;
    config::set_password_keyring(username, &password)?;
    element!(SuccessMessage(message: format!("Password stored for {}", username))).print();
    Ok(())
}

fn read_input(prompt: &str, default: Option<&str>, description: Option<&str>) -> Result<String> {
    element! {
        InputPrompt(
            prompt: prompt.to_string(),
            default: default.map(|s| s.to_string()),
            description: description.map(|s| s.to_string())
        )
    }
    .print();

    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();

    if input.is_empty() {
        Ok(default.map(|s| s.to_string()).unwrap_or(input))
    } else {
        Ok(input)
    }
}

fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => Some(true),
        "n" | "no" | "false" => Some(false),
        _ => None,
    }
}

fn interactive_config() -> Result<()> {
    element!(ConfigHeader()).print();

    let current = config::read_config_file()?;

    let current_base_url = current
        .base_url
        .as_ref()
        .map(|url| url.to_string())
        .unwrap_or_else(|| streamable::DEFAULT_BASE_URL.to_string());
    let base_url = loop {
        let base_url_str = read_input(
            "Streamable API URL",
            Some(current_base_url.as_str()),
            Some("The endpoint the upload requests are sent to"),
        )?;

        match Url::parse(&base_url_str) {
            Ok(url) => break url,
            Err(e) => {
                element!(ErrorMessage(message: format!("Invalid URL: {}", e))).print();
                println!();
            }
        }
    };

    let username = read_input(
        "Default Username",
        current.username.as_deref(),
        Some("Optional: log in as this user when --user is not given"),
    )?;
    let username = if username.is_empty() {
        None
    } else {
        Some(username)
    };

    let current_clipboard = if current.clipboard.unwrap_or(false) {
        "y"
    } else {
        "n"
    };
    let clipboard = loop {
        let answer = read_input(
            "Copy URL to clipboard after upload? (y/n)",
            Some(current_clipboard),
            None,
        )?;
        match parse_yes_no(&answer) {
            Some(clipboard) => break clipboard,
            None => {
                element!(ErrorMessage(message: "Please answer y or n".to_string())).print();
                println!();
            }
        }
    };

    if let Some(username) = &username {
        let password = Password::new()
            .with_prompt(format!(
                "Password for {} (stored in OS keyring, leave empty to skip)",
                username
            ))
            .allow_empty_password(true)
            .interact()?;
        if !password.is_empty() {
            config::set_password_keyring(username, &password)?;
        }
    }

    let config_file = ConfigFile {
        base_url: Some(base_url),
        username,
        clipboard: Some(clipboard),
    };
    let path = config::write_config(config_file)
        .map_err(|e| anyhow!("Unable to save configuration: {:#}", e))?;

    element!(SuccessMessage(message: format!("Configuration saved to {}", path.display()))).print();

    Ok(())
}

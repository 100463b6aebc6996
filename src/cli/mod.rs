//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and dispatches each subcommand
//! to its handler. Handlers print user-facing results and exit non-zero on
//! failure.

pub mod auth;
pub mod chat;
pub mod context;
pub mod prompt;
pub mod say;

use std::error::Error;

use clap::{Parser, Subcommand};

use crate::cli::auth::{
    run_forgot_password, run_health, run_login, run_logout, run_register, run_resend_code,
    run_reset_password, run_verify, run_whoami,
};
use crate::cli::chat::run_chat;
use crate::cli::say::{run_conversations, run_messages, run_say};
use crate::core::config::{Config, ConfigKey};
use crate::core::constants::API_BASE_URL_ENV;
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "parlor")]
#[command(about = "Command-line client for the Parlor chat service")]
#[command(
    long_about = "Parlor signs you in to a Parlor chat server and lets you talk to its \
assistant from the terminal. Sessions persist between runs until you log out \
or the access token expires.\n\n\
Configuration:\n\
  Use 'parlor set api-base-url <url>' to point at your server.\n\n\
Environment Variables:\n\
  PARLOR_API_BASE_URL   API base URL (overrides the config file)\n\
  RUST_LOG              Log filter for diagnostics on stderr (default: parlor=warn)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: Option<String>,
        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(short, long)]
        email: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// Password (prompted for twice when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Confirm your email with the code you were sent
    Verify {
        #[arg(short, long)]
        email: Option<String>,
        code: Option<String>,
    },
    /// Send a new verification code
    ResendCode {
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Request a password reset email
    ForgotPassword {
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Set a new password using the token from a reset email
    ResetPassword {
        token: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and remove stored credentials
    Logout,
    /// Show who is signed in
    Whoami,
    /// Check that the server is reachable
    Health,
    /// List your conversations
    Conversations,
    /// Print the messages of a conversation
    Messages {
        conversation: i64,
    },
    /// Send one message and print the reply
    Say {
        /// Continue this conversation instead of starting a new one
        #[arg(short, long)]
        conversation: Option<i64>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Chat interactively (default)
    Chat {
        #[arg(short, long)]
        conversation: Option<i64>,
    },
    /// Set configuration values, or show them when no key is given
    Set {
        key: Option<String>,
        value: Option<String>,
    },
    /// Unset configuration values
    Unset {
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args
        .command
        .unwrap_or(Commands::Chat { conversation: None })
    {
        Commands::Login { email, password } => run_login(email, password).await,
        Commands::Register {
            email,
            first_name,
            last_name,
            password,
        } => run_register(email, first_name, last_name, password).await,
        Commands::Verify { email, code } => run_verify(email, code).await,
        Commands::ResendCode { email } => run_resend_code(email).await,
        Commands::ForgotPassword { email } => run_forgot_password(email).await,
        Commands::ResetPassword { token, password } => run_reset_password(token, password).await,
        Commands::Logout => run_logout(),
        Commands::Whoami => run_whoami().await,
        Commands::Health => run_health().await,
        Commands::Conversations => run_conversations().await,
        Commands::Messages { conversation } => run_messages(conversation).await,
        Commands::Say {
            conversation,
            prompt,
        } => run_say(conversation, prompt).await,
        Commands::Chat { conversation } => run_chat(conversation).await,
        Commands::Set { key, value } => handle_set(key, value),
        Commands::Unset { key } => handle_unset(&key),
    }
}

fn handle_set(key: Option<String>, value: Option<String>) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    let (Some(key), Some(value)) = (key, value) else {
        config.print_all();
        if std::env::var(API_BASE_URL_ENV).is_ok() {
            println!("  ({API_BASE_URL_ENV} is set and overrides api-base-url)");
        }
        return Ok(());
    };

    let Some(config_key) = ConfigKey::parse(&key) else {
        eprintln!("❌ Unknown config key: {key}");
        eprintln!("   Available keys: {}", ConfigKey::known_keys());
        std::process::exit(1);
    };
    if let Err(message) = config.set_value(config_key, &value) {
        eprintln!("❌ {message}");
        std::process::exit(1);
    }
    config.save()?;
    println!("✅ Set {key} to: {}", value.trim());
    Ok(())
}

fn handle_unset(key: &str) -> Result<(), Box<dyn Error>> {
    let Some(config_key) = ConfigKey::parse(key) else {
        eprintln!("❌ Unknown config key: {key}");
        eprintln!("   Available keys: {}", ConfigKey::known_keys());
        std::process::exit(1);
    };
    let mut config = Config::load()?;
    config.unset_value(config_key);
    config.save()?;
    println!("✅ Unset {key}");
    Ok(())
}

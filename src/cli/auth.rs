//! Account commands: sign in and out, registration, verification, and
//! password recovery.

use std::error::Error;

use crate::api::models::{
    EmailVerificationRequest, LoginCredentials, PasswordReset, PasswordResetRequest,
    RegisterData, ResendVerificationRequest,
};
use crate::cli::context::ClientContext;
use crate::cli::prompt::{read_line, value_or_prompt};
use crate::core::session::LoginOutcome;
use crate::utils::validation::{
    validate_email_present, validate_new_password, validate_reset_token, validate_verification,
};

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {message}");
    std::process::exit(1);
}

pub async fn run_login(
    email: Option<String>,
    password: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    let email = value_or_prompt(email, "Email")?;
    let password = value_or_prompt(password, "Password")?;

    let outcome = context
        .session
        .login(&LoginCredentials { email, password })
        .await;
    report_sign_in(outcome)
}

fn report_sign_in(outcome: LoginOutcome) -> Result<(), Box<dyn Error>> {
    match outcome {
        LoginOutcome::Success { user } => {
            println!("✅ Signed in as {} <{}>", user.display_name(), user.email);
            Ok(())
        }
        LoginOutcome::Failure {
            message,
            requires_verification: true,
            email,
        } => {
            eprintln!("❌ {message}");
            let email = email.unwrap_or_else(|| "<email>".to_string());
            eprintln!("   Verify your account with: parlor verify --email {email} <code>");
            std::process::exit(1);
        }
        LoginOutcome::Failure { message, .. } => fail(message),
    }
}

pub async fn run_register(
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    password: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    let email = value_or_prompt(email, "Email")?;
    let (password, confirmation) = password_pair(password, "Password")?;

    if let Err(message) = validate_new_password(&password, &confirmation) {
        fail(message);
    }

    let data = RegisterData {
        email: email.clone(),
        password,
        password_confirmation: confirmation,
        first_name,
        last_name,
    };
    match context.api.register(&data).await {
        Ok(response) => {
            println!(
                "✅ {}",
                response
                    .message
                    .unwrap_or_else(|| "Registration successful".to_string())
            );
            println!("   A verification code was sent to {email}.");
            println!("   Finish with: parlor verify --email {email} <code>");
            Ok(())
        }
        Err(err) => fail(err),
    }
}

/// A password passed on the command line counts as already confirmed;
/// otherwise it is typed twice.
fn password_pair(given: Option<String>, label: &str) -> Result<(String, String), Box<dyn Error>> {
    match given {
        Some(password) => Ok((password.clone(), password)),
        None => {
            let password = read_line(label)?;
            let confirmation = read_line(&format!("Confirm {}", label.to_lowercase()))?;
            Ok((password, confirmation))
        }
    }
}

pub async fn run_verify(email: Option<String>, code: Option<String>) -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    let email = value_or_prompt(email, "Email")?;
    let code = value_or_prompt(code, "Verification code")?;
    if let Err(message) = validate_verification(&email, &code) {
        fail(message);
    }

    let outcome = context
        .session
        .verify_email(&EmailVerificationRequest {
            email,
            verification_code: code.trim().to_string(),
        })
        .await;
    report_sign_in(outcome)
}

pub async fn run_resend_code(email: Option<String>) -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    let email = value_or_prompt(email, "Email")?;
    if let Err(message) = validate_email_present(&email) {
        fail(message);
    }

    match context
        .api
        .resend_verification_code(&ResendVerificationRequest { email })
        .await
    {
        Ok(response) => {
            println!("✅ {}", response.message);
            Ok(())
        }
        Err(err) => fail(err),
    }
}

pub async fn run_forgot_password(email: Option<String>) -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    let email = value_or_prompt(email, "Email")?;
    if let Err(message) = validate_email_present(&email) {
        fail(message);
    }

    match context
        .api
        .send_password_reset_email(&PasswordResetRequest { email })
        .await
    {
        Ok(response) => {
            println!("✅ {}", response.message);
            Ok(())
        }
        Err(err) => fail(err),
    }
}

pub async fn run_reset_password(
    token: String,
    password: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    if let Err(message) = validate_reset_token(&token) {
        fail(message);
    }
    let (password, confirmation) = password_pair(password, "New password")?;
    if let Err(message) = validate_new_password(&password, &confirmation) {
        fail(message);
    }

    let request = PasswordReset {
        token,
        new_password: password,
        new_password_confirmation: confirmation,
    };
    match context.api.reset_password(&request).await {
        Ok(response) => {
            println!("✅ {}", response.message);
            Ok(())
        }
        Err(err) => fail(err),
    }
}

pub fn run_logout() -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    context
        .session
        .logout(|| println!("✅ Signed out. Stored credentials were removed."));
    Ok(())
}

pub async fn run_whoami() -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    let snapshot = context.session.mount().await;
    match snapshot.user {
        Some(user) if snapshot.is_authenticated() => {
            println!("{} <{}> (id {})", user.display_name(), user.email, user.id);
            Ok(())
        }
        _ => fail("Not signed in."),
    }
}

pub async fn run_health() -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    match context.api.health_check().await {
        Ok(response) => {
            println!("✅ {} is up ({})", context.api.base_url(), response.status);
            Ok(())
        }
        Err(err) => fail(format!("{} is not healthy: {err}", context.api.base_url())),
    }
}

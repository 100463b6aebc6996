//! Checks run on form input before it is sent to the server.

pub const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";
const MIN_PASSWORD_LEN: usize = 8;

pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number".to_string());
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        return Err(format!(
            "Password must contain at least one special character ({PASSWORD_SPECIALS})"
        ));
    }
    Ok(())
}

/// Confirmation first, then strength.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), String> {
    if password != confirmation {
        return Err("Passwords do not match".to_string());
    }
    validate_password_strength(password)
}

pub fn validate_verification(email: &str, code: &str) -> Result<(), String> {
    if email.trim().is_empty() || code.trim().is_empty() {
        return Err("Please enter email and verification code".to_string());
    }
    Ok(())
}

pub fn validate_email_present(email: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("Please enter your email address".to_string());
    }
    Ok(())
}

pub fn validate_reset_token(token: &str) -> Result<(), String> {
    if token.trim().is_empty() {
        return Err("Invalid reset token".to_string());
    }
    Ok(())
}

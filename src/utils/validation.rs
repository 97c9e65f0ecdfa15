use crate::utils::error::{AppError, AppResult};

pub const MAX_MESSAGE_LENGTH: usize = 4000;

fn is_printable_ascii(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii() && !c.is_ascii_control())
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if username.is_empty() {
        return Err(AppError::Validation("Username cannot be empty".to_string()));
    }

    if username.len() > 64 {
        return Err(AppError::Validation(
            "Username must be at most 64 characters long".to_string(),
        ));
    }

    if !is_printable_ascii(username) || username.contains(' ') {
        return Err(AppError::Validation(
            "Username must contain only printable ASCII characters without spaces".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_full_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Full name cannot be empty".to_string()));
    }

    if name.chars().count() > 128 {
        return Err(AppError::Validation(
            "Full name must be at most 128 characters long".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters long".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_user_id(user_id: &str) -> AppResult<()> {
    if user_id.trim().is_empty() {
        return Err(AppError::Validation("User id cannot be empty".to_string()));
    }

    Ok(())
}

pub fn validate_message_text(text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "Message text cannot be empty".to_string(),
        ));
    }

    if text.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AppError::Validation(format!(
            "Message text must be at most {} characters long",
            MAX_MESSAGE_LENGTH
        )));
    }

    Ok(())
}

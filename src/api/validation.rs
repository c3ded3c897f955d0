//! Request field validation. Runs before anything reaches the session layer.

use super::error::ApiError;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 30;
const PASSWORD_MIN: usize = 6;
const BIO_MAX: usize = 500;

pub const PAGE_LIMIT_DEFAULT: i64 = 10;
pub const PAGE_LIMIT_MAX: i64 = 100;

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ApiError::bad_request(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::bad_request(
            "Username can only contain letters and numbers",
        ));
    }
    Ok(())
}

/// Accepts `local@domain.tld` with no whitespace.
pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let invalid = || ApiError::bad_request("Please provide a valid email");
    let email = email.trim();

    if email.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || host.starts_with('.') || tld.len() < 2 {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN
        )));
    }
    Ok(())
}

pub fn validate_bio(bio: &str) -> Result<(), ApiError> {
    if bio.chars().count() > BIO_MAX {
        return Err(ApiError::bad_request(format!(
            "Bio cannot exceed {} characters",
            BIO_MAX
        )));
    }
    Ok(())
}

pub fn validate_required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(())
}

/// Resolve `page`/`limit` query values. Page is 1-based, and the row
/// offset it implies must fit in an `i64`.
pub fn pagination(page: Option<i64>, limit: Option<i64>) -> Result<(i64, i64), ApiError> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(ApiError::bad_request("Page must be at least 1"));
    }
    let limit = limit.unwrap_or(PAGE_LIMIT_DEFAULT);
    if !(1..=PAGE_LIMIT_MAX).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "Limit must be between 1 and {}",
            PAGE_LIMIT_MAX
        )));
    }
    if (page - 1).checked_mul(limit).is_none() {
        return Err(ApiError::bad_request("Page is out of range"));
    }
    Ok((page, limit))
}

use lazy_static::lazy_static;
use regex::Regex;

use crate::rest::{ApiError, MSG_INVALID_ARGUMENTS};

pub const EMAIL_MAX_LEN: usize = 40;

/// Request bodies implement this so `ValidatedJson` can reject them after binding.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^[1-9]?[0-9]{7,14}$").unwrap();
    static ref PASSWORD_RE: Regex = Regex::new(r"^[\x21-\x7E]{8,36}$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= EMAIL_MAX_LEN && EMAIL_RE.is_match(email)
}

/// Digits only, no leading `+`.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// Printable ASCII without spaces, 8 to 36 characters.
pub fn is_valid_password(password: &str) -> bool {
    PASSWORD_RE.is_match(password)
}

pub fn is_valid_person_name(name: &str) -> bool {
    let len = name.chars().count();
    (2..=30).contains(&len) && name.chars().all(char::is_alphabetic)
}

pub fn is_valid_catalog_name(name: &str, max_len: usize) -> bool {
    (2..=max_len).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphabetic())
}

pub fn is_valid_personal_id(id: &str) -> bool {
    id.len() == 11 && id.chars().all(|c| c.is_ascii_digit())
}

/// Turns a failed check into the shared "Invalid arguments" rejection.
pub fn ensure(valid: bool) -> Result<(), ApiError> {
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request(MSG_INVALID_ARGUMENTS))
    }
}

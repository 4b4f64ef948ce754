use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::{User, UserChanges};
use crate::{
    auth::Role,
    rest::ApiError,
    validation::{
        ensure, is_valid_email, is_valid_password, is_valid_person_name, is_valid_personal_id,
        is_valid_phone, Validate,
    },
};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        ensure(
            is_valid_email(&self.email)
                && is_valid_phone(&self.phone_number)
                && is_valid_person_name(&self.first_name)
                && is_valid_person_name(&self.last_name)
                && is_valid_password(&self.password),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterProviderRequest {
    #[serde(flatten)]
    pub user: RegisterRequest,
    pub personal_id_number: String,
}

impl Validate for RegisterProviderRequest {
    fn validate(&self) -> Result<(), ApiError> {
        self.user.validate()?;
        ensure(is_valid_personal_id(&self.personal_id_number))
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        ensure(is_valid_email(&self.email) && is_valid_password(&self.password))
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

impl Validate for EmailRequest {
    fn validate(&self) -> Result<(), ApiError> {
        ensure(is_valid_email(&self.email))
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        ensure(
            self.first_name.as_deref().map_or(true, is_valid_person_name)
                && self.last_name.as_deref().map_or(true, is_valid_person_name)
                && self.phone_number.as_deref().map_or(true, is_valid_phone)
                && self.email.as_deref().map_or(true, is_valid_email),
        )
    }
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            phone_number: req.phone_number,
            email: req.email.map(|e| normalize_email(&e)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<(), ApiError> {
        ensure(is_valid_password(&self.old_password) && is_valid_password(&self.new_password))
    }
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access_token: String,
}

/// Public view of a user. Ids are strings since snowflakes exceed JSON-safe integers.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    pub role: Role,
    pub verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl UserResponse {
    pub fn new(user: User, picture_url: Option<String>) -> Self {
        Self {
            id: user.id.to_string(),
            first_name: user.first_name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            email: user.email,
            picture_url,
            role: user.role,
            verified: user.verified,
            created_at: user.created_at,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

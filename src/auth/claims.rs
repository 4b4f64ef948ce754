use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Customer,
    Provider,
    Admin,
}

/// Type of JWT. Each kind is signed with its own secret.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Verification,
}

/// JWT payload. `sub` is the user id rendered as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims<T> {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Claims<T> {
    pub fn user_id(&self) -> anyhow::Result<i64> {
        self.sub
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("subject is not a user id"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessData {
    pub role: Role,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshData {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationData {
    pub email: String,
}

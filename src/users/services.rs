use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{normalize_email, RegisterRequest, TokenPair},
    repo::UserRepository,
    repo_types::{NewProvider, NewUser, User, UserChanges},
    verification::VerificationRepository,
};
use crate::{
    auth::{HashError, JwtKeys, PasswordHasher, Role},
    db::RepoError,
    encryption::Encryptor,
    mailer::{Letter, Mailer},
    rest::{ApiError, MSG_UNSUPPORTED_MEDIA},
    storage::{image_extension, StorageClient},
};

pub const PICTURE_DIR: &str = "pfp";
const PREVIEW_LEN: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
    #[error("Email or Password is incorrect")]
    InvalidCredentials,
    #[error("Password is incorrect")]
    IncorrectPassword,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has already been used")]
    TokenUsed,
    #[error("User is already verified")]
    AlreadyVerified,
    #[error("No changes")]
    NoChanges,
    #[error("Unsupported media type")]
    UnsupportedMedia,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => ApiError::not_found(err.to_string()),
            UserError::AlreadyExists | UserError::TokenUsed | UserError::AlreadyVerified => {
                ApiError::conflict(err.to_string())
            }
            UserError::InvalidCredentials
            | UserError::IncorrectPassword
            | UserError::InvalidToken => ApiError::unauthorized(err.to_string()),
            UserError::NoChanges => ApiError::bad_request(err.to_string()),
            UserError::UnsupportedMedia => ApiError::bad_request(MSG_UNSUPPORTED_MEDIA),
            UserError::Repo(e) => ApiError::Internal(e.into()),
            UserError::Internal(e) => ApiError::Internal(e),
        }
    }
}

pub type UserResult<T> = Result<T, UserError>;

fn classify_write(err: RepoError) -> UserError {
    match err {
        RepoError::UniqueViolation => UserError::AlreadyExists,
        e => UserError::Repo(e),
    }
}

fn hash_failure(err: HashError) -> UserError {
    UserError::Internal(anyhow::anyhow!(err))
}

/// Last digits shown back to the provider instead of the full id.
pub fn personal_id_preview(personal_id: &str) -> String {
    let start = personal_id.len().saturating_sub(PREVIEW_LEN);
    personal_id[start..].to_string()
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    verification: Arc<dyn VerificationRepository>,
    mailer: Arc<dyn Mailer>,
    hasher: PasswordHasher,
    encryptor: Encryptor,
    keys: JwtKeys,
    verify_url: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        verification: Arc<dyn VerificationRepository>,
        mailer: Arc<dyn Mailer>,
        hasher: PasswordHasher,
        encryptor: Encryptor,
        keys: JwtKeys,
        verify_url: String,
    ) -> Self {
        Self {
            users,
            verification,
            mailer,
            hasher,
            encryptor,
            keys,
            verify_url,
        }
    }

    fn new_user(&self, req: RegisterRequest, role: Role) -> UserResult<NewUser> {
        let hash = self.hasher.hash(&req.password).map_err(hash_failure)?;
        Ok(NewUser {
            first_name: req.first_name,
            last_name: req.last_name,
            phone_number: req.phone_number,
            email: normalize_email(&req.email),
            hash,
            role,
        })
    }

    #[instrument(skip(self, req))]
    pub async fn register_customer(&self, req: RegisterRequest) -> UserResult<User> {
        let new = self.new_user(req, Role::Customer)?;
        let user = self.users.create(&new).await.map_err(classify_write)?;
        info!(user_id = user.id, "customer registered");
        self.send_confirmation_in_background(&user);
        Ok(user)
    }

    #[instrument(skip(self, req, personal_id))]
    pub async fn register_provider(
        &self,
        req: RegisterRequest,
        personal_id: &str,
    ) -> UserResult<User> {
        let new = self.new_user(req, Role::Provider)?;
        let provider = NewProvider {
            encrypted_personal_id: self.encryptor.encrypt(personal_id.as_bytes())?,
            personal_id_preview: personal_id_preview(personal_id),
        };
        let user = self
            .users
            .create_provider(&new, &provider)
            .await
            .map_err(classify_write)?;
        info!(user_id = user.id, "provider registered");
        self.send_confirmation_in_background(&user);
        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> UserResult<TokenPair> {
        let email = normalize_email(email);
        let Some(user) = self.users.get_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(UserError::InvalidCredentials);
        };

        match self.hasher.verify(password, &user.hash) {
            Ok(()) => {}
            Err(HashError::PasswordMismatch) => {
                warn!(user_id = user.id, "login invalid password");
                return Err(UserError::InvalidCredentials);
            }
            Err(e) => return Err(hash_failure(e)),
        }

        let pair = TokenPair {
            access_token: self.keys.sign_access(user.id, user.role, user.verified)?,
            refresh_token: self.keys.sign_refresh(user.id)?,
        };
        info!(user_id = user.id, "user logged in");
        Ok(pair)
    }

    /// New access token carrying the current role and verified flag.
    pub async fn refresh(&self, user_id: i64) -> UserResult<String> {
        let user = self.users.get(user_id).await?.ok_or(UserError::NotFound)?;
        Ok(self.keys.sign_access(user.id, user.role, user.verified)?)
    }

    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &str) -> UserResult<User> {
        let claims = self
            .keys
            .verify_verification(token)
            .map_err(|_| UserError::InvalidToken)?;
        let user_id = claims.user_id().map_err(|_| UserError::InvalidToken)?;

        let user = self.users.get(user_id).await?.ok_or(UserError::NotFound)?;
        if user.email != claims.data.email {
            warn!(user_id, "verification token issued for another email");
            return Err(UserError::InvalidToken);
        }

        let remaining = claims.exp as i64 - OffsetDateTime::now_utc().unix_timestamp();
        let ttl = Duration::from_secs(remaining.max(1) as u64);
        if !self.verification.mark_token_used(token, ttl).await? {
            return Err(UserError::TokenUsed);
        }

        if !self.users.set_verified(user_id).await? {
            return Err(UserError::NotFound);
        }
        info!(user_id, "email verified");

        self.send_in_background(user.email.clone(), Letter::verified(&user.first_name));
        Ok(User {
            verified: true,
            ..user
        })
    }

    #[instrument(skip(self))]
    pub async fn resend_confirmation(&self, email: &str) -> UserResult<()> {
        let user = self
            .users
            .get_by_email(&normalize_email(email))
            .await?
            .ok_or(UserError::NotFound)?;
        if user.verified {
            return Err(UserError::AlreadyVerified);
        }
        let letter = self.confirmation_letter(&user)?;
        self.mailer.send(&user.email, letter).await?;
        Ok(())
    }

    fn confirmation_letter(&self, user: &User) -> UserResult<Letter> {
        let token = self.keys.sign_verification(user.id, &user.email)?;
        Ok(Letter::confirmation(&user.first_name, &self.verify_url, &token))
    }

    fn send_confirmation_in_background(&self, user: &User) {
        match self.confirmation_letter(user) {
            Ok(letter) => self.send_in_background(user.email.clone(), letter),
            Err(e) => error!(error = %e, user_id = user.id, "sign verification token failed"),
        }
    }

    fn send_in_background(&self, to: String, letter: Letter) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, letter).await {
                error!(error = ?e, "send letter failed");
            }
        });
    }
}

/// Uploaded picture as read from the multipart body.
#[derive(Debug, Clone)]
pub struct Upload {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    storage: Arc<dyn StorageClient>,
    hasher: PasswordHasher,
    url_expiry_secs: u64,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn StorageClient>,
        hasher: PasswordHasher,
        url_expiry_secs: u64,
    ) -> Self {
        Self {
            users,
            storage,
            hasher,
            url_expiry_secs,
        }
    }

    pub async fn get(&self, id: i64) -> UserResult<User> {
        self.users.get(id).await?.ok_or(UserError::NotFound)
    }

    /// Signed URL of the user's picture, if any.
    pub async fn picture_url(&self, user: &User) -> UserResult<Option<String>> {
        let Some(name) = user.picture_name.as_deref() else {
            return Ok(None);
        };
        let url = self.storage.presign_get(name, self.url_expiry_secs).await?;
        Ok(Some(url))
    }

    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: i64, changes: UserChanges) -> UserResult<User> {
        if changes.is_empty() {
            return Err(UserError::NoChanges);
        }
        let user = self
            .users
            .update(id, &changes)
            .await
            .map_err(classify_write)?
            .ok_or(UserError::NotFound)?;
        info!(user_id = id, "personal info updated");
        Ok(user)
    }

    #[instrument(skip(self, upload), fields(content_type = %upload.content_type))]
    pub async fn set_picture(&self, id: i64, upload: Upload) -> UserResult<User> {
        let ext = image_extension(&upload.content_type).ok_or(UserError::UnsupportedMedia)?;
        let user = self.get(id).await?;

        let key = format!("{PICTURE_DIR}/{}.{ext}", Uuid::new_v4().simple());
        self.storage
            .put_object(&key, upload.body, &upload.content_type)
            .await?;

        if !self.users.set_picture(id, Some(&key)).await? {
            self.discard(&key).await;
            return Err(UserError::NotFound);
        }
        if let Some(old) = user.picture_name.as_deref() {
            self.discard(old).await;
        }
        info!(user_id = id, key = %key, "picture updated");

        Ok(User {
            picture_name: Some(key),
            ..user
        })
    }

    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        id: i64,
        old_password: &str,
        new_password: &str,
    ) -> UserResult<()> {
        let user = self.get(id).await?;
        match self.hasher.verify(old_password, &user.hash) {
            Ok(()) => {}
            Err(HashError::PasswordMismatch) => return Err(UserError::IncorrectPassword),
            Err(e) => return Err(hash_failure(e)),
        }

        let hash = self.hasher.hash(new_password).map_err(hash_failure)?;
        if !self.users.set_hash(id, &hash).await? {
            return Err(UserError::NotFound);
        }
        info!(user_id = id, "password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> UserResult<()> {
        let user = self.get(id).await?;
        if let Some(picture) = user.picture_name.as_deref() {
            self.storage.delete_object(picture).await?;
        }
        if !self.users.delete(id).await? {
            return Err(UserError::NotFound);
        }
        info!(user_id = id, "user deleted");
        Ok(())
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.storage.delete_object(key).await {
            warn!(error = ?e, key = %key, "delete stale picture failed");
        }
    }
}

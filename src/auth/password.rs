use argon2::{Algorithm, Argon2, Params, Version};
use base64ct::{Base64Unpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use tracing::error;

use crate::config::Argon2Config;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("password does not match")]
    PasswordMismatch,
    #[error("malformed password hash")]
    Malformed,
    #[error("argon2: {0}")]
    Argon2(String),
}

/// Argon2id hasher storing `b64(key) ‖ b64(salt)` with unpadded standard base64.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    salt_len: usize,
    key_len: usize,
    params: Params,
}

impl PasswordHasher {
    pub fn new(cfg: &Argon2Config) -> Result<Self, HashError> {
        let params = Params::new(cfg.memory, cfg.time, cfg.threads, Some(cfg.key_len))
            .map_err(|e| HashError::Argon2(e.to_string()))?;
        Ok(Self {
            salt_len: cfg.salt_len,
            key_len: cfg.key_len,
            params,
        })
    }

    pub fn hash(&self, plain: &str) -> Result<String, HashError> {
        let mut salt = vec![0u8; self.salt_len];
        OsRng.fill_bytes(&mut salt);

        let key = self.derive(plain, &salt)?;
        let mut encoded = Base64Unpadded::encode_string(&key);
        encoded.push_str(&Base64Unpadded::encode_string(&salt));
        Ok(encoded)
    }

    pub fn verify(&self, plain: &str, stored: &str) -> Result<(), HashError> {
        let breakpoint = self.breakpoint();
        if !stored.is_char_boundary(breakpoint) || stored.len() <= breakpoint {
            return Err(HashError::Malformed);
        }
        let (key_part, salt_part) = stored.split_at(breakpoint);
        let salt = Base64Unpadded::decode_vec(salt_part).map_err(|_| HashError::Malformed)?;

        let key = self.derive(plain, &salt)?;
        if Base64Unpadded::encode_string(&key) == key_part {
            Ok(())
        } else {
            Err(HashError::PasswordMismatch)
        }
    }

    /// Length of the encoded key prefix.
    fn breakpoint(&self) -> usize {
        (self.key_len * 4).div_ceil(3)
    }

    fn derive(&self, plain: &str, salt: &[u8]) -> Result<Vec<u8>, HashError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let mut key = vec![0u8; self.key_len];
        argon2
            .hash_password_into(plain.as_bytes(), salt, &mut key)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password_into error");
                HashError::Argon2(e.to_string())
            })?;
        Ok(key)
    }
}

use std::{sync::Arc, time::Duration};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{AccessData, Claims, RefreshData, Role, TokenKind, VerificationData};
use crate::config::JwtConfig;

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeyPair {
    fn new(name: &str, secret: &str, ttl_minutes: i64) -> anyhow::Result<Self> {
        if secret.trim().is_empty() {
            anyhow::bail!("jwt {name} secret is empty");
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs(ttl_minutes.max(0) as u64 * 60),
        })
    }
}

struct KeySet {
    access: KeyPair,
    refresh: KeyPair,
    verification: KeyPair,
    issuer: String,
    audience: String,
}

#[derive(Clone)]
pub struct JwtKeys {
    inner: Arc<KeySet>,
}

impl JwtKeys {
    /// Fails when any of the three secrets is blank.
    pub fn new(cfg: &JwtConfig) -> anyhow::Result<Self> {
        Ok(Self {
            inner: Arc::new(KeySet {
                access: KeyPair::new("access", &cfg.access_secret, cfg.access_ttl_minutes)?,
                refresh: KeyPair::new("refresh", &cfg.refresh_secret, cfg.refresh_ttl_minutes)?,
                verification: KeyPair::new(
                    "verification",
                    &cfg.verification_secret,
                    cfg.verification_ttl_minutes,
                )?,
                issuer: cfg.issuer.clone(),
                audience: cfg.audience.clone(),
            }),
        })
    }

    fn pair(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.inner.access,
            TokenKind::Refresh => &self.inner.refresh,
            TokenKind::Verification => &self.inner.verification,
        }
    }

    fn sign<T: Serialize>(&self, user_id: i64, kind: TokenKind, data: T) -> anyhow::Result<String> {
        let pair = self.pair(kind);
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(pair.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.inner.issuer.clone(),
            aud: self.inner.audience.clone(),
            kind,
            data,
        };
        let token = encode(&Header::default(), &claims, &pair.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    fn verify<T: DeserializeOwned>(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims<T>> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.inner.audience));
        validation.set_issuer(std::slice::from_ref(&self.inner.issuer));
        let data = decode::<Claims<T>>(token, &self.pair(kind).decoding, &validation)?;
        if data.claims.kind != kind {
            anyhow::bail!("expected {kind:?} token, got {:?}", data.claims.kind);
        }
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn sign_access(&self, user_id: i64, role: Role, verified: bool) -> anyhow::Result<String> {
        self.sign(user_id, TokenKind::Access, AccessData { role, verified })
    }

    pub fn sign_refresh(&self, user_id: i64) -> anyhow::Result<String> {
        self.sign(user_id, TokenKind::Refresh, RefreshData {})
    }

    pub fn sign_verification(&self, user_id: i64, email: &str) -> anyhow::Result<String> {
        let data = VerificationData {
            email: email.to_string(),
        };
        self.sign(user_id, TokenKind::Verification, data)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims<AccessData>> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims<RefreshData>> {
        self.verify(token, TokenKind::Refresh)
    }

    pub fn verify_verification(&self, token: &str) -> anyhow::Result<Claims<VerificationData>> {
        self.verify(token, TokenKind::Verification)
    }
}

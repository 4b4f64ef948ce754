use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use crate::config::RedisConfig;

const KEY_PREFIX: &str = "verification:";

/// One-time-use bookkeeping for email confirmation tokens.
#[async_trait]
pub trait VerificationRepository: Send + Sync {
    /// Returns `false` when the token was consumed before.
    async fn mark_token_used(&self, token: &str, ttl: Duration) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct RedisVerificationRepository {
    conn: ConnectionManager,
}

impl RedisVerificationRepository {
    pub async fn connect(cfg: &RedisConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(cfg.url()).context("redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("connect to redis")?;
        info!(host = %cfg.host, db = cfg.db, "redis connected");
        Ok(Self { conn })
    }
}

fn key(token: &str) -> String {
    format!("{KEY_PREFIX}{token}")
}

#[async_trait]
impl VerificationRepository for RedisVerificationRepository {
    async fn mark_token_used(&self, token: &str, ttl: Duration) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key(token))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .context("redis SET NX")?;
        let fresh = reply.is_some();
        debug!(fresh, "verification token marked");
        Ok(fresh)
    }
}

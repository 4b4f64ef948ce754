use anyhow::Context;
use sqlx::{
    migrate::Migrator,
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use tracing::info;

use crate::config::PostgresConfig;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const RAISE_EXCEPTION: &str = "P0001";

pub async fn connect(cfg: &PostgresConfig) -> anyhow::Result<PgPool> {
    let options = PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.db);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect_with(options)
        .await
        .context("connect to database")?;

    info!(host = %cfg.host, db = %cfg.db, "postgres connected");
    Ok(pool)
}

/// Applies one service's migration set. Services may share a database, so
/// versions applied by another service's set are not an error.
pub async fn migrate(pool: &PgPool, mut migrator: Migrator, service: &str) -> anyhow::Result<()> {
    migrator.set_ignore_missing(true);
    migrator
        .run(pool)
        .await
        .with_context(|| format!("{service} migrations"))?;
    info!(service, "migrations applied");
    Ok(())
}

/// Driver errors, classified by SQLSTATE.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("foreign key constraint violated")]
    ForeignKeyViolation,
    #[error("exception raised: {0}")]
    RaisedException(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        };
        match code.as_deref() {
            Some(UNIQUE_VIOLATION) => Self::UniqueViolation,
            Some(FOREIGN_KEY_VIOLATION) => Self::ForeignKeyViolation,
            Some(RAISE_EXCEPTION) => {
                let message = match &err {
                    sqlx::Error::Database(db) => db.message().to_string(),
                    _ => String::new(),
                };
                Self::RaisedException(message)
            }
            _ => Self::Database(err),
        }
    }
}

impl RepoError {
    /// Both a unique index and a guarding trigger mean the name is taken.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UniqueViolation | Self::RaisedException(_))
    }
}

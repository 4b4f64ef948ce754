use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Snowflake node id of this instance.
    pub instance_id: i64,
    pub shutdown_timeout_secs: u64,
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance_id: 1,
            shutdown_timeout_secs: 10,
            production: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db: String,
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: "postgres".into(),
            db: "postgres".into(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        match self.password.as_deref() {
            Some(password) if !password.is_empty() => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_secret: String,
    pub refresh_ttl_minutes: i64,
    pub verification_secret: String,
    pub verification_ttl_minutes: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "servicehub".into(),
            audience: "servicehub-users".into(),
            access_secret: String::new(),
            access_ttl_minutes: 15,
            refresh_secret: String::new(),
            refresh_ttl_minutes: 60 * 24 * 14,
            verification_secret: String::new(),
            verification_ttl_minutes: 60 * 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Argon2Config {
    pub salt_len: usize,
    pub key_len: usize,
    pub time: u32,
    /// Memory cost in KiB.
    pub memory: u32,
    pub threads: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            salt_len: 16,
            key_len: 32,
            time: 2,
            memory: 19 * 1024,
            threads: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AesConfig {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub url_expiry_secs: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".into(),
            endpoint: None,
            access_key: String::new(),
            secret_key: String::new(),
            bucket: "servicehub".into(),
            url_expiry_secs: 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
    /// Redirects every letter to `from`.
    pub dev: bool,
    /// Confirmation link base, the token is appended as `?token=`.
    pub verify_url: String,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 587,
            user: String::new(),
            password: String::new(),
            from: "no-reply@servicehub.local".into(),
            dev: true,
            verify_url: "http://localhost:8080/v1/auth/verify".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_per_page: i64,
    pub max_per_page: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: 20,
            max_per_page: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub argon2: Argon2Config,
    pub aes: AesConfig,
    pub aws: AwsConfig,
    pub mailer: MailerConfig,
    pub pagination: PaginationConfig,
}

impl AppConfig {
    /// Reads the YAML file named by `CONFIG_PATH` and applies env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(raw).context("parse yaml config")
    }

    /// Secrets and the listen address come from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };

        set(&mut self.http.host, "APP_HOST");
        set(&mut self.postgres.user, "POSTGRES_USER");
        set(&mut self.postgres.password, "POSTGRES_PASSWORD");
        set(&mut self.postgres.db, "POSTGRES_DB");
        set(&mut self.jwt.access_secret, "JWT_ACCESS_SECRET");
        set(&mut self.jwt.refresh_secret, "JWT_REFRESH_SECRET");
        set(&mut self.jwt.verification_secret, "JWT_VERIFICATION_SECRET");
        set(&mut self.aes.key, "AES_KEY");
        set(&mut self.aws.access_key, "AWS_ACCESS_KEY");
        set(&mut self.aws.secret_key, "AWS_SECRET_KEY");
        set(&mut self.mailer.user, "SMTP_USER");
        set(&mut self.mailer.password, "SMTP_PASSWORD");

        if let Some(password) = lookup("REDIS_PASSWORD") {
            self.redis.password = Some(password);
        }
        if let Some(port) = lookup("APP_PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.http.port = port;
        }
    }
}

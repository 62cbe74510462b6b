use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Flat delivery fee in minor currency units.
    pub delivery_fee: i64,
    pub source_read_timeout: Duration,
    pub submit_timeout: Duration,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub webhook_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let delivery_fee = env::var("DELIVERY_FEE")
            .ok()
            .and_then(|f| f.parse::<i64>().ok())
            .filter(|f| *f >= 0)
            .unwrap_or(1000);
        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            delivery_fee,
            source_read_timeout: millis_from_env("SOURCE_READ_TIMEOUT_MS", 5_000),
            submit_timeout: millis_from_env("SUBMIT_TIMEOUT_MS", 10_000),
            mail_api_url: optional_var("MAIL_API_URL"),
            mail_api_key: optional_var("MAIL_API_KEY"),
            webhook_secret: optional_var("WEBHOOK_SECRET"),
        })
    }

    /// Configuration with every optional setting at its default.
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            jwt_secret: jwt_secret.into(),
            delivery_fee: 1000,
            source_read_timeout: Duration::from_millis(5_000),
            submit_timeout: Duration::from_millis(10_000),
            mail_api_url: None,
            mail_api_key: None,
            webhook_secret: None,
        }
    }
}

fn millis_from_env(key: &str, default: u64) -> Duration {
    let millis = env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_millis(millis)
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

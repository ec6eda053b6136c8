use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub cron_secret: String,
    pub server_host: String,
    pub server_port: u16,
    /// Upper bound for every round-trip to the confirmation store.
    pub store_timeout: Duration,
    /// When set, the deadline scan also runs in-process on this interval.
    pub scan_interval: Option<Duration>,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;

        let cron_secret = env::var("CRON_SECRET")?;
        if cron_secret.trim().is_empty() {
            return Err("CRON_SECRET must not be empty".into());
        }

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        let store_timeout_secs: u64 = env::var("STORE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        if store_timeout_secs == 0 {
            return Err("STORE_TIMEOUT_SECS must be greater than zero".into());
        }

        let scan_interval = match env::var("SCAN_INTERVAL_SECS") {
            Ok(val) => Some(Self::parse_interval(&val)?),
            Err(_) => None,
        };

        let run_migrations = env::var("RUN_MIGRATIONS")
            .map(|v| Self::parse_flag(&v))
            .unwrap_or(true);

        Ok(Config {
            database_url,
            cron_secret,
            server_host,
            server_port,
            store_timeout: Duration::from_secs(store_timeout_secs),
            scan_interval,
            run_migrations,
        })
    }

    fn parse_interval(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
        let secs: u64 = value.trim().parse()?;
        if secs == 0 {
            return Err("SCAN_INTERVAL_SECS must be greater than zero".into());
        }
        Ok(Duration::from_secs(secs))
    }

    fn parse_flag(value: &str) -> bool {
        !matches!(value.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off")
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

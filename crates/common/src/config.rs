/// Which Kalshi environment the process trades against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KalshiEnv {
    Demo,
    Prod,
}

impl KalshiEnv {
    /// Base URL including the `/trade-api/v2` prefix.
    pub fn base_url(&self) -> &'static str {
        match self {
            KalshiEnv::Demo => "https://demo-api.kalshi.co/trade-api/v2",
            KalshiEnv::Prod => "https://api.elections.kalshi.com/trade-api/v2",
        }
    }
}

impl std::fmt::Display for KalshiEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KalshiEnv::Demo => write!(f, "demo"),
            KalshiEnv::Prod => write!(f, "prod"),
        }
    }
}

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Kalshi credentials
    pub kalshi_api_key_id: String,
    /// PEM-encoded RSA private key. May contain literal `\n` escapes.
    pub kalshi_private_key: String,
    pub kalshi_env: KalshiEnv,

    // Dashboard
    pub dashboard_token: String,
    pub dashboard_port: u16,

    // Database
    pub database_url: String,

    // Scheduler
    pub reconcile_interval_secs: u64,
    pub snapshot_interval_secs: u64,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let kalshi_env = match required_env("KALSHI_ENV").to_lowercase().as_str() {
            "demo" => KalshiEnv::Demo,
            "prod" => KalshiEnv::Prod,
            other => panic!("ERROR: KALSHI_ENV must be 'demo' or 'prod', got: '{other}'"),
        };

        Config {
            kalshi_api_key_id: required_env("KALSHI_API_KEY_ID"),
            kalshi_private_key: required_env("KALSHI_PRIVATE_KEY"),
            kalshi_env,
            dashboard_token: required_env("DASHBOARD_TOKEN"),
            dashboard_port: optional_env("DASHBOARD_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            database_url: required_env("DATABASE_URL"),
            reconcile_interval_secs: optional_env("RECONCILE_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            snapshot_interval_secs: optional_env("SNAPSHOT_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

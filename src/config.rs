use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Directory where generated `<license_id>.lic` files are stored.
    pub artifacts_dir: String,
    /// Pre-shared key for artifact signing. Injected here rather than
    /// compiled in; the deployed external decoder holds the same bytes.
    pub signing_key: String,
    /// Shared secret authenticating purchase-completed webhook deliveries.
    pub webhook_secret: String,
    pub dev_mode: bool,
    /// Per-IP requests per minute for public endpoints.
    pub rate_limit_standard_rpm: u32,
    pub rate_limit_relaxed_rpm: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("TRADEKEY_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let signing_key = env::var("LICENSE_SIGNING_KEY")
            .expect("LICENSE_SIGNING_KEY must be set (pre-shared artifact key)");
        let webhook_secret = env::var("PURCHASE_WEBHOOK_SECRET")
            .expect("PURCHASE_WEBHOOK_SECRET must be set (purchase event HMAC secret)");

        let rate_limit_standard_rpm: u32 = env::var("RATE_LIMIT_STANDARD_RPM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let rate_limit_relaxed_rpm: u32 = env::var("RATE_LIMIT_RELAXED_RPM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "tradekey.db".to_string()),
            artifacts_dir: env::var("ARTIFACTS_DIR").unwrap_or_else(|_| "licenses".to_string()),
            signing_key,
            webhook_secret,
            dev_mode,
            rate_limit_standard_rpm,
            rate_limit_relaxed_rpm,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// src/config.rs

use std::env;

use dotenvy::dotenv;
use url::Url;

/// How many tokens are tried before a result insert gives up on collisions.
pub const RESULT_TOKEN_MAX_ATTEMPTS: usize = 3;

/// Category reported when nothing could be scored.
pub const DEFAULT_TOP_CATEGORY: &str = "General";

const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:5173",
    "http://localhost:5174",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:5174",
];

/// Outgoing mail settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// JSON relay endpoint. `None` selects the logging transport.
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from_email: String,
    pub from_name: String,
    /// Operator address for new-attempt notifications.
    pub owner_email: Option<String>,
    /// Public site that renders results, used to build the link in the welcome mail.
    pub results_site: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. Without it the service keeps everything in memory.
    pub database_url: Option<String>,
    pub rust_log: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Directory of quiz JSON documents loaded into the catalog at startup.
    pub quiz_seed_dir: Option<String>,
    pub mail: MailConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = non_empty_var("DATABASE_URL");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5000);

        let cors_origins = non_empty_var("CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect());

        let results_site = non_empty_var("BRAND_SITE").and_then(|raw| match Url::parse(&raw) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Ignoring BRAND_SITE '{}': {}", raw, e);
                None
            }
        });

        let mail = MailConfig {
            api_url: non_empty_var("MAIL_API_URL"),
            api_key: non_empty_var("MAIL_API_KEY"),
            from_email: non_empty_var("FROM_EMAIL")
                .unwrap_or_else(|| "no-reply@localhost".to_string()),
            from_name: non_empty_var("FROM_NAME").unwrap_or_else(|| "Quiz Results".to_string()),
            owner_email: non_empty_var("OWNER_EMAIL"),
            results_site,
        };

        Self {
            database_url,
            rust_log,
            port,
            cors_origins,
            quiz_seed_dir: non_empty_var("QUIZ_SEED_DIR"),
            mail,
        }
    }
}

/// Reads an environment variable, treating blank values as unset.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

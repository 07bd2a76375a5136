use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_DATA_FILE: &str = "data/recommendations.json";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_REFINE_TIMEOUT_MS: u64 = 8_000;

/// Where recommendation history lives.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    JsonFile { path: PathBuf },
    Postgres { database_url: String },
}

/// Where uploaded media lives.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaBackend {
    Local {
        dir: PathBuf,
    },
    S3 {
        bucket: String,
        endpoint: String,
        access_key_id: String,
        secret_access_key: String,
    },
}

/// Application configuration loaded from environment variables.
/// Fails at startup if a selected backend is missing its required variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub media: MediaBackend,
    /// Enables the LLM note refiner when set.
    pub anthropic_api_key: Option<String>,
    pub note_refine_timeout: Duration,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds config from any variable lookup. Empty values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let store = match var("RECOMMENDATION_STORE").as_deref().unwrap_or("json") {
            "json" => StoreBackend::JsonFile {
                path: var("DATA_FILE")
                    .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string())
                    .into(),
            },
            "postgres" => StoreBackend::Postgres {
                database_url: require("DATABASE_URL")?,
            },
            other => bail!("RECOMMENDATION_STORE must be 'json' or 'postgres', got '{other}'"),
        };

        let media = match var("S3_BUCKET") {
            Some(bucket) => MediaBackend::S3 {
                bucket,
                endpoint: require("S3_ENDPOINT")?,
                access_key_id: require("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            },
            None => MediaBackend::Local {
                dir: var("UPLOAD_DIR")
                    .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string())
                    .into(),
            },
        };

        Ok(Config {
            store,
            media,
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            note_refine_timeout: Duration::from_millis(parse_or(
                var("NOTE_REFINE_TIMEOUT_MS"),
                DEFAULT_REFINE_TIMEOUT_MS,
                "NOTE_REFINE_TIMEOUT_MS must be a whole number of milliseconds",
            )?),
            max_upload_bytes: parse_or(
                var("MAX_UPLOAD_BYTES"),
                DEFAULT_MAX_UPLOAD_BYTES,
                "MAX_UPLOAD_BYTES must be a whole number of bytes",
            )?,
            port: parse_or(var("PORT"), 8080, "PORT must be a valid port number")?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T, msg: &'static str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v.trim().parse::<T>().context(msg),
        None => Ok(default),
    }
}

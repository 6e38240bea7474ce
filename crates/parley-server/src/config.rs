use std::env;
use std::path::PathBuf;

use anyhow::Context;

use parley_moderation::FallbackPolicy;

const DEFAULT_MODERATION_URL: &str = "https://api.openai.com/v1/moderations";

/// Storage backend, chosen once at startup.
#[derive(Debug, Clone)]
pub enum StorageKind {
    Memory,
    Sqlite(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub storage: StorageKind,
    pub moderation_url: String,
    pub moderation_api_key: Option<String>,
    pub fallback: FallbackPolicy,
    pub blocklist_path: Option<PathBuf>,
    pub prefilter_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PARLEY_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PARLEY_PORT is not a valid port number")?;

        let jwt_secret =
            env::var("PARLEY_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".to_string());

        let storage = match env::var("PARLEY_STORAGE").as_deref() {
            Ok("memory") => StorageKind::Memory,
            Ok("sqlite") | Err(_) => StorageKind::Sqlite(
                env::var("PARLEY_DB_PATH")
                    .unwrap_or_else(|_| "parley.db".to_string())
                    .into(),
            ),
            Ok(other) => anyhow::bail!(
                "unknown PARLEY_STORAGE '{other}' (expected 'memory' or 'sqlite')"
            ),
        };

        let fallback = match env::var("PARLEY_MODERATION_FALLBACK") {
            Ok(raw) => FallbackPolicy::parse(&raw).with_context(|| {
                format!(
                    "unknown PARLEY_MODERATION_FALLBACK '{raw}' (expected 'keyword' or 'fail-open')"
                )
            })?,
            Err(_) => FallbackPolicy::Keyword,
        };

        Ok(Self {
            host,
            port,
            jwt_secret,
            storage,
            moderation_url: env::var("PARLEY_MODERATION_URL")
                .unwrap_or_else(|_| DEFAULT_MODERATION_URL.to_string()),
            moderation_api_key: env::var("PARLEY_MODERATION_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            fallback,
            blocklist_path: env::var("PARLEY_BLOCKLIST_PATH").ok().map(PathBuf::from),
            prefilter_path: env::var("PARLEY_PREFILTER_PATH").ok().map(PathBuf::from),
        })
    }
}

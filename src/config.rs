use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Cli, EnvArgs};
use crate::sync::{Collections, SyncConfig};

/// Largest `per_page` the WooCommerce REST API accepts.
const MAX_PAGE_SIZE: u32 = 100;

/// Environment files tried in order; the first one present is loaded.
const DOTENV_FILES: &[&str] = &[".env.development", ".env.production", ".env"];

/// Shop URL and REST API key pair.
#[derive(Clone)]
pub struct ApiCredentials {
    pub site: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("site", &self.site)
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .finish()
    }
}

/// Application configuration.
#[derive(Debug)]
pub struct Config {
    pub store_path: PathBuf,
    /// Absent when the shop settings are not set; only imports need them.
    pub api: Option<ApiCredentials>,
    pub request_timeout: Duration,
    pub sync: SyncConfig,
}

/// Load the first environment file that exists in the working directory.
/// Variables already set in the process environment are not overridden.
pub fn load_dotenv() -> Option<PathBuf> {
    DOTENV_FILES
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .and_then(|path| dotenvy::from_filename(path).ok())
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Config {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let env: &EnvArgs = &cli.env;

        if env.max_threads == 0 {
            anyhow::bail!("MAX_THREADS must be at least 1");
        }
        if env.page_size == 0 || env.page_size > MAX_PAGE_SIZE {
            anyhow::bail!(
                "PAGE_SIZE must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                env.page_size
            );
        }
        if env.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be at least 1");
        }
        for (name, value) in [
            ("ORDER_COLLECTION", &env.order_collection),
            ("CUSTOMER_COLLECTION", &env.customer_collection),
            ("PRODUCT_COLLECTION", &env.product_collection),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
        }

        let api = match (
            non_empty(&env.site),
            non_empty(&env.consumer_key),
            non_empty(&env.consumer_secret),
        ) {
            (Some(site), Some(consumer_key), Some(consumer_secret)) => Some(ApiCredentials {
                site,
                consumer_key,
                consumer_secret,
            }),
            _ => None,
        };

        Ok(Self {
            store_path: expand_tilde(&env.store_path),
            api,
            request_timeout: Duration::from_secs(env.request_timeout_secs),
            sync: SyncConfig {
                max_concurrency: env.max_threads,
                page_size: env.page_size,
                no_progress_bar: cli.no_progress_bar,
                collections: Collections {
                    orders: env.order_collection.clone(),
                    customers: env.customer_collection.clone(),
                    products: env.product_collection.clone(),
                },
            },
        })
    }

    /// Shop credentials, required by every import.
    pub fn require_api(&self) -> anyhow::Result<&ApiCredentials> {
        self.api.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "SITE, CONSUMER_KEY and CONSUMER_SECRET must be set (environment, .env file or flags)"
            )
        })
    }
}

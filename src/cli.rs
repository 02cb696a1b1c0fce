use chrono::{DateTime, Duration, Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand};

use crate::record::RecordId;
use crate::schema::EntityKind;
use crate::types::{LogLevel, SortOrder};

/// Format of window bounds computed from `--days`/`--hours`. Sub-second
/// precision is always written as zero.
const RANGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000";

#[derive(Parser, Debug)]
#[command(
    name = "wc-migrate",
    version,
    about = "Copy WooCommerce orders, customers and products into a document store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Disable progress bar
    #[arg(long, global = true)]
    pub no_progress_bar: bool,

    /// Exit non-zero when pages or records failed
    #[arg(long, global = true)]
    pub fail_on_error: bool,

    #[command(flatten)]
    pub env: EnvArgs,
}

/// Connection and tuning settings, normally supplied through the
/// environment or a `.env` file.
#[derive(Args, Debug, Clone)]
pub struct EnvArgs {
    /// Shop base URL, e.g. https://shop.example.com
    #[arg(long, env = "SITE", global = true)]
    pub site: Option<String>,

    /// REST API consumer key
    #[arg(long, env = "CONSUMER_KEY", hide_env_values = true, global = true)]
    pub consumer_key: Option<String>,

    /// REST API consumer secret
    #[arg(long, env = "CONSUMER_SECRET", hide_env_values = true, global = true)]
    pub consumer_secret: Option<String>,

    /// Path of the document store database
    #[arg(long, env = "STORE_PATH", default_value = "~/.wc-migrate/store.db", global = true)]
    pub store_path: String,

    /// Maximum number of pages fetched concurrently
    #[arg(long, env = "MAX_THREADS", default_value_t = 10, global = true)]
    pub max_threads: usize,

    /// Records per list request (WooCommerce caps this at 100)
    #[arg(long, env = "PAGE_SIZE", default_value_t = 100, global = true)]
    pub page_size: u32,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120, global = true)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "ORDER_COLLECTION", default_value = "orders", global = true)]
    pub order_collection: String,

    #[arg(long, env = "CUSTOMER_COLLECTION", default_value = "vendors", global = true)]
    pub customer_collection: String,

    #[arg(long, env = "PRODUCT_COLLECTION", default_value = "products", global = true)]
    pub product_collection: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Import orders
    Orders(ImportArgs),
    /// Import customers with the seller role
    Customers(ImportArgs),
    /// Import products
    Products(ImportArgs),
    /// Show document counts and recent sync runs
    Status(StatusArgs),
}

impl Command {
    /// The entity kind and arguments of an import subcommand.
    pub fn import(&self) -> Option<(EntityKind, &ImportArgs)> {
        match self {
            Command::Orders(args) => Some((EntityKind::Orders, args)),
            Command::Customers(args) => Some((EntityKind::Customers, args)),
            Command::Products(args) => Some((EntityKind::Products, args)),
            Command::Status(_) => None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Import a single record by id
    #[arg(short = 'i', long, value_parser = parse_record_id)]
    pub id: Option<RecordId>,

    /// Sort order; anything starting with "asc" sorts ascending
    #[arg(short = 's', long, default_value = "desc")]
    pub sort: String,

    /// Window start (used only together with --before)
    #[arg(short = 'a', long)]
    pub after: Option<String>,

    /// Window end (used only together with --after)
    #[arg(short = 'b', long)]
    pub before: Option<String>,

    /// Window covers the last N days
    #[arg(short = 'd', long, default_value_t = 0)]
    pub days: u32,

    /// Window covers the last N hours (ignored when --days is set)
    #[arg(short = 'H', long, default_value_t = 1)]
    pub hours: u32,

    /// Skip records already stored for the window
    #[arg(long)]
    pub sync: bool,
}

impl ImportArgs {
    pub fn sort_order(&self) -> SortOrder {
        SortOrder::parse_lenient(&self.sort)
    }

    /// The `(from, to)` window bounds.
    ///
    /// An explicit `--after`/`--before` pair wins. Otherwise the window ends
    /// at `now`; `--days N` starts it at the same time of day N days ago,
    /// and `--hours N` starts it N hours ago (never less than one hour).
    pub fn resolve_range(&self, now: DateTime<Local>) -> (String, String) {
        if let (Some(after), Some(before)) = (&self.after, &self.before) {
            return (after.clone(), before.clone());
        }

        let now_naive = now.naive_local();
        let after: NaiveDateTime = if self.days > 0 {
            let day = now.date_naive() - Duration::days(i64::from(self.days));
            day.and_time(now.time())
        } else if self.hours > 1 {
            now_naive - Duration::hours(i64::from(self.hours))
        } else {
            now_naive - Duration::hours(1)
        };

        (
            after.format(RANGE_FORMAT).to_string(),
            now_naive.format(RANGE_FORMAT).to_string(),
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Number of recent sync runs to show
    #[arg(long, default_value_t = 10)]
    pub runs: u32,

    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_record_id(s: &str) -> Result<RecordId, String> {
    let s = s.trim();
    let id = match s.parse::<i64>() {
        Ok(n) => RecordId::from_value(&serde_json::Value::from(n)),
        Err(_) => RecordId::from_value(&serde_json::Value::from(s)),
    };
    id.ok_or_else(|| format!("'{s}' is not a usable record id"))
}

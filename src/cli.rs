//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap`
//! crate. The binary runs non-interactively under a scheduler, so every
//! option can also come from an environment variable.

use clap::{Args, Parser, Subcommand};

/// Scheduled affiliate blog pipeline.
///
/// # Examples
///
/// ```sh
/// # One selection, generation, and publish cycle
/// gadget_press post
///
/// # Force a full catalog refresh (rate-limit paced, takes a while)
/// gadget_press refresh
///
/// # Notify blog search engines about the newest post
/// gadget_press ping
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding the catalog, posted history, and metadata files
    #[arg(short, long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one selection, generation, and publish cycle
    Post(PostArgs),
    /// Replace the whole catalog from the upstream product API
    Refresh(RefreshArgs),
    /// Ping blog search engines about the newest post
    Ping(PingArgs),
}

/// Upstream product API credentials and tuning.
#[derive(Args, Debug, Clone)]
pub struct UpstreamArgs {
    /// SearchItems endpoint of the product API
    #[arg(long, env = "PRODUCT_API_ENDPOINT")]
    pub api_endpoint: Option<String>,

    /// Product API access key
    #[arg(long, env = "PRODUCT_API_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// Product API secret key
    #[arg(long, env = "PRODUCT_API_SECRET_KEY")]
    pub secret_key: Option<String>,

    /// Partner tag appended to every product link
    #[arg(long, env = "PRODUCT_API_PARTNER_TAG")]
    pub partner_tag: Option<String>,

    /// Storefront base URL used for product links
    #[arg(
        long,
        env = "PRODUCT_API_MARKETPLACE",
        default_value = "https://www.amazon.com"
    )]
    pub marketplace: String,

    /// YAML file overriding the built-in search keyword groups
    #[arg(long, env = "KEYWORDS_FILE")]
    pub keywords_file: Option<String>,
}

impl UpstreamArgs {
    /// True when every credential needed to call the upstream is present.
    pub fn is_configured(&self) -> bool {
        self.api_endpoint.is_some()
            && self.access_key.is_some()
            && self.secret_key.is_some()
            && self.partner_tag.is_some()
    }
}

#[derive(Args, Debug)]
pub struct PostArgs {
    /// Target WordPress site URL
    #[arg(long, env = "WP_SITE_URL")]
    pub site_url: String,

    /// WordPress username
    #[arg(long, env = "WP_USERNAME")]
    pub username: String,

    /// WordPress application password
    #[arg(long, env = "WP_APP_PASSWORD")]
    pub app_password: String,

    /// Post status: draft or publish
    #[arg(long, env = "POST_STATUS", default_value = "draft")]
    pub status: String,

    /// Days before the cached catalog counts as stale
    #[arg(long, env = "STALENESS_THRESHOLD_DAYS", default_value_t = 50)]
    pub staleness_threshold_days: i64,

    /// Skip the upstream fetch entirely and use cached data only
    #[arg(long, env = "USE_CACHED_PRODUCTS", default_value_t = false)]
    pub cached_only: bool,

    /// Restrict selection to one category
    #[arg(long)]
    pub category: Option<String>,

    /// Publish a specific catalog item instead of rotating
    #[arg(long)]
    pub item_id: Option<String>,

    #[command(flatten)]
    pub upstream: UpstreamArgs,
}

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Number of items to collect for the new catalog
    #[arg(long, default_value_t = 100)]
    pub target_count: usize,

    /// Seconds to wait between consecutive upstream requests
    #[arg(long, default_value_t = 10)]
    pub min_interval_secs: u64,

    #[command(flatten)]
    pub upstream: UpstreamArgs,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Target WordPress site URL
    #[arg(long, env = "WP_SITE_URL")]
    pub site_url: String,

    /// Blog display name sent with each ping
    #[arg(long, env = "BLOG_NAME", default_value = "Gadget Review Blog")]
    pub blog_name: String,
}

//! # Gadget Press
//!
//! A scheduled pipeline that keeps a locally cached catalog of gadget
//! products, rotates through it without repeats, assembles an affiliate
//! review post for the selected product, and publishes it through the
//! WordPress REST API. Companion subcommands refresh the catalog from
//! the upstream product search API and ping blog search engines after
//! publishes.
//!
//! ## Usage
//!
//! ```sh
//! gadget_press post              # one select-compose-publish cycle
//! gadget_press refresh           # rebuild the product catalog
//! gadget_press ping              # notify ping endpoints
//! ```
//!
//! ## Architecture
//!
//! Each invocation performs one run to completion and exits:
//! 1. **Selection**: the rotation manager refreshes the catalog if it is
//!    stale, then picks an item not yet posted in this rotation
//! 2. **Generation**: the composer assembles the title, HTML body, and
//!    SEO metadata
//! 3. **Publish**: category, featured image, and post are created via
//!    the WordPress API; the item is recorded as posted only after the
//!    publish is confirmed

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod composer;
mod fetcher;
mod models;
mod ping;
mod rotation;
mod store;
mod utils;
mod wordpress;

use cli::{Cli, Command, PingArgs, PostArgs, RefreshArgs, UpstreamArgs};
use composer::PostComposer;
use fetcher::{FetchPlan, ProductApiClient, TokioSleeper};
use rotation::{Pick, RotationManager};
use store::CatalogStore;
use utils::{ensure_writable_dir, media_filename};
use wordpress::{NewPost, SeoFields, WordPressClient};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();

    let result = match &args.command {
        Command::Post(post_args) => run_post(&args.data_dir, post_args).await,
        Command::Refresh(refresh_args) => run_refresh(&args.data_dir, refresh_args).await,
        Command::Ping(ping_args) => run_ping(ping_args).await,
    };

    let elapsed = start_time.elapsed();
    match &result {
        Ok(()) => info!(?elapsed, "Run complete"),
        Err(e) => error!(?elapsed, error = %e, "Run failed"),
    }
    result
}

/// Build the upstream client and fetch plan from CLI options.
///
/// Returns `None` when credentials are incomplete; callers degrade to
/// cached data in that case.
fn build_upstream(
    upstream: &UpstreamArgs,
    target_count: usize,
    min_interval: Duration,
) -> Option<(ProductApiClient, FetchPlan)> {
    if !upstream.is_configured() {
        return None;
    }
    let client = ProductApiClient::new(
        upstream.api_endpoint.as_deref()?,
        upstream.access_key.as_deref()?,
        upstream.secret_key.as_deref()?,
        upstream.partner_tag.as_deref()?,
        &upstream.marketplace,
    )
    .map_err(|e| warn!(error = %e, "Could not build product API client"))
    .ok()?;

    let groups = match &upstream.keywords_file {
        Some(path) => match fetcher::load_keyword_groups(path) {
            Ok(groups) => {
                info!(path = %path, groups = groups.len(), "Loaded keyword groups from file");
                groups
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Could not load keywords file; using built-in groups");
                fetcher::builtin_keyword_groups()
            }
        },
        None => fetcher::builtin_keyword_groups(),
    };

    let plan = FetchPlan {
        groups,
        target_count,
        min_interval,
        ..FetchPlan::default()
    };
    Some((client, plan))
}

/// One selection, generation, and publish cycle.
#[instrument(level = "info", skip_all)]
async fn run_post(data_dir: &str, args: &PostArgs) -> Result<(), Box<dyn Error>> {
    info!(site = %args.site_url, status = %args.status, "Starting publish cycle");
    ensure_writable_dir(data_dir).await?;

    let mut manager = RotationManager::load(CatalogStore::new(data_dir)).await;

    // --- Staleness-driven refresh ---
    if args.cached_only {
        info!("Cached-only flag set; skipping upstream refresh");
    } else if let Some((client, plan)) =
        build_upstream(&args.upstream, 100, Duration::from_secs(10))
    {
        manager
            .refresh_if_stale(
                args.staleness_threshold_days,
                &client,
                &TokioSleeper,
                &plan,
            )
            .await;
    } else {
        info!("Upstream credentials not configured; using cached catalog");
    }

    if manager.catalog_len() == 0 {
        return Err("no product data available; run the refresh subcommand first".into());
    }

    // --- Selection ---
    let pick = match &args.item_id {
        Some(id) => {
            let item = manager
                .find(id)
                .cloned()
                .ok_or_else(|| format!("item {id} not found in catalog"))?;
            Pick {
                item,
                rotation_reset: false,
            }
        }
        None => manager
            .pick_next(args.category.as_deref())
            .ok_or("no selectable item for the requested category")?,
    };
    let item = &pick.item;
    if pick.rotation_reset {
        info!("Rotation history was reset by this selection");
    }
    info!(id = %item.id, name = %item.display_name, category = %item.category, "Selected product");

    // --- Generation ---
    let composer = PostComposer::new();
    let title = composer.title(item);
    let html_body = composer.body(item);
    let meta_description = composer.meta_description(item);
    let meta_keywords = composer.meta_keywords(item);
    info!(%title, "Composed article");

    // --- Publish ---
    let wp = WordPressClient::new(&args.site_url, &args.username, &args.app_password)?;

    let categories = match wp.get_or_create_category(&item.category).await {
        Ok(id) => vec![id],
        Err(e) => {
            warn!(category = %item.category, error = %e, "Category setup failed; posting without one");
            Vec::new()
        }
    };

    let tags = match wp.get_or_create_tags(&composer.tags(item)).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "Tag setup failed; posting without tags");
            Vec::new()
        }
    };

    let featured_media = match &item.image_url {
        Some(image_url) => {
            match wp
                .upload_media(image_url, &media_filename(&item.display_name))
                .await
            {
                Ok(media) => Some(media.id),
                Err(e) => {
                    warn!(error = %e, "Featured image upload failed; posting without one");
                    None
                }
            }
        }
        None => None,
    };

    let new_post = NewPost {
        title: title.clone(),
        html_body,
        status: args.status.clone(),
        categories,
        tags,
        featured_media,
        excerpt: Some(meta_description.clone()),
        seo: SeoFields {
            title: Some(title),
            description: Some(meta_description),
            keywords: Some(meta_keywords),
        },
    };

    // A rejected publish leaves the item unposted so the next run can
    // pick it again.
    let created = wp.create_post(&new_post).await?;

    if let Err(e) = manager.mark_seen(&item.id).await {
        warn!(id = %item.id, error = %e, "Published but could not record posted history");
    }

    info!(
        post_id = created.id,
        url = %created.link,
        status = %args.status,
        "Publish cycle finished"
    );
    Ok(())
}

/// Forced full catalog refresh with rate-limit pacing.
#[instrument(level = "info", skip_all)]
async fn run_refresh(data_dir: &str, args: &RefreshArgs) -> Result<(), Box<dyn Error>> {
    info!(
        target = args.target_count,
        interval_secs = args.min_interval_secs,
        "Starting forced catalog refresh"
    );
    ensure_writable_dir(data_dir).await?;

    let (client, plan) = build_upstream(
        &args.upstream,
        args.target_count,
        Duration::from_secs(args.min_interval_secs),
    )
    .ok_or("product API credentials are required for refresh")?;

    let mut manager = RotationManager::load(CatalogStore::new(data_dir)).await;
    let count = manager.force_refresh(&client, &TokioSleeper, &plan).await?;

    for (category, items) in manager.category_counts() {
        info!(category = %category, count = items, "Catalog category");
    }
    info!(count, "Catalog refresh finished");
    Ok(())
}

/// Fire-and-forget ping broadcast about the newest post.
#[instrument(level = "info", skip_all)]
async fn run_ping(args: &PingArgs) -> Result<(), Box<dyn Error>> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("gadget_press/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let latest = WordPressClient::latest_public_post(&http, &args.site_url).await;
    if let Some(post) = &latest {
        info!(title = %post.title, url = %post.link, "Announcing latest post");
    } else {
        info!("No latest post found; sending a plain site ping");
    }

    let report = ping::broadcast(
        &http,
        &args.blog_name,
        &args.site_url,
        latest.as_ref().map(|p| p.link.as_str()),
    )
    .await?;

    if report.any_success() {
        Ok(())
    } else {
        Err("every ping endpoint rejected the notification".into())
    }
}

//! Upstream product search with brand filtering and rate-limit-aware
//! retry logic.
//!
//! The upstream commerce API enforces a strict minimum interval between
//! requests (roughly one search every ten seconds); violating it returns a
//! rate-limit error. This module wraps the API behind the [`ItemSource`]
//! trait and applies a bounded exponential backoff only to rate-limit
//! errors. Any other upstream failure is treated as "no results for this
//! keyword" so a single bad keyword can never abort a whole catalog
//! refresh.
//!
//! # Retry Strategy
//!
//! - Maximum 3 attempts per keyword
//! - Exponential backoff seeded at 15 seconds (15s, 30s, 60s)
//! - Random jitter (0-1000ms) added to each delay
//! - Retry exhaustion and fatal errors both yield an empty list

use crate::models::Item;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Brands accepted into the catalog. Matching is case-insensitive
/// containment against the upstream brand field or the product title.
pub const MAJOR_BRANDS: &[&str] = &[
    "Logitech",
    "Microsoft",
    "Samsung",
    "Crucial",
    "Anker",
    "BenQ",
    "HHKB",
    "Happy Hacking Keyboard",
    "Corsair",
    "Razer",
    "ASUS",
    "Dell",
    "HP",
    "Lenovo",
    "SanDisk",
    "Western Digital",
    "WD",
    "Kingston",
    "Intel",
    "AMD",
    "NVIDIA",
    "Sony",
    "Panasonic",
    "Canon",
    "Epson",
    "Seagate",
    "Transcend",
    "Philips",
    "LG",
    "Acer",
    "Apple",
    "Keychron",
    "SteelSeries",
    "HyperX",
    "Elgato",
    "Thermaltake",
];

/// Errors surfaced by the upstream search API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The upstream rejected the request for exceeding its request rate.
    #[error("upstream rate limit hit: {0}")]
    RateLimited(String),
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    /// Application-level rejection (bad credentials, invalid request).
    #[error("upstream api error: {0}")]
    Api(String),
    /// The response body did not match the expected shape.
    #[error("malformed upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Only rate limiting is worth waiting out; everything else fails the
    /// request immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::RateLimited(_))
    }
}

/// Source of catalog candidates, separated from HTTP so the refresh logic
/// can run against a fake in tests.
pub trait ItemSource {
    /// Search for items matching `keyword`, labelled with `category`.
    ///
    /// Implementations return at most `max_results` items, already
    /// filtered to the curated brand allow-list.
    async fn search(
        &self,
        keyword: &str,
        category: &str,
        max_results: usize,
    ) -> Result<Vec<Item>, FetchError>;
}

/// Pluggable delay so backoff and pacing are testable without wall-clock
/// waits.
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded exponential backoff applied to rate-limit errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(15),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// With the defaults this yields 15s, 30s, 60s.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// One category with its search keywords.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct KeywordGroup {
    pub category: String,
    pub keywords: Vec<String>,
}

/// Built-in search keyword groups, mirroring the categories the blog
/// covers. A YAML file given via `--keywords-file` replaces these.
pub fn builtin_keyword_groups() -> Vec<KeywordGroup> {
    let group = |category: &str, keywords: &[&str]| KeywordGroup {
        category: category.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    };
    vec![
        group(
            "peripherals",
            &[
                "wireless mouse",
                "gaming mouse",
                "ergonomic mouse",
                "mechanical keyboard",
                "gaming keyboard",
                "wireless keyboard",
                "monitor light bar",
                "desk lamp",
                "webcam",
                "usb microphone",
                "gaming headset",
                "bluetooth speaker",
                "portable charger",
                "usb wall charger",
                "usb hub",
                "docking station",
                "mouse pad",
            ],
        ),
        group(
            "components",
            &[
                "nvme ssd",
                "m.2 ssd",
                "internal ssd",
                "ddr5 memory",
                "ddr4 memory",
                "graphics card",
                "external ssd",
                "external hard drive",
                "pc case",
                "power supply unit",
                "cpu cooler",
                "case fan",
            ],
        ),
    ]
}

/// Load keyword groups from a YAML file.
///
/// The file is a list of `{ category, keywords }` entries. Errors are
/// returned to the caller, which falls back to the built-in groups.
pub fn load_keyword_groups(path: &str) -> Result<Vec<KeywordGroup>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let groups: Vec<KeywordGroup> = serde_yaml::from_str(&raw)?;
    Ok(groups)
}

/// Everything a bulk catalog fetch needs to know.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub groups: Vec<KeywordGroup>,
    /// Stop accumulating once this many candidates are collected.
    pub target_count: usize,
    /// Items requested per keyword search.
    pub per_keyword: usize,
    /// Minimum pause between consecutive upstream requests.
    pub min_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self {
            groups: builtin_keyword_groups(),
            target_count: 100,
            per_keyword: 5,
            min_interval: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// True when the title or brand matches the curated allow-list.
pub fn is_major_brand(title: &str, brand: Option<&str>) -> bool {
    let title = title.to_lowercase();
    let brand = brand.map(str::to_lowercase);
    MAJOR_BRANDS.iter().any(|candidate| {
        let candidate = candidate.to_lowercase();
        brand.as_deref().is_some_and(|b| b.contains(&candidate)) || title.contains(&candidate)
    })
}

/// Search one keyword, retrying only on rate-limit errors.
///
/// Never returns an error: fatal failures and retry exhaustion both
/// collapse into an empty list, which the caller treats the same as a
/// keyword with no matching items.
#[instrument(level = "info", skip(source, policy, sleeper))]
pub async fn search_with_retry<S, Z>(
    source: &S,
    policy: &RetryPolicy,
    sleeper: &Z,
    keyword: &str,
    category: &str,
    max_results: usize,
) -> Vec<Item>
where
    S: ItemSource,
    Z: Sleeper,
{
    let mut attempt = 1u32;
    loop {
        match source.search(keyword, category, max_results).await {
            Ok(items) => {
                debug!(keyword, count = items.len(), "Upstream search succeeded");
                return items;
            }
            Err(e) if e.is_transient() => {
                if attempt >= policy.max_attempts {
                    warn!(
                        keyword,
                        attempt,
                        max = policy.max_attempts,
                        "Rate limited on every attempt; treating keyword as empty"
                    );
                    return Vec::new();
                }
                let jitter_ms: u64 = rand::rng().random_range(0..=1000);
                let delay = policy.delay_for(attempt) + Duration::from_millis(jitter_ms);
                warn!(keyword, attempt, ?delay, error = %e, "Rate limited; backing off");
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(keyword, error = %e, "Upstream search failed; treating keyword as empty");
                return Vec::new();
            }
        }
    }
}

/// Walk every keyword group, accumulating candidates until the target
/// count is reached or the groups are exhausted.
///
/// Requests are deliberately serialized with `min_interval` pauses to
/// honor the upstream rate limit. Candidates are returned in encounter
/// order and may contain duplicate ids; the caller dedups.
#[instrument(level = "info", skip_all, fields(target = plan.target_count))]
pub async fn collect_candidates<S, Z>(source: &S, sleeper: &Z, plan: &FetchPlan) -> Vec<Item>
where
    S: ItemSource,
    Z: Sleeper,
{
    let mut candidates: Vec<Item> = Vec::new();
    let mut first_request = true;

    'groups: for group in &plan.groups {
        info!(category = %group.category, keywords = group.keywords.len(), "Searching keyword group");
        for keyword in &group.keywords {
            if candidates.len() >= plan.target_count {
                info!(total = candidates.len(), "Reached target count; stopping search");
                break 'groups;
            }
            if !first_request {
                sleeper.sleep(plan.min_interval).await;
            }
            first_request = false;

            let items = search_with_retry(
                source,
                &plan.retry,
                sleeper,
                keyword,
                &group.category,
                plan.per_keyword,
            )
            .await;
            if items.is_empty() {
                info!(keyword = %keyword, "No items for keyword");
            } else {
                info!(keyword = %keyword, count = items.len(), total = candidates.len() + items.len(), "Collected candidates");
            }
            candidates.extend(items);
        }
    }

    info!(total = candidates.len(), "Candidate collection finished");
    candidates
}

/// Wire shape of a SearchItems response.
///
/// Mirrors the subset of the upstream schema the pipeline reads: title,
/// brand line, primary image, price listing, and feature bullets.
#[derive(Debug, Deserialize)]
struct SearchItemsResponse {
    #[serde(rename = "SearchResult")]
    search_result: Option<SearchResult>,
    #[serde(rename = "Errors", default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "Items", default)]
    items: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    #[serde(rename = "ASIN")]
    asin: String,
    #[serde(rename = "ItemInfo")]
    item_info: Option<ItemInfo>,
    #[serde(rename = "Images")]
    images: Option<Images>,
    #[serde(rename = "Offers")]
    offers: Option<Offers>,
}

#[derive(Debug, Deserialize)]
struct ItemInfo {
    #[serde(rename = "Title")]
    title: Option<DisplayValue>,
    #[serde(rename = "ByLineInfo")]
    by_line_info: Option<ByLineInfo>,
    #[serde(rename = "Features")]
    features: Option<DisplayValues>,
}

#[derive(Debug, Deserialize)]
struct DisplayValue {
    #[serde(rename = "DisplayValue")]
    display_value: String,
}

#[derive(Debug, Deserialize)]
struct DisplayValues {
    #[serde(rename = "DisplayValues", default)]
    display_values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ByLineInfo {
    #[serde(rename = "Brand")]
    brand: Option<DisplayValue>,
}

#[derive(Debug, Deserialize)]
struct Images {
    #[serde(rename = "Primary")]
    primary: Option<ImageSet>,
}

#[derive(Debug, Deserialize)]
struct ImageSet {
    #[serde(rename = "Large")]
    large: Option<ImageDetail>,
}

#[derive(Debug, Deserialize)]
struct ImageDetail {
    #[serde(rename = "URL")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct Offers {
    #[serde(rename = "Listings", default)]
    listings: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(rename = "Price")]
    price: Option<ListingPrice>,
}

#[derive(Debug, Deserialize)]
struct ListingPrice {
    #[serde(rename = "DisplayAmount")]
    display_amount: String,
}

/// HTTP client for the partner product search API.
///
/// Posts SearchItems-shaped JSON requests and maps the response into
/// [`Item`]s, keeping only allow-listed brands. Link construction appends
/// the partner tag so every published article earns referral credit.
#[derive(Debug, Clone)]
pub struct ProductApiClient {
    http: reqwest::Client,
    endpoint: Url,
    access_key: String,
    secret_key: String,
    partner_tag: String,
    marketplace: String,
}

impl ProductApiClient {
    /// Build a client against `endpoint` (the SearchItems resource URL).
    ///
    /// `marketplace` is the storefront base used for product links, e.g.
    /// `https://www.amazon.com`.
    pub fn new(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        partner_tag: &str,
        marketplace: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("gadget_press/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: Url::parse(endpoint)?,
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            partner_tag: partner_tag.to_string(),
            marketplace: marketplace.trim_end_matches('/').to_string(),
        })
    }

    fn product_link(&self, id: &str) -> String {
        format!("{}/dp/{}?tag={}", self.marketplace, id, self.partner_tag)
    }

    /// Convert one upstream record, applying the brand allow-list.
    fn convert(&self, api_item: ApiItem, keyword: &str, category: &str) -> Option<Item> {
        let title = api_item
            .item_info
            .as_ref()
            .and_then(|info| info.title.as_ref())
            .map(|t| t.display_value.clone())
            .unwrap_or_default();
        let brand = api_item
            .item_info
            .as_ref()
            .and_then(|info| info.by_line_info.as_ref())
            .and_then(|b| b.brand.as_ref())
            .map(|b| b.display_value.clone());

        if !is_major_brand(&title, brand.as_deref()) {
            debug!(id = %api_item.asin, "Dropping item outside brand allow-list");
            return None;
        }

        let price = api_item
            .offers
            .as_ref()
            .and_then(|o| o.listings.first())
            .and_then(|l| l.price.as_ref())
            .map(|p| p.display_amount.clone());
        let image_url = api_item
            .images
            .as_ref()
            .and_then(|i| i.primary.as_ref())
            .and_then(|p| p.large.as_ref())
            .map(|l| l.url.clone());
        let features: Vec<String> = api_item
            .item_info
            .as_ref()
            .and_then(|info| info.features.as_ref())
            .map(|f| f.display_values.iter().take(5).cloned().collect())
            .unwrap_or_default();
        let description = Some(format!(
            "A well-reviewed {keyword} from {}.",
            brand.as_deref().unwrap_or("a major manufacturer")
        ));

        Some(Item {
            source_url: self.product_link(&api_item.asin),
            id: api_item.asin,
            display_name: title,
            full_name: None,
            price,
            image_url,
            description,
            category: category.to_string(),
            features,
            rating: None,
        })
    }
}

impl ItemSource for ProductApiClient {
    async fn search(
        &self,
        keyword: &str,
        category: &str,
        max_results: usize,
    ) -> Result<Vec<Item>, FetchError> {
        let body = serde_json::json!({
            "Keywords": keyword,
            "ItemCount": max_results,
            "PartnerTag": self.partner_tag,
            "PartnerType": "Associates",
            "Resources": [
                "Images.Primary.Large",
                "ItemInfo.Title",
                "ItemInfo.Features",
                "ItemInfo.ByLineInfo",
                "Offers.Listings.Price",
            ],
        });

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("x-api-access-key", &self.access_key)
            .header("x-api-secret-key", &self.secret_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited(format!("http {status}")));
        }
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Api(format!(
                "http {status}: {}",
                crate::utils::truncate_for_log(&raw, 200)
            )));
        }

        let parsed: SearchItemsResponse = serde_json::from_str(&raw)?;
        if let Some(err) = parsed.errors.first() {
            if err.code.eq_ignore_ascii_case("TooManyRequests") {
                return Err(FetchError::RateLimited(err.message.clone()));
            }
            // NoResults is a normal outcome, not a failure.
            if err.code.eq_ignore_ascii_case("NoResults") {
                return Ok(Vec::new());
            }
            return Err(FetchError::Api(format!("{}: {}", err.code, err.message)));
        }

        let items = parsed
            .search_result
            .map(|result| result.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|api_item| self.convert(api_item, keyword, category))
            .collect();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Sleeper that records requested delays instead of waiting.
    #[derive(Debug, Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    struct AlwaysRateLimited {
        calls: AtomicU32,
    }

    impl ItemSource for AlwaysRateLimited {
        async fn search(
            &self,
            _keyword: &str,
            _category: &str,
            _max_results: usize,
        ) -> Result<Vec<Item>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::RateLimited("throttled".to_string()))
        }
    }

    struct AlwaysFatal {
        calls: AtomicU32,
    }

    impl ItemSource for AlwaysFatal {
        async fn search(
            &self,
            _keyword: &str,
            _category: &str,
            _max_results: usize,
        ) -> Result<Vec<Item>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Api("InvalidPartnerTag: rejected".to_string()))
        }
    }

    fn item(id: &str, category: &str) -> Item {
        Item {
            id: id.to_string(),
            display_name: format!("Item {id}"),
            full_name: None,
            source_url: format!("https://www.example-shop.com/dp/{id}"),
            price: None,
            image_url: None,
            description: None,
            category: category.to_string(),
            features: vec![],
            rating: None,
        }
    }

    struct FixedBatches {
        batches: Mutex<Vec<Vec<Item>>>,
    }

    impl ItemSource for FixedBatches {
        async fn search(
            &self,
            _keyword: &str,
            _category: &str,
            _max_results: usize,
        ) -> Result<Vec<Item>, FetchError> {
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(batches.remove(0))
            }
        }
    }

    #[test]
    fn test_backoff_schedule_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(15));
        assert_eq!(policy.delay_for(2), Duration::from_secs(30));
        assert_eq!(policy.delay_for(3), Duration::from_secs(60));
    }

    #[test]
    fn test_brand_filter_matches_brand_case_insensitively() {
        assert!(is_major_brand("Some Gaming Mouse", Some("logitech")));
        assert!(is_major_brand("some keyboard", Some("RAZER Inc.")));
        assert!(!is_major_brand("Generic Mouse", Some("Shenzhen OEM")));
    }

    #[test]
    fn test_brand_filter_falls_back_to_title() {
        assert!(is_major_brand("Corsair K70 RGB PRO", None));
        assert!(!is_major_brand("RGB Keyboard 104 keys", None));
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_returns_empty_not_error() {
        let source = AlwaysRateLimited {
            calls: AtomicU32::new(0),
        };
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::default();

        let items =
            search_with_retry(&source, &policy, &sleeper, "gaming mouse", "peripherals", 5).await;

        assert!(items.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3, "3 attempts total");
        let delays = sleeper.delays.lock().unwrap();
        assert_eq!(delays.len(), 2, "a sleep between each pair of attempts");
        assert!(delays[0] >= Duration::from_secs(15) && delays[0] < Duration::from_secs(17));
        assert!(delays[1] >= Duration::from_secs(30) && delays[1] < Duration::from_secs(32));
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let source = AlwaysFatal {
            calls: AtomicU32::new(0),
        };
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::default();

        let items = search_with_retry(&source, &policy, &sleeper, "nvme ssd", "components", 5).await;

        assert!(items.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1, "no retry on fatal errors");
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collect_stops_at_target_count() {
        let source = FixedBatches {
            batches: Mutex::new(vec![
                vec![item("A", "peripherals"), item("B", "peripherals")],
                vec![item("C", "peripherals"), item("D", "peripherals")],
                vec![item("E", "peripherals")],
            ]),
        };
        let sleeper = RecordingSleeper::default();
        let plan = FetchPlan {
            target_count: 3,
            min_interval: Duration::from_secs(10),
            ..FetchPlan::default()
        };

        let candidates = collect_candidates(&source, &sleeper, &plan).await;

        assert_eq!(candidates.len(), 4, "stops after the batch that crossed the target");
        let delays = sleeper.delays.lock().unwrap();
        assert!(
            delays.iter().any(|d| *d == Duration::from_secs(10)),
            "pacing pause between upstream requests"
        );
    }

    #[tokio::test]
    async fn test_collect_tolerates_empty_keywords() {
        let source = FixedBatches {
            batches: Mutex::new(vec![vec![], vec![item("A", "peripherals")]]),
        };
        let sleeper = RecordingSleeper::default();
        let plan = FetchPlan {
            target_count: 1,
            min_interval: Duration::ZERO,
            ..FetchPlan::default()
        };

        let candidates = collect_candidates(&source, &sleeper, &plan).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "A");
    }

    #[test]
    fn test_builtin_groups_cover_both_categories() {
        let groups = builtin_keyword_groups();
        let categories: Vec<&str> = groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(categories, vec!["peripherals", "components"]);
        assert!(groups.iter().all(|g| !g.keywords.is_empty()));
    }

    fn test_client(endpoint: &str) -> ProductApiClient {
        ProductApiClient::new(
            endpoint,
            "test-access",
            "test-secret",
            "gadgetpress-20",
            "https://www.example-shop.com",
        )
        .expect("client construction should not fail")
    }

    #[tokio::test]
    async fn test_http_search_parses_and_filters_brands() {
        use wiremock::matchers::{body_partial_json, header, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = serde_json::json!({
            "SearchResult": {
                "Items": [
                    {
                        "ASIN": "B0LOGI001",
                        "ItemInfo": {
                            "Title": { "DisplayValue": "MX Master 3S Wireless Mouse" },
                            "ByLineInfo": { "Brand": { "DisplayValue": "Logitech" } },
                            "Features": { "DisplayValues": ["8,000 DPI sensor", "Quiet clicks"] }
                        },
                        "Images": { "Primary": { "Large": { "URL": "https://img.example.com/mx.jpg" } } },
                        "Offers": { "Listings": [ { "Price": { "DisplayAmount": "$99.99" } } ] }
                    },
                    {
                        "ASIN": "B0GENERIC",
                        "ItemInfo": {
                            "Title": { "DisplayValue": "Budget Wireless Mouse 2.4G" },
                            "ByLineInfo": { "Brand": { "DisplayValue": "Shenzhen OEM" } }
                        }
                    }
                ]
            }
        });

        Mock::given(method("POST"))
            .and(header("x-api-access-key", "test-access"))
            .and(body_partial_json(
                serde_json::json!({ "Keywords": "wireless mouse" }),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let items = client
            .search("wireless mouse", "peripherals", 5)
            .await
            .expect("search should succeed");

        assert_eq!(items.len(), 1, "off-list brand must be dropped");
        let item = &items[0];
        assert_eq!(item.id, "B0LOGI001");
        assert_eq!(item.display_name, "MX Master 3S Wireless Mouse");
        assert_eq!(item.category, "peripherals");
        assert_eq!(item.price.as_deref(), Some("$99.99"));
        assert_eq!(item.features.len(), 2);
        assert_eq!(
            item.source_url,
            "https://www.example-shop.com/dp/B0LOGI001?tag=gadgetpress-20"
        );
    }

    #[tokio::test]
    async fn test_http_429_maps_to_rate_limited() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .search("gaming mouse", "peripherals", 5)
            .await
            .expect_err("429 must be an error");
        assert!(matches!(err, FetchError::RateLimited(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_error_code_maps_to_api_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = serde_json::json!({
            "Errors": [ { "Code": "AccessDenied", "Message": "The request signature is invalid" } ]
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .search("nvme ssd", "components", 5)
            .await
            .expect_err("upstream error code must surface");
        assert!(matches!(err, FetchError::Api(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_no_results_code_is_empty_not_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = serde_json::json!({
            "Errors": [ { "Code": "NoResults", "Message": "No results found" } ]
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let items = client
            .search("case fan", "components", 5)
            .await
            .expect("NoResults is a normal outcome");
        assert!(items.is_empty());
    }

    #[test]
    fn test_keyword_groups_parse_from_yaml() {
        let yaml = r#"
- category: peripherals
  keywords:
    - trackball
    - drawing tablet
- category: components
  keywords:
    - sata ssd
"#;
        let groups: Vec<KeywordGroup> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].keywords[1], "drawing tablet");
        assert_eq!(groups[1].category, "components");
    }
}

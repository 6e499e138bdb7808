//! Review article assembly.
//!
//! Turns one catalog [`Item`] into the pieces WordPress needs: a title,
//! an HTML body, an excerpt, SEO meta fields, and tag names. The copy is
//! template-assembled with light randomization so consecutive posts do
//! not read identically. Output is a plain HTML fragment; WordPress
//! wraps it into blocks on its side.

use crate::models::Item;
use rand::seq::IndexedRandom;
use std::fmt::Write as _;

const REVIEW_TEMPLATES: &[&str] = &[
    "In-Depth Review",
    "Hands-On Review",
    "Unboxing Review",
    "Long-Term Test",
    "Field Report",
];

/// Escape text destined for HTML element content or attribute values.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Assembles review posts from catalog items.
#[derive(Debug, Default)]
pub struct PostComposer;

impl PostComposer {
    pub fn new() -> Self {
        Self
    }

    /// Article title, e.g. `[Hands-On Review] MX Master 3S - the new
    /// standard in peripherals`.
    pub fn title(&self, item: &Item) -> String {
        let template = REVIEW_TEMPLATES
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or("Review");
        format!(
            "[{template}] {} - the new standard in {}",
            item.display_name, item.category
        )
    }

    fn introduction(&self, item: &Item) -> String {
        // The body leads with the long-form name when one exists.
        let name = escape_html(item.full_name.as_deref().unwrap_or(&item.display_name));
        let category = escape_html(&item.category);
        let intros = [
            format!("Today we are taking a close look at the {name}, one of the most talked-about picks in {category}."),
            format!("We spent real desk time with the {name}, a recent standout in the {category} space."),
            format!("Shopping for {category}? The {name} has been on our bench for a while, and here is how it held up."),
        ];
        let mut intro = intros
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| intros[0].clone());
        if let Some(description) = &item.description {
            intro.push_str("</p>\n<p>");
            intro.push_str(&escape_html(description));
        }
        intro
    }

    fn features_section(&self, item: &Item) -> String {
        if item.features.is_empty() {
            return String::new();
        }
        let mut html = String::from("<h2>Key Features</h2>\n<ul>\n");
        for feature in &item.features {
            let _ = writeln!(html, "  <li>{}</li>", escape_html(feature));
        }
        html.push_str("</ul>\n");
        html
    }

    fn usage_section(&self, item: &Item) -> String {
        let name = item.display_name.to_lowercase();
        let mut html = String::from("<h2>How It Feels in Daily Use</h2>\n");
        if name.contains("mouse") {
            html.push_str(
                "<p>The shape settles naturally into the hand, and long sessions never left \
                 our wrist aching. Clicks are quiet enough for a shared office.</p>\n",
            );
        } else if name.contains("keyboard") {
            html.push_str(
                "<p>Typing feel is the headline here. The layout took a day to get used to, \
                 and after that our typing speed noticeably improved.</p>\n",
            );
        } else if name.contains("ssd") || name.contains("memory") || name.contains("ddr") {
            html.push_str(
                "<p>After installation the whole system felt snappier. Boot times and \
                 application loads improved dramatically over the previous setup.</p>\n",
            );
        } else {
            html.push_str(
                "<p>It performed exactly as promised in day-to-day use. Build quality is \
                 solid, and it feels like a product that will stay on the desk for years.</p>\n",
            );
        }
        html
    }

    fn pros_cons_section(&self, item: &Item) -> String {
        let mut html = String::from("<h2>Pros and Cons</h2>\n<h3>Pros</h3>\n<ul>\n");
        for feature in item.features.iter().take(2) {
            let _ = writeln!(html, "  <li>{}</li>", escape_html(feature));
        }
        html.push_str("  <li>Build quality that holds up to long-term use</li>\n");
        html.push_str("  <li>Clean, refined design</li>\n");
        html.push_str("</ul>\n<h3>Cons</h3>\n<ul>\n");
        html.push_str("  <li>Priced at a premium</li>\n");
        html.push_str("  <li>Limited color options</li>\n");
        html.push_str("</ul>\n");
        html
    }

    fn link_section(&self, item: &Item) -> String {
        let price_text = item
            .price
            .as_deref()
            .map(|p| format!(" - {}", escape_html(p)))
            .unwrap_or_default();
        let mut html = String::from("<h2>Where to Buy</h2>\n");
        let _ = writeln!(
            html,
            "<p><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer nofollow\">Check the {} on the store{}</a></p>",
            escape_html(&item.source_url),
            escape_html(&item.display_name),
            price_text
        );
        html.push_str(
            "<p><small>Prices change frequently; confirm the current price on the product page.</small></p>\n",
        );
        html
    }

    fn conclusion(&self, item: &Item) -> String {
        let name = escape_html(&item.display_name);
        let category = escape_html(&item.category);
        let closers = [
            format!("The {name} is an easy recommendation for anyone shopping in {category}."),
            format!("If you are weighing options in {category}, the {name} belongs on the shortlist."),
            format!("All told, the {name} is one of the strongest {category} picks we have tested."),
        ];
        let closer = closers
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| closers[0].clone());
        format!(
            "<h2>Verdict</h2>\n<p>{closer} It earns its price, and as a long-term purchase it is easy to justify.</p>\n"
        )
    }

    /// Full HTML body for the post.
    pub fn body(&self, item: &Item) -> String {
        let mut content = String::new();
        let _ = write!(content, "<p>{}</p>\n\n", self.introduction(item));
        content.push_str(&self.features_section(item));
        content.push('\n');
        content.push_str(&self.usage_section(item));
        content.push('\n');
        content.push_str(&self.pros_cons_section(item));
        content.push('\n');
        content.push_str(&self.link_section(item));
        content.push('\n');
        content.push_str(&self.conclusion(item));
        content
    }

    /// Short plain-text summary for the excerpt and SEO description.
    pub fn meta_description(&self, item: &Item) -> String {
        let base = match (&item.description, item.features.first()) {
            (Some(description), _) => format!("{} review: {}", item.display_name, description),
            (None, Some(feature)) => format!("{} review: {}", item.display_name, feature),
            (None, None) => format!(
                "{} review: our hands-on impressions and verdict.",
                item.display_name
            ),
        };
        if base.chars().count() > 155 {
            let cut: String = base.chars().take(152).collect();
            format!("{cut}...")
        } else {
            base
        }
    }

    /// Comma-joined keyword list for SEO plugins.
    pub fn meta_keywords(&self, item: &Item) -> String {
        self.tags(item).join(",")
    }

    /// Tag names for the post, derived from the category and the product
    /// name.
    pub fn tags(&self, item: &Item) -> Vec<String> {
        let mut tags = vec![item.category.clone(), "review".to_string()];
        let name = item.display_name.to_lowercase();
        if name.contains("mouse") {
            tags.push("mouse".to_string());
        }
        if name.contains("keyboard") {
            tags.push("keyboard".to_string());
        }
        if name.contains("ssd") {
            tags.push("storage".to_string());
        }
        if name.contains("memory") || name.contains("ddr") {
            tags.push("memory".to_string());
        }
        if name.contains("monitor") || name.contains("display") {
            tags.push("monitor".to_string());
        }
        tags.dedup();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Item {
        Item {
            id: "B0TEST123".to_string(),
            display_name: "K70 RGB PRO Mechanical Keyboard".to_string(),
            full_name: None,
            source_url: "https://www.example-shop.com/dp/B0TEST123?tag=gadgetpress-20".to_string(),
            price: Some("$169.99".to_string()),
            image_url: None,
            description: Some("Flagship mechanical keyboard with per-key RGB".to_string()),
            category: "peripherals".to_string(),
            features: vec![
                "Cherry MX Red switches".to_string(),
                "8,000Hz polling".to_string(),
                "Aluminum frame".to_string(),
            ],
            rating: None,
        }
    }

    #[test]
    fn test_title_mentions_product_and_category() {
        let composer = PostComposer::new();
        let title = composer.title(&sample_item());
        assert!(title.contains("K70 RGB PRO Mechanical Keyboard"));
        assert!(title.contains("peripherals"));
        assert!(title.starts_with('['));
    }

    #[test]
    fn test_body_contains_all_sections() {
        let composer = PostComposer::new();
        let body = composer.body(&sample_item());
        assert!(body.contains("<h2>Key Features</h2>"));
        assert!(body.contains("<h2>How It Feels in Daily Use</h2>"));
        assert!(body.contains("<h2>Pros and Cons</h2>"));
        assert!(body.contains("<h2>Where to Buy</h2>"));
        assert!(body.contains("<h2>Verdict</h2>"));
    }

    #[test]
    fn test_body_lists_every_feature() {
        let composer = PostComposer::new();
        let item = sample_item();
        let body = composer.body(&item);
        for feature in &item.features {
            assert!(body.contains(&escape_html(feature)), "missing feature: {feature}");
        }
    }

    #[test]
    fn test_features_section_absent_without_features() {
        let composer = PostComposer::new();
        let mut item = sample_item();
        item.features.clear();
        let body = composer.body(&item);
        assert!(!body.contains("<h2>Key Features</h2>"));
    }

    #[test]
    fn test_link_section_has_nofollow_and_price() {
        let composer = PostComposer::new();
        let body = composer.body(&sample_item());
        assert!(body.contains("rel=\"noopener noreferrer nofollow\""));
        assert!(body.contains("$169.99"));
        assert!(body.contains("https://www.example-shop.com/dp/B0TEST123?tag=gadgetpress-20"));
    }

    #[test]
    fn test_html_is_escaped() {
        let composer = PostComposer::new();
        let mut item = sample_item();
        item.display_name = "Cable 2m <USB-C & USB-A>".to_string();
        item.features = vec!["Fast & durable".to_string()];
        let body = composer.body(&item);
        assert!(body.contains("&lt;USB-C &amp; USB-A&gt;"));
        assert!(body.contains("Fast &amp; durable"));
        assert!(!body.contains("<USB-C"));
    }

    #[test]
    fn test_meta_description_is_bounded() {
        let composer = PostComposer::new();
        let mut item = sample_item();
        item.description = Some("very long ".repeat(40));
        let description = composer.meta_description(&item);
        assert!(description.chars().count() <= 155);
        assert!(description.ends_with("..."));
    }

    #[test]
    fn test_introduction_prefers_full_name() {
        let composer = PostComposer::new();
        let mut item = sample_item();
        item.full_name = Some("Corsair K70 RGB PRO Mechanical Gaming Keyboard".to_string());
        let body = composer.body(&item);
        assert!(body.contains("Corsair K70 RGB PRO Mechanical Gaming Keyboard"));
    }

    #[test]
    fn test_tags_derive_from_name_and_category() {
        let composer = PostComposer::new();
        let tags = composer.tags(&sample_item());
        assert!(tags.contains(&"peripherals".to_string()));
        assert!(tags.contains(&"review".to_string()));
        assert!(tags.contains(&"keyboard".to_string()));
    }

    #[test]
    fn test_usage_section_keys_off_product_kind() {
        let composer = PostComposer::new();
        let mut item = sample_item();
        item.display_name = "980 PRO NVMe SSD 1TB".to_string();
        let body = composer.body(&item);
        assert!(body.contains("Boot times"));
    }
}

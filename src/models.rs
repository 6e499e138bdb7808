//! Data models for catalog items.
//!
//! This module defines the core entity shared by every stage of the
//! pipeline: [`Item`], one entry in the locally cached product catalog.
//! Items are produced by the upstream product search API, persisted as a
//! whole-catalog JSON snapshot, rotated through by the selection logic,
//! and finally rendered into a review post.
//!
//! # JSON Schema
//!
//! The persisted catalog and the upstream responses both use camelCase
//! field names, so the struct serializes with `rename_all = "camelCase"`.
//! Fields that the upstream may omit are explicit `Option`s rather than
//! presence-checked dynamic fields.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One product in the catalog.
///
/// `id` is the vendor-assigned stable identifier and the primary key of
/// the catalog: the persistent store replaces any existing entry with the
/// same `id` on insert.
///
/// # Fields
///
/// * `id` - Opaque unique identifier assigned by the vendor
/// * `display_name` - Short label used in titles
/// * `full_name` - Longer descriptive name used in body text
/// * `source_url` - Canonical product link carrying the partner tag
/// * `price` - Display string such as `"$59.99"`, not a structured amount
/// * `category` - Grouping label, also used for upstream searches
/// * `features` - Ordered bullet points; ordering is display-relevant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Vendor-assigned stable identifier, unique across the catalog.
    pub id: String,
    /// Short human-readable label, used as title context. Not unique.
    pub display_name: String,
    /// Longer descriptive name for body text, independent of `display_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Canonical external link, constructed from `id` plus the partner tag.
    pub source_url: String,
    /// Free-form display price, e.g. `"$129.00"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Primary product image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Free text, possibly synthesized from `features`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category label, e.g. `"peripherals"` or `"components"`.
    pub category: String,
    /// Ordered list of short feature strings.
    #[serde(default)]
    pub features: Vec<String>,
    /// Average customer rating, when the upstream provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
}

/// Display-price shape: a currency marker followed by digit groups.
static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s0-9]{1,4}\s?[0-9][0-9,.]*$").unwrap());

impl Item {
    /// Check whether a `price` value matches the expected display shape
    /// (currency symbol plus digit groups, e.g. `"¥14,800"` or `"$59.99"`).
    ///
    /// Returns `true` when the field is absent; only a present-but-garbled
    /// price violates the invariant.
    pub fn price_looks_valid(&self) -> bool {
        match &self.price {
            Some(p) => PRICE_PATTERN.is_match(p),
            None => true,
        }
    }
}

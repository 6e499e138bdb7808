//! Catalog cache and rotation management.
//!
//! [`RotationManager`] owns the three persisted collections (catalog,
//! posted-item history, refresh metadata) and decides which product the
//! pipeline publishes next. Two invariants drive the design:
//!
//! - **No repeats until exhaustion**: an item is never selected twice
//!   before every item in the catalog has been selected once. Once the
//!   whole catalog has been posted, the history resets and rotation
//!   starts over.
//! - **Staleness-triggered refresh**: when the catalog is older than a
//!   configured number of days, it is wholly replaced from the upstream
//!   search API before selection. A refresh that fails to produce any
//!   candidates leaves the previous catalog untouched.
//!
//! Selection itself never fails; callers receive `None` when nothing is
//! available and decide what that means for the run.

use crate::fetcher::{self, FetchPlan, ItemSource, Sleeper};
use crate::models::Item;
use crate::store::{CatalogStore, RefreshMetadata};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use std::error::Error;
use tracing::{info, instrument, warn};

/// Result of a successful selection.
///
/// `rotation_reset` is true when this pick triggered the exhaustion
/// reset, i.e. every catalog item had already been posted and the history
/// was cleared to start a new rotation.
#[derive(Debug, Clone)]
pub struct Pick {
    pub item: Item,
    pub rotation_reset: bool,
}

/// Owns the persisted catalog state for the duration of one run.
///
/// Constructed once per process, discarded at exit. The manager is the
/// single writer of the three backing files; no other component touches
/// them.
#[derive(Debug)]
pub struct RotationManager {
    store: CatalogStore,
    catalog: Vec<Item>,
    seen: HashSet<String>,
    meta: RefreshMetadata,
}

/// Whether the catalog is due for a full refresh.
///
/// A missing timestamp (first run) is not stale; the caller writes the
/// baseline instead. The boundary is inclusive: a catalog exactly
/// `threshold_days` old refreshes.
pub fn is_stale(meta: &RefreshMetadata, now: DateTime<Utc>, threshold_days: i64) -> bool {
    match meta.last_refresh_timestamp {
        Some(last) => (now - last).num_days() >= threshold_days,
        None => false,
    }
}

impl RotationManager {
    /// Load all three collections from `store`, each degrading to an
    /// empty default independently.
    #[instrument(level = "info", skip_all)]
    pub async fn load(store: CatalogStore) -> Self {
        let catalog = store.load_catalog().await;
        let seen: HashSet<String> = store.load_seen().await.into_iter().collect();
        let meta = store.load_metadata().await;
        info!(
            catalog = catalog.len(),
            posted = seen.len(),
            refresh_count = meta.refresh_count,
            "Rotation manager initialized"
        );
        Self {
            store,
            catalog,
            seen,
            meta,
        }
    }

    /// Number of items currently in the catalog.
    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }

    /// Number of items posted since the last reset.
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Look up a catalog item by id.
    pub fn find(&self, id: &str) -> Option<&Item> {
        self.catalog.iter().find(|item| item.id == id)
    }

    /// Per-category item counts, sorted by category name.
    pub fn category_counts(&self) -> Vec<(String, usize)> {
        self.catalog
            .iter()
            .map(|item| item.category.clone())
            .sorted()
            .dedup_with_count()
            .map(|(count, category)| (category, count))
            .collect()
    }

    /// Select the next item to publish, uniformly at random among items
    /// not yet posted in this rotation.
    ///
    /// When every item has been posted, the history is cleared (the
    /// exhaustion reset) and selection continues against the full
    /// catalog; the returned [`Pick`] flags this so callers can log or
    /// react. A `category` filter restricts selection to that category
    /// and yields `None` when no unseen item matches, even if other
    /// categories still have unseen items. An empty catalog always
    /// yields `None`.
    pub fn pick_next(&mut self, category: Option<&str>) -> Option<Pick> {
        if self.catalog.is_empty() {
            return None;
        }

        let mut rotation_reset = false;
        let mut available: Vec<&Item> = self
            .catalog
            .iter()
            .filter(|item| !self.seen.contains(&item.id))
            .collect();

        if available.is_empty() {
            warn!(
                catalog = self.catalog.len(),
                "Every catalog item has been posted; resetting rotation history"
            );
            self.seen.clear();
            available = self.catalog.iter().collect();
            rotation_reset = true;
        }

        if let Some(wanted) = category {
            available.retain(|item| item.category == wanted);
            if available.is_empty() {
                info!(category = wanted, "No unseen items in requested category");
                return None;
            }
        }

        let item = (*available.choose(&mut rand::rng())?).clone();
        info!(id = %item.id, name = %item.display_name, rotation_reset, "Selected item");
        Some(Pick {
            item,
            rotation_reset,
        })
    }

    /// Record that `id` has been published and persist the history.
    ///
    /// Idempotent: recording an id that is already present performs no
    /// write at all.
    pub async fn mark_seen(&mut self, id: &str) -> Result<(), Box<dyn Error>> {
        if !self.seen.insert(id.to_string()) {
            info!(id, "Item already recorded as posted; skipping write");
            return Ok(());
        }
        let ids: Vec<String> = self.seen.iter().cloned().sorted().collect();
        self.store.save_seen(&ids).await?;
        info!(id, posted = ids.len(), "Recorded posted item");
        Ok(())
    }

    /// Refresh the catalog from upstream if it has gone stale.
    ///
    /// On the first run (no recorded timestamp) the current time is
    /// written as the baseline and no refresh happens. Refresh failures
    /// are logged and swallowed; the run continues on the existing
    /// catalog. Returns whether a refresh actually completed.
    #[instrument(level = "info", skip(self, source, sleeper, plan))]
    pub async fn refresh_if_stale<S, Z>(
        &mut self,
        threshold_days: i64,
        source: &S,
        sleeper: &Z,
        plan: &FetchPlan,
    ) -> bool
    where
        S: ItemSource,
        Z: Sleeper,
    {
        let now = Utc::now();
        let Some(last) = self.meta.last_refresh_timestamp else {
            info!("No refresh timestamp recorded; writing baseline");
            self.meta.last_refresh_timestamp = Some(now);
            if let Err(e) = self.store.save_metadata(&self.meta).await {
                warn!(error = %e, "Failed to write baseline refresh metadata");
            }
            return false;
        };

        let age_days = (now - last).num_days();
        if !is_stale(&self.meta, now, threshold_days) {
            info!(age_days, threshold_days, "Catalog is fresh; no refresh needed");
            return false;
        }

        info!(age_days, threshold_days, "Catalog is stale; refreshing from upstream");
        match self.refresh(source, sleeper, plan).await {
            Ok(count) => {
                info!(count, "Catalog refresh completed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Catalog refresh failed; continuing with stale data");
                false
            }
        }
    }

    /// Unconditionally refresh the catalog, backing up the previous
    /// snapshot first. Used by the `refresh` subcommand; errors propagate
    /// so the scheduled job exits non-zero.
    pub async fn force_refresh<S, Z>(
        &mut self,
        source: &S,
        sleeper: &Z,
        plan: &FetchPlan,
    ) -> Result<usize, Box<dyn Error>>
    where
        S: ItemSource,
        Z: Sleeper,
    {
        self.store.backup_catalog().await?;
        self.refresh(source, sleeper, plan).await
    }

    /// Full refresh: clear history, accumulate candidates across every
    /// keyword group, dedup by id keeping first-seen order, truncate to
    /// the target count, and atomically replace the catalog.
    ///
    /// Zero candidates aborts before the replacement step, leaving the
    /// persisted catalog and metadata exactly as they were.
    async fn refresh<S, Z>(
        &mut self,
        source: &S,
        sleeper: &Z,
        plan: &FetchPlan,
    ) -> Result<usize, Box<dyn Error>>
    where
        S: ItemSource,
        Z: Sleeper,
    {
        self.seen.clear();
        self.store.save_seen(&[]).await?;
        info!("Cleared posted history for refresh");

        let candidates = fetcher::collect_candidates(source, sleeper, plan).await;
        if candidates.is_empty() {
            return Err("upstream fetch produced no candidates; keeping previous catalog".into());
        }

        let fresh: Vec<Item> = candidates
            .into_iter()
            .unique_by(|item| item.id.clone())
            .take(plan.target_count)
            .collect();

        self.store.save_catalog(&fresh).await?;
        self.catalog = fresh;
        self.meta.last_refresh_timestamp = Some(Utc::now());
        self.meta.refresh_count += 1;
        self.store.save_metadata(&self.meta).await?;

        Ok(self.catalog.len())
    }
}

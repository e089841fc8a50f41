//! Run reports. Each job returns one; the CLI prints it as JSON.

use std::collections::BTreeMap;

use cardex_core::Language;
use serde::Serialize;

/// Outcome of [`crate::Engine::enrich_language`],
/// [`crate::Engine::enrich_extended`], [`crate::Engine::enrich_sets`] and
/// [`crate::Engine::refresh_images`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
  pub language:         Language,
  /// Rows in the selection when the run started.
  pub total_candidates: u64,
  pub processed:        u64,
  pub enriched:         u64,
  pub not_found:        u64,
  /// Rows looked at but not fetched (or fetched and left alone).
  pub skipped:          u64,
  pub failed:           u64,
  /// The run stopped early on a shutdown signal.
  pub interrupted:      bool,
}

impl EnrichmentReport {
  pub fn new(language: Language, total_candidates: u64) -> Self {
    Self {
      language,
      total_candidates,
      processed: 0,
      enriched: 0,
      not_found: 0,
      skipped: 0,
      failed: 0,
      interrupted: false,
    }
  }

  pub(crate) fn log_progress(&self, job: &str, batch: u32) {
    tracing::info!(
      job,
      language = %self.language,
      batch,
      processed = self.processed,
      enriched = self.enriched,
      not_found = self.not_found,
      skipped = self.skipped,
      failed = self.failed,
      total = self.total_candidates,
      "batch done"
    );
  }
}

/// Outcome of [`crate::Engine::enrich_pricing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingReport {
  pub language:         Language,
  pub total_candidates: u64,
  pub processed:        u64,
  /// Rows that received a fresh snapshot.
  pub updated:          u64,
  /// Rows whose card exists upstream without any marketplace price.
  pub no_pricing:       u64,
  pub not_found:        u64,
  pub failed:           u64,
  pub interrupted:      bool,
}

impl PricingReport {
  pub fn new(language: Language, total_candidates: u64) -> Self {
    Self {
      language,
      total_candidates,
      processed: 0,
      updated: 0,
      no_pricing: 0,
      not_found: 0,
      failed: 0,
      interrupted: false,
    }
  }

  pub(crate) fn log_progress(&self, batch: u32) {
    tracing::info!(
      job = "pricing",
      language = %self.language,
      batch,
      processed = self.processed,
      updated = self.updated,
      no_pricing = self.no_pricing,
      not_found = self.not_found,
      failed = self.failed,
      total = self.total_candidates,
      "batch done"
    );
  }
}

/// Counters of one asset backfill, for one language or summed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillCounts {
  pub examined:          u64,
  pub filled:            u64,
  /// No English row with the same id: a region-exclusive.
  pub no_counterpart:    u64,
  /// The English row lacks the asset too.
  pub counterpart_empty: u64,
  pub failed:            u64,
}

impl BackfillCounts {
  fn add(&mut self, other: &BackfillCounts) {
    self.examined += other.examined;
    self.filled += other.filled;
    self.no_counterpart += other.no_counterpart;
    self.counterpart_empty += other.counterpart_empty;
    self.failed += other.failed;
  }
}

/// Outcome of [`crate::Engine::backfill_logos`] and
/// [`crate::Engine::backfill_card_images`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
  /// `"set_assets"` or `"card_images"`.
  pub asset:        &'static str,
  pub totals:       BackfillCounts,
  pub per_language: BTreeMap<Language, BackfillCounts>,
  pub interrupted:  bool,
}

impl BackfillReport {
  pub fn new(asset: &'static str) -> Self {
    Self { asset, totals: BackfillCounts::default(), per_language: BTreeMap::new(), interrupted: false }
  }

  pub(crate) fn record(&mut self, language: Language, counts: BackfillCounts) {
    self.totals.add(&counts);
    self.per_language.insert(language, counts);
  }
}

/// Outcome of [`crate::Engine::sync_sets`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
  pub language:    Language,
  /// Sets in the upstream listing.
  pub listed:      u64,
  pub inserted:    u64,
  /// Existing rows that had blank fields filled.
  pub merged:      u64,
  pub unchanged:   u64,
  pub failed:      u64,
  pub interrupted: bool,
}

impl SyncReport {
  pub fn new(language: Language, listed: u64) -> Self {
    Self {
      language,
      listed,
      inserted: 0,
      merged: 0,
      unchanged: 0,
      failed: 0,
      interrupted: false,
    }
  }
}

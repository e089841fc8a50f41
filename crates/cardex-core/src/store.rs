//! The `CatalogStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `cardex-store-sqlite`).
//! The engines depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  Language,
  card::{Card, CardAttributes, CardKey},
  enrichment::EnrichmentState,
  pricing::PricingSnapshot,
  set::{Set, SetAttributes, SetKey},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Store errors must say whether they doom the whole run.
///
/// A fatal error (database unreachable, schema mismatch) aborts the run; any
/// other error is confined to the row being written and is counted as a
/// failure for that row only.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn is_fatal(&self) -> bool;
}

// ─── Query types ─────────────────────────────────────────────────────────────

/// Which card rows a listing returns. All listings are per language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardSelection {
  /// Marker field (`category`) empty and not yet enriched. Includes
  /// `NotFound` rows so callers can see and skip them.
  PendingEnrichment,
  /// Enriched rows whose `image_url` is still empty.
  EnrichedMissingImage,
  /// Any row whose `image_url` is empty.
  MissingImage,
  /// Enriched rows whose pricing is absent or was stamped before the cutoff.
  /// A `None` cutoff selects every enriched row.
  PricingDue { stamped_before: Option<DateTime<Utc>> },
  /// Rows with the marker field present but `abilities` or `attacks` still
  /// absent, last checked before the cutoff (or never). A `None` cutoff
  /// ignores the check time.
  MissingExtended { checked_before: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetSelection {
  /// Not yet enriched (pending or not found).
  PendingEnrichment,
  /// Logo or symbol empty.
  MissingAssets,
}

/// One page of a keyset-paginated listing, ordered by `external_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
  /// Only rows with `external_id` strictly greater than this.
  pub after: Option<String>,
  pub limit: usize,
}

impl PageRequest {
  pub fn first(limit: usize) -> Self { Self { after: None, limit } }
}

/// A row as returned by a listing: its key and enrichment state only.
///
/// The attribute columns are decoded by the per-row reads and writes, so one
/// undecodable row cannot stall the listing it appears in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listed<K> {
  pub key:        K,
  pub enrichment: EnrichmentState,
}

/// What an upsert did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
  Inserted,
  /// The row existed; the listed fields were blank and got filled.
  Merged { filled: Vec<&'static str> },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the per-language catalog store.
///
/// Every write touches exactly one row and commits on its own, so an
/// interrupted run never leaves a half-written batch behind.
pub trait CatalogStore: Send + Sync {
  type Error: StoreError;

  // ── Upserts ───────────────────────────────────────────────────────────

  /// Insert the card, or fill-missing merge its attributes into the
  /// existing row with the same key. Pricing and state of an existing row
  /// are left alone.
  fn upsert_card(
    &self,
    card: Card,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + '_;

  /// Set counterpart of [`CatalogStore::upsert_card`].
  fn upsert_set(
    &self,
    set: Set,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_card(
    &self,
    key: CardKey,
  ) -> impl Future<Output = Result<Option<Card>, Self::Error>> + Send + '_;

  fn get_set(
    &self,
    key: SetKey,
  ) -> impl Future<Output = Result<Option<Set>, Self::Error>> + Send + '_;

  fn count_cards(
    &self,
    language: Language,
    selection: CardSelection,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn list_cards(
    &self,
    language: Language,
    selection: CardSelection,
    page: PageRequest,
  ) -> impl Future<Output = Result<Vec<Listed<CardKey>>, Self::Error>> + Send + '_;

  fn count_sets(
    &self,
    language: Language,
    selection: SetSelection,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn list_sets(
    &self,
    language: Language,
    selection: SetSelection,
    page: PageRequest,
  ) -> impl Future<Output = Result<Vec<Listed<SetKey>>, Self::Error>> + Send + '_;

  // ── Card writes ───────────────────────────────────────────────────────

  /// Fill-missing merge upstream attributes into the row and mark it
  /// enriched at `at`. Returns the names of the fields that were filled.
  fn fill_card(
    &self,
    key: CardKey,
    attrs: CardAttributes,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<&'static str>, Self::Error>> + Send + '_;

  /// Record that the upstream has no detail for this card.
  fn mark_card_not_found(
    &self,
    key: CardKey,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Set `image_url` only if it is currently empty. Returns whether the row
  /// was written.
  fn fill_card_image(
    &self,
    key: CardKey,
    image_url: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Overwrite the pricing snapshot (with nothing, if `None`) and stamp
  /// `pricing_updated_at`.
  fn replace_card_pricing(
    &self,
    key: CardKey,
    pricing: Option<PricingSnapshot>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Set writes ────────────────────────────────────────────────────────

  fn fill_set(
    &self,
    key: SetKey,
    attrs: SetAttributes,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<&'static str>, Self::Error>> + Send + '_;

  fn mark_set_not_found(
    &self,
    key: SetKey,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Fill `logo_url` / `symbol_url` where currently empty. Returns the names
  /// of the columns that were written.
  fn fill_set_assets(
    &self,
    key: SetKey,
    logo_url: Option<String>,
    symbol_url: Option<String>,
  ) -> impl Future<Output = Result<Vec<&'static str>, Self::Error>> + Send + '_;
}

//! Upstream data sources and the fetch outcome taxonomy.
//!
//! A fetch has three results, and callers must keep them apart:
//!
//! - `Ok(FetchOutcome::Found(_))`: data to merge.
//! - `Ok(FetchOutcome::NotFound)`: the upstream definitively has no record
//!   for this identifier in this language. Terminal; not an error.
//! - `Err(FetchError::Failed { .. })`: transient trouble that survived the
//!   client's retries. The row should be left alone and tried next run.

use std::future::Future;

use thiserror::Error;

use crate::{
  Language,
  card::CardDetail,
  pricing::PricingSnapshot,
  set::{SetDetail, SetSummary},
};

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
  Found(T),
  NotFound,
}

impl<T> FetchOutcome<T> {
  pub fn found(self) -> Option<T> {
    match self {
      Self::Found(v) => Some(v),
      Self::NotFound => None,
    }
  }

  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound) }
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
  #[error("fetch failed after {attempts} attempt(s): {reason}")]
  Failed { attempts: u32, reason: String },
}

impl FetchError {
  pub fn attempts(&self) -> u32 {
    match self {
      Self::Failed { attempts, .. } => *attempts,
    }
  }
}

pub type FetchResult<T> = Result<FetchOutcome<T>, FetchError>;

/// The upstream card/set catalog.
pub trait CatalogSource: Send + Sync {
  fn fetch_card_detail<'a>(
    &'a self,
    external_id: &'a str,
    language: Language,
  ) -> impl Future<Output = FetchResult<CardDetail>> + Send + 'a;

  fn fetch_set_detail<'a>(
    &'a self,
    external_id: &'a str,
    language: Language,
  ) -> impl Future<Output = FetchResult<SetDetail>> + Send + 'a;

  /// Every set the upstream knows in `language`.
  fn fetch_set_list(
    &self,
    language: Language,
  ) -> impl Future<Output = Result<Vec<SetSummary>, FetchError>> + Send + '_;
}

/// A marketplace price feed.
pub trait PricingSource: Send + Sync {
  /// `Found(None)` means the card exists upstream but no marketplace lists
  /// a price for it.
  fn fetch_pricing<'a>(
    &'a self,
    external_id: &'a str,
    language: Language,
  ) -> impl Future<Output = FetchResult<Option<PricingSnapshot>>> + Send + 'a;
}

//! Per-row enrichment state.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Where a row stands with respect to catalog enrichment.
///
/// `NotFound` is terminal: the upstream was asked and had no record, which is
/// common for older and region-exclusive identifiers. It is distinct from
/// `Pending` so a rerun does not hammer the upstream with the same misses.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentState {
  #[default]
  Pending,
  Enriched,
  NotFound,
}

impl EnrichmentState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Enriched => "enriched",
      Self::NotFound => "not_found",
    }
  }
}

impl FromStr for EnrichmentState {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "enriched" => Ok(Self::Enriched),
      "not_found" => Ok(Self::NotFound),
      other => Err(Error::UnknownEnrichmentState(other.to_owned())),
    }
  }
}

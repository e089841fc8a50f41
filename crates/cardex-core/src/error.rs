//! Error types for `cardex-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown language code: {0:?}")]
  UnknownLanguage(String),

  #[error("unknown enrichment state: {0:?}")]
  UnknownEnrichmentState(String),

  #[error("unknown marketplace: {0:?}")]
  UnknownMarketplace(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

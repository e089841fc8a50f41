use thiserror::Error;

/// Errors raised while setting the client up. Per-request trouble is
/// reported through [`cardex_core::source::FetchError`] instead.
#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Build(#[source] reqwest::Error),

  #[error("invalid base URL {0:?}")]
  InvalidBaseUrl(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

use cardex_core::source::FetchError;
use thiserror::Error;

/// Errors that end a whole run. Row-level trouble is counted in the run's
/// report instead.
#[derive(Debug, Error)]
pub enum Error {
  #[error("store: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("http client: {0}")]
  Fetch(#[from] FetchError),

  #[error("config: {0}")]
  Config(#[from] config::ConfigError),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

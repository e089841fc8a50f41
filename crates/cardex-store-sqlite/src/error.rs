//! Error type for `cardex-store-sqlite`.

use cardex_core::{card::CardKey, set::SetKey, store::StoreError};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] cardex_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A column held a value that does not decode into its domain type.
  #[error("decode error: {0}")]
  Decode(String),

  #[error("card not found: {0}")]
  CardNotFound(CardKey),

  #[error("set not found: {0}")]
  SetNotFound(SetKey),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    // Errors raised by our own decoding inside `Connection::call` travel
    // boxed in `Other`; unwrap them back into their own variant.
    match e {
      tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
        Ok(own) => *own,
        Err(inner) => Error::Database(tokio_rusqlite::Error::Other(inner)),
      },
      e => Error::Database(e),
    }
  }
}

/// Box a crate error so it can cross the `Connection::call` boundary.
pub(crate) fn boxed(e: impl Into<Error>) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e.into()))
}

impl StoreError for Error {
  fn is_fatal(&self) -> bool {
    match self {
      Self::Database(e) => database_error_is_fatal(e),
      _ => false,
    }
  }
}

fn database_error_is_fatal(e: &tokio_rusqlite::Error) -> bool {
  match e {
    tokio_rusqlite::Error::ConnectionClosed => true,
    tokio_rusqlite::Error::Close(_) => true,
    tokio_rusqlite::Error::Rusqlite(e) => sqlite_error_is_fatal(e),
    _ => false,
  }
}

fn sqlite_error_is_fatal(e: &rusqlite::Error) -> bool {
  match e {
    rusqlite::Error::SqliteFailure(err, msg) => match err.code {
      ErrorCode::CannotOpen
      | ErrorCode::NotADatabase
      | ErrorCode::DatabaseCorrupt
      | ErrorCode::SystemIoFailure
      | ErrorCode::ReadOnly
      | ErrorCode::PermissionDenied
      | ErrorCode::DiskFull
      | ErrorCode::OutOfMemory
      | ErrorCode::FileLockingProtocolFailed => true,
      // SQLITE_ERROR: a missing table or column means the schema is not
      // the one this binary expects.
      ErrorCode::Unknown => msg
        .as_deref()
        .is_some_and(|m| m.contains("no such table") || m.contains("no such column")),
      _ => false,
    },
    // A wrongly typed value in one row is that row's problem; only a missing
    // column says the schema is off.
    rusqlite::Error::InvalidColumnIndex(_) | rusqlite::Error::InvalidColumnName(_) => true,
    _ => false,
  }
}

//! Rate-limited HTTP client for the TCGdex catalog API.
//!
//! [`TcgdexClient`] implements both [`cardex_core::source::CatalogSource`]
//! and [`cardex_core::source::PricingSource`]. Every outbound request passes
//! through one shared [`Throttle`], and transient failures are retried with
//! exponential backoff before surfacing as
//! [`cardex_core::source::FetchError::Failed`].

mod client;
mod throttle;
mod wire;

pub mod error;

pub use client::{ClientConfig, DEFAULT_BASE_URL, TcgdexClient};
pub use error::{Error, Result};
pub use throttle::Throttle;

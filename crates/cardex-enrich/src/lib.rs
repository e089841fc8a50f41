//! Enrichment, pricing and asset backfill engines for the cardex catalog.
//!
//! All jobs hang off [`Engine`], which pairs a [`CatalogStore`] with an
//! upstream source. Jobs run one language at a time, one row at a time, and
//! every write commits on its own, so a run can be killed and simply started
//! again.
//!
//! [`CatalogStore`]: cardex_core::store::CatalogStore

pub mod backfill;
pub mod batch;
pub mod config;
pub mod enrich;
pub mod error;
pub mod pricing;
pub mod report;
pub mod shutdown;
pub mod sync;

pub use batch::BatchOptions;
pub use enrich::{EnrichOptions, ExtendedOptions};
pub use error::{Error, Result};
pub use pricing::PricingOptions;
pub use shutdown::Shutdown;

// ─── Engine ──────────────────────────────────────────────────────────────────

/// A store, an upstream source and the shutdown flag every job observes.
///
/// The source type is free: the backfill jobs never go upstream and work
/// with `()`.
pub struct Engine<S, C> {
  pub store:    S,
  pub source:   C,
  pub shutdown: Shutdown,
}

impl<S, C> Engine<S, C> {
  pub fn new(store: S, source: C) -> Self {
    Self { store, source, shutdown: Shutdown::new() }
  }

  pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
    self.shutdown = shutdown;
    self
  }
}

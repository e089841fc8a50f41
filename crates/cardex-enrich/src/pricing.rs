//! Marketplace pricing refresh. Snapshots are replaced, never merged.

use cardex_core::{
  Language,
  card::CardKey,
  source::{FetchOutcome, PricingSource},
  store::{CardSelection, CatalogStore, Listed},
};
use chrono::{Duration, Utc};

use crate::{
  BatchOptions, Engine, Error, Result,
  batch::{absorb, walk},
  report::PricingReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingOptions {
  pub batch:   BatchOptions,
  /// Re-price rows stamped longer ago than this. `None` re-prices every
  /// enriched row.
  pub max_age: Option<Duration>,
}

impl Default for PricingOptions {
  fn default() -> Self {
    Self { batch: BatchOptions::default(), max_age: Some(Duration::hours(24)) }
  }
}

impl<S, C> Engine<S, C>
where
  S: CatalogStore,
  C: PricingSource,
{
  /// Refresh the pricing snapshot of every enriched card of `language` that
  /// is due.
  ///
  /// A killed run resumes where it stopped: rows it already priced carry a
  /// fresh stamp and fall outside the `max_age` window.
  pub async fn enrich_pricing(
    &self,
    language: Language,
    options: &PricingOptions,
  ) -> Result<PricingReport> {
    let selection = CardSelection::PricingDue {
      stamped_before: options.max_age.map(|age| Utc::now() - age),
    };
    let total = self
      .store
      .count_cards(language, selection)
      .await
      .map_err(Error::store)?;
    tracing::info!(%language, total, "starting pricing refresh");

    let mut report = PricingReport::new(language, total);
    let interrupted = walk(
      options.batch,
      &self.shutdown,
      &mut report,
      async |page| {
        self.store.list_cards(language, selection, page).await.map_err(Error::store)
      },
      async |report: &mut PricingReport, card: Listed<CardKey>| {
        report.processed += 1;
        self.price_card(card.key, report).await
      },
      |report, batch| report.log_progress(batch),
    )
    .await?;
    report.interrupted = interrupted;

    tracing::info!(
      %language,
      updated = report.updated,
      no_pricing = report.no_pricing,
      not_found = report.not_found,
      failed = report.failed,
      interrupted = report.interrupted,
      "pricing refresh finished"
    );
    Ok(report)
  }

  async fn price_card(&self, key: CardKey, report: &mut PricingReport) -> Result<()> {
    let pricing = match self
      .source
      .fetch_pricing(&key.external_id, key.language)
      .await
    {
      Ok(FetchOutcome::Found(pricing)) => pricing,
      Ok(FetchOutcome::NotFound) => {
        tracing::debug!(card = %key, "not found upstream; pricing untouched");
        report.not_found += 1;
        return Ok(());
      }
      Err(e) => {
        tracing::warn!(card = %key, error = %e, "pricing fetch failed");
        report.failed += 1;
        return Ok(());
      }
    };

    let priced = pricing.is_some();
    let sources = pricing.as_ref().map(|p| p.sources()).unwrap_or_default();
    match self.store.replace_card_pricing(key.clone(), pricing, Utc::now()).await {
      Ok(()) if priced => {
        tracing::debug!(card = %key, %sources, "pricing updated");
        report.updated += 1;
      }
      Ok(()) => report.no_pricing += 1,
      Err(e) => {
        absorb(e, &key)?;
        report.failed += 1;
      }
    }
    Ok(())
  }
}

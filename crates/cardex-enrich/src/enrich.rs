//! Catalog enrichment: fill blank card and set fields from the upstream
//! detail endpoints.

use cardex_core::{
  Language,
  card::CardKey,
  enrichment::EnrichmentState,
  set::SetKey,
  source::{CatalogSource, FetchOutcome},
  store::{CardSelection, CatalogStore, Listed, SetSelection},
};
use chrono::{Duration, Utc};

use crate::{
  BatchOptions, Engine, Error, Result,
  batch::{absorb, walk},
  report::EnrichmentReport,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichOptions {
  pub batch:           BatchOptions,
  /// Fetch rows already recorded as not found instead of skipping them.
  pub retry_not_found: bool,
}

/// Options for [`Engine::enrich_extended`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedOptions {
  pub batch:         BatchOptions,
  /// Skip rows checked more recently than this. Trainer and Energy cards
  /// never gain attacks, so without a window they would be fetched on every
  /// run. `None` fetches every selected row.
  pub recheck_after: Option<Duration>,
}

impl Default for ExtendedOptions {
  fn default() -> Self {
    Self { batch: BatchOptions::default(), recheck_after: Some(Duration::days(7)) }
  }
}

impl<S, C> Engine<S, C>
where
  S: CatalogStore,
  C: CatalogSource,
{
  /// Enrich every card of `language` whose marker field is still empty.
  ///
  /// Upstream values only ever fill blank fields. Rows already known to be
  /// missing upstream are counted as skipped unless
  /// [`EnrichOptions::retry_not_found`] is set.
  pub async fn enrich_language(
    &self,
    language: Language,
    options: &EnrichOptions,
  ) -> Result<EnrichmentReport> {
    let selection = CardSelection::PendingEnrichment;
    let total = self
      .store
      .count_cards(language, selection)
      .await
      .map_err(Error::store)?;
    tracing::info!(%language, total, "starting card enrichment");

    let mut report = EnrichmentReport::new(language, total);
    let interrupted = walk(
      options.batch,
      &self.shutdown,
      &mut report,
      async |page| {
        self.store.list_cards(language, selection, page).await.map_err(Error::store)
      },
      async |report: &mut EnrichmentReport, card: Listed<CardKey>| {
        report.processed += 1;
        self.enrich_card(card, options, report).await
      },
      |report, batch| report.log_progress("enrich", batch),
    )
    .await?;
    report.interrupted = interrupted;

    tracing::info!(
      %language,
      enriched = report.enriched,
      not_found = report.not_found,
      skipped = report.skipped,
      failed = report.failed,
      interrupted = report.interrupted,
      "card enrichment finished"
    );
    Ok(report)
  }

  async fn enrich_card(
    &self,
    card: Listed<CardKey>,
    options: &EnrichOptions,
    report: &mut EnrichmentReport,
  ) -> Result<()> {
    if card.enrichment == EnrichmentState::NotFound && !options.retry_not_found {
      report.skipped += 1;
      return Ok(());
    }

    let key = card.key;
    match self
      .source
      .fetch_card_detail(&key.external_id, key.language)
      .await
    {
      Ok(FetchOutcome::Found(detail)) => {
        match self.store.fill_card(key.clone(), detail.attrs, Utc::now()).await {
          Ok(filled) => {
            tracing::debug!(card = %key, ?filled, "enriched");
            report.enriched += 1;
          }
          Err(e) => {
            absorb(e, &key)?;
            report.failed += 1;
          }
        }
      }
      Ok(FetchOutcome::NotFound) => self.card_not_found(key, report).await?,
      Err(e) => {
        tracing::warn!(card = %key, error = %e, "fetch failed; leaving row for the next run");
        report.failed += 1;
      }
    }
    Ok(())
  }

  async fn card_not_found(&self, key: CardKey, report: &mut EnrichmentReport) -> Result<()> {
    match self.store.mark_card_not_found(key.clone(), Utc::now()).await {
      Ok(()) => {
        tracing::debug!(card = %key, "not found upstream");
        report.not_found += 1;
      }
      Err(e) => {
        absorb(e, &key)?;
        report.failed += 1;
      }
    }
    Ok(())
  }

  /// Re-fetch cards of `language` that carry the marker field but still lack
  /// abilities or attacks, and fill whatever the detail now has.
  ///
  /// Rows imported before the extended fields were stored are the usual
  /// case. A fetch that fills nothing counts as skipped; the row's check
  /// time still moves so the [`ExtendedOptions::recheck_after`] window holds.
  pub async fn enrich_extended(
    &self,
    language: Language,
    options: &ExtendedOptions,
  ) -> Result<EnrichmentReport> {
    let selection = CardSelection::MissingExtended {
      checked_before: options.recheck_after.map(|age| Utc::now() - age),
    };
    let total = self
      .store
      .count_cards(language, selection)
      .await
      .map_err(Error::store)?;
    tracing::info!(%language, total, "starting extended field enrichment");

    let mut report = EnrichmentReport::new(language, total);
    let interrupted = walk(
      options.batch,
      &self.shutdown,
      &mut report,
      async |page| {
        self.store.list_cards(language, selection, page).await.map_err(Error::store)
      },
      async |report: &mut EnrichmentReport, card: Listed<CardKey>| {
        report.processed += 1;
        self.extend_card(card.key, report).await
      },
      |report, batch| report.log_progress("enrich-extended", batch),
    )
    .await?;
    report.interrupted = interrupted;

    tracing::info!(
      %language,
      enriched = report.enriched,
      skipped = report.skipped,
      not_found = report.not_found,
      failed = report.failed,
      interrupted = report.interrupted,
      "extended field enrichment finished"
    );
    Ok(report)
  }

  async fn extend_card(&self, key: CardKey, report: &mut EnrichmentReport) -> Result<()> {
    match self
      .source
      .fetch_card_detail(&key.external_id, key.language)
      .await
    {
      Ok(FetchOutcome::Found(detail)) => {
        match self.store.fill_card(key.clone(), detail.attrs, Utc::now()).await {
          Ok(filled) if filled.is_empty() => report.skipped += 1,
          Ok(filled) => {
            tracing::debug!(card = %key, ?filled, "extended fields filled");
            report.enriched += 1;
          }
          Err(e) => {
            absorb(e, &key)?;
            report.failed += 1;
          }
        }
      }
      Ok(FetchOutcome::NotFound) => self.card_not_found(key, report).await?,
      Err(e) => {
        tracing::warn!(card = %key, error = %e, "fetch failed; leaving row for the next run");
        report.failed += 1;
      }
    }
    Ok(())
  }

  /// Enrich every set of `language` not yet enriched, from the set detail
  /// endpoint.
  pub async fn enrich_sets(
    &self,
    language: Language,
    options: &EnrichOptions,
  ) -> Result<EnrichmentReport> {
    let selection = SetSelection::PendingEnrichment;
    let total = self
      .store
      .count_sets(language, selection)
      .await
      .map_err(Error::store)?;
    tracing::info!(%language, total, "starting set enrichment");

    let mut report = EnrichmentReport::new(language, total);
    let interrupted = walk(
      options.batch,
      &self.shutdown,
      &mut report,
      async |page| {
        self.store.list_sets(language, selection, page).await.map_err(Error::store)
      },
      async |report: &mut EnrichmentReport, set: Listed<SetKey>| {
        report.processed += 1;
        self.enrich_set(set, options, report).await
      },
      |report, batch| report.log_progress("enrich-sets", batch),
    )
    .await?;
    report.interrupted = interrupted;

    Ok(report)
  }

  async fn enrich_set(
    &self,
    set: Listed<SetKey>,
    options: &EnrichOptions,
    report: &mut EnrichmentReport,
  ) -> Result<()> {
    if set.enrichment == EnrichmentState::NotFound && !options.retry_not_found {
      report.skipped += 1;
      return Ok(());
    }

    let key = set.key;
    match self
      .source
      .fetch_set_detail(&key.external_id, key.language)
      .await
    {
      Ok(FetchOutcome::Found(detail)) => {
        match self.store.fill_set(key.clone(), detail.attrs, Utc::now()).await {
          Ok(filled) => {
            tracing::debug!(set = %key, ?filled, "enriched");
            report.enriched += 1;
          }
          Err(e) => {
            absorb(e, &key)?;
            report.failed += 1;
          }
        }
      }
      Ok(FetchOutcome::NotFound) => {
        match self.store.mark_set_not_found(key.clone(), Utc::now()).await {
          Ok(()) => report.not_found += 1,
          Err(e) => {
            absorb(e, &key)?;
            report.failed += 1;
          }
        }
      }
      Err(e) => {
        tracing::warn!(set = %key, error = %e, "fetch failed; leaving row for the next run");
        report.failed += 1;
      }
    }
    Ok(())
  }

  /// Re-fetch enriched cards of `language` that still have no image and
  /// fill `image_url` only.
  pub async fn refresh_images(
    &self,
    language: Language,
    options: &EnrichOptions,
  ) -> Result<EnrichmentReport> {
    let selection = CardSelection::EnrichedMissingImage;
    let total = self
      .store
      .count_cards(language, selection)
      .await
      .map_err(Error::store)?;
    tracing::info!(%language, total, "starting image refresh");

    let mut report = EnrichmentReport::new(language, total);
    let interrupted = walk(
      options.batch,
      &self.shutdown,
      &mut report,
      async |page| {
        self.store.list_cards(language, selection, page).await.map_err(Error::store)
      },
      async |report: &mut EnrichmentReport, card: Listed<CardKey>| {
        report.processed += 1;
        self.refresh_image(card.key, report).await
      },
      |report, batch| report.log_progress("refresh-images", batch),
    )
    .await?;
    report.interrupted = interrupted;

    Ok(report)
  }

  async fn refresh_image(&self, key: CardKey, report: &mut EnrichmentReport) -> Result<()> {
    match self
      .source
      .fetch_card_detail(&key.external_id, key.language)
      .await
    {
      Ok(FetchOutcome::Found(detail)) => match detail.attrs.image_url {
        Some(url) => match self.store.fill_card_image(key.clone(), url).await {
          Ok(true) => report.enriched += 1,
          Ok(false) => report.skipped += 1,
          Err(e) => {
            absorb(e, &key)?;
            report.failed += 1;
          }
        },
        None => report.skipped += 1,
      },
      Ok(FetchOutcome::NotFound) => report.not_found += 1,
      Err(e) => {
        tracing::warn!(card = %key, error = %e, "fetch failed; leaving row for the next run");
        report.failed += 1;
      }
    }
    Ok(())
  }
}

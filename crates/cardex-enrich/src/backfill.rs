//! Cross-language asset backfill.
//!
//! The upstream serves logos and card scans for English far more completely
//! than for other languages, and the assets are language-neutral. These jobs
//! copy them from the English row with the same external id into every
//! non-English row where they are empty. No upstream calls are made.

use cardex_core::{
  Language,
  card::CardKey,
  set::SetKey,
  store::{CardSelection, CatalogStore, Listed, SetSelection},
};

use crate::{
  BatchOptions, Engine, Error, Result,
  batch::{absorb, walk},
  report::{BackfillCounts, BackfillReport},
};

fn log_batch(counts: &BackfillCounts, batch: u32) {
  tracing::debug!(
    batch,
    examined = counts.examined,
    filled = counts.filled,
    failed = counts.failed,
    "backfill batch done"
  );
}

impl<S, C> Engine<S, C>
where
  S: CatalogStore,
{
  /// Fill empty set `logo_url` / `symbol_url` from the English twin, for
  /// every non-English language.
  pub async fn backfill_logos(&self, batch: BatchOptions) -> Result<BackfillReport> {
    let mut report = BackfillReport::new("set_assets");
    for language in Language::non_english() {
      let (counts, interrupted) = self.backfill_set_assets(language, batch).await?;
      tracing::info!(
        %language,
        examined = counts.examined,
        filled = counts.filled,
        no_counterpart = counts.no_counterpart,
        counterpart_empty = counts.counterpart_empty,
        "set asset backfill done"
      );
      report.record(language, counts);
      if interrupted {
        report.interrupted = true;
        break;
      }
    }
    Ok(report)
  }

  async fn backfill_set_assets(
    &self,
    language: Language,
    batch: BatchOptions,
  ) -> Result<(BackfillCounts, bool)> {
    let mut counts = BackfillCounts::default();
    let interrupted = walk(
      batch,
      &self.shutdown,
      &mut counts,
      async |page| {
        self
          .store
          .list_sets(language, SetSelection::MissingAssets, page)
          .await
          .map_err(Error::store)
      },
      async |counts: &mut BackfillCounts, set: Listed<SetKey>| {
        counts.examined += 1;
        self.copy_set_assets(set.key, counts).await
      },
      log_batch,
    )
    .await?;
    Ok((counts, interrupted))
  }

  async fn copy_set_assets(&self, key: SetKey, counts: &mut BackfillCounts) -> Result<()> {
    let english = match self.store.get_set(key.in_language(Language::En)).await {
      Ok(Some(english)) => english,
      Ok(None) => {
        counts.no_counterpart += 1;
        return Ok(());
      }
      Err(e) => {
        absorb(e, &key)?;
        counts.failed += 1;
        return Ok(());
      }
    };

    match self
      .store
      .fill_set_assets(key.clone(), english.attrs.logo_url, english.attrs.symbol_url)
      .await
    {
      Ok(filled) if filled.is_empty() => counts.counterpart_empty += 1,
      Ok(filled) => {
        tracing::debug!(set = %key, ?filled, "assets copied from English");
        counts.filled += 1;
      }
      Err(e) => {
        absorb(e, &key)?;
        counts.failed += 1;
      }
    }
    Ok(())
  }

  /// Fill empty card `image_url` from the English twin, for every
  /// non-English language.
  pub async fn backfill_card_images(&self, batch: BatchOptions) -> Result<BackfillReport> {
    let mut report = BackfillReport::new("card_images");
    for language in Language::non_english() {
      let (counts, interrupted) = self.backfill_images(language, batch).await?;
      tracing::info!(
        %language,
        examined = counts.examined,
        filled = counts.filled,
        no_counterpart = counts.no_counterpart,
        counterpart_empty = counts.counterpart_empty,
        "card image backfill done"
      );
      report.record(language, counts);
      if interrupted {
        report.interrupted = true;
        break;
      }
    }
    Ok(report)
  }

  async fn backfill_images(
    &self,
    language: Language,
    batch: BatchOptions,
  ) -> Result<(BackfillCounts, bool)> {
    let mut counts = BackfillCounts::default();
    let interrupted = walk(
      batch,
      &self.shutdown,
      &mut counts,
      async |page| {
        self
          .store
          .list_cards(language, CardSelection::MissingImage, page)
          .await
          .map_err(Error::store)
      },
      async |counts: &mut BackfillCounts, card: Listed<CardKey>| {
        counts.examined += 1;
        self.copy_card_image(card.key, counts).await
      },
      log_batch,
    )
    .await?;
    Ok((counts, interrupted))
  }

  async fn copy_card_image(&self, key: CardKey, counts: &mut BackfillCounts) -> Result<()> {
    let english = match self.store.get_card(key.in_language(Language::En)).await {
      Ok(Some(english)) => english,
      Ok(None) => {
        counts.no_counterpart += 1;
        return Ok(());
      }
      // An undecodable English row is that row's problem, not this one's.
      Err(e) => {
        absorb(e, &key)?;
        counts.failed += 1;
        return Ok(());
      }
    };
    let Some(image_url) = english.attrs.image_url else {
      counts.counterpart_empty += 1;
      return Ok(());
    };

    match self.store.fill_card_image(key.clone(), image_url).await {
      Ok(true) => counts.filled += 1,
      Ok(false) => counts.counterpart_empty += 1,
      Err(e) => {
        absorb(e, &key)?;
        counts.failed += 1;
      }
    }
    Ok(())
  }
}

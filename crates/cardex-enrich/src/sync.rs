//! Set listing sync: make sure every set the upstream lists has a row.

use cardex_core::{
  Language,
  source::CatalogSource,
  store::{CatalogStore, UpsertOutcome},
};

use crate::{Engine, Result, batch::absorb, report::SyncReport};

impl<S, C> Engine<S, C>
where
  S: CatalogStore,
  C: CatalogSource,
{
  /// Upsert every set the upstream lists for `language`.
  ///
  /// New sets are inserted as pending; existing rows only get blank fields
  /// filled. A failed listing fetch ends the run, since there is nothing to
  /// sync without it.
  pub async fn sync_sets(&self, language: Language) -> Result<SyncReport> {
    let summaries = self.source.fetch_set_list(language).await?;
    tracing::info!(%language, listed = summaries.len(), "starting set sync");

    let mut report = SyncReport::new(language, summaries.len() as u64);
    for summary in summaries {
      if self.shutdown.is_triggered() {
        report.interrupted = true;
        break;
      }

      let set = summary.into_set(language);
      let key = set.key.clone();
      match self.store.upsert_set(set).await {
        Ok(UpsertOutcome::Inserted) => report.inserted += 1,
        Ok(UpsertOutcome::Merged { filled }) if filled.is_empty() => report.unchanged += 1,
        Ok(UpsertOutcome::Merged { filled }) => {
          tracing::debug!(set = %key, ?filled, "filled from listing");
          report.merged += 1;
        }
        Err(e) => {
          absorb(e, &key)?;
          report.failed += 1;
        }
      }
    }

    tracing::info!(
      %language,
      inserted = report.inserted,
      merged = report.merged,
      unchanged = report.unchanged,
      failed = report.failed,
      "set sync finished"
    );
    Ok(report)
  }
}

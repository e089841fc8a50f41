//! The batch primitive shared by every job: keyset paging over a selection,
//! a row cap, and the rule for store errors met while writing one row.

use std::fmt::Display;

use cardex_core::{
  card::CardKey,
  set::SetKey,
  store::{Listed, PageRequest, StoreError},
};

use crate::{Error, Result, shutdown::Shutdown};

/// Paging knobs common to all jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
  /// Rows fetched from the store per page.
  pub batch_size: usize,
  /// Stop after this many rows in total.
  pub limit:      Option<usize>,
}

impl Default for BatchOptions {
  fn default() -> Self { Self { batch_size: 100, limit: None } }
}

/// Walks a selection page by page in ascending `external_id` order.
///
/// Rows that leave the selection while the job runs (because the job just
/// wrote them) do not shift later pages: the next page always starts after
/// the last id seen.
#[derive(Debug)]
pub(crate) struct Pager {
  after:      Option<String>,
  batch_size: usize,
  remaining:  Option<usize>,
  requested:  usize,
  batch:      u32,
  exhausted:  bool,
}

impl Pager {
  pub(crate) fn new(options: BatchOptions) -> Self {
    Self {
      after:      None,
      batch_size: options.batch_size.max(1),
      remaining:  options.limit,
      requested:  0,
      batch:      0,
      exhausted:  false,
    }
  }

  /// The next page to request, or `None` once the selection or the row cap
  /// is used up.
  pub(crate) fn next_page(&mut self) -> Option<PageRequest> {
    if self.exhausted || self.remaining == Some(0) {
      return None;
    }
    self.requested = self
      .remaining
      .map_or(self.batch_size, |r| r.min(self.batch_size));
    Some(PageRequest { after: self.after.clone(), limit: self.requested })
  }

  /// Record a page the store returned for the last request.
  pub(crate) fn accept<T>(&mut self, rows: &[T], key: impl Fn(&T) -> &str) {
    match rows.last() {
      Some(last) => self.after = Some(key(last).to_owned()),
      None => self.exhausted = true,
    }
    if rows.len() < self.requested {
      self.exhausted = true;
    }
    if let Some(remaining) = &mut self.remaining {
      *remaining = remaining.saturating_sub(rows.len());
    }
    self.batch += 1;
  }

  /// One-based number of the last accepted page.
  pub(crate) fn batch(&self) -> u32 { self.batch }
}

/// Keys a [`Pager`] can resume after.
pub(crate) trait RowKey {
  fn external_id(&self) -> &str;
}

impl RowKey for CardKey {
  fn external_id(&self) -> &str { &self.external_id }
}

impl RowKey for SetKey {
  fn external_id(&self) -> &str { &self.external_id }
}

/// Run `each` over every row of a selection, one page at a time.
///
/// `list` fetches a page; `on_batch` runs after each full page has been
/// handled. The walk stops between rows once `shutdown` is triggered and
/// returns `true` in that case. Errors from either closure end the walk.
pub(crate) async fn walk<K, R>(
  options: BatchOptions,
  shutdown: &Shutdown,
  report: &mut R,
  mut list: impl AsyncFnMut(PageRequest) -> Result<Vec<Listed<K>>>,
  mut each: impl AsyncFnMut(&mut R, Listed<K>) -> Result<()>,
  on_batch: impl Fn(&R, u32),
) -> Result<bool>
where
  K: RowKey,
{
  let mut pager = Pager::new(options);

  while let Some(page) = pager.next_page() {
    let rows = list(page).await?;
    pager.accept(&rows, |row| row.key.external_id());
    if rows.is_empty() {
      break;
    }

    for row in rows {
      if shutdown.is_triggered() {
        return Ok(true);
      }
      each(&mut *report, row).await?;
    }
    on_batch(&*report, pager.batch());
  }
  Ok(false)
}

/// Decide what a failed single-row write means for the run.
///
/// Fatal errors end the run. Anything else is logged, and the caller counts
/// the row as failed and moves on.
pub(crate) fn absorb<E: StoreError>(err: E, row: &dyn Display) -> Result<()> {
  if err.is_fatal() {
    tracing::error!(%row, error = %err, "fatal store error");
    return Err(Error::store(err));
  }
  tracing::warn!(%row, error = %err, "row write failed; leaving it for the next run");
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use cardex_core::{Language, enrichment::EnrichmentState};

  use super::*;

  fn ids(from: u32, to: u32) -> Vec<String> {
    (from..=to).map(|i| format!("c{i:02}")).collect()
  }

  #[test]
  fn pages_until_a_short_page() {
    let mut pager = Pager::new(BatchOptions { batch_size: 3, limit: None });

    let first = pager.next_page().unwrap();
    assert_eq!(first, PageRequest { after: None, limit: 3 });
    pager.accept(&ids(1, 3), String::as_str);

    let second = pager.next_page().unwrap();
    assert_eq!(second.after.as_deref(), Some("c03"));
    pager.accept(&ids(4, 5), String::as_str);

    assert_eq!(pager.batch(), 2);
    assert!(pager.next_page().is_none());
  }

  #[test]
  fn limit_caps_the_last_page() {
    let mut pager = Pager::new(BatchOptions { batch_size: 4, limit: Some(6) });

    assert_eq!(pager.next_page().unwrap().limit, 4);
    pager.accept(&ids(1, 4), String::as_str);
    assert_eq!(pager.next_page().unwrap().limit, 2);
    pager.accept(&ids(5, 6), String::as_str);
    assert!(pager.next_page().is_none());
  }

  #[test]
  fn empty_page_ends_the_walk() {
    let mut pager = Pager::new(BatchOptions::default());
    pager.next_page().unwrap();
    pager.accept::<String>(&[], String::as_str);
    assert!(pager.next_page().is_none());
  }

  #[tokio::test]
  async fn walk_hands_over_rows_and_stops_on_shutdown() {
    let rows: Vec<Listed<CardKey>> = (1..=5)
      .map(|i| Listed {
        key:        CardKey::new(format!("c{i:02}"), Language::De),
        enrichment: EnrichmentState::Pending,
      })
      .collect();
    let shutdown = Shutdown::new();
    let batches = RefCell::new(Vec::new());
    let mut seen: Vec<String> = Vec::new();

    let interrupted = walk(
      BatchOptions { batch_size: 2, limit: None },
      &shutdown,
      &mut seen,
      async |page: PageRequest| {
        Ok(
          rows
            .iter()
            .filter(|r| page.after.as_deref().is_none_or(|a| r.key.external_id.as_str() > a))
            .take(page.limit)
            .cloned()
            .collect(),
        )
      },
      async |seen: &mut Vec<String>, row: Listed<CardKey>| {
        if row.key.external_id == "c03" {
          shutdown.trigger();
        }
        seen.push(row.key.external_id);
        Ok(())
      },
      |seen, batch| batches.borrow_mut().push((batch, seen.len())),
    )
    .await
    .unwrap();

    assert!(interrupted);
    assert_eq!(seen, ["c01", "c02", "c03"]);
    // The page holding c03 was cut short, so only the first one logged.
    assert_eq!(batches.into_inner(), [(1, 2)]);
  }
}

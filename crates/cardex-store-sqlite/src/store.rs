//! [`SqliteStore`], the SQLite implementation of [`CatalogStore`].

use std::{path::Path, time::Duration};

use cardex_core::{
  Language,
  card::{Card, CardAttributes, CardKey},
  pricing::PricingSnapshot,
  set::{Set, SetAttributes, SetKey},
  store::{CardSelection, CatalogStore, Listed, PageRequest, SetSelection, UpsertOutcome},
};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, ToSql, TransactionBehavior};

use crate::{
  Error, Result,
  encode::{
    CARD_COLUMNS, EncodedCard, EncodedCardAttrs, EncodedSetAttrs, LISTED_COLUMNS,
    RawCard, RawListed, RawSet, SET_COLUMNS, encode_dt, encode_pricing,
  },
  error::boxed,
  schema::{BUSY_TIMEOUT_MS, SCHEMA},
};

type Param<'a> = (&'static str, &'a dyn ToSql);

// ─── Column lists ────────────────────────────────────────────────────────────

/// Catalog columns of `cards`, in the order of [`EncodedCardAttrs::bind`].
const CARD_ATTR_COLUMNS: [&str; 22] = [
  "local_id", "name", "set_id", "category", "rarity", "illustrator", "hp",
  "types", "stage", "evolves_from", "suffix", "dex_ids", "retreat_cost",
  "regulation_mark", "abilities", "attacks", "weaknesses", "resistances",
  "variants", "legal", "image_url", "raw",
];

/// Catalog columns of `sets`, in the order of [`EncodedSetAttrs::bind`].
const SET_ATTR_COLUMNS: [&str; 11] = [
  "name", "code", "release_date", "total_cards", "official_cards", "logo_url",
  "symbol_url", "serie_name", "serie_code", "legal", "raw",
];

fn assignments(columns: &[&str]) -> String {
  columns
    .iter()
    .map(|c| format!("{c} = :{c}"))
    .collect::<Vec<_>>()
    .join(", ")
}

fn placeholders(columns: &[&str]) -> String {
  columns
    .iter()
    .map(|c| format!(":{c}"))
    .collect::<Vec<_>>()
    .join(", ")
}

const BLANK_IMAGE: &str = "(image_url IS NULL OR TRIM(image_url) = '')";
const HAS_CATEGORY: &str = "(category IS NOT NULL AND TRIM(category) <> '')";
const MISSING_EXTENDED: &str = "(abilities IS NULL OR attacks IS NULL)";

/// SQL predicate for a card selection, plus the `:cutoff` value it binds.
fn card_filter(selection: CardSelection) -> (String, Option<String>) {
  match selection {
    CardSelection::PendingEnrichment => (
      "(category IS NULL OR TRIM(category) = '') AND enrichment_state <> 'enriched'"
        .to_owned(),
      None,
    ),
    CardSelection::EnrichedMissingImage => {
      (format!("enrichment_state = 'enriched' AND {BLANK_IMAGE}"), None)
    }
    CardSelection::MissingImage => (BLANK_IMAGE.to_owned(), None),
    CardSelection::PricingDue { stamped_before: None } => {
      ("enrichment_state = 'enriched'".to_owned(), None)
    }
    CardSelection::PricingDue { stamped_before: Some(cutoff) } => (
      "enrichment_state = 'enriched' \
       AND (pricing_updated_at IS NULL OR pricing_updated_at < :cutoff)"
        .to_owned(),
      Some(encode_dt(cutoff)),
    ),
    CardSelection::MissingExtended { checked_before: None } => {
      (format!("{HAS_CATEGORY} AND {MISSING_EXTENDED}"), None)
    }
    CardSelection::MissingExtended { checked_before: Some(cutoff) } => (
      format!(
        "{HAS_CATEGORY} AND {MISSING_EXTENDED} \
         AND (checked_at IS NULL OR checked_at < :cutoff)"
      ),
      Some(encode_dt(cutoff)),
    ),
  }
}

fn set_filter(selection: SetSelection) -> &'static str {
  match selection {
    SetSelection::PendingEnrichment => "enrichment_state <> 'enriched'",
    SetSelection::MissingAssets => {
      "(logo_url IS NULL OR TRIM(logo_url) = '' \
        OR symbol_url IS NULL OR TRIM(symbol_url) = '')"
    }
  }
}

// ─── Row helpers (run inside `Connection::call`) ─────────────────────────────

fn select_card(
  conn: &rusqlite::Connection,
  key: &CardKey,
) -> tokio_rusqlite::Result<Option<Card>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {CARD_COLUMNS} FROM cards WHERE external_id = ?1 AND language = ?2"
      ),
      rusqlite::params![key.external_id, key.language.as_str()],
      RawCard::from_row,
    )
    .optional()?;
  raw.map(RawCard::into_card).transpose().map_err(boxed)
}

fn insert_card(
  conn: &rusqlite::Connection,
  card: &Card,
  now: &str,
) -> tokio_rusqlite::Result<()> {
  let enc = EncodedCard::new(card).map_err(boxed)?;
  let sql = format!(
    "INSERT INTO cards (external_id, language, {columns}, pricing,
       pricing_updated_at, enrichment_state, checked_at, created_at, updated_at)
     VALUES (:external_id, :language, {values}, :pricing,
       :pricing_updated_at, :enrichment_state, :checked_at, :now, :now)",
    columns = CARD_ATTR_COLUMNS.join(", "),
    values = placeholders(&CARD_ATTR_COLUMNS),
  );

  let mut params: Vec<Param<'_>> = enc.attrs.bind().to_vec();
  params.push((":external_id", &enc.external_id));
  params.push((":language", &enc.language));
  params.push((":pricing", &enc.pricing));
  params.push((":pricing_updated_at", &enc.pricing_updated_at));
  params.push((":enrichment_state", &enc.enrichment_state));
  params.push((":checked_at", &enc.checked_at));
  params.push((":now", &now));

  conn.execute(&sql, params.as_slice())?;
  Ok(())
}

/// Write back every catalog column; with `mark_enriched` also flip the row's
/// state to enriched.
fn update_card_attrs(
  conn: &rusqlite::Connection,
  key: &CardKey,
  attrs: &CardAttributes,
  now: &str,
  mark_enriched: bool,
) -> tokio_rusqlite::Result<()> {
  let enc = EncodedCardAttrs::new(attrs).map_err(boxed)?;
  let state = if mark_enriched {
    "enrichment_state = 'enriched', checked_at = :now, "
  } else {
    ""
  };
  let sql = format!(
    "UPDATE cards SET {}, {state}updated_at = :now
     WHERE external_id = :external_id AND language = :language",
    assignments(&CARD_ATTR_COLUMNS),
  );

  let language = key.language.as_str();
  let mut params: Vec<Param<'_>> = enc.bind().to_vec();
  params.push((":now", &now));
  params.push((":external_id", &key.external_id));
  params.push((":language", &language));

  conn.execute(&sql, params.as_slice())?;
  Ok(())
}

fn select_set(
  conn: &rusqlite::Connection,
  key: &SetKey,
) -> tokio_rusqlite::Result<Option<Set>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {SET_COLUMNS} FROM sets WHERE external_id = ?1 AND language = ?2"
      ),
      rusqlite::params![key.external_id, key.language.as_str()],
      RawSet::from_row,
    )
    .optional()?;
  raw.map(RawSet::into_set).transpose().map_err(boxed)
}

fn insert_set(
  conn: &rusqlite::Connection,
  set: &Set,
  now: &str,
) -> tokio_rusqlite::Result<()> {
  let enc = EncodedSetAttrs::new(&set.attrs).map_err(boxed)?;
  let sql = format!(
    "INSERT INTO sets (external_id, language, {columns}, enrichment_state,
       checked_at, created_at, updated_at)
     VALUES (:external_id, :language, {values}, :enrichment_state,
       :checked_at, :now, :now)",
    columns = SET_ATTR_COLUMNS.join(", "),
    values = placeholders(&SET_ATTR_COLUMNS),
  );

  let language = set.key.language.as_str();
  let state = set.enrichment.as_str();
  let checked_at = set.checked_at.map(encode_dt);
  let mut params: Vec<Param<'_>> = enc.bind().to_vec();
  params.push((":external_id", &set.key.external_id));
  params.push((":language", &language));
  params.push((":enrichment_state", &state));
  params.push((":checked_at", &checked_at));
  params.push((":now", &now));

  conn.execute(&sql, params.as_slice())?;
  Ok(())
}

fn update_set_attrs(
  conn: &rusqlite::Connection,
  key: &SetKey,
  attrs: &SetAttributes,
  now: &str,
  mark_enriched: bool,
) -> tokio_rusqlite::Result<()> {
  let enc = EncodedSetAttrs::new(attrs).map_err(boxed)?;
  let state = if mark_enriched {
    "enrichment_state = 'enriched', checked_at = :now, "
  } else {
    ""
  };
  let sql = format!(
    "UPDATE sets SET {}, {state}updated_at = :now
     WHERE external_id = :external_id AND language = :language",
    assignments(&SET_ATTR_COLUMNS),
  );

  let language = key.language.as_str();
  let mut params: Vec<Param<'_>> = enc.bind().to_vec();
  params.push((":now", &now));
  params.push((":external_id", &key.external_id));
  params.push((":language", &language));

  conn.execute(&sql, params.as_slice())?;
  Ok(())
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A catalog store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Several
/// processes may open the same file; WAL mode and a busy timeout let their
/// single-row writes interleave.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "opened catalog store");
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  type Error = Error;

  // ── Upserts ─────────────────────────────────────────────────────────────

  async fn upsert_card(&self, card: Card) -> Result<UpsertOutcome> {
    let now = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = match select_card(&tx, &card.key)? {
          None => {
            insert_card(&tx, &card, &now)?;
            UpsertOutcome::Inserted
          }
          Some(mut stored) => {
            let filled = stored.attrs.fill_missing(card.attrs);
            if !filled.is_empty() {
              update_card_attrs(&tx, &stored.key, &stored.attrs, &now, false)?;
            }
            UpsertOutcome::Merged { filled }
          }
        };
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  async fn upsert_set(&self, set: Set) -> Result<UpsertOutcome> {
    let now = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = match select_set(&tx, &set.key)? {
          None => {
            insert_set(&tx, &set, &now)?;
            UpsertOutcome::Inserted
          }
          Some(mut stored) => {
            let filled = stored.attrs.fill_missing(set.attrs);
            if !filled.is_empty() {
              update_set_attrs(&tx, &stored.key, &stored.attrs, &now, false)?;
            }
            UpsertOutcome::Merged { filled }
          }
        };
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  async fn get_card(&self, key: CardKey) -> Result<Option<Card>> {
    Ok(self.conn.call(move |conn| select_card(conn, &key)).await?)
  }

  async fn get_set(&self, key: SetKey) -> Result<Option<Set>> {
    Ok(self.conn.call(move |conn| select_set(conn, &key)).await?)
  }

  async fn count_cards(
    &self,
    language: Language,
    selection: CardSelection,
  ) -> Result<u64> {
    let (filter, cutoff) = card_filter(selection);
    let language = language.as_str();

    let count: i64 = self
      .conn
      .call(move |conn| {
        let sql =
          format!("SELECT COUNT(*) FROM cards WHERE language = :language AND {filter}");
        let mut params: Vec<Param<'_>> = vec![];
        params.push((":language", &language));
        if let Some(cutoff) = &cutoff {
          params.push((":cutoff", cutoff));
        }
        Ok(conn.query_row(&sql, params.as_slice(), |r| r.get(0))?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  async fn list_cards(
    &self,
    language: Language,
    selection: CardSelection,
    page: PageRequest,
  ) -> Result<Vec<Listed<CardKey>>> {
    let (filter, cutoff) = card_filter(selection);
    let language = language.as_str();
    let after = page.after.unwrap_or_default();
    let limit = page.limit as i64;

    let raws: Vec<RawListed> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {LISTED_COLUMNS} FROM cards
           WHERE language = :language AND external_id > :after AND {filter}
           ORDER BY external_id
           LIMIT :limit"
        );
        let mut params: Vec<Param<'_>> = vec![];
        params.push((":language", &language));
        params.push((":after", &after));
        params.push((":limit", &limit));
        if let Some(cutoff) = &cutoff {
          params.push((":cutoff", cutoff));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params.as_slice(), RawListed::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| raw.into_listed(|id, lang| CardKey::new(id, lang)))
      .collect()
  }

  async fn count_sets(
    &self,
    language: Language,
    selection: SetSelection,
  ) -> Result<u64> {
    let filter = set_filter(selection);
    let language = language.as_str();

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!("SELECT COUNT(*) FROM sets WHERE language = ?1 AND {filter}"),
          rusqlite::params![language],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  async fn list_sets(
    &self,
    language: Language,
    selection: SetSelection,
    page: PageRequest,
  ) -> Result<Vec<Listed<SetKey>>> {
    let filter = set_filter(selection);
    let language = language.as_str();
    let after = page.after.unwrap_or_default();
    let limit = page.limit as i64;

    let raws: Vec<RawListed> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {LISTED_COLUMNS} FROM sets
           WHERE language = ?1 AND external_id > ?2 AND {filter}
           ORDER BY external_id
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![language, after, limit], RawListed::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| raw.into_listed(|id, lang| SetKey::new(id, lang)))
      .collect()
  }

  // ── Card writes ─────────────────────────────────────────────────────────

  async fn fill_card(
    &self,
    key: CardKey,
    attrs: CardAttributes,
    at: DateTime<Utc>,
  ) -> Result<Vec<&'static str>> {
    let now = encode_dt(at);
    let lookup = key.clone();

    let filled = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(mut card) = select_card(&tx, &lookup)? else {
          return Ok(None);
        };
        let filled = card.attrs.fill_missing(attrs);
        update_card_attrs(&tx, &lookup, &card.attrs, &now, true)?;
        tx.commit()?;
        Ok(Some(filled))
      })
      .await?;

    filled.ok_or(Error::CardNotFound(key))
  }

  async fn mark_card_not_found(&self, key: CardKey, at: DateTime<Utc>) -> Result<()> {
    let now = encode_dt(at);
    let external_id = key.external_id.clone();
    let language = key.language.as_str();

    let exists = self
      .conn
      .call(move |conn| {
        // An enriched row keeps its state; only the check time moves.
        let changed = conn.execute(
          "UPDATE cards
           SET enrichment_state = CASE WHEN enrichment_state = 'enriched'
                                       THEN 'enriched' ELSE 'not_found' END,
               checked_at = ?3, updated_at = ?3
           WHERE external_id = ?1 AND language = ?2",
          rusqlite::params![external_id, language, now],
        )?;
        Ok(changed > 0)
      })
      .await?;

    if exists { Ok(()) } else { Err(Error::CardNotFound(key)) }
  }

  async fn fill_card_image(&self, key: CardKey, image_url: String) -> Result<bool> {
    if image_url.trim().is_empty() {
      return Ok(false);
    }
    let now = encode_dt(Utc::now());
    let language = key.language.as_str();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!(
            "UPDATE cards SET image_url = ?3, updated_at = ?4
             WHERE external_id = ?1 AND language = ?2 AND {BLANK_IMAGE}"
          ),
          rusqlite::params![key.external_id, language, image_url, now],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn replace_card_pricing(
    &self,
    key: CardKey,
    pricing: Option<PricingSnapshot>,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let pricing_str = encode_pricing(pricing.as_ref())?;
    let now = encode_dt(at);
    let external_id = key.external_id.clone();
    let language = key.language.as_str();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE cards SET pricing = ?3, pricing_updated_at = ?4, updated_at = ?4
           WHERE external_id = ?1 AND language = ?2",
          rusqlite::params![external_id, language, pricing_str, now],
        )?)
      })
      .await?;

    if changed > 0 { Ok(()) } else { Err(Error::CardNotFound(key)) }
  }

  // ── Set writes ──────────────────────────────────────────────────────────

  async fn fill_set(
    &self,
    key: SetKey,
    attrs: SetAttributes,
    at: DateTime<Utc>,
  ) -> Result<Vec<&'static str>> {
    let now = encode_dt(at);
    let lookup = key.clone();

    let filled = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(mut set) = select_set(&tx, &lookup)? else {
          return Ok(None);
        };
        let filled = set.attrs.fill_missing(attrs);
        update_set_attrs(&tx, &lookup, &set.attrs, &now, true)?;
        tx.commit()?;
        Ok(Some(filled))
      })
      .await?;

    filled.ok_or(Error::SetNotFound(key))
  }

  async fn mark_set_not_found(&self, key: SetKey, at: DateTime<Utc>) -> Result<()> {
    let now = encode_dt(at);
    let external_id = key.external_id.clone();
    let language = key.language.as_str();

    let exists = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE sets
           SET enrichment_state = CASE WHEN enrichment_state = 'enriched'
                                       THEN 'enriched' ELSE 'not_found' END,
               checked_at = ?3, updated_at = ?3
           WHERE external_id = ?1 AND language = ?2",
          rusqlite::params![external_id, language, now],
        )?;
        Ok(changed > 0)
      })
      .await?;

    if exists { Ok(()) } else { Err(Error::SetNotFound(key)) }
  }

  async fn fill_set_assets(
    &self,
    key: SetKey,
    logo_url: Option<String>,
    symbol_url: Option<String>,
  ) -> Result<Vec<&'static str>> {
    let now = encode_dt(Utc::now());
    let language = key.language.as_str();

    let filled = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut filled = Vec::new();
        for (column, value) in [("logo_url", logo_url), ("symbol_url", symbol_url)] {
          let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            continue;
          };
          let changed = tx.execute(
            &format!(
              "UPDATE sets SET {column} = ?3, updated_at = ?4
               WHERE external_id = ?1 AND language = ?2
                 AND ({column} IS NULL OR TRIM({column}) = '')"
            ),
            rusqlite::params![key.external_id, language, value, now],
          )?;
          if changed > 0 {
            filled.push(column);
          }
        }
        tx.commit()?;
        Ok(filled)
      })
      .await?;

    Ok(filled)
  }
}

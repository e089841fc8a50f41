//! Encoding and decoding helpers between domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings (microsecond
//! precision, `Z` suffix) so that string comparison orders them correctly.
//! Lists and structured fields are stored as compact JSON; an empty list or
//! blank structure is stored as NULL so "empty" has one representation.

use cardex_core::{
  Language,
  card::{Card, CardAttributes, CardKey},
  enrichment::EnrichmentState,
  merge::Blank,
  pricing::PricingSnapshot,
  set::{Set, SetAttributes, SetKey},
  store::Listed,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

// ─── Integers ────────────────────────────────────────────────────────────────

fn decode_u32(column: &str, v: Option<i64>) -> Result<Option<u32>> {
  v.map(|n| {
    u32::try_from(n).map_err(|_| Error::Decode(format!("{column}: {n} out of range")))
  })
  .transpose()
}

// ─── JSON ────────────────────────────────────────────────────────────────────

/// Encode a possibly-blank value as JSON, or NULL when blank.
pub fn encode_json<T: Serialize + Blank>(v: &T) -> Result<Option<String>> {
  if v.is_blank() {
    Ok(None)
  } else {
    Ok(Some(serde_json::to_string(v)?))
  }
}

/// Decode a JSON column into its default value when NULL.
pub fn decode_json<T: DeserializeOwned + Default>(s: Option<&str>) -> Result<T> {
  match s {
    Some(s) => Ok(serde_json::from_str(s)?),
    None => Ok(T::default()),
  }
}

/// Imported rows carry a bare number where the upstream has a single dex id.
#[derive(Deserialize)]
#[serde(untagged)]
enum DexIds {
  One(u32),
  Many(Vec<u32>),
}

fn decode_dex_ids(s: Option<&str>) -> Result<Vec<u32>> {
  Ok(match decode_json::<Option<DexIds>>(s)? {
    Some(DexIds::One(id)) => vec![id],
    Some(DexIds::Many(ids)) => ids,
    None => Vec::new(),
  })
}

/// An empty snapshot is stored as NULL, like an absent one.
pub fn encode_pricing(p: Option<&PricingSnapshot>) -> Result<Option<String>> {
  p.filter(|p| !p.is_empty())
    .map(serde_json::to_string)
    .transpose()
    .map_err(Error::from)
}

fn blank_to_none(s: &Option<String>) -> Option<String> {
  s.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

// ─── Encoded column values ───────────────────────────────────────────────────

/// Column values for the catalog part of a `cards` row.
pub struct EncodedCardAttrs {
  pub local_id:        String,
  pub name:            String,
  pub set_id:          String,
  pub category:        Option<String>,
  pub rarity:          Option<String>,
  pub illustrator:     Option<String>,
  pub hp:              Option<i64>,
  pub types:           Option<String>,
  pub stage:           Option<String>,
  pub evolves_from:    Option<String>,
  pub suffix:          Option<String>,
  pub dex_ids:         Option<String>,
  pub retreat_cost:    Option<i64>,
  pub regulation_mark: Option<String>,
  pub abilities:       Option<String>,
  pub attacks:         Option<String>,
  pub weaknesses:      Option<String>,
  pub resistances:     Option<String>,
  pub variants:        Option<String>,
  pub legal:           Option<String>,
  pub image_url:       Option<String>,
  pub raw:             Option<String>,
}

impl EncodedCardAttrs {
  pub fn new(a: &CardAttributes) -> Result<Self> {
    Ok(Self {
      local_id:        a.local_id.clone(),
      name:            a.name.clone(),
      set_id:          a.set_id.clone(),
      category:        blank_to_none(&a.category),
      rarity:          blank_to_none(&a.rarity),
      illustrator:     blank_to_none(&a.illustrator),
      hp:              a.hp.map(i64::from),
      types:           encode_json(&a.types)?,
      stage:           blank_to_none(&a.stage),
      evolves_from:    blank_to_none(&a.evolves_from),
      suffix:          blank_to_none(&a.suffix),
      dex_ids:         encode_json(&a.dex_ids)?,
      retreat_cost:    a.retreat_cost.map(i64::from),
      regulation_mark: blank_to_none(&a.regulation_mark),
      abilities:       encode_json(&a.abilities)?,
      attacks:         encode_json(&a.attacks)?,
      weaknesses:      encode_json(&a.weaknesses)?,
      resistances:     encode_json(&a.resistances)?,
      variants:        encode_json(&a.variants)?,
      legal:           encode_json(&a.legal)?,
      image_url:       blank_to_none(&a.image_url),
      raw:             encode_json(&a.raw)?,
    })
  }

  /// Bind as the named parameters used by the card statements in
  /// [`crate::store`].
  pub fn bind(&self) -> [(&'static str, &dyn rusqlite::ToSql); 22] {
    [
      (":local_id", &self.local_id),
      (":name", &self.name),
      (":set_id", &self.set_id),
      (":category", &self.category),
      (":rarity", &self.rarity),
      (":illustrator", &self.illustrator),
      (":hp", &self.hp),
      (":types", &self.types),
      (":stage", &self.stage),
      (":evolves_from", &self.evolves_from),
      (":suffix", &self.suffix),
      (":dex_ids", &self.dex_ids),
      (":retreat_cost", &self.retreat_cost),
      (":regulation_mark", &self.regulation_mark),
      (":abilities", &self.abilities),
      (":attacks", &self.attacks),
      (":weaknesses", &self.weaknesses),
      (":resistances", &self.resistances),
      (":variants", &self.variants),
      (":legal", &self.legal),
      (":image_url", &self.image_url),
      (":raw", &self.raw),
    ]
  }
}

/// Column values for a whole new `cards` row.
pub struct EncodedCard {
  pub external_id:        String,
  pub language:           &'static str,
  pub attrs:              EncodedCardAttrs,
  pub pricing:            Option<String>,
  pub pricing_updated_at: Option<String>,
  pub enrichment_state:   &'static str,
  pub checked_at:         Option<String>,
}

impl EncodedCard {
  pub fn new(card: &Card) -> Result<Self> {
    Ok(Self {
      external_id:        card.key.external_id.clone(),
      language:           card.key.language.as_str(),
      attrs:              EncodedCardAttrs::new(&card.attrs)?,
      pricing:            encode_pricing(card.pricing.as_ref())?,
      pricing_updated_at: card.pricing_updated_at.map(encode_dt),
      enrichment_state:   card.enrichment.as_str(),
      checked_at:         card.checked_at.map(encode_dt),
    })
  }
}

/// Column values for the catalog part of a `sets` row.
pub struct EncodedSetAttrs {
  pub name:           String,
  pub code:           Option<String>,
  pub release_date:   Option<String>,
  pub total_cards:    Option<i64>,
  pub official_cards: Option<i64>,
  pub logo_url:       Option<String>,
  pub symbol_url:     Option<String>,
  pub serie_name:     Option<String>,
  pub serie_code:     Option<String>,
  pub legal:          Option<String>,
  pub raw:            Option<String>,
}

impl EncodedSetAttrs {
  pub fn new(a: &SetAttributes) -> Result<Self> {
    Ok(Self {
      name:           a.name.clone(),
      code:           blank_to_none(&a.code),
      release_date:   a.release_date.map(encode_date),
      total_cards:    a.total_cards.map(i64::from),
      official_cards: a.official_cards.map(i64::from),
      logo_url:       blank_to_none(&a.logo_url),
      symbol_url:     blank_to_none(&a.symbol_url),
      serie_name:     blank_to_none(&a.serie_name),
      serie_code:     blank_to_none(&a.serie_code),
      legal:          encode_json(&a.legal)?,
      raw:            encode_json(&a.raw)?,
    })
  }

  pub fn bind(&self) -> [(&'static str, &dyn rusqlite::ToSql); 11] {
    [
      (":name", &self.name),
      (":code", &self.code),
      (":release_date", &self.release_date),
      (":total_cards", &self.total_cards),
      (":official_cards", &self.official_cards),
      (":logo_url", &self.logo_url),
      (":symbol_url", &self.symbol_url),
      (":serie_name", &self.serie_name),
      (":serie_code", &self.serie_code),
      (":legal", &self.legal),
      (":raw", &self.raw),
    ]
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawListed::from_row`].
pub const LISTED_COLUMNS: &str = "external_id, language, enrichment_state";

/// Key and state of a listed row; the attribute columns are not read.
pub struct RawListed {
  pub external_id:      String,
  pub language:         String,
  pub enrichment_state: String,
}

impl RawListed {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      external_id:      row.get(0)?,
      language:         row.get(1)?,
      enrichment_state: row.get(2)?,
    })
  }

  pub fn into_listed<K>(self, key: fn(String, Language) -> K) -> Result<Listed<K>> {
    Ok(Listed {
      key:        key(self.external_id, self.language.parse()?),
      enrichment: self.enrichment_state.parse()?,
    })
  }
}

/// Column list matching [`RawCard::from_row`].
pub const CARD_COLUMNS: &str = "external_id, language, local_id, name, set_id,
  category, rarity, illustrator, hp, types, stage, evolves_from, suffix,
  dex_ids, retreat_cost, regulation_mark, abilities, attacks, weaknesses,
  resistances, variants, legal, image_url, raw, pricing, pricing_updated_at,
  enrichment_state, checked_at";

/// Raw values read directly from a `cards` row.
pub struct RawCard {
  pub external_id:        String,
  pub language:           String,
  pub local_id:           String,
  pub name:               String,
  pub set_id:             String,
  pub category:           Option<String>,
  pub rarity:             Option<String>,
  pub illustrator:        Option<String>,
  pub hp:                 Option<i64>,
  pub types:              Option<String>,
  pub stage:              Option<String>,
  pub evolves_from:       Option<String>,
  pub suffix:             Option<String>,
  pub dex_ids:            Option<String>,
  pub retreat_cost:       Option<i64>,
  pub regulation_mark:    Option<String>,
  pub abilities:          Option<String>,
  pub attacks:            Option<String>,
  pub weaknesses:         Option<String>,
  pub resistances:        Option<String>,
  pub variants:           Option<String>,
  pub legal:              Option<String>,
  pub image_url:          Option<String>,
  pub raw:                Option<String>,
  pub pricing:            Option<String>,
  pub pricing_updated_at: Option<String>,
  pub enrichment_state:   String,
  pub checked_at:         Option<String>,
}

impl RawCard {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      external_id:        row.get(0)?,
      language:           row.get(1)?,
      local_id:           row.get(2)?,
      name:               row.get(3)?,
      set_id:             row.get(4)?,
      category:           row.get(5)?,
      rarity:             row.get(6)?,
      illustrator:        row.get(7)?,
      hp:                 row.get(8)?,
      types:              row.get(9)?,
      stage:              row.get(10)?,
      evolves_from:       row.get(11)?,
      suffix:             row.get(12)?,
      dex_ids:            row.get(13)?,
      retreat_cost:       row.get(14)?,
      regulation_mark:    row.get(15)?,
      abilities:          row.get(16)?,
      attacks:            row.get(17)?,
      weaknesses:         row.get(18)?,
      resistances:        row.get(19)?,
      variants:           row.get(20)?,
      legal:              row.get(21)?,
      image_url:          row.get(22)?,
      raw:                row.get(23)?,
      pricing:            row.get(24)?,
      pricing_updated_at: row.get(25)?,
      enrichment_state:   row.get(26)?,
      checked_at:         row.get(27)?,
    })
  }

  pub fn into_card(self) -> Result<Card> {
    let language: Language = self.language.parse()?;
    let attrs = CardAttributes {
      local_id:        self.local_id,
      name:            self.name,
      set_id:          self.set_id,
      category:        self.category,
      rarity:          self.rarity,
      illustrator:     self.illustrator,
      hp:              decode_u32("hp", self.hp)?,
      types:           decode_json(self.types.as_deref())?,
      stage:           self.stage,
      evolves_from:    self.evolves_from,
      suffix:          self.suffix,
      dex_ids:         decode_dex_ids(self.dex_ids.as_deref())?,
      retreat_cost:    decode_u32("retreat_cost", self.retreat_cost)?,
      regulation_mark: self.regulation_mark,
      abilities:       decode_json(self.abilities.as_deref())?,
      attacks:         decode_json(self.attacks.as_deref())?,
      weaknesses:      decode_json(self.weaknesses.as_deref())?,
      resistances:     decode_json(self.resistances.as_deref())?,
      variants:        decode_json(self.variants.as_deref())?,
      legal:           decode_json(self.legal.as_deref())?,
      image_url:       self.image_url,
      raw:             decode_json(self.raw.as_deref())?,
    };

    Ok(Card {
      key: CardKey::new(self.external_id, language),
      attrs,
      pricing: decode_json(self.pricing.as_deref())?,
      pricing_updated_at: decode_opt_dt(self.pricing_updated_at)?,
      enrichment: self.enrichment_state.parse::<EnrichmentState>()?,
      checked_at: decode_opt_dt(self.checked_at)?,
    })
  }
}

/// Column list matching [`RawSet::from_row`].
pub const SET_COLUMNS: &str = "external_id, language, name, code, release_date,
  total_cards, official_cards, logo_url, symbol_url, serie_name, serie_code,
  legal, raw, enrichment_state, checked_at";

/// Raw values read directly from a `sets` row.
pub struct RawSet {
  pub external_id:      String,
  pub language:         String,
  pub name:             String,
  pub code:             Option<String>,
  pub release_date:     Option<String>,
  pub total_cards:      Option<i64>,
  pub official_cards:   Option<i64>,
  pub logo_url:         Option<String>,
  pub symbol_url:       Option<String>,
  pub serie_name:       Option<String>,
  pub serie_code:       Option<String>,
  pub legal:            Option<String>,
  pub raw:              Option<String>,
  pub enrichment_state: String,
  pub checked_at:       Option<String>,
}

impl RawSet {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      external_id:      row.get(0)?,
      language:         row.get(1)?,
      name:             row.get(2)?,
      code:             row.get(3)?,
      release_date:     row.get(4)?,
      total_cards:      row.get(5)?,
      official_cards:   row.get(6)?,
      logo_url:         row.get(7)?,
      symbol_url:       row.get(8)?,
      serie_name:       row.get(9)?,
      serie_code:       row.get(10)?,
      legal:            row.get(11)?,
      raw:              row.get(12)?,
      enrichment_state: row.get(13)?,
      checked_at:       row.get(14)?,
    })
  }

  pub fn into_set(self) -> Result<Set> {
    let language: Language = self.language.parse()?;
    let attrs = SetAttributes {
      name:           self.name,
      code:           self.code,
      release_date:   self.release_date.as_deref().map(decode_date).transpose()?,
      total_cards:    decode_u32("total_cards", self.total_cards)?,
      official_cards: decode_u32("official_cards", self.official_cards)?,
      logo_url:       self.logo_url,
      symbol_url:     self.symbol_url,
      serie_name:     self.serie_name,
      serie_code:     self.serie_code,
      legal:          decode_json(self.legal.as_deref())?,
      raw:            decode_json(self.raw.as_deref())?,
    };

    Ok(Set {
      key: SetKey::new(self.external_id, language),
      attrs,
      enrichment: self.enrichment_state.parse::<EnrichmentState>()?,
      checked_at: decode_opt_dt(self.checked_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_as_strings() {
    let whole = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let later = whole + chrono::Duration::microseconds(1500);
    assert!(encode_dt(whole) < encode_dt(later));
    assert_eq!(encode_dt(whole), "2025-03-01T12:00:00.000000Z");
    assert_eq!(decode_dt(&encode_dt(later)).unwrap(), later);
  }

  #[test]
  fn empty_lists_encode_as_null() {
    let empty: Vec<String> = Vec::new();
    assert_eq!(encode_json(&empty).unwrap(), None);
    let decoded: Vec<String> = decode_json(None).unwrap();
    assert!(decoded.is_empty());
  }

  #[test]
  fn dex_ids_accept_a_bare_number() {
    assert_eq!(decode_dex_ids(Some("25")).unwrap(), vec![25]);
    assert_eq!(decode_dex_ids(Some("[1,2]")).unwrap(), vec![1, 2]);
    assert!(decode_dex_ids(None).unwrap().is_empty());
    assert!(decode_dex_ids(Some("\"pikachu\"")).is_err());
  }
}

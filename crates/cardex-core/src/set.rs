//! Set types. One row per `(external_id, language)`.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Language, card::Legality, enrichment::EnrichmentState, fill_fields};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetKey {
  /// Upstream set identifier, e.g. `"swsh3"`.
  pub external_id: String,
  pub language:    Language,
}

impl SetKey {
  pub fn new(external_id: impl Into<String>, language: Language) -> Self {
    Self { external_id: external_id.into(), language }
  }

  pub fn in_language(&self, language: Language) -> Self {
    Self { external_id: self.external_id.clone(), language }
  }
}

impl fmt::Display for SetKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.external_id, self.language)
  }
}

/// Catalog fields of a set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetAttributes {
  pub name:           String,
  /// Official abbreviation, e.g. `"DAA"`.
  pub code:           Option<String>,
  pub release_date:   Option<NaiveDate>,
  /// Including secret rares.
  pub total_cards:    Option<u32>,
  /// The number printed on the cards.
  pub official_cards: Option<u32>,
  pub logo_url:       Option<String>,
  pub symbol_url:     Option<String>,
  pub serie_name:     Option<String>,
  pub serie_code:     Option<String>,
  pub legal:          Option<Legality>,
  pub raw:            Option<serde_json::Value>,
}

impl SetAttributes {
  /// Fill every blank field from `incoming`; see [`crate::merge`].
  pub fn fill_missing(&mut self, incoming: SetAttributes) -> Vec<&'static str> {
    let mut filled = Vec::new();
    fill_fields!(self, incoming, filled;
      name, code, release_date, total_cards, official_cards, logo_url,
      symbol_url, serie_name, serie_code, legal, raw,
    );
    filled
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
  pub key:        SetKey,
  pub attrs:      SetAttributes,
  pub enrichment: EnrichmentState,
  pub checked_at: Option<DateTime<Utc>>,
}

impl Set {
  pub fn new(key: SetKey, attrs: SetAttributes) -> Self {
    Self { key, attrs, enrichment: EnrichmentState::Pending, checked_at: None }
  }
}

/// Full set detail from the upstream catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDetail {
  pub external_id: String,
  pub attrs:       SetAttributes,
}

/// One entry of the upstream set listing; a subset of [`SetDetail`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetSummary {
  pub external_id:    String,
  pub name:           String,
  pub logo_url:       Option<String>,
  pub symbol_url:     Option<String>,
  pub total_cards:    Option<u32>,
  pub official_cards: Option<u32>,
}

impl SetSummary {
  pub fn into_set(self, language: Language) -> Set {
    Set::new(
      SetKey::new(self.external_id, language),
      SetAttributes {
        name: self.name,
        logo_url: self.logo_url,
        symbol_url: self.symbol_url,
        total_cards: self.total_cards,
        official_cards: self.official_cards,
        ..Default::default()
      },
    )
  }
}

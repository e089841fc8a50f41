//! Card types. One row per `(external_id, language)`.
//!
//! [`CardAttributes`] is the bag of catalog fields shared by the stored
//! [`Card`] and the upstream [`CardDetail`], so merging is a field-by-field
//! fill between two values of the same shape.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Language,
  enrichment::EnrichmentState,
  fill_fields,
  merge::Blank,
  pricing::PricingSnapshot,
};

// ─── Identity ────────────────────────────────────────────────────────────────

/// The identity of a card row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardKey {
  /// Catalog-wide upstream identifier, e.g. `"swsh3-136"`.
  pub external_id: String,
  pub language:    Language,
}

impl CardKey {
  pub fn new(external_id: impl Into<String>, language: Language) -> Self {
    Self { external_id: external_id.into(), language }
  }

  /// The same card in another language.
  pub fn in_language(&self, language: Language) -> Self {
    Self { external_id: self.external_id.clone(), language }
  }
}

impl fmt::Display for CardKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.external_id, self.language)
  }
}

// ─── Sub-types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
  pub name: String,
  pub text: Option<String>,
  /// e.g. "Ability", "Poke-POWER".
  #[serde(rename = "type")]
  pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
  pub name:   String,
  pub cost:   Vec<String>,
  /// Kept as text: the catalog uses values like `"30+"` and `"20×"`.
  pub damage: Option<String>,
  pub text:   Option<String>,
}

/// A weakness or resistance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeModifier {
  #[serde(rename = "type")]
  pub kind:     String,
  /// e.g. `"×2"` or `"-30"`.
  pub modifier: Option<String>,
}

/// Print variants the card exists in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variants {
  pub normal:        Option<bool>,
  pub reverse:       Option<bool>,
  pub holo:          Option<bool>,
  pub first_edition: Option<bool>,
}

impl Blank for Variants {
  fn is_blank(&self) -> bool {
    self.normal.is_none()
      && self.reverse.is_none()
      && self.holo.is_none()
      && self.first_edition.is_none()
  }
}

/// Tournament format legality; shared by cards and sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Legality {
  pub standard: Option<bool>,
  pub expanded: Option<bool>,
}

impl Blank for Legality {
  fn is_blank(&self) -> bool {
    self.standard.is_none() && self.expanded.is_none()
  }
}

// ─── Attributes ──────────────────────────────────────────────────────────────

/// Catalog fields of a card. Everything the enrichment engine may fill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardAttributes {
  /// Number within the set, e.g. `"136"` or `"TG05"`.
  pub local_id:        String,
  pub name:            String,
  /// External id of the set in the same language.
  pub set_id:          String,
  /// Pokemon, Trainer or Energy. Doubles as the enrichment marker field.
  pub category:        Option<String>,
  pub rarity:          Option<String>,
  pub illustrator:     Option<String>,
  pub hp:              Option<u32>,
  pub types:           Vec<String>,
  pub stage:           Option<String>,
  pub evolves_from:    Option<String>,
  pub suffix:          Option<String>,
  pub dex_ids:         Vec<u32>,
  pub retreat_cost:    Option<u32>,
  pub regulation_mark: Option<String>,
  pub abilities:       Vec<Ability>,
  pub attacks:         Vec<Attack>,
  pub weaknesses:      Vec<TypeModifier>,
  pub resistances:     Vec<TypeModifier>,
  pub variants:        Option<Variants>,
  pub legal:           Option<Legality>,
  pub image_url:       Option<String>,
  /// Upstream payload as received, kept for audit and replay.
  pub raw:             Option<serde_json::Value>,
}

impl CardAttributes {
  /// Fill every blank field from `incoming`; present values are kept.
  ///
  /// Returns the names of the fields that were written.
  pub fn fill_missing(&mut self, incoming: CardAttributes) -> Vec<&'static str> {
    let mut filled = Vec::new();
    fill_fields!(self, incoming, filled;
      local_id, name, set_id, category, rarity, illustrator, hp, types,
      stage, evolves_from, suffix, dex_ids, retreat_cost, regulation_mark,
      abilities, attacks, weaknesses, resistances, variants, legal,
      image_url, raw,
    );
    filled
  }
}

// ─── Card ────────────────────────────────────────────────────────────────────

/// A stored card row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
  pub key:                CardKey,
  pub attrs:              CardAttributes,
  /// Latest marketplace snapshot; replaced wholesale by each pricing run.
  pub pricing:            Option<PricingSnapshot>,
  pub pricing_updated_at: Option<DateTime<Utc>>,
  pub enrichment:         EnrichmentState,
  /// When the upstream was last consulted for this row.
  pub checked_at:         Option<DateTime<Utc>>,
}

impl Card {
  /// A freshly imported, not yet enriched card.
  pub fn new(key: CardKey, attrs: CardAttributes) -> Self {
    Self {
      key,
      attrs,
      pricing: None,
      pricing_updated_at: None,
      enrichment: EnrichmentState::Pending,
      checked_at: None,
    }
  }
}

// ─── Upstream detail ─────────────────────────────────────────────────────────

/// Card detail as returned by the upstream catalog, already normalised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDetail {
  pub external_id: String,
  pub attrs:       CardAttributes,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stored() -> CardAttributes {
    CardAttributes {
      local_id: "4".into(),
      name: "Glurak".into(),
      set_id: "base1".into(),
      rarity: Some("Holo Rare".into()),
      image_url: Some("https://assets.tcgdex.net/de/base/base1/4".into()),
      ..Default::default()
    }
  }

  fn upstream() -> CardAttributes {
    CardAttributes {
      local_id: "4".into(),
      name: "Charizard".into(),
      set_id: "base1".into(),
      category: Some("Pokemon".into()),
      rarity: Some("Rare".into()),
      hp: Some(120),
      types: vec!["Fire".into()],
      image_url: Some("https://example.invalid/other".into()),
      attacks: vec![Attack {
        name:   "Fire Spin".into(),
        cost:   vec!["Fire".to_string(); 4],
        damage: Some("100".into()),
        text:   None,
      }],
      ..Default::default()
    }
  }

  #[test]
  fn fill_missing_keeps_existing_values() {
    let mut attrs = stored();
    let filled = attrs.fill_missing(upstream());

    assert_eq!(attrs.name, "Glurak");
    assert_eq!(attrs.rarity.as_deref(), Some("Holo Rare"));
    assert_eq!(
      attrs.image_url.as_deref(),
      Some("https://assets.tcgdex.net/de/base/base1/4")
    );
    assert_eq!(attrs.category.as_deref(), Some("Pokemon"));
    assert_eq!(attrs.hp, Some(120));
    assert_eq!(attrs.attacks.len(), 1);
    assert_eq!(filled, vec!["category", "hp", "types", "attacks"]);
  }

  #[test]
  fn fill_missing_is_idempotent() {
    let mut attrs = stored();
    attrs.fill_missing(upstream());
    let snapshot = attrs.clone();
    let filled = attrs.fill_missing(upstream());
    assert!(filled.is_empty());
    assert_eq!(attrs, snapshot);
  }
}

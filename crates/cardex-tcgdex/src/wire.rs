//! TCGdex JSON payloads and their mapping onto core types.
//!
//! The upstream is loose about types: `hp` and `damage` arrive as numbers in
//! some languages and strings in others, and optional blocks come and go.
//! Everything here is `#[serde(default)]` and tolerant.

use cardex_core::{
  card::{Ability, Attack, CardAttributes, CardDetail, Legality, TypeModifier, Variants},
  pricing::{MarketPrice, Marketplace, PricingSnapshot},
  set::{SetAttributes, SetDetail, SetSummary},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ─── Lenient scalars ─────────────────────────────────────────────────────────

/// Accepts `30`, `"30"`, `"30+"` and `null`; keeps the text form.
fn text_or_number<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Value::deserialize(d)? {
    Value::String(s) if !s.trim().is_empty() => Some(s),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  })
}

/// Accepts `120`, `"120"` and `null`. Anything unparseable becomes `None`.
fn lenient_u32<'de, D>(d: D) -> Result<Option<u32>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Value::deserialize(d)? {
    Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  })
}

/// `dexId` is usually a list but occasionally a bare number.
fn dex_ids<'de, D>(d: D) -> Result<Vec<u32>, D::Error>
where
  D: Deserializer<'de>,
{
  let as_u32 = |v: &Value| v.as_u64().and_then(|n| u32::try_from(n).ok());
  Ok(match Value::deserialize(d)? {
    Value::Array(items) => items.iter().filter_map(as_u32).collect(),
    v @ Value::Number(_) => as_u32(&v).into_iter().collect(),
    _ => Vec::new(),
  })
}

fn non_blank(s: Option<String>) -> Option<String> {
  s.filter(|s| !s.trim().is_empty())
}

// ─── Cards ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireCard {
  id:              String,
  #[serde(deserialize_with = "text_or_number")]
  local_id:        Option<String>,
  name:            String,
  category:        Option<String>,
  rarity:          Option<String>,
  illustrator:     Option<String>,
  #[serde(deserialize_with = "lenient_u32")]
  hp:              Option<u32>,
  types:           Vec<String>,
  stage:           Option<String>,
  evolve_from:     Option<String>,
  suffix:          Option<String>,
  #[serde(deserialize_with = "dex_ids")]
  dex_id:          Vec<u32>,
  #[serde(deserialize_with = "lenient_u32")]
  retreat:         Option<u32>,
  regulation_mark: Option<String>,
  abilities:       Vec<WireAbility>,
  attacks:         Vec<WireAttack>,
  weaknesses:      Vec<WireModifier>,
  resistances:     Vec<WireModifier>,
  variants:        Option<WireVariants>,
  legal:           Option<WireLegal>,
  image:           Option<String>,
  set:             Option<WireSetRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireAbility {
  name:   String,
  effect: Option<String>,
  #[serde(rename = "type")]
  kind:   Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireAttack {
  name:   String,
  cost:   Vec<String>,
  effect: Option<String>,
  #[serde(deserialize_with = "text_or_number")]
  damage: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireModifier {
  #[serde(rename = "type")]
  kind:  String,
  #[serde(deserialize_with = "text_or_number")]
  value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireVariants {
  normal:        Option<bool>,
  reverse:       Option<bool>,
  holo:          Option<bool>,
  first_edition: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireLegal {
  standard: Option<bool>,
  expanded: Option<bool>,
}

impl From<WireLegal> for Legality {
  fn from(w: WireLegal) -> Self {
    Legality { standard: w.standard, expanded: w.expanded }
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireSetRef {
  id: String,
}

impl WireCard {
  /// Map onto core attributes; `raw` is the payload this was parsed from.
  pub(crate) fn into_detail(self, raw: Value) -> CardDetail {
    let attrs = CardAttributes {
      local_id:        self.local_id.unwrap_or_default(),
      name:            self.name,
      set_id:          self.set.map(|s| s.id).unwrap_or_default(),
      category:        non_blank(self.category),
      rarity:          non_blank(self.rarity),
      illustrator:     non_blank(self.illustrator),
      hp:              self.hp,
      types:           self.types,
      stage:           non_blank(self.stage),
      evolves_from:    non_blank(self.evolve_from),
      suffix:          non_blank(self.suffix),
      dex_ids:         self.dex_id,
      retreat_cost:    self.retreat,
      regulation_mark: non_blank(self.regulation_mark),
      abilities:       self
        .abilities
        .into_iter()
        .map(|a| Ability { name: a.name, text: non_blank(a.effect), kind: non_blank(a.kind) })
        .collect(),
      attacks:         self
        .attacks
        .into_iter()
        .map(|a| Attack {
          name:   a.name,
          cost:   a.cost,
          damage: a.damage,
          text:   non_blank(a.effect),
        })
        .collect(),
      weaknesses:      self.weaknesses.into_iter().map(WireModifier::into_core).collect(),
      resistances:     self.resistances.into_iter().map(WireModifier::into_core).collect(),
      variants:        self.variants.map(|v| Variants {
        normal:        v.normal,
        reverse:       v.reverse,
        holo:          v.holo,
        first_edition: v.first_edition,
      }),
      legal:           self.legal.map(Legality::from),
      image_url:       non_blank(self.image),
      raw:             Some(raw),
    };
    CardDetail { external_id: self.id, attrs }
  }
}

impl WireModifier {
  fn into_core(self) -> TypeModifier {
    TypeModifier { kind: self.kind, modifier: self.value }
  }
}

// ─── Sets ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireCardCount {
  total:    Option<u32>,
  official: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireSerie {
  id:   Option<String>,
  name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireAbbreviation {
  official: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireSet {
  id:           String,
  name:         String,
  logo:         Option<String>,
  symbol:       Option<String>,
  card_count:   WireCardCount,
  serie:        Option<WireSerie>,
  release_date: Option<String>,
  legal:        Option<WireLegal>,
  abbreviation: Option<WireAbbreviation>,
}

impl WireSet {
  pub(crate) fn into_detail(self, raw: Value) -> SetDetail {
    let serie = self.serie.unwrap_or_default();
    let attrs = SetAttributes {
      name:           self.name,
      code:           non_blank(self.abbreviation.and_then(|a| a.official)),
      release_date:   self
        .release_date
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
      total_cards:    self.card_count.total,
      official_cards: self.card_count.official,
      logo_url:       non_blank(self.logo),
      symbol_url:     non_blank(self.symbol),
      serie_name:     non_blank(serie.name),
      serie_code:     non_blank(serie.id),
      legal:          self.legal.map(Legality::from),
      raw:            Some(raw),
    };
    SetDetail { external_id: self.id, attrs }
  }

  /// The listing endpoint returns the same shape with fewer fields.
  pub(crate) fn into_summary(self) -> SetSummary {
    SetSummary {
      external_id:    self.id,
      name:           self.name,
      logo_url:       non_blank(self.logo),
      symbol_url:     non_blank(self.symbol),
      total_cards:    self.card_count.total,
      official_cards: self.card_count.official,
    }
  }
}

// ─── Pricing ─────────────────────────────────────────────────────────────────

/// tcgplayer splits its figures by print variant; these are read in order.
const TCGPLAYER_VARIANTS: [&str; 5] = [
  "normal",
  "holofoil",
  "reverse-holofoil",
  "1st-edition",
  "1st-edition-holofoil",
];

fn number(block: &Value, key: &str) -> Option<f64> {
  block.get(key).and_then(Value::as_f64)
}

fn updated_at(block: &Value) -> Option<DateTime<Utc>> {
  block.get("updated")?.as_str()?.parse().ok()
}

fn currency(block: &Value) -> Option<String> {
  block.get("unit").and_then(Value::as_str).map(str::to_owned)
}

fn cardmarket(block: &Value) -> Option<MarketPrice> {
  let avg = number(block, "avg");
  let low = number(block, "low");
  if avg.is_none() && low.is_none() && number(block, "trend").is_none() {
    return None;
  }
  Some(MarketPrice {
    marketplace:       Marketplace::Cardmarket,
    variant:           None,
    currency:          currency(block).or_else(|| Some("EUR".to_owned())),
    avg,
    median:            None,
    low,
    high:              None,
    sold_count:        None,
    sold_window_days:  None,
    active_listings:   None,
    source_updated_at: updated_at(block),
    raw:               block.clone(),
  })
}

fn tcgplayer(block: &Value) -> Vec<MarketPrice> {
  TCGPLAYER_VARIANTS
    .iter()
    .filter_map(|variant| {
      let prices = block.get(*variant).filter(|v| v.is_object())?;
      Some(MarketPrice {
        marketplace:       Marketplace::Tcgplayer,
        variant:           Some((*variant).to_owned()),
        currency:          currency(block).or_else(|| Some("USD".to_owned())),
        avg:               number(prices, "marketPrice"),
        median:            number(prices, "midPrice"),
        low:               number(prices, "lowPrice"),
        high:              number(prices, "highPrice"),
        sold_count:        None,
        sold_window_days:  None,
        active_listings:   None,
        source_updated_at: updated_at(block),
        raw:               prices.clone(),
      })
    })
    .collect()
}

/// Read the `pricing` block of a card payload. `None` when no marketplace
/// lists the card.
pub(crate) fn pricing_snapshot(card: &Value) -> Option<PricingSnapshot> {
  let pricing = card.get("pricing").filter(|p| p.is_object())?;

  let mut markets = Vec::new();
  if let Some(block) = pricing.get("cardmarket").filter(|b| b.is_object()) {
    markets.extend(cardmarket(block));
  }
  if let Some(block) = pricing.get("tcgplayer").filter(|b| b.is_object()) {
    markets.extend(tcgplayer(block));
  }

  let snapshot = PricingSnapshot { markets };
  (!snapshot.is_empty()).then_some(snapshot)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn numeric_and_textual_scalars_both_parse() {
    let card: WireCard = serde_json::from_value(json!({
      "id": "swsh3-136",
      "localId": 136,
      "name": "Furret",
      "hp": "110",
      "dexId": 162,
      "attacks": [
        { "name": "Feelin' Fine", "cost": ["Colorless"] },
        { "name": "Tail Smash", "cost": ["Colorless", "Colorless"], "damage": 90 },
        { "name": "Continuous Tumble", "damage": "50×" }
      ]
    }))
    .unwrap();

    let detail = card.into_detail(json!({}));
    assert_eq!(detail.attrs.local_id, "136");
    assert_eq!(detail.attrs.hp, Some(110));
    assert_eq!(detail.attrs.dex_ids, [162]);
    let damage: Vec<_> = detail.attrs.attacks.iter().map(|a| a.damage.as_deref()).collect();
    assert_eq!(damage, [None, Some("90"), Some("50×")]);
  }

  #[test]
  fn blank_strings_become_none() {
    let card: WireCard = serde_json::from_value(json!({
      "id": "x", "name": "X", "category": "", "image": "  "
    }))
    .unwrap();
    let detail = card.into_detail(Value::Null);
    assert_eq!(detail.attrs.category, None);
    assert_eq!(detail.attrs.image_url, None);
  }

  #[test]
  fn pricing_reads_both_marketplaces() {
    let card = json!({
      "pricing": {
        "cardmarket": { "updated": "2026-02-01T00:00:00.000Z", "unit": "EUR",
                        "avg": 1.2, "low": 0.5, "trend": 1.1 },
        "tcgplayer": { "unit": "USD",
                       "normal": { "lowPrice": 0.4, "midPrice": 0.9,
                                   "highPrice": 3.0, "marketPrice": 0.8 },
                       "reverse-holofoil": { "marketPrice": 1.9 } }
      }
    });

    let snapshot = pricing_snapshot(&card).unwrap();
    assert_eq!(snapshot.sources(), "cardmarket,tcgplayer,tcgplayer");

    let cm = snapshot.market(Marketplace::Cardmarket).unwrap();
    assert_eq!(cm.avg, Some(1.2));
    assert_eq!(cm.currency.as_deref(), Some("EUR"));
    assert!(cm.source_updated_at.is_some());
    assert_eq!(cm.raw["trend"], json!(1.1));

    let tp = snapshot.market(Marketplace::Tcgplayer).unwrap();
    assert_eq!(tp.variant.as_deref(), Some("normal"));
    assert_eq!((tp.low, tp.median, tp.high, tp.avg), (Some(0.4), Some(0.9), Some(3.0), Some(0.8)));
  }

  #[test]
  fn absent_or_empty_pricing_is_none() {
    assert!(pricing_snapshot(&json!({ "id": "x" })).is_none());
    assert!(pricing_snapshot(&json!({ "pricing": null })).is_none());
    assert!(
      pricing_snapshot(&json!({ "pricing": { "cardmarket": null, "tcgplayer": {} } }))
        .is_none()
    );
  }
}

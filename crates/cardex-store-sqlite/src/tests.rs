//! Integration tests for `SqliteStore` against an in-memory database.

use cardex_core::{
  Language,
  card::{Attack, Card, CardAttributes, CardKey},
  enrichment::EnrichmentState,
  pricing::{MarketPrice, Marketplace, PricingSnapshot},
  set::{Set, SetAttributes, SetKey},
  store::{
    CardSelection, CatalogStore, PageRequest, SetSelection, StoreError as _,
    UpsertOutcome,
  },
};
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(hour: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
}

fn bare_set(id: &str, language: Language) -> Set {
  Set::new(SetKey::new(id, language), SetAttributes {
    name: format!("Set {id}"),
    ..Default::default()
  })
}

fn bare_card(id: &str, set_id: &str, language: Language) -> Card {
  Card::new(CardKey::new(id, language), CardAttributes {
    local_id: id.rsplit('-').next().unwrap_or(id).to_owned(),
    name: format!("Card {id}"),
    set_id: set_id.to_owned(),
    ..Default::default()
  })
}

/// Seed a set and `n` bare cards `swsh3-1 .. swsh3-n` in `language`.
async fn seed(s: &SqliteStore, language: Language, n: usize) -> Vec<CardKey> {
  s.upsert_set(bare_set("swsh3", language)).await.unwrap();
  let mut keys = Vec::new();
  for i in 1..=n {
    let card = bare_card(&format!("swsh3-{i}"), "swsh3", language);
    keys.push(card.key.clone());
    s.upsert_card(card).await.unwrap();
  }
  keys
}

fn detail() -> CardAttributes {
  CardAttributes {
    local_id: "1".into(),
    name: "Butterfree".into(),
    set_id: "swsh3".into(),
    category: Some("Pokemon".into()),
    hp: Some(120),
    types: vec!["Grass".into()],
    attacks: vec![Attack {
      name:   "Whirlwind".into(),
      cost:   vec!["Grass".into()],
      damage: Some("30+".into()),
      text:   None,
    }],
    image_url: Some("https://assets.example/de/swsh3/1".into()),
    ..Default::default()
  }
}

fn cardmarket(avg: f64) -> PricingSnapshot {
  PricingSnapshot {
    markets: vec![MarketPrice {
      marketplace:       Marketplace::Cardmarket,
      variant:           None,
      currency:          Some("EUR".into()),
      avg:               Some(avg),
      median:            None,
      low:               Some(avg / 2.0),
      high:              None,
      sold_count:        None,
      sold_window_days:  None,
      active_listings:   None,
      source_updated_at: Some(at(3)),
      raw:               serde_json::json!({ "avg": avg }),
    }],
  }
}

// ─── Upserts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_inserts_then_merges() {
  let s = store().await;
  s.upsert_set(bare_set("swsh3", Language::De)).await.unwrap();

  let card = bare_card("swsh3-1", "swsh3", Language::De);
  let outcome = s.upsert_card(card.clone()).await.unwrap();
  assert_eq!(outcome, UpsertOutcome::Inserted);

  // Same key again: nothing blank gets a value, so nothing is filled.
  let outcome = s.upsert_card(card.clone()).await.unwrap();
  assert_eq!(outcome, UpsertOutcome::Merged { filled: vec![] });

  let fetched = s.get_card(card.key.clone()).await.unwrap().unwrap();
  assert_eq!(fetched.attrs, card.attrs);
  assert_eq!(fetched.enrichment, EnrichmentState::Pending);
}

#[tokio::test]
async fn upsert_never_overwrites_present_values() {
  let s = store().await;
  s.upsert_set(bare_set("swsh3", Language::En)).await.unwrap();
  let mut card = bare_card("swsh3-1", "swsh3", Language::En);
  card.attrs.rarity = Some("Rare".into());
  s.upsert_card(card.clone()).await.unwrap();

  let mut incoming = card.clone();
  incoming.attrs.rarity = Some("Common".into());
  incoming.attrs.illustrator = Some("Ken Sugimori".into());
  let outcome = s.upsert_card(incoming).await.unwrap();
  assert_eq!(outcome, UpsertOutcome::Merged { filled: vec!["illustrator"] });

  let fetched = s.get_card(card.key).await.unwrap().unwrap();
  assert_eq!(fetched.attrs.rarity.as_deref(), Some("Rare"));
  assert_eq!(fetched.attrs.illustrator.as_deref(), Some("Ken Sugimori"));
}

#[tokio::test]
async fn same_id_in_two_languages_is_two_rows() {
  let s = store().await;
  seed(&s, Language::En, 1).await;
  seed(&s, Language::De, 1).await;

  let en = s.get_card(CardKey::new("swsh3-1", Language::En)).await.unwrap();
  let de = s.get_card(CardKey::new("swsh3-1", Language::De)).await.unwrap();
  assert!(en.is_some());
  assert!(de.is_some());
  assert_eq!(
    s.count_cards(Language::Fr, CardSelection::MissingImage).await.unwrap(),
    0
  );
}

#[tokio::test]
async fn card_without_its_set_is_rejected_but_not_fatal() {
  let s = store().await;
  let err = s
    .upsert_card(bare_card("xy1-1", "xy1", Language::En))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));
  assert!(!err.is_fatal());
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.get_card(CardKey::new("nope", Language::En)).await.unwrap().is_none());
  assert!(s.get_set(SetKey::new("nope", Language::En)).await.unwrap().is_none());
}

// ─── Listings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pending_listing_paginates_by_external_id() {
  let s = store().await;
  seed(&s, Language::De, 5).await;

  let sel = CardSelection::PendingEnrichment;
  assert_eq!(s.count_cards(Language::De, sel).await.unwrap(), 5);

  let first = s
    .list_cards(Language::De, sel, PageRequest::first(2))
    .await
    .unwrap();
  let ids: Vec<_> = first.iter().map(|c| c.key.external_id.as_str()).collect();
  assert_eq!(ids, ["swsh3-1", "swsh3-2"]);

  let next = s
    .list_cards(Language::De, sel, PageRequest {
      after: Some("swsh3-2".into()),
      limit: 10,
    })
    .await
    .unwrap();
  let ids: Vec<_> = next.iter().map(|c| c.key.external_id.as_str()).collect();
  assert_eq!(ids, ["swsh3-3", "swsh3-4", "swsh3-5"]);
}

#[tokio::test]
async fn enriched_rows_leave_the_pending_listing() {
  let s = store().await;
  let keys = seed(&s, Language::De, 3).await;

  s.fill_card(keys[0].clone(), detail(), at(1)).await.unwrap();
  s.mark_card_not_found(keys[1].clone(), at(1)).await.unwrap();

  let pending = s
    .list_cards(Language::De, CardSelection::PendingEnrichment, PageRequest::first(10))
    .await
    .unwrap();
  let states: Vec<_> = pending
    .iter()
    .map(|c| (c.key.external_id.as_str(), c.enrichment))
    .collect();
  assert_eq!(states, [
    ("swsh3-2", EnrichmentState::NotFound),
    ("swsh3-3", EnrichmentState::Pending),
  ]);
}

#[tokio::test]
async fn image_selections() {
  let s = store().await;
  let keys = seed(&s, Language::Ja, 3).await;

  let mut no_image = detail();
  no_image.image_url = None;
  s.fill_card(keys[0].clone(), no_image, at(1)).await.unwrap();
  s.fill_card(keys[1].clone(), detail(), at(1)).await.unwrap();

  let sel = CardSelection::EnrichedMissingImage;
  let rows = s
    .list_cards(Language::Ja, sel, PageRequest::first(10))
    .await
    .unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].key, keys[0]);

  // The pending row has no image either.
  assert_eq!(
    s.count_cards(Language::Ja, CardSelection::MissingImage).await.unwrap(),
    2
  );
}

#[tokio::test]
async fn pricing_due_respects_cutoff() {
  let s = store().await;
  let keys = seed(&s, Language::En, 3).await;
  for key in &keys {
    s.fill_card(key.clone(), detail(), at(1)).await.unwrap();
  }
  s.replace_card_pricing(keys[0].clone(), Some(cardmarket(2.0)), at(2))
    .await
    .unwrap();
  s.replace_card_pricing(keys[1].clone(), Some(cardmarket(2.0)), at(10))
    .await
    .unwrap();

  let due = CardSelection::PricingDue { stamped_before: Some(at(5)) };
  let rows = s
    .list_cards(Language::En, due, PageRequest::first(10))
    .await
    .unwrap();
  let ids: Vec<_> = rows.iter().map(|c| c.key.external_id.as_str()).collect();
  assert_eq!(ids, ["swsh3-1", "swsh3-3"]);

  let all = CardSelection::PricingDue { stamped_before: None };
  assert_eq!(s.count_cards(Language::En, all).await.unwrap(), 3);
}

#[tokio::test]
async fn missing_extended_selection_honours_check_window() {
  let s = store().await;
  let keys = seed(&s, Language::Fr, 3).await;

  // Marker present, attacks present, abilities absent.
  s.fill_card(keys[0].clone(), detail(), at(1)).await.unwrap();
  // Marker present, both present.
  let mut full = detail();
  full.abilities = vec![cardex_core::card::Ability {
    name: "Compound Eyes".into(),
    text: Some("Draw a card.".into()),
    kind: Some("Ability".into()),
  }];
  s.fill_card(keys[1].clone(), full, at(1)).await.unwrap();
  // keys[2] has no marker and is left to the regular enrichment pass.

  let any = CardSelection::MissingExtended { checked_before: None };
  let rows = s
    .list_cards(Language::Fr, any, PageRequest::first(10))
    .await
    .unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].key, keys[0]);

  let stale = CardSelection::MissingExtended { checked_before: Some(at(5)) };
  assert_eq!(s.count_cards(Language::Fr, stale).await.unwrap(), 1);
  let recent = CardSelection::MissingExtended { checked_before: Some(at(1)) };
  assert_eq!(s.count_cards(Language::Fr, recent).await.unwrap(), 0);
}

// ─── Card writes ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn fill_card_marks_enriched_and_reports_filled_fields() {
  let s = store().await;
  let keys = seed(&s, Language::De, 1).await;

  let filled = s.fill_card(keys[0].clone(), detail(), at(4)).await.unwrap();
  assert!(filled.contains(&"category"));
  assert!(filled.contains(&"attacks"));
  assert!(!filled.contains(&"name"));

  let card = s.get_card(keys[0].clone()).await.unwrap().unwrap();
  assert_eq!(card.enrichment, EnrichmentState::Enriched);
  assert_eq!(card.checked_at, Some(at(4)));
  assert_eq!(card.attrs.name, "Card swsh3-1");
  assert_eq!(card.attrs.hp, Some(120));
  assert_eq!(card.attrs.attacks[0].damage.as_deref(), Some("30+"));
}

#[tokio::test]
async fn fill_card_twice_changes_nothing() {
  let s = store().await;
  let keys = seed(&s, Language::De, 1).await;
  s.fill_card(keys[0].clone(), detail(), at(1)).await.unwrap();
  let first = s.get_card(keys[0].clone()).await.unwrap().unwrap();

  let filled = s.fill_card(keys[0].clone(), detail(), at(2)).await.unwrap();
  assert!(filled.is_empty());
  let second = s.get_card(keys[0].clone()).await.unwrap().unwrap();
  assert_eq!(first.attrs, second.attrs);
}

#[tokio::test]
async fn fill_card_missing_row_errors() {
  let s = store().await;
  let err = s
    .fill_card(CardKey::new("ghost", Language::De), detail(), at(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CardNotFound(_)));
  assert!(!err.is_fatal());
}

#[tokio::test]
async fn not_found_never_demotes_enriched() {
  let s = store().await;
  let keys = seed(&s, Language::De, 1).await;
  s.fill_card(keys[0].clone(), detail(), at(1)).await.unwrap();
  s.mark_card_not_found(keys[0].clone(), at(2)).await.unwrap();

  let card = s.get_card(keys[0].clone()).await.unwrap().unwrap();
  assert_eq!(card.enrichment, EnrichmentState::Enriched);
  assert_eq!(card.checked_at, Some(at(2)));
}

#[tokio::test]
async fn fill_card_image_only_writes_empty() {
  let s = store().await;
  let keys = seed(&s, Language::Fr, 1).await;

  assert!(!s.fill_card_image(keys[0].clone(), "  ".into()).await.unwrap());
  assert!(s.fill_card_image(keys[0].clone(), "https://a/1".into()).await.unwrap());
  assert!(!s.fill_card_image(keys[0].clone(), "https://b/1".into()).await.unwrap());

  let card = s.get_card(keys[0].clone()).await.unwrap().unwrap();
  assert_eq!(card.attrs.image_url.as_deref(), Some("https://a/1"));
}

#[tokio::test]
async fn pricing_is_replaced_not_merged() {
  let s = store().await;
  let keys = seed(&s, Language::En, 1).await;
  let key = keys[0].clone();

  s.replace_card_pricing(key.clone(), Some(cardmarket(4.0)), at(1))
    .await
    .unwrap();
  s.replace_card_pricing(key.clone(), Some(cardmarket(1.5)), at(2))
    .await
    .unwrap();
  let card = s.get_card(key.clone()).await.unwrap().unwrap();
  let pricing = card.pricing.unwrap();
  assert_eq!(pricing.markets.len(), 1);
  assert_eq!(pricing.market(Marketplace::Cardmarket).unwrap().avg, Some(1.5));
  assert_eq!(card.pricing_updated_at, Some(at(2)));

  // Upstream reported no pricing: the old snapshot goes away.
  s.replace_card_pricing(key.clone(), None, at(3)).await.unwrap();
  let card = s.get_card(key).await.unwrap().unwrap();
  assert!(card.pricing.is_none());
  assert_eq!(card.pricing_updated_at, Some(at(3)));
}

#[tokio::test]
async fn pricing_timestamps_compare_in_sql() {
  let s = store().await;
  let keys = seed(&s, Language::En, 1).await;
  s.fill_card(keys[0].clone(), detail(), at(1)).await.unwrap();
  let stamp = at(6) + Duration::microseconds(250);
  s.replace_card_pricing(keys[0].clone(), None, stamp).await.unwrap();

  let just_after = CardSelection::PricingDue {
    stamped_before: Some(stamp + Duration::microseconds(1)),
  };
  let just_before = CardSelection::PricingDue {
    stamped_before: Some(stamp - Duration::microseconds(1)),
  };
  assert_eq!(s.count_cards(Language::En, just_after).await.unwrap(), 1);
  assert_eq!(s.count_cards(Language::En, just_before).await.unwrap(), 0);
}

// ─── Sets ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn set_enrichment_and_listing() {
  let s = store().await;
  s.upsert_set(bare_set("base1", Language::De)).await.unwrap();
  s.upsert_set(bare_set("swsh3", Language::De)).await.unwrap();

  assert_eq!(
    s.count_sets(Language::De, SetSelection::PendingEnrichment).await.unwrap(),
    2
  );

  let filled = s
    .fill_set(
      SetKey::new("swsh3", Language::De),
      SetAttributes {
        name: "Flammende Finsternis".into(),
        code: Some("DAA".into()),
        total_cards: Some(201),
        logo_url: Some("https://assets.example/de/swsh3/logo".into()),
        ..Default::default()
      },
      at(1),
    )
    .await
    .unwrap();
  assert_eq!(filled, ["code", "total_cards", "logo_url"]);

  let pending = s
    .list_sets(Language::De, SetSelection::PendingEnrichment, PageRequest::first(10))
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].key.external_id, "base1");

  let set = s.get_set(SetKey::new("swsh3", Language::De)).await.unwrap().unwrap();
  assert_eq!(set.attrs.name, "Set swsh3");
  assert_eq!(set.enrichment, EnrichmentState::Enriched);
}

#[tokio::test]
async fn set_assets_fill_only_empty_columns() {
  let s = store().await;
  let mut set = bare_set("swsh3", Language::It);
  set.attrs.symbol_url = Some("https://assets.example/it/symbol".into());
  s.upsert_set(set).await.unwrap();

  let key = SetKey::new("swsh3", Language::It);
  assert_eq!(
    s.count_sets(Language::It, SetSelection::MissingAssets).await.unwrap(),
    1
  );

  let filled = s
    .fill_set_assets(
      key.clone(),
      Some("https://assets.example/en/logo".into()),
      Some("https://assets.example/en/symbol".into()),
    )
    .await
    .unwrap();
  assert_eq!(filled, ["logo_url"]);

  let set = s.get_set(key).await.unwrap().unwrap();
  assert_eq!(set.attrs.symbol_url.as_deref(), Some("https://assets.example/it/symbol"));
  assert_eq!(
    s.count_sets(Language::It, SetSelection::MissingAssets).await.unwrap(),
    0
  );
}

#[tokio::test]
async fn mark_set_not_found_on_missing_row_errors() {
  let s = store().await;
  let err = s
    .mark_set_not_found(SetKey::new("ghost", Language::En), at(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SetNotFound(_)));
}

fn temp_db(name: &str) -> (std::path::PathBuf, std::path::PathBuf) {
  let dir = std::env::temp_dir()
    .join(format!("cardex-store-{}-{name}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("catalog.db");
  let _ = std::fs::remove_file(&path);
  (dir, path)
}

#[tokio::test]
async fn file_store_survives_reopen() {
  let (dir, path) = temp_db("reopen");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    seed(&s, Language::Pl, 2).await;
  }
  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(
    s.count_cards(Language::Pl, CardSelection::PendingEnrichment).await.unwrap(),
    2
  );

  drop(s);
  let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn undecodable_rows_still_list_and_fail_alone() {
  let (dir, path) = temp_db("undecodable");
  let s = SqliteStore::open(&path).await.unwrap();
  let keys = seed(&s, Language::De, 4).await;

  // Values an older importer or a hand edit could leave behind.
  let raw = rusqlite::Connection::open(&path).unwrap();
  raw
    .execute_batch(
      "UPDATE cards SET dex_ids = '25'      WHERE external_id = 'swsh3-1';
       UPDATE cards SET attacks = '{broken' WHERE external_id = 'swsh3-2';
       UPDATE cards SET hp = 'many'         WHERE external_id = 'swsh3-3';",
    )
    .unwrap();
  drop(raw);

  let rows = s
    .list_cards(Language::De, CardSelection::PendingEnrichment, PageRequest::first(10))
    .await
    .unwrap();
  assert_eq!(rows.len(), 4);
  assert!(rows.iter().all(|r| r.enrichment == EnrichmentState::Pending));

  let first = s.get_card(keys[0].clone()).await.unwrap().unwrap();
  assert_eq!(first.attrs.dex_ids, [25]);

  let err = s.get_card(keys[1].clone()).await.unwrap_err();
  assert!(matches!(err, Error::Json(_)));
  assert!(!err.is_fatal());

  let err = s.fill_card(keys[2].clone(), detail(), at(1)).await.unwrap_err();
  assert!(!err.is_fatal(), "{err}");

  s.fill_card(keys[3].clone(), detail(), at(1)).await.unwrap();

  drop(s);
  let _ = std::fs::remove_dir_all(&dir);
}

//! SQL schema for the cardex SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sets (
    id               INTEGER PRIMARY KEY,
    external_id      TEXT NOT NULL,
    language         TEXT NOT NULL,
    name             TEXT NOT NULL,
    code             TEXT,
    release_date     TEXT,            -- YYYY-MM-DD
    total_cards      INTEGER,
    official_cards   INTEGER,
    logo_url         TEXT,
    symbol_url       TEXT,
    serie_name       TEXT,
    serie_code       TEXT,
    legal            TEXT,            -- JSON Legality
    raw              TEXT,            -- upstream payload, JSON
    enrichment_state TEXT NOT NULL DEFAULT 'pending'
                     CHECK (enrichment_state IN ('pending', 'enriched', 'not_found')),
    checked_at       TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    UNIQUE (external_id, language)
);

-- A card always points at a set of its own language.
CREATE TABLE IF NOT EXISTS cards (
    id                 INTEGER PRIMARY KEY,
    external_id        TEXT NOT NULL,
    language           TEXT NOT NULL,
    local_id           TEXT NOT NULL,
    name               TEXT NOT NULL,
    set_id             TEXT NOT NULL,
    category           TEXT,          -- enrichment marker
    rarity             TEXT,
    illustrator        TEXT,
    hp                 INTEGER,
    types              TEXT,          -- JSON array, NULL when empty
    stage              TEXT,
    evolves_from       TEXT,
    suffix             TEXT,
    dex_ids            TEXT,
    retreat_cost       INTEGER,
    regulation_mark    TEXT,
    abilities          TEXT,
    attacks            TEXT,
    weaknesses         TEXT,
    resistances        TEXT,
    variants           TEXT,
    legal              TEXT,
    image_url          TEXT,
    raw                TEXT,
    pricing            TEXT,          -- JSON PricingSnapshot; replaced, never merged
    pricing_updated_at TEXT,
    enrichment_state   TEXT NOT NULL DEFAULT 'pending'
                       CHECK (enrichment_state IN ('pending', 'enriched', 'not_found')),
    checked_at         TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    UNIQUE (external_id, language),
    FOREIGN KEY (set_id, language) REFERENCES sets (external_id, language)
);

CREATE INDEX IF NOT EXISTS cards_state_idx   ON cards(language, enrichment_state, external_id);
CREATE INDEX IF NOT EXISTS cards_set_idx     ON cards(language, set_id);
CREATE INDEX IF NOT EXISTS cards_pricing_idx ON cards(language, pricing_updated_at);
CREATE INDEX IF NOT EXISTS sets_state_idx    ON sets(language, enrichment_state, external_id);

PRAGMA user_version = 1;
";

/// How long a writer waits on another process's lock before giving up.
pub const BUSY_TIMEOUT_MS: u64 = 5_000;

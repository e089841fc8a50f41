//! Marketplace price snapshots.
//!
//! A snapshot is the latest view of every marketplace that lists the card.
//! It is never merged with a previous snapshot: each pricing run replaces
//! the stored value wholesale.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
  Cardmarket,
  Tcgplayer,
}

impl Marketplace {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Cardmarket => "cardmarket",
      Self::Tcgplayer => "tcgplayer",
    }
  }
}

impl fmt::Display for Marketplace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Marketplace {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cardmarket" => Ok(Self::Cardmarket),
      "tcgplayer" => Ok(Self::Tcgplayer),
      other => Err(Error::UnknownMarketplace(other.to_owned())),
    }
  }
}

/// Aggregate price statistics from one marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
  pub marketplace:       Marketplace,
  /// Print variant the figures refer to (e.g. `"holofoil"`), if the
  /// marketplace splits prices by variant.
  pub variant:           Option<String>,
  /// ISO 4217 code, e.g. `"EUR"`.
  pub currency:          Option<String>,
  pub avg:               Option<f64>,
  pub median:            Option<f64>,
  pub low:               Option<f64>,
  pub high:              Option<f64>,
  pub sold_count:        Option<u32>,
  /// Size of the window `sold_count` covers, in days.
  pub sold_window_days:  Option<u32>,
  pub active_listings:   Option<u32>,
  /// When the marketplace last refreshed these figures.
  pub source_updated_at: Option<DateTime<Utc>>,
  /// The marketplace block exactly as received.
  pub raw:               serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingSnapshot {
  pub markets: Vec<MarketPrice>,
}

impl PricingSnapshot {
  pub fn is_empty(&self) -> bool { self.markets.is_empty() }

  pub fn market(&self, marketplace: Marketplace) -> Option<&MarketPrice> {
    self.markets.iter().find(|m| m.marketplace == marketplace)
  }

  /// Comma-separated marketplace names, for log lines.
  pub fn sources(&self) -> String {
    self
      .markets
      .iter()
      .map(|m| m.marketplace.as_str())
      .collect::<Vec<_>>()
      .join(",")
  }
}

//! Runtime settings, read from an optional TOML file and `CARDEX_*`
//! environment variables.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `CARDEX_API__DELAY_MS=1000` or `CARDEX_STORE_PATH=/data/cardex.db`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use cardex_tcgdex::{ClientConfig, DEFAULT_BASE_URL};
use serde::Deserialize;

use crate::{BatchOptions, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub store_path: PathBuf,
  pub api:        ApiSettings,
  pub batch:      BatchSettings,
  pub pricing:    PricingSettings,
  pub extended:   ExtendedSettings,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path: PathBuf::from("cardex.db"),
      api:        ApiSettings::default(),
      batch:      BatchSettings::default(),
      pricing:    PricingSettings::default(),
      extended:   ExtendedSettings::default(),
    }
  }
}

/// Upstream client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
  pub base_url:       String,
  /// Minimum spacing between request starts.
  pub delay_ms:       u64,
  pub timeout_secs:   u64,
  pub max_attempts:   u32,
  pub backoff_ms:     u64,
  pub max_backoff_ms: u64,
  pub user_agent:     String,
}

impl Default for ApiSettings {
  fn default() -> Self {
    let client = ClientConfig::default();
    Self {
      base_url:       DEFAULT_BASE_URL.to_owned(),
      delay_ms:       client.delay.as_millis() as u64,
      timeout_secs:   client.timeout.as_secs(),
      max_attempts:   client.max_attempts,
      backoff_ms:     client.backoff.as_millis() as u64,
      max_backoff_ms: client.max_backoff.as_millis() as u64,
      user_agent:     client.user_agent,
    }
  }
}

impl ApiSettings {
  pub fn client_config(&self) -> ClientConfig {
    ClientConfig {
      base_url:     self.base_url.clone(),
      delay:        Duration::from_millis(self.delay_ms),
      timeout:      Duration::from_secs(self.timeout_secs),
      max_attempts: self.max_attempts,
      backoff:      Duration::from_millis(self.backoff_ms),
      max_backoff:  Duration::from_millis(self.max_backoff_ms),
      user_agent:   self.user_agent.clone(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
  pub size: usize,
}

impl Default for BatchSettings {
  fn default() -> Self { Self { size: BatchOptions::default().batch_size } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingSettings {
  /// Rows priced more recently than this are skipped.
  pub max_age_hours: u64,
}

impl Default for PricingSettings {
  fn default() -> Self { Self { max_age_hours: 24 } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtendedSettings {
  /// Rows checked more recently than this are not fetched again by
  /// `enrich-extended`.
  pub recheck_after_hours: u64,
}

impl Default for ExtendedSettings {
  fn default() -> Self { Self { recheck_after_hours: 168 } }
}

impl Settings {
  /// Layer the file at `path` (if it exists) under the environment.
  pub fn load(path: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("CARDEX")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()?;
    Ok(settings)
  }

  /// `store_path` with a leading `~` expanded.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let settings = Settings::load(Path::new("/nonexistent/cardex.toml")).unwrap();
    assert_eq!(settings.batch.size, 100);
    assert_eq!(settings.api.delay_ms, 500);
    assert_eq!(settings.api.client_config().max_attempts, 3);
    assert_eq!(settings.pricing.max_age_hours, 24);
    assert_eq!(settings.extended.recheck_after_hours, 168);
  }

  #[test]
  fn file_values_override_defaults() {
    let dir = std::env::temp_dir().join(format!("cardex-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("cardex.toml");
    std::fs::write(
      &path,
      "store_path = \"/var/lib/cardex/catalog.db\"\n\
       [api]\ndelay_ms = 1000\nuser_agent = \"storefront-sync\"\n\
       [batch]\nsize = 25\n",
    )
    .unwrap();

    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.store_path(), PathBuf::from("/var/lib/cardex/catalog.db"));
    assert_eq!(settings.batch.size, 25);
    let client = settings.api.client_config();
    assert_eq!(client.delay, Duration::from_millis(1000));
    assert_eq!(client.user_agent, "storefront-sync");
    assert_eq!(client.timeout, Duration::from_secs(10));

    std::fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn tilde_is_expanded() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/cardex.db")),
      PathBuf::from(home).join("cardex.db")
    );
    assert_eq!(expand_tilde(Path::new("/abs.db")), PathBuf::from("/abs.db"));
  }
}

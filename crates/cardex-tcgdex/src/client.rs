use std::{sync::Arc, time::Duration};

use cardex_core::{
  Language,
  card::CardDetail,
  pricing::PricingSnapshot,
  set::{SetDetail, SetSummary},
  source::{CatalogSource, FetchError, FetchOutcome, FetchResult, PricingSource},
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
  Error, Result,
  throttle::Throttle,
  wire::{self, WireCard, WireSet},
};

pub const DEFAULT_BASE_URL: &str = "https://api.tcgdex.net/v2";

/// Connection and pacing settings for [`TcgdexClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url:     String,
  /// Minimum spacing between the starts of two requests.
  pub delay:        Duration,
  pub timeout:      Duration,
  /// Total tries per request, the first one included.
  pub max_attempts: u32,
  /// Wait after the first transient failure; doubles each retry.
  pub backoff:      Duration,
  pub max_backoff:  Duration,
  pub user_agent:   String,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url:     DEFAULT_BASE_URL.to_owned(),
      delay:        Duration::from_millis(500),
      timeout:      Duration::from_secs(10),
      max_attempts: 3,
      backoff:      Duration::from_millis(500),
      max_backoff:  Duration::from_secs(8),
      user_agent:   concat!("cardex/", env!("CARGO_PKG_VERSION")).to_owned(),
    }
  }
}

/// What one HTTP attempt came to.
enum Attempt {
  Done(FetchOutcome<Value>),
  /// Worth another try: timeout, connection trouble, 5xx, 429.
  Transient(String),
  Fatal(String),
}

/// Async client for the TCGdex REST API.
///
/// Cheap to clone; clones share the HTTP connection pool and the throttle.
#[derive(Clone)]
pub struct TcgdexClient {
  http:     Client,
  config:   Arc<ClientConfig>,
  throttle: Arc<Throttle>,
}

impl TcgdexClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
      return Err(Error::InvalidBaseUrl(config.base_url));
    }
    let http = Client::builder()
      .timeout(config.timeout)
      .user_agent(config.user_agent.clone())
      .build()
      .map_err(Error::Build)?;
    let throttle = Arc::new(Throttle::new(config.delay));
    Ok(Self { http, config: Arc::new(config), throttle })
  }

  fn url(&self, language: Language, path: &str) -> String {
    format!(
      "{}/{}/{}",
      self.config.base_url.trim_end_matches('/'),
      language.api_code(),
      path
    )
  }

  /// Wait applied after the `attempt`-th failure.
  fn backoff(&self, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    self.config.backoff.saturating_mul(factor).min(self.config.max_backoff)
  }

  async fn attempt(&self, url: &str) -> Attempt {
    self.throttle.wait().await;

    let resp = match self.http.get(url).send().await {
      Ok(resp) => resp,
      Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
        return Attempt::Transient(e.to_string());
      }
      Err(e) => return Attempt::Fatal(e.to_string()),
    };

    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
      return Attempt::Done(FetchOutcome::NotFound);
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
      return Attempt::Transient(format!("HTTP {status}"));
    }
    if !status.is_success() {
      return Attempt::Fatal(format!("HTTP {status}"));
    }

    let body = match resp.bytes().await {
      Ok(body) => body,
      Err(e) => return Attempt::Transient(format!("reading body: {e}")),
    };
    if body.iter().all(u8::is_ascii_whitespace) {
      return Attempt::Done(FetchOutcome::NotFound);
    }
    match serde_json::from_slice::<Value>(&body) {
      Ok(Value::Null) => Attempt::Done(FetchOutcome::NotFound),
      Ok(value) => Attempt::Done(FetchOutcome::Found(value)),
      Err(e) => Attempt::Fatal(format!("malformed JSON: {e}")),
    }
  }

  /// `GET` with throttling and retries. Returns the attempt count with the
  /// outcome so decoding failures can report it.
  async fn get(&self, url: &str) -> Result<(FetchOutcome<Value>, u32), FetchError> {
    let max_attempts = self.config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
      attempt += 1;
      match self.attempt(url).await {
        Attempt::Done(outcome) => {
          tracing::debug!(url, attempt, not_found = outcome.is_not_found(), "fetched");
          return Ok((outcome, attempt));
        }
        Attempt::Fatal(reason) => {
          return Err(FetchError::Failed { attempts: attempt, reason });
        }
        Attempt::Transient(reason) if attempt >= max_attempts => {
          tracing::warn!(url, attempt, %reason, "giving up on upstream request");
          return Err(FetchError::Failed { attempts: attempt, reason });
        }
        Attempt::Transient(reason) => {
          let wait = self.backoff(attempt);
          tracing::warn!(url, attempt, ?wait, %reason, "transient upstream failure, retrying");
          tokio::time::sleep(wait).await;
        }
      }
    }
  }

  /// `GET` and decode the payload as `T`, handing back the raw value too.
  async fn get_decoded<T: DeserializeOwned>(&self, url: &str) -> FetchResult<(T, Value)> {
    let (outcome, attempts) = self.get(url).await?;
    let FetchOutcome::Found(value) = outcome else {
      return Ok(FetchOutcome::NotFound);
    };
    let decoded = serde_json::from_value(value.clone()).map_err(|e| FetchError::Failed {
      attempts,
      reason: format!("unexpected payload: {e}"),
    })?;
    Ok(FetchOutcome::Found((decoded, value)))
  }
}

// ─── Source impls ────────────────────────────────────────────────────────────

impl CatalogSource for TcgdexClient {
  /// `GET /{lang}/cards/{id}`
  async fn fetch_card_detail<'a>(
    &'a self,
    external_id: &'a str,
    language: Language,
  ) -> FetchResult<CardDetail> {
    let url = self.url(language, &format!("cards/{external_id}"));
    Ok(match self.get_decoded::<WireCard>(&url).await? {
      FetchOutcome::Found((card, raw)) => FetchOutcome::Found(card.into_detail(raw)),
      FetchOutcome::NotFound => FetchOutcome::NotFound,
    })
  }

  /// `GET /{lang}/sets/{id}`
  async fn fetch_set_detail<'a>(
    &'a self,
    external_id: &'a str,
    language: Language,
  ) -> FetchResult<SetDetail> {
    let url = self.url(language, &format!("sets/{external_id}"));
    Ok(match self.get_decoded::<WireSet>(&url).await? {
      FetchOutcome::Found((set, raw)) => FetchOutcome::Found(set.into_detail(raw)),
      FetchOutcome::NotFound => FetchOutcome::NotFound,
    })
  }

  /// `GET /{lang}/sets`. A language the upstream does not serve yields an
  /// empty list.
  async fn fetch_set_list(
    &self,
    language: Language,
  ) -> Result<Vec<SetSummary>, FetchError> {
    let url = self.url(language, "sets");
    Ok(match self.get_decoded::<Vec<WireSet>>(&url).await? {
      FetchOutcome::Found((sets, _)) => sets.into_iter().map(WireSet::into_summary).collect(),
      FetchOutcome::NotFound => Vec::new(),
    })
  }
}

impl PricingSource for TcgdexClient {
  /// Prices ride along on the card payload: `GET /{lang}/cards/{id}`.
  async fn fetch_pricing<'a>(
    &'a self,
    external_id: &'a str,
    language: Language,
  ) -> FetchResult<Option<PricingSnapshot>> {
    let url = self.url(language, &format!("cards/{external_id}"));
    let (outcome, _) = self.get(&url).await?;
    Ok(match outcome {
      FetchOutcome::Found(card) => FetchOutcome::Found(wire::pricing_snapshot(&card)),
      FetchOutcome::NotFound => FetchOutcome::NotFound,
    })
  }
}

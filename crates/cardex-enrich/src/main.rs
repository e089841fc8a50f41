//! `cardex`: drives the catalog jobs from the command line.
//!
//! Reads `cardex.toml` (or the path given with `--config`) plus `CARDEX_*`
//! environment variables, opens the SQLite store, runs one job for one or
//! all languages, and prints the final report to stdout as JSON. Progress
//! goes to the log on stderr.
//!
//! Exits 0 when the job ran to completion, 1 on a fatal error, and
//! [`EXIT_INTERRUPTED`] when a signal stopped it early; the summary is
//! printed in that case too.

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use cardex_core::Language;
use cardex_enrich::{
  BatchOptions, EnrichOptions, Engine, ExtendedOptions, PricingOptions, Shutdown,
  config::Settings,
};
use cardex_store_sqlite::SqliteStore;
use cardex_tcgdex::TcgdexClient;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{Instrument as _, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Multi-language TCG catalog enrichment")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "cardex.toml")]
  config: PathBuf,

  /// SQLite database path; overrides `store_path` from the config.
  #[arg(long)]
  db: Option<PathBuf>,

  #[arg(long, value_enum, default_value_t = LogFormat::Text)]
  log_format: LogFormat,

  #[command(subcommand)]
  command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
  Text,
  Json,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Languages {
  /// A single language, e.g. `de` or `pt_br`.
  #[arg(long)]
  lang: Option<Language>,

  /// Every language in turn, sharing one throttle.
  #[arg(long)]
  all_langs: bool,
}

impl Languages {
  fn resolve(&self) -> Vec<Language> {
    match self.lang {
      Some(language) => vec![language],
      None => Language::ALL.to_vec(),
    }
  }
}

#[derive(Args)]
struct Paging {
  /// Rows per store page.
  #[arg(long)]
  batch_size: Option<usize>,

  /// Minimum milliseconds between upstream requests.
  #[arg(long, value_name = "MS")]
  delay: Option<u64>,

  /// Stop after this many rows per language.
  #[arg(long)]
  limit: Option<usize>,
}

impl Paging {
  fn batch(&self, settings: &Settings) -> BatchOptions {
    BatchOptions {
      batch_size: self.batch_size.unwrap_or(settings.batch.size),
      limit:      self.limit,
    }
  }
}

#[derive(Subcommand)]
enum Command {
  /// Fill blank card fields from the upstream card detail.
  Enrich {
    #[command(flatten)]
    languages:       Languages,
    #[command(flatten)]
    paging:          Paging,
    /// Also re-fetch cards recorded as not found.
    #[arg(long)]
    retry_not_found: bool,
  },
  /// Fill blank set fields from the upstream set detail.
  EnrichSets {
    #[command(flatten)]
    languages:       Languages,
    #[command(flatten)]
    paging:          Paging,
    #[arg(long)]
    retry_not_found: bool,
  },
  /// Re-fetch cards that have a category but no abilities or attacks.
  EnrichExtended {
    #[command(flatten)]
    languages: Languages,
    #[command(flatten)]
    paging:    Paging,
    /// Ignore the recheck window and fetch every selected card.
    #[arg(long)]
    all:       bool,
  },
  /// Re-fetch enriched cards that still have no image.
  RefreshImages {
    #[command(flatten)]
    languages: Languages,
    #[command(flatten)]
    paging:    Paging,
  },
  /// Replace marketplace pricing on enriched cards.
  Pricing {
    #[command(flatten)]
    languages: Languages,
    #[command(flatten)]
    paging:    Paging,
    /// Re-price every enriched card, however recently priced.
    #[arg(long)]
    all:       bool,
  },
  /// Insert sets the upstream lists but the store lacks.
  SyncSets {
    #[command(flatten)]
    languages: Languages,
    #[arg(long, value_name = "MS")]
    delay:     Option<u64>,
  },
  /// Copy set logos and symbols from English rows.
  BackfillLogos,
  /// Copy card images from English rows.
  BackfillImages,
}

impl Command {
  fn job(&self) -> &'static str {
    match self {
      Command::Enrich { .. } => "enrich",
      Command::EnrichSets { .. } => "enrich-sets",
      Command::EnrichExtended { .. } => "enrich-extended",
      Command::RefreshImages { .. } => "refresh-images",
      Command::Pricing { .. } => "pricing",
      Command::SyncSets { .. } => "sync-sets",
      Command::BackfillLogos => "backfill-logos",
      Command::BackfillImages => "backfill-images",
    }
  }
}

/// Exit status of a run stopped early by SIGINT or SIGTERM.
const EXIT_INTERRUPTED: u8 = 3;

/// What ends up on stdout.
#[derive(Serialize)]
struct RunSummary {
  job:         &'static str,
  run_id:      Uuid,
  interrupted: bool,
  reports:     Vec<serde_json::Value>,
}

impl RunSummary {
  /// `triggered` is the shutdown flag after the run. A report can also say
  /// it was cut short on its own.
  fn new(
    job: &'static str,
    run_id: Uuid,
    reports: Vec<serde_json::Value>,
    triggered: bool,
  ) -> Self {
    let interrupted = triggered
      || reports
        .iter()
        .any(|r| r.get("interrupted").and_then(serde_json::Value::as_bool) == Some(true));
    Self { job, run_id, interrupted, reports }
  }

  fn exit_status(&self) -> u8 { if self.interrupted { EXIT_INTERRUPTED } else { 0 } }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  let cli = Cli::parse();
  init_tracing(cli.log_format);

  let mut settings = Settings::load(&cli.config)
    .with_context(|| format!("config: failed to load {:?}", cli.config))?;
  if let Some(db) = cli.db {
    settings.store_path = db;
  }

  let store_path = settings.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("store: failed to open {store_path:?}"))?;

  let shutdown = Shutdown::new();
  shutdown.listen();

  let job = cli.command.job();
  let run_id = Uuid::new_v4();
  let reports = run(cli.command, &settings, store, shutdown.clone())
    .instrument(tracing::info_span!("run", %run_id, job))
    .await?;

  let summary = RunSummary::new(job, run_id, reports, shutdown.is_triggered());
  println!(
    "{}",
    serde_json::to_string_pretty(&summary).context("serialising report")?
  );
  if summary.interrupted {
    tracing::warn!(%run_id, "run interrupted; start it again to resume");
  }
  Ok(ExitCode::from(summary.exit_status()))
}

fn init_tracing(format: LogFormat) {
  let builder = tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr);
  match format {
    LogFormat::Text => builder.init(),
    LogFormat::Json => builder.json().init(),
  }
}

fn client(settings: &Settings, delay: Option<u64>) -> anyhow::Result<TcgdexClient> {
  let mut config = settings.api.client_config();
  if let Some(ms) = delay {
    config.delay = std::time::Duration::from_millis(ms);
  }
  TcgdexClient::new(config).context("http client: failed to build")
}

fn language_span(language: Language) -> tracing::Span {
  tracing::info_span!("language", %language)
}

async fn run(
  command: Command,
  settings: &Settings,
  store: SqliteStore,
  shutdown: Shutdown,
) -> anyhow::Result<Vec<serde_json::Value>> {
  let mut reports = Vec::new();

  match command {
    Command::Enrich { languages, paging, retry_not_found } => {
      let engine = Engine::new(store, client(settings, paging.delay)?).with_shutdown(shutdown);
      let options = EnrichOptions { batch: paging.batch(settings), retry_not_found };
      for language in languages.resolve() {
        let report = engine
          .enrich_language(language, &options)
          .instrument(language_span(language))
          .await?;
        reports.push(serde_json::to_value(report)?);
        if engine.shutdown.is_triggered() {
          break;
        }
      }
    }
    Command::EnrichSets { languages, paging, retry_not_found } => {
      let engine = Engine::new(store, client(settings, paging.delay)?).with_shutdown(shutdown);
      let options = EnrichOptions { batch: paging.batch(settings), retry_not_found };
      for language in languages.resolve() {
        let report = engine
          .enrich_sets(language, &options)
          .instrument(language_span(language))
          .await?;
        reports.push(serde_json::to_value(report)?);
        if engine.shutdown.is_triggered() {
          break;
        }
      }
    }
    Command::EnrichExtended { languages, paging, all } => {
      let engine = Engine::new(store, client(settings, paging.delay)?).with_shutdown(shutdown);
      let recheck_after =
        chrono::Duration::try_hours(settings.extended.recheck_after_hours as i64)
          .context("config: extended.recheck_after_hours out of range")?;
      let options = ExtendedOptions {
        batch:         paging.batch(settings),
        recheck_after: (!all).then_some(recheck_after),
      };
      for language in languages.resolve() {
        let report = engine
          .enrich_extended(language, &options)
          .instrument(language_span(language))
          .await?;
        reports.push(serde_json::to_value(report)?);
        if engine.shutdown.is_triggered() {
          break;
        }
      }
    }
    Command::RefreshImages { languages, paging } => {
      let engine = Engine::new(store, client(settings, paging.delay)?).with_shutdown(shutdown);
      let options = EnrichOptions { batch: paging.batch(settings), retry_not_found: false };
      for language in languages.resolve() {
        let report = engine
          .refresh_images(language, &options)
          .instrument(language_span(language))
          .await?;
        reports.push(serde_json::to_value(report)?);
        if engine.shutdown.is_triggered() {
          break;
        }
      }
    }
    Command::Pricing { languages, paging, all } => {
      let engine = Engine::new(store, client(settings, paging.delay)?).with_shutdown(shutdown);
      let max_age = chrono::Duration::try_hours(settings.pricing.max_age_hours as i64)
        .context("config: pricing.max_age_hours out of range")?;
      let options = PricingOptions {
        batch:   paging.batch(settings),
        max_age: (!all).then_some(max_age),
      };
      for language in languages.resolve() {
        let report = engine
          .enrich_pricing(language, &options)
          .instrument(language_span(language))
          .await?;
        reports.push(serde_json::to_value(report)?);
        if engine.shutdown.is_triggered() {
          break;
        }
      }
    }
    Command::SyncSets { languages, delay } => {
      let engine = Engine::new(store, client(settings, delay)?).with_shutdown(shutdown);
      for language in languages.resolve() {
        let report = engine
          .sync_sets(language)
          .instrument(language_span(language))
          .await?;
        reports.push(serde_json::to_value(report)?);
        if engine.shutdown.is_triggered() {
          break;
        }
      }
    }
    Command::BackfillLogos => {
      let engine = Engine::new(store, ()).with_shutdown(shutdown);
      let batch = BatchOptions { batch_size: settings.batch.size, limit: None };
      reports.push(serde_json::to_value(engine.backfill_logos(batch).await?)?);
    }
    Command::BackfillImages => {
      let engine = Engine::new(store, ()).with_shutdown(shutdown);
      let batch = BatchOptions { batch_size: settings.batch.size, limit: None };
      reports.push(serde_json::to_value(engine.backfill_card_images(batch).await?)?);
    }
  }

  Ok(reports)
}

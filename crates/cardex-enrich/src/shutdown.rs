//! Cooperative shutdown on SIGINT / SIGTERM.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

/// A flag jobs check between rows. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
  pub fn new() -> Self { Self::default() }

  pub fn trigger(&self) { self.0.store(true, Ordering::SeqCst); }

  pub fn is_triggered(&self) -> bool { self.0.load(Ordering::SeqCst) }

  /// Spawn a task that triggers the flag on Ctrl-C or SIGTERM.
  pub fn listen(&self) {
    let flag = self.clone();
    tokio::spawn(async move {
      wait_for_signal().await;
      tracing::warn!("shutdown requested; stopping after the current row");
      flag.trigger();
    });
  }
}

#[cfg(unix)]
async fn wait_for_signal() {
  use tokio::signal::unix::{SignalKind, signal};

  let Ok(mut term) = signal(SignalKind::terminate()) else {
    let _ = tokio::signal::ctrl_c().await;
    return;
  };
  tokio::select! {
    _ = tokio::signal::ctrl_c() => {}
    _ = term.recv() => {}
  }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
  let _ = tokio::signal::ctrl_c().await;
}

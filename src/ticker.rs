//! Periodic index price display.
//!
//! A background task fetches the last close of each configured symbol on a
//! fixed interval and publishes a one-line display such as
//! `KOSPI 2650.12 | NASDAQ 16274.94`. Readers subscribe through a
//! [`tokio::sync::watch`] channel and always see the latest line.
//!
//! Symbols that fail are left out of the line. When every symbol fails the
//! previous line stays published.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::traits::MarketData;

/// Handle to a running ticker task.
pub struct TickerHandle {
    display: watch::Receiver<String>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// A receiver of the current display line (empty until the first fetch).
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.display.clone()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(target: "ticker", "ticker task ended abnormally: {}", e);
        }
    }
}

/// Start the ticker. The first fetch happens immediately.
///
/// `symbols` maps a display label to a market symbol (e.g. `KOSPI` → `^KS11`).
pub fn spawn_ticker(
    market: Arc<dyn MarketData>,
    symbols: BTreeMap<String, String>,
    interval: Duration,
) -> TickerHandle {
    let (display_tx, display_rx) = watch::channel(String::new());
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        tracing::info!(target: "ticker", "Ticker started ({}s interval, {} symbols)", interval.as_secs(), symbols.len());
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(line) = fetch_display(market.as_ref(), &symbols).await {
                        display_tx.send_replace(line);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(target: "ticker", "Ticker stopped");
    });

    TickerHandle {
        display: display_rx,
        shutdown_tx,
        task,
    }
}

/// One display line, or `None` if no symbol could be fetched.
pub async fn fetch_display(
    market: &dyn MarketData,
    symbols: &BTreeMap<String, String>,
) -> Option<String> {
    let mut parts = Vec::with_capacity(symbols.len());
    for (label, symbol) in symbols {
        match market.last_close(symbol).await {
            Ok(price) => parts.push(format!("{} {:.2}", label, price)),
            Err(e) => tracing::debug!(target: "ticker", %symbol, error = %e, "price fetch failed"),
        }
    }
    (!parts.is_empty()).then(|| parts.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateItem, FinancialStatements};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeMarket {
        calls: AtomicUsize,
        down: AtomicBool,
    }

    impl FakeMarket {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                down: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MarketData for FakeMarket {
        async fn last_close(&self, symbol: &str) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) || symbol == "^BAD" {
                anyhow::bail!("no data for {}", symbol);
            }
            Ok(match symbol {
                "^KS11" => 2650.5,
                _ => 100.0,
            })
        }
        async fn statements(&self, _symbol: &str) -> Result<FinancialStatements> {
            anyhow::bail!("unused")
        }
        async fn lookup(&self, _query: &str) -> Result<Vec<CandidateItem>> {
            Ok(Vec::new())
        }
    }

    fn symbols(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(l, s)| (l.to_string(), s.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_display_skips_failed_symbols() {
        let market = FakeMarket::new();
        let line = fetch_display(&market, &symbols(&[("KOSPI", "^KS11"), ("X", "^BAD"), ("NASDAQ", "^IXIC")]))
            .await
            .unwrap();
        assert_eq!(line, "KOSPI 2650.50 | NASDAQ 100.00");
    }

    #[tokio::test]
    async fn test_display_none_when_all_fail() {
        let market = FakeMarket::new();
        assert_eq!(fetch_display(&market, &symbols(&[("X", "^BAD")])).await, None);
    }

    #[tokio::test]
    async fn test_ticker_publishes_and_keeps_last_line() {
        let market = Arc::new(FakeMarket::new());
        let handle = spawn_ticker(
            market.clone(),
            symbols(&[("KOSPI", "^KS11")]),
            Duration::from_millis(20),
        );

        let mut rx = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("ticker never published")
            .unwrap();
        assert_eq!(*rx.borrow(), "KOSPI 2650.50");

        market.down.store(true, Ordering::SeqCst);
        let calls = market.calls.load(Ordering::SeqCst);
        while market.calls.load(Ordering::SeqCst) < calls + 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*rx.borrow(), "KOSPI 2650.50");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_fetching() {
        let market = Arc::new(FakeMarket::new());
        let handle = spawn_ticker(
            market.clone(),
            symbols(&[("KOSPI", "^KS11")]),
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.shutdown().await;

        let after = market.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(market.calls.load(Ordering::SeqCst), after);
    }
}

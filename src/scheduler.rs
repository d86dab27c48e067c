use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::config::Chain;
use crate::eth::RpcClient;
use crate::models::NotificationMessage;
use crate::poll_stats::POLL_STATS;
use crate::telegram::{format_transaction_message, Notifier};
use crate::watcher::WalletWatcher;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub events: usize,
    pub delivered: usize,
    pub dropped: usize,
}

/// Drives poll cycles on a fixed interval and forwards every new
/// transaction to the notifier.
pub struct Scheduler<C, N> {
    watcher: WalletWatcher<C>,
    notifier: N,
    chain: Chain,
    chat_id: String,
    interval: Duration,
}

impl<C: RpcClient, N: Notifier> Scheduler<C, N> {
    pub fn new(
        watcher: WalletWatcher<C>,
        notifier: N,
        chain: Chain,
        chat_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            watcher,
            notifier,
            chain,
            chat_id: chat_id.into(),
            interval,
        }
    }

    pub fn watcher(&self) -> &WalletWatcher<C> {
        &self.watcher
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// One poll followed by one send per new transaction. Undelivered
    /// messages are dropped.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let events = self.watcher.poll().await;
        let mut report = CycleReport {
            events: events.len(),
            ..Default::default()
        };

        for event in &events {
            let message = NotificationMessage {
                chat_id: self.chat_id.clone(),
                text: format_transaction_message(self.chain, event),
            };
            let delivered = self.notifier.send(&message).await;
            POLL_STATS.record_notification(delivered);
            if delivered {
                report.delivered += 1;
            } else {
                report.dropped += 1;
            }
        }

        report
    }

    /// Runs cycles until `shutdown` resolves. A cycle in progress is allowed
    /// to finish first.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!("polling every {:?}", self.interval);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, stopping poll loop");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    if report.dropped > 0 {
                        tracing::info!(
                            "delivered {} of {} notification(s)",
                            report.delivered, report.events
                        );
                    }
                    tracing::info!(
                        "poll stats {}",
                        serde_json::to_string(&POLL_STATS.snapshot()).unwrap_or_default()
                    );
                }
            }
        }
    }
}

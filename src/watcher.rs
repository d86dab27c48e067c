use std::collections::{HashMap, HashSet};

use ethers_core::types::{Address, H256};

use crate::eth::{RpcClient, RpcError};
use crate::models::{TrackedWallet, TransactionEvent};
use crate::poll_stats::POLL_STATS;

/// Owns the tracked wallets and their last-seen markers.
pub struct WalletWatcher<C> {
    client: C,
    wallets: Vec<TrackedWallet>,
    max_blocks_per_poll: u64,
    /// Hashes already returned, with their block. Entries at or below the
    /// lowest `synced_through` can no longer be fetched and are pruned.
    reported: HashMap<H256, u64>,
}

impl<C: RpcClient> WalletWatcher<C> {
    pub fn new(client: C, wallets: Vec<TrackedWallet>, max_blocks_per_poll: u64) -> Self {
        Self {
            client,
            wallets,
            max_blocks_per_poll: max_blocks_per_poll.max(1),
            reported: HashMap::new(),
        }
    }

    /// Anchors every wallet at the current head, or just before `start_block`
    /// when one is given. Fails if the head cannot be fetched.
    pub async fn start(
        client: C,
        addresses: &[Address],
        start_block: Option<u64>,
        max_blocks_per_poll: u64,
    ) -> Result<Self, RpcError> {
        let head = client.latest_block_number().await?;
        let synced_through = match start_block {
            Some(start) => start.saturating_sub(1),
            None => head,
        };
        tracing::info!(
            "watching {} wallet(s) from block {} (head {})",
            addresses.len(),
            synced_through + 1,
            head
        );

        let wallets = addresses
            .iter()
            .map(|address| TrackedWallet::new(*address, synced_through))
            .collect();
        Ok(Self::new(client, wallets, max_blocks_per_poll))
    }

    pub fn wallets(&self) -> &[TrackedWallet] {
        &self.wallets
    }

    pub fn wallet(&self, address: &Address) -> Option<&TrackedWallet> {
        self.wallets.iter().find(|w| w.address == *address)
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Number of hashes kept for cross-wallet de-duplication.
    pub fn reported_len(&self) -> usize {
        self.reported.len()
    }

    fn prune_reported(&mut self) {
        let Some(floor) = self.wallets.iter().map(|w| w.synced_through).min() else {
            self.reported.clear();
            return;
        };
        self.reported.retain(|_, block| *block > floor);
    }

    /// Runs one poll cycle. Returns the new transactions across all wallets
    /// ordered by block then transaction index, each hash at most once.
    ///
    /// A wallet whose lookup fails keeps its state and is retried next cycle.
    pub async fn poll(&mut self) -> Vec<TransactionEvent> {
        POLL_STATS.inc_cycles();

        let head = match self.client.latest_block_number().await {
            Ok(head) => head,
            Err(err) => {
                tracing::warn!("skipping poll cycle, failed to fetch latest block: {}", err);
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        let mut failures = 0u64;

        for wallet in &mut self.wallets {
            if wallet.synced_through >= head {
                continue;
            }
            let from_block = wallet.synced_through + 1;
            let to_block = head.min(wallet.synced_through.saturating_add(self.max_blocks_per_poll));

            let fetched = match self
                .client
                .transactions_for_address(wallet.address, from_block, to_block)
                .await
            {
                Ok(fetched) => fetched,
                Err(err) => {
                    failures += 1;
                    tracing::warn!(
                        "failed to poll wallet {} for blocks {}..={}: {}",
                        wallet.checksum(),
                        from_block,
                        to_block,
                        err
                    );
                    continue;
                }
            };

            let mut fresh: Vec<TransactionEvent> = fetched
                .into_iter()
                .filter(|event| event.touches(&wallet.address) && wallet.is_new(event, to_block))
                .collect();
            fresh.sort_by_key(TransactionEvent::cursor);

            if let Some(last) = fresh.last() {
                wallet.last_seen = Some(last.cursor());
            }
            wallet.synced_through = to_block;

            tracing::debug!(
                "wallet {} scanned {}..={}, {} new tx(s)",
                wallet.checksum(),
                from_block,
                to_block,
                fresh.len()
            );
            events.extend(fresh);
        }

        let events = merge_events(events, &mut self.reported);
        self.prune_reported();

        POLL_STATS.inc_events(events.len() as u64);
        POLL_STATS.inc_wallet_failures(failures);
        tracing::info!(
            "poll cycle at head {}: {} new tx(s), {} wallet failure(s)",
            head,
            events.len(),
            failures
        );

        events
    }
}

/// Orders events by chain position and drops hashes already reported, in
/// this cycle or an earlier one. A transaction between two tracked wallets
/// reaches here once per wallet, possibly in different cycles when one of
/// them lagged behind.
fn merge_events(
    mut events: Vec<TransactionEvent>,
    reported: &mut HashMap<H256, u64>,
) -> Vec<TransactionEvent> {
    events.sort_by_key(TransactionEvent::cursor);
    let mut seen: HashSet<H256> = HashSet::with_capacity(events.len());
    events.retain(|event| seen.insert(event.hash) && !reported.contains_key(&event.hash));
    for event in &events {
        reported.insert(event.hash, event.block_number);
    }
    events
}

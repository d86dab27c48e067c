use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers_core::types::{Address, BlockId, Transaction, TransactionReceipt};
use ethers_providers::{Http, Middleware, Provider, ProviderError, RpcError as _};
use url::Url;

use crate::models::TransactionEvent;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Connection refused, timeout, or other transport failure.
    #[error("network error: {0}")]
    Network(String),
    /// The provider answered, but with an error or something unparseable.
    #[error("provider error: {0}")]
    Provider(String),
}

impl From<ProviderError> for RpcError {
    fn from(err: ProviderError) -> Self {
        match &err {
            ProviderError::HTTPError(_) => RpcError::Network(err.to_string()),
            ProviderError::JsonRpcClientError(inner) => {
                if inner.as_error_response().is_some() || inner.as_serde_error().is_some() {
                    RpcError::Provider(err.to_string())
                } else {
                    RpcError::Network(err.to_string())
                }
            }
            _ => RpcError::Provider(err.to_string()),
        }
    }
}

/// Read access to the chain that the watcher needs.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn latest_block_number(&self) -> Result<u64, RpcError>;

    /// Transactions sent from or to `address` in `from_block..=to_block`.
    async fn transactions_for_address(
        &self,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransactionEvent>, RpcError>;
}

#[derive(Clone)]
struct CachedBlock {
    timestamp: u64,
    transactions: Arc<Vec<Transaction>>,
}

#[derive(Clone)]
pub struct EthClient {
    provider: Provider<Http>,
    /// Blocks fetched since the last head lookup, shared by every wallet
    /// scanned in the same cycle.
    blocks: Arc<Mutex<BTreeMap<u64, CachedBlock>>>,
}

impl EthClient {
    pub fn new(rpc_url: &Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;
        let transport = Http::new_with_client(rpc_url.clone(), client);
        let provider = Provider::new(transport);
        Ok(Self {
            provider,
            blocks: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    /// Returns `(chain_id, head)`. Used once before polling starts.
    pub async fn startup_check(&self) -> Result<(u64, u64), RpcError> {
        let chain_id = self.provider.get_chainid().await?;
        let head = self.provider.get_block_number().await?;
        Ok((chain_id.low_u64(), head.as_u64()))
    }

    fn cached_blocks(&self) -> MutexGuard<'_, BTreeMap<u64, CachedBlock>> {
        self.blocks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn block(&self, num: u64) -> Result<CachedBlock, RpcError> {
        let hit = self.cached_blocks().get(&num).cloned();
        if let Some(hit) = hit {
            return Ok(hit);
        }

        let block = self
            .provider
            .get_block_with_txs(BlockId::Number(num.into()))
            .await?
            .ok_or_else(|| RpcError::Provider(format!("block {} not found", num)))?;
        let cached = CachedBlock {
            timestamp: block.timestamp.low_u64(),
            transactions: Arc::new(block.transactions),
        };
        self.cached_blocks().insert(num, cached.clone());
        Ok(cached)
    }
}

#[async_trait]
impl RpcClient for EthClient {
    /// Starts a new cycle: blocks cached during the previous one are dropped
    /// so a reorged block is fetched again.
    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        self.cached_blocks().clear();
        let latest = self.provider.get_block_number().await?;
        Ok(latest.as_u64())
    }

    async fn transactions_for_address(
        &self,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransactionEvent>, RpcError> {
        let mut out = Vec::new();

        for num in from_block..=to_block {
            let block = self.block(num).await?;

            for (position, tx) in block.transactions.iter().enumerate() {
                let event = normalize_tx(tx, num, position as u64, block.timestamp);
                if !event.touches(&address) {
                    continue;
                }

                match self.provider.get_transaction_receipt(tx.hash).await {
                    Ok(receipt) if !receipt_succeeded(receipt.as_ref()) => {
                        tracing::info!("skipping reverted tx {}", event.hash_hex());
                        continue;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!("could not fetch receipt for {}: {}", event.hash_hex(), err);
                    }
                }

                out.push(event);
            }
        }

        Ok(out)
    }
}

fn normalize_tx(tx: &Transaction, block_number: u64, position: u64, timestamp: u64) -> TransactionEvent {
    TransactionEvent {
        hash: tx.hash,
        from: tx.from,
        to: tx.to,
        value_wei: tx.value,
        block_number,
        transaction_index: tx.transaction_index.map_or(position, |i| i.as_u64()),
        timestamp,
    }
}

/// Missing receipts and pre-Byzantium receipts without a status count as
/// successful.
fn receipt_succeeded(receipt: Option<&TransactionReceipt>) -> bool {
    receipt
        .and_then(|r| r.status)
        .map_or(true, |status| status.as_u64() == 1)
}

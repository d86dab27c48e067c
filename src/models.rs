use std::cmp::Ordering;

use ethers_core::types::{Address, H256, U256};
use ethers_core::utils::to_checksum;
use serde::Serialize;

/// Position of a transaction on chain. Ordered by block, then index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TxCursor {
    pub block_number: u64,
    pub transaction_index: u64,
}

impl PartialOrd for TxCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TxCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.block_number
            .cmp(&other.block_number)
            .then(self.transaction_index.cmp(&other.transaction_index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionEvent {
    pub hash: H256,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value_wei: U256,
    pub block_number: u64,
    pub transaction_index: u64,
    pub timestamp: u64,
}

impl TransactionEvent {
    pub fn cursor(&self) -> TxCursor {
        TxCursor {
            block_number: self.block_number,
            transaction_index: self.transaction_index,
        }
    }

    pub fn touches(&self, address: &Address) -> bool {
        self.from == *address || self.to.as_ref() == Some(address)
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{:x}", self.hash)
    }
}

/// Per-address polling state, owned by the watcher for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedWallet {
    pub address: Address,
    pub last_seen: Option<TxCursor>,
    /// Highest block already scanned for this wallet.
    pub synced_through: u64,
}

impl TrackedWallet {
    pub fn new(address: Address, synced_through: u64) -> Self {
        Self {
            address,
            last_seen: None,
            synced_through,
        }
    }

    pub fn checksum(&self) -> String {
        to_checksum(&self.address, None)
    }

    pub fn last_seen_block(&self) -> Option<u64> {
        self.last_seen.map(|c| c.block_number)
    }

    /// True if `event` lies strictly after everything already handled for
    /// this wallet and no later than `to_block`.
    pub fn is_new(&self, event: &TransactionEvent, to_block: u64) -> bool {
        event.block_number > self.synced_through
            && event.block_number <= to_block
            && self.last_seen.map_or(true, |seen| event.cursor() > seen)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub chat_id: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(block: u64, index: u64) -> TransactionEvent {
        TransactionEvent {
            hash: H256::from_low_u64_be(block * 1000 + index),
            from: Address::from_low_u64_be(1),
            to: None,
            value_wei: U256::zero(),
            block_number: block,
            transaction_index: index,
            timestamp: 0,
        }
    }

    #[test]
    fn cursor_orders_by_block_then_index() {
        assert!(event(10, 5).cursor() < event(11, 0).cursor());
        assert!(event(10, 1).cursor() < event(10, 2).cursor());
    }

    #[test]
    fn is_new_excludes_last_seen_and_scanned_blocks() {
        let mut wallet = TrackedWallet::new(Address::from_low_u64_be(1), 100);
        wallet.last_seen = Some(event(100, 3).cursor());

        assert!(!wallet.is_new(&event(100, 3), 105));
        assert!(!wallet.is_new(&event(100, 7), 105));
        assert!(!wallet.is_new(&event(99, 0), 105));
        assert!(!wallet.is_new(&event(106, 0), 105));
        assert!(wallet.is_new(&event(101, 0), 105));
    }

    #[test]
    fn touches_matches_sender_or_recipient() {
        let mut e = event(1, 0);
        let other = Address::from_low_u64_be(2);
        assert!(e.touches(&Address::from_low_u64_be(1)));
        assert!(!e.touches(&other));
        e.to = Some(other);
        assert!(e.touches(&other));
    }
}

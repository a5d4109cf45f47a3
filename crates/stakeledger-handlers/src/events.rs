//! Domain events and the sinks that receive them.
//!
//! Emission happens after state changes are final. Sinks are
//! fire-and-forget: nothing in the ledger waits on or depends on delivery.

use std::sync::Mutex;

use serde::Serialize;
use stakeledger_core::{Address, BlockHeader, PublicKey, TransactionData, TransactionId};
use tokio::sync::broadcast;

/// Something observable happened to ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Event {
    StakeRegistered {
        transaction: TransactionData,
    },
    StakeReleased {
        address: Address,
        public_key: Option<PublicKey>,
        stake_key: i64,
        block: BlockHeader,
    },
    StakeRedeemed {
        public_key: PublicKey,
        stake_key: i64,
    },
    DelegateRegistered {
        public_key: PublicKey,
        username: String,
    },
    WalletVoted {
        public_key: PublicKey,
        delegate: PublicKey,
    },
    WalletUnvoted {
        public_key: PublicKey,
        delegate: PublicKey,
    },
    HtlcLocked {
        transaction: TransactionId,
        public_key: PublicKey,
    },
}

impl Event {
    /// Dotted event name used by subscribers.
    pub fn name(&self) -> &'static str {
        match self {
            Event::StakeRegistered { .. } => "stake.registered",
            Event::StakeReleased { .. } => "stake.released",
            Event::StakeRedeemed { .. } => "stake.redeemed",
            Event::DelegateRegistered { .. } => "delegate.registered",
            Event::WalletVoted { .. } => "wallet.vote",
            Event::WalletUnvoted { .. } => "wallet.unvote",
            Event::HtlcLocked { .. } => "htlc.locked",
        }
    }
}

/// Receives events. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Fans events out to in-process subscribers over a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest events; emitting with no
/// subscribers is not an error.
pub struct BroadcastSink {
    sender: broadcast::Sender<Event>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: Event) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            tracing::trace!(event = name, "no event subscribers");
        }
    }
}

/// Keeps every event in memory. For tests.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(Event::name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakeledger_core::Keypair;

    fn redeemed() -> Event {
        Event::StakeRedeemed {
            public_key: Keypair::from_seed(&[1; 32]).public_key(),
            stake_key: 5,
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        sink.emit(redeemed());
        assert_eq!(rx.recv().await.unwrap().name(), "stake.redeemed");
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        BroadcastSink::default().emit(redeemed());
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.emit(redeemed());
        assert_eq!(sink.names(), vec!["stake.redeemed"]);
        sink.clear();
        assert!(sink.events().is_empty());
    }
}

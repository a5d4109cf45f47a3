//! Handler lookup by transaction key.

use std::collections::HashMap;
use std::sync::Arc;

use stakeledger_core::{NetworkConfig, TransactionKey};

use crate::error::{HandlerError, Result};
use crate::handler::TransactionHandler;
use crate::handlers::{
    DelegateRegistrationHandler, HtlcLockHandler, StakeCreateHandler, StakeRedeemHandler,
    TransferHandler, VoteHandler,
};

/// Registered handlers, kept in registration order.
///
/// Bootstrap replays types in this order, so a type must be registered
/// after every type whose state it reads.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn TransactionHandler>>,
    index: HashMap<TransactionKey, usize>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in type: transfer, delegate registration, vote, HTLC
    /// lock, stake create, stake redeem.
    pub fn with_defaults(config: Arc<NetworkConfig>) -> Self {
        let mut registry = Self::new();
        let defaults: [Arc<dyn TransactionHandler>; 6] = [
            Arc::new(TransferHandler),
            Arc::new(DelegateRegistrationHandler),
            Arc::new(VoteHandler),
            Arc::new(HtlcLockHandler),
            Arc::new(StakeCreateHandler::new(config)),
            Arc::new(StakeRedeemHandler),
        ];
        for handler in defaults {
            // Keys are distinct by construction.
            let _ = registry.register(handler);
        }
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn TransactionHandler>) -> Result<()> {
        let key = handler.key();
        if self.index.contains_key(&key) {
            return Err(HandlerError::DuplicateHandler(key));
        }
        self.index.insert(key, self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    pub fn get(&self, key: TransactionKey) -> Result<&Arc<dyn TransactionHandler>> {
        self.index
            .get(&key)
            .map(|&i| &self.handlers[i])
            .ok_or(HandlerError::UnknownType(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn TransactionHandler>> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

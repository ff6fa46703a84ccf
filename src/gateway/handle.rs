//! Lazily opened, process-wide store handle
//!
//! The first caller starts initialization (connect, then create the schema).
//! Callers that arrive while it is in flight await the same shared future and
//! see the same outcome. A failed attempt is forgotten so the next caller
//! starts over.

use crate::error::{GatewayError, Result};
use crate::store::{Store, StoreConnector};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

type InitFuture = Shared<BoxFuture<'static, Result<Arc<dyn Store>>>>;

enum Slot {
    Empty { last_error: Option<String> },
    Pending(InitFuture),
    Ready(Arc<dyn Store>),
}

/// Snapshot of the handle's lifecycle for health and dashboard views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandleStatus {
    pub initialized: bool,
    pub initializing: bool,
    pub error: Option<String>,
}

pub struct StoreHandle {
    connector: Arc<dyn StoreConnector>,
    slot: Mutex<Slot>,
}

impl StoreHandle {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            slot: Mutex::new(Slot::Empty { last_error: None }),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.connector.backend()
    }

    /// Return the store, initializing it first if needed.
    pub async fn get(&self) -> Result<Arc<dyn Store>> {
        let init = {
            let mut slot = self.lock_slot();
            match &*slot {
                Slot::Ready(store) => return Ok(Arc::clone(store)),
                Slot::Pending(init) => init.clone(),
                Slot::Empty { .. } => {
                    let init = initialize(Arc::clone(&self.connector)).boxed().shared();
                    *slot = Slot::Pending(init.clone());
                    init
                }
            }
        };

        let outcome = init.clone().await;

        let mut slot = self.lock_slot();
        // Only the attempt we awaited may settle the slot.
        let settles = matches!(&*slot, Slot::Pending(pending) if pending.ptr_eq(&init));
        if settles {
            *slot = match &outcome {
                Ok(store) => Slot::Ready(Arc::clone(store)),
                Err(e) => Slot::Empty {
                    last_error: Some(e.to_string()),
                },
            };
        }

        outcome
    }

    pub fn status(&self) -> HandleStatus {
        match &*self.lock_slot() {
            Slot::Ready(_) => HandleStatus {
                initialized: true,
                initializing: false,
                error: None,
            },
            Slot::Pending(_) => HandleStatus {
                initialized: false,
                initializing: true,
                error: None,
            },
            Slot::Empty { last_error } => HandleStatus {
                initialized: false,
                initializing: false,
                error: last_error.clone(),
            },
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        // The slot is never left half-written, so a poisoned lock is still usable.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn initialize(connector: Arc<dyn StoreConnector>) -> Result<Arc<dyn Store>> {
    info!("Initializing {} store...", connector.backend());

    let store = connector.connect().await.map_err(|e| {
        error!("Failed to open store: {}", e);
        GatewayError::from(e)
    })?;

    for statement in store.dialect().schema_statements() {
        store.query(statement, &[]).await.map_err(|e| {
            error!("Failed to create schema: {}", e);
            GatewayError::Initialization {
                cause: format!("schema creation failed: {}", e),
            }
        })?;
    }

    info!("Database schema initialized");
    Ok(store)
}

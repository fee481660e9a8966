//! Shared producer directory
//!
//! Process-wide registry mapping producer ids to live producers. One
//! instance is built per simulation and handed to every agent as an
//! `Arc<Directory>`, so tests can stand up fully isolated markets.
//!
//! All operations are safe under concurrent registration, removal and
//! listing; a listing is always a point-in-time copy and never observes
//! a partially inserted entry.

use crate::producer::Producer;
use agora_core::{MarketError, ProducerId, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Registry of currently active producers.
#[derive(Default)]
pub struct Directory {
    producers: DashMap<ProducerId, Arc<Producer>>,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            producers: DashMap::new(),
        }
    }

    /// Registers a producer under its id.
    ///
    /// Fails with [`MarketError::DuplicateIdentity`] if the id is taken;
    /// the existing entry is left untouched.
    pub fn register(&self, producer: Arc<Producer>) -> Result<()> {
        match self.producers.entry(producer.id()) {
            Entry::Occupied(_) => Err(MarketError::DuplicateIdentity(producer.id())),
            Entry::Vacant(slot) => {
                log::info!("directory: producer {} registered", producer.id());
                slot.insert(producer);
                Ok(())
            }
        }
    }

    /// Removes a producer by id. No-op if the id is absent.
    pub fn unregister(&self, id: ProducerId) {
        if self.producers.remove(&id).is_some() {
            log::info!("directory: producer {id} unregistered");
        }
    }

    pub fn get(&self, id: ProducerId) -> Option<Arc<Producer>> {
        self.producers.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Point-in-time snapshot of the registered producers, sorted by id.
    pub fn producers(&self) -> Vec<Arc<Producer>> {
        let mut snapshot: Vec<Arc<Producer>> = self
            .producers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        snapshot.sort_by_key(|producer| producer.id());
        snapshot
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

//! In-memory blockchain store, for tests and single-process tooling.

use crate::ports::outbound::BlockchainStore;
use parking_lot::RwLock;
use shared_types::StoreError;
use std::collections::HashMap;

/// `(contract, key) → value` map behind a lock.
#[derive(Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<(String, Vec<u8>), Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, contract: &str, key: impl AsRef<[u8]>, value: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .insert((contract.to_string(), key.as_ref().to_vec()), value.into());
    }

    pub fn delete(&self, contract: &str, key: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        self.objects
            .write()
            .remove(&(contract.to_string(), key.as_ref().to_vec()))
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl BlockchainStore for InMemoryStore {
    fn read_object(&self, contract: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .objects
            .read()
            .get(&(contract.to_string(), key.to_vec()))
            .cloned())
    }
}

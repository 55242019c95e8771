//! In-memory storage implementation for testing

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// In-memory storage implementation for testing and development.
///
/// Clones share the same backing map, so a test can keep a handle and
/// inspect what the ledger persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
    fail_writes: Arc<RwLock<bool>>,
    /// Writes left before a single injected failure
    fail_after: Arc<RwLock<Option<usize>>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    /// Raw value stored under a key
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    /// Make every subsequent write fail, to simulate a full disk
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().unwrap() = fail;
    }

    /// Let `writes` more writes succeed, fail the next one, then recover
    pub fn fail_write_after(&self, writes: usize) {
        *self.fail_after.write().unwrap() = Some(writes);
    }
}

impl LedgerStorage for MemoryStorage {
    fn read_key(&self, key: &str) -> LedgerResult<Option<String>> {
        Ok(self.raw(key))
    }

    fn write_key(&mut self, key: &str, value: &str) -> LedgerResult<()> {
        let injected = {
            let mut fail_after = self.fail_after.write().unwrap();
            match *fail_after {
                Some(0) => {
                    *fail_after = None;
                    true
                }
                Some(n) => {
                    *fail_after = Some(n - 1);
                    false
                }
                None => false,
            }
        };
        if injected || *self.fail_writes.read().unwrap() {
            return Err(LedgerError::Storage(format!(
                "Write to '{}' rejected",
                key
            )));
        }
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerSnapshot;
    use bigdecimal::BigDecimal;

    #[test]
    fn test_empty_storage_loads_empty_snapshot() {
        let storage = MemoryStorage::new();
        let snapshot = storage.load().unwrap();
        assert!(snapshot.records.is_empty());
        assert!(snapshot.creditors.is_empty());
        assert!(snapshot.customers.is_empty());
    }

    #[test]
    fn test_save_writes_all_keys() {
        let mut storage = MemoryStorage::new();
        let snapshot = LedgerSnapshot {
            customers: vec![Customer::new(
                "Ali".to_string(),
                BigDecimal::from(10),
                String::new(),
            )],
            ..Default::default()
        };

        storage.save(&snapshot).unwrap();

        assert_eq!(storage.raw(RECORDS_KEY).as_deref(), Some("[]"));
        assert_eq!(storage.raw(CREDITORS_KEY).as_deref(), Some("[]"));
        assert_eq!(storage.load().unwrap(), snapshot);
    }

    #[test]
    fn test_injected_failure_hits_one_write() {
        let mut storage = MemoryStorage::new();
        storage.fail_write_after(1);

        assert!(storage.write_key("a", "1").is_ok());
        assert!(storage.write_key("b", "2").is_err());
        assert!(storage.write_key("c", "3").is_ok());
        assert_eq!(storage.raw("b"), None);
    }
}

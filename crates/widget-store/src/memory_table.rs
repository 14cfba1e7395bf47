//! In-memory wide-column table.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::StoreError;
use crate::traits::{Item, TABLE_KEY_ATTRIBUTE, WideColumnTable};

/// In-memory table backed by a `RwLock<HashMap>`.
pub struct MemoryTable {
    name: String,
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryTable {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.read().expect("lock poisoned").len()
    }

    /// Whether the table holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl WideColumnTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        let key = item
            .get(TABLE_KEY_ATTRIBUTE)
            .cloned()
            .ok_or(StoreError::MissingKey {
                attribute: TABLE_KEY_ATTRIBUTE,
            })?;

        let mut map = self.items.write().expect("lock poisoned");
        debug!(table = %self.name, %key, "storing item in memory");
        map.insert(key, item);
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError> {
        let map = self.items.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    async fn delete_item(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.items.write().expect("lock poisoned");
        map.remove(key);
        debug!(table = %self.name, key, "deleted item from memory");
        Ok(())
    }
}

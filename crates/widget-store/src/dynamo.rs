//! DynamoDB table adapter.

use std::collections::HashMap;

use aws_config::SdkConfig;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{Item, TABLE_KEY_ATTRIBUTE, WideColumnTable};

/// A [`WideColumnTable`] backed by a DynamoDB table whose hash key is
/// [`TABLE_KEY_ATTRIBUTE`]. Every attribute is stored as a string.
pub struct DynamoTable {
    client: Client,
    table: String,
}

impl DynamoTable {
    /// Build a client for the named table.
    pub fn new(config: &SdkConfig, table: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            table: table.into(),
        }
    }
}

fn key_value(key: &str) -> AttributeValue {
    AttributeValue::S(key.to_string())
}

#[async_trait::async_trait]
impl WideColumnTable for DynamoTable {
    fn name(&self) -> &str {
        &self.table
    }

    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        if !item.contains_key(TABLE_KEY_ATTRIBUTE) {
            return Err(StoreError::MissingKey {
                attribute: TABLE_KEY_ATTRIBUTE,
            });
        }

        let attributes: HashMap<String, AttributeValue> = item
            .into_iter()
            .map(|(name, value)| (name, AttributeValue::S(value)))
            .collect();

        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(attributes))
            .send()
            .await
            .map_err(|e| StoreError::backend("dynamodb", DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError> {
        let out = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(TABLE_KEY_ATTRIBUTE, key_value(key))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StoreError::backend("dynamodb", DisplayErrorContext(e)))?;

        let Some(attributes) = out.item() else {
            return Ok(None);
        };

        let mut item = Item::new();
        for (name, value) in attributes {
            match value.as_s() {
                Ok(s) => {
                    item.insert(name.clone(), s.clone());
                }
                Err(_) => debug!(table = %self.table, key, attribute = %name, "skipping non-string attribute"),
            }
        }
        Ok(Some(item))
    }

    async fn delete_item(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(TABLE_KEY_ATTRIBUTE, key_value(key))
            .send()
            .await
            .map_err(|e| StoreError::backend("dynamodb", DisplayErrorContext(e)))?;
        Ok(())
    }
}

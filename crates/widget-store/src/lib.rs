//! Backend traits and implementations for the widget consumer.
//!
//! The consumer talks to three kinds of external service, each behind a
//! trait so the engine never depends on a concrete client:
//!
//! - [`ObjectBucket`]: list/get/put/delete over a flat key space.
//! - [`MessageQueue`]: batched receive, delete by receipt handle, send.
//! - [`WideColumnTable`]: put/get/delete of flat string items by key.
//!
//! Each trait has an in-memory backend ([`MemoryBucket`], [`MemoryQueue`],
//! [`MemoryTable`]) and an AWS-backed one ([`S3Bucket`], [`SqsQueue`],
//! [`DynamoTable`]).

mod dynamo;
mod error;
mod memory_queue;
mod memory_store;
mod memory_table;
mod s3;
mod sqs;
mod traits;

pub use dynamo::DynamoTable;
pub use error::StoreError;
pub use memory_queue::MemoryQueue;
pub use memory_store::MemoryBucket;
pub use memory_table::MemoryTable;
pub use s3::S3Bucket;
pub use sqs::SqsQueue;
pub use traits::{
    Item, MessageQueue, ObjectBucket, QueueMessage, ReceiveOptions, TABLE_KEY_ATTRIBUTE,
    WideColumnTable,
};

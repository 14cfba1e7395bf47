//! Consumption engine for widget mutation requests.
//!
//! The [`Consumer`] pulls one [`PendingRequest`] at a time from a
//! [`RequestSource`], parses it, and applies it to a [`WidgetSink`]:
//!
//! - [`RequestSource`]: listing-backed ([`BucketSource`]) or queue-backed
//!   ([`QueueSource`]) retrieval. A returned request has already been
//!   removed from its backend.
//! - [`WidgetSink`]: document-store ([`DocumentSink`]) or wide-column
//!   ([`TableSink`]) persistence with upsert/delete semantics.
//! - [`Consumer`]: the Draining/Idle loop that stops after two consecutive
//!   empty polls separated by the idle wait.

pub mod consumer;
pub mod error;
pub mod sink;
pub mod source;

pub use consumer::{Consumer, ConsumerConfig, ConsumerStats, LoopState, Outcome, StopReason};
pub use error::EngineError;
pub use sink::{DocumentSink, TableSink, WidgetSink};
pub use source::{AckToken, BucketSource, PendingRequest, QueueSource, RequestSource};

#[cfg(test)]
mod tests;

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */
#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

//! Relay of provider-owned S3 objects announced through an Amazon SQS queue.
//!
//! A data provider publishes one SQS message per batch of newly available objects in a bucket
//! it owns. This crate drains that queue and copies every referenced object into a bucket owned
//! by the operator, under a time-partitioned key (`<prefix>YYYY/MM/DD/HH/<path>`).
//!
//! A message is deleted from the queue only after every object it references was copied. Any
//! failure stops the drain and leaves the message to be redelivered once its visibility timeout
//! expires; copies overwrite the destination key, so redelivery is safe.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> Result<(), aws_s3_queue_forwarder::error::Error> {
//! use aws_s3_queue_forwarder::{Forwarder, QueueDrainer, SqsQueue};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = aws_s3_queue_forwarder::from_env().load()?;
//! let sdk_config = aws_config::from_env().load().await;
//!
//! let queue = SqsQueue::connect(&sdk_config, config.queue_url(), config.source_credentials())?;
//! let forwarder = Forwarder::from_sdk_config(&config, &sdk_config);
//!
//! let output = QueueDrainer::new(queue)
//!     .drain(&forwarder, &CancellationToken::new())
//!     .await?;
//! println!("forwarded {} notifications", output.messages_handled());
//! # Ok(())
//! # }
//! ```

/// Error types emitted by `aws-s3-queue-forwarder`
pub mod error;

/// Common types used by `aws-s3-queue-forwarder`
pub mod types;

/// Forwarder configuration
pub mod config;

/// Queue message payloads
pub mod notification;

/// Destination key derivation
pub mod partition;

/// Queue access
pub mod queue;

/// The receive, handle, acknowledge loop
pub mod drain;

/// S3 client construction per credential scope
pub mod client;

/// Streaming object copy between buckets
pub mod relay;

/// Per-notification handler
pub mod forwarder;

/// Counters
pub mod metrics;

pub use self::config::Config;
pub use self::drain::{DrainOutput, MessageHandler, QueueDrainer};
pub use self::forwarder::Forwarder;
pub use self::queue::SqsQueue;
pub use self::relay::ObjectRelay;
use self::config::loader::ConfigLoader;

/// Create a config loader reading the process environment
pub fn from_env() -> ConfigLoader {
    ConfigLoader::default()
}

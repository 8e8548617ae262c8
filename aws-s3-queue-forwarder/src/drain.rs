/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error;
use crate::notification::Notification;
use crate::queue::{MessageQueue, ReceivedMessage};

/// Processes one decoded notification.
///
/// Returning `Ok` acknowledges the notification: the drain deletes its message right after.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a notification
    async fn handle(&self, notification: &Notification) -> Result<(), error::Error>;
}

/// Summary of a drain that ran until the queue was empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct DrainOutput {
    messages_handled: u64,
}

impl DrainOutput {
    /// Number of messages handled and deleted
    pub fn messages_handled(&self) -> u64 {
        self.messages_handled
    }
}

/// Receives messages one at a time until the queue is empty.
///
/// Each message is decoded, handled and then deleted. The first failure stops the drain and
/// leaves the failing message on the queue, hidden until its visibility timeout expires.
#[derive(Debug, Clone)]
pub struct QueueDrainer<Q> {
    queue: Q,
}

impl<Q: MessageQueue> QueueDrainer<Q> {
    /// Create a drainer for `queue`
    pub fn new(queue: Q) -> Self {
        Self { queue }
    }

    /// The queue being drained
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Drain the queue through `handler`.
    ///
    /// Returns once a receive reports an empty queue. Cancellation is observed before every
    /// receive and while the handler runs; a message whose handling was cancelled is not
    /// deleted.
    pub async fn drain<H>(
        &self,
        handler: &H,
        cancel: &CancellationToken,
    ) -> Result<DrainOutput, error::Error>
    where
        H: MessageHandler + ?Sized,
    {
        let span = tracing::info_span!("drain", queue_url = self.queue.url());
        self.drain_inner(handler, cancel).instrument(span).await
    }

    async fn drain_inner<H>(
        &self,
        handler: &H,
        cancel: &CancellationToken,
    ) -> Result<DrainOutput, error::Error>
    where
        H: MessageHandler + ?Sized,
    {
        let mut output = DrainOutput::default();
        loop {
            if cancel.is_cancelled() {
                tracing::warn!("drain cancelled after {} messages", output.messages_handled);
                return Err(error::operation_cancelled());
            }

            let Some(message) = self.queue.receive().await? else {
                tracing::info!("queue is empty, handled {} messages", output.messages_handled);
                return Ok(output);
            };

            let span = tracing::info_span!(
                "message",
                message_id = message.message_id(),
                cid = tracing::field::Empty
            );
            self.process(&message, handler, cancel)
                .instrument(span)
                .await?;
            output.messages_handled += 1;
        }
    }

    async fn process<H>(
        &self,
        message: &ReceivedMessage,
        handler: &H,
        cancel: &CancellationToken,
    ) -> Result<(), error::Error>
    where
        H: MessageHandler + ?Sized,
    {
        let notification = Notification::from_body(message.body()).inspect_err(|err| {
            tracing::error!("undecodable message body, leaving it on the queue: {err}");
        })?;
        tracing::Span::current().record("cid", notification.cid.as_str());
        tracing::debug!(
            files = notification.files.len(),
            declared_file_count = notification.file_count,
            declared_total_size = notification.total_size,
            "decoded notification"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("cancelled while handling message, it will be redelivered");
                return Err(error::operation_cancelled());
            }
            result = handler.handle(&notification) => result?,
        }

        self.queue.delete(message).await?;
        tracing::info!("message handled and deleted");
        Ok(())
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use async_trait::async_trait;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_types::SdkConfig;
use tracing::Instrument;

use crate::client::static_credentials;
use crate::error;
use crate::types::Credentials;

/// Visibility timeout requested for every received message, in seconds (10 hours).
///
/// A received message stays hidden from other consumers for this long, which must cover the
/// slowest copy of a full notification.
pub const VISIBILITY_TIMEOUT_SECS: i32 = 36_000;

/// Messages are polled one at a time.
const MAX_MESSAGES_PER_RECEIVE: i32 = 1;

/// No long polling: an empty queue answers immediately and ends the drain.
const WAIT_TIME_SECS: i32 = 0;

/// One message received from the queue and not yet deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    message_id: Option<String>,
    receipt_handle: String,
    body: String,
}

impl ReceivedMessage {
    /// Create a new received message
    pub fn new(
        message_id: Option<String>,
        receipt_handle: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id,
            receipt_handle: receipt_handle.into(),
            body: body.into(),
        }
    }

    /// Queue-assigned message id, if reported
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Handle needed to delete this receipt of the message
    pub fn receipt_handle(&self) -> &str {
        &self.receipt_handle
    }

    /// Raw message body
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// The queue operations a drain needs.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Receive at most one message. `None` means the queue is currently empty.
    async fn receive(&self) -> Result<Option<ReceivedMessage>, error::Error>;

    /// Delete a message by its receipt handle.
    async fn delete(&self, message: &ReceivedMessage) -> Result<(), error::Error>;

    /// Address of the queue, for diagnostics
    fn url(&self) -> &str;
}

/// [`MessageQueue`] backed by Amazon SQS.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    url: String,
}

impl SqsQueue {
    /// Open a queue by URL.
    ///
    /// The region is resolved from the URL. Explicit credentials replace the credential chain of
    /// `sdk_config` for every queue request; ambient credentials keep it.
    pub fn connect(
        sdk_config: &SdkConfig,
        queue_url: &str,
        credentials: &Credentials,
    ) -> Result<SqsQueue, error::Error> {
        let region = region_from_queue_url(queue_url)?;
        let mut builder =
            aws_sdk_sqs::config::Builder::from(sdk_config).region(Region::new(region.to_owned()));
        match static_credentials(credentials, "queue") {
            Some(creds) => builder = builder.credentials_provider(creds),
            None => {
                tracing::warn!("queue access key and secret are not set, using role permissions")
            }
        }

        Ok(SqsQueue::from_client(
            aws_sdk_sqs::Client::from_conf(builder.build()),
            queue_url,
        ))
    }

    /// Use an existing SQS client
    pub fn from_client(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> SqsQueue {
        SqsQueue {
            client,
            url: queue_url.into(),
        }
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self) -> Result<Option<ReceivedMessage>, error::Error> {
        let resp = self
            .client
            .receive_message()
            .queue_url(&self.url)
            .max_number_of_messages(MAX_MESSAGES_PER_RECEIVE)
            .visibility_timeout(VISIBILITY_TIMEOUT_SECS)
            .wait_time_seconds(WAIT_TIME_SECS)
            .message_system_attribute_names(MessageSystemAttributeName::SentTimestamp)
            .send()
            .instrument(tracing::debug_span!("send-receive-message"))
            .await
            .map_err(error::queue_protocol)?;

        let Some(msg) = resp.messages.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };

        let sent_timestamp = msg
            .attributes()
            .and_then(|attrs| attrs.get(&MessageSystemAttributeName::SentTimestamp));
        tracing::info!(
            message_id = msg.message_id(),
            sent_timestamp = sent_timestamp.map(String::as_str),
            "received message"
        );

        let receipt_handle = msg
            .receipt_handle
            .ok_or_else(|| error::queue_protocol("received message has no receipt handle"))?;
        let body = msg
            .body
            .ok_or_else(|| error::queue_protocol("received message has no body"))?;
        Ok(Some(ReceivedMessage::new(
            msg.message_id,
            receipt_handle,
            body,
        )))
    }

    async fn delete(&self, message: &ReceivedMessage) -> Result<(), error::Error> {
        self.client
            .delete_message()
            .queue_url(&self.url)
            .receipt_handle(message.receipt_handle())
            .send()
            .instrument(tracing::debug_span!("send-delete-message"))
            .await
            .map_err(error::queue_protocol)?;
        Ok(())
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Resolve the region of an SQS queue from its URL.
///
/// Two addressing schemes are recognized:
///
/// * `https://sqs.<region>.amazonaws.com/<account>/<queue>`
/// * `https://<region>.queue.amazonaws.com/<account>/<queue>` (legacy)
pub fn region_from_queue_url(url: &str) -> Result<&str, error::Error> {
    let unsupported = || error::configuration(format!("unsupported SQS URL syntax: `{url}`"));

    let rest = url.strip_prefix("https://").ok_or_else(unsupported)?;
    let host = rest.split('/').next().unwrap_or_default();
    let region = host
        .strip_prefix("sqs.")
        .and_then(|h| h.strip_suffix(".amazonaws.com"))
        .or_else(|| host.strip_suffix(".queue.amazonaws.com"))
        .ok_or_else(unsupported)?;

    let valid = !region.is_empty()
        && region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid {
        return Err(unsupported());
    }
    Ok(region)
}

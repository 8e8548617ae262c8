/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_s3_queue_forwarder::client::ClientProvider;
use aws_s3_queue_forwarder::drain::MessageHandler;
use aws_s3_queue_forwarder::error::{Error, ErrorKind};
use aws_s3_queue_forwarder::notification::{FileEntry, Notification};
use aws_s3_queue_forwarder::queue::{MessageQueue, ReceivedMessage};
use aws_s3_queue_forwarder::types::ObjectLocator;
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::operation::put_object::PutObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_mocks::{mock, mock_client, Rule, RuleMode};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::http::StatusCode;
use aws_smithy_types::body::SdkBody;
use bytes::Bytes;

pub const QUEUE_URL: &str = "https://sqs.ap-northeast-1.amazonaws.com/210987654321/test-queue";

/// Build a notification for `files` (path, size) in `bucket`
pub fn notification(
    cid: &str,
    timestamp: u64,
    bucket: &str,
    files: &[(&str, u64)],
) -> Notification {
    let files: Vec<FileEntry> = files
        .iter()
        .map(|(path, size)| FileEntry {
            path: path.to_string(),
            size: *size,
            checksum: "d0f566f37295e46f28c75f71ddce9422".to_owned(),
        })
        .collect();
    Notification {
        cid: cid.to_owned(),
        timestamp,
        file_count: files.len() as u64,
        total_size: files.iter().map(|f| f.size).sum(),
        bucket: bucket.to_owned(),
        path_prefix: "data/".to_owned(),
        files,
    }
}

/// Queue message body for a notification
pub fn notification_body(notification: &Notification) -> String {
    serde_json::to_string(notification).unwrap()
}

/// Something that happened to a [`FakeQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A receive returning the message with this receipt handle, or `None` when empty
    Receive(Option<String>),
    /// A delete of this receipt handle
    Delete(String),
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<ReceivedMessage>,
    events: Vec<QueueEvent>,
    next_id: usize,
    fail_deletes: bool,
}

/// In-memory queue recording every receive and delete.
///
/// Received messages are not returned to the queue; a message that was never deleted is what a
/// real queue would redeliver after its visibility timeout.
#[derive(Debug, Clone, Default)]
pub struct FakeQueue {
    state: Arc<Mutex<QueueState>>,
}

impl FakeQueue {
    /// A queue holding one message per body, receipt handles `rh-0`, `rh-1`, ...
    pub fn with_bodies<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = FakeQueue::default();
        for body in bodies {
            queue.push(body);
        }
        queue
    }

    /// Append a message
    pub fn push(&self, body: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        let n = state.next_id;
        state.next_id += 1;
        state.pending.push_back(ReceivedMessage::new(
            Some(format!("m-{n}")),
            format!("rh-{n}"),
            body,
        ));
    }

    /// Make every delete fail
    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().fail_deletes = true;
    }

    /// Everything that happened so far, in order
    pub fn events(&self) -> Vec<QueueEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Receipt handles deleted so far
    pub fn deleted(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                QueueEvent::Delete(handle) => Some(handle),
                _ => None,
            })
            .collect()
    }

    /// Number of receive calls so far
    pub fn receive_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, QueueEvent::Receive(_)))
            .count()
    }

    /// Messages never received
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }
}

#[async_trait]
impl MessageQueue for FakeQueue {
    async fn receive(&self) -> Result<Option<ReceivedMessage>, Error> {
        let mut state = self.state.lock().unwrap();
        let message = state.pending.pop_front();
        let handle = message.as_ref().map(|m| m.receipt_handle().to_owned());
        state.events.push(QueueEvent::Receive(handle));
        Ok(message)
    }

    async fn delete(&self, message: &ReceivedMessage) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            return Err(Error::new(ErrorKind::QueueProtocol, "delete rejected"));
        }
        state
            .events
            .push(QueueEvent::Delete(message.receipt_handle().to_owned()));
        Ok(())
    }

    fn url(&self) -> &str {
        QUEUE_URL
    }
}

/// Handler returning scripted outcomes, one per call, then succeeding.
#[derive(Debug, Default)]
pub struct ScriptedHandler {
    outcomes: Mutex<VecDeque<Option<ErrorKind>>>,
    handled: Mutex<Vec<String>>,
}

impl ScriptedHandler {
    /// A handler failing with `kind` on the given calls (zero based)
    pub fn failing_on(call: usize, kind: ErrorKind) -> Self {
        let mut outcomes: VecDeque<_> = std::iter::repeat(None).take(call).collect();
        outcomes.push_back(Some(kind));
        Self {
            outcomes: Mutex::new(outcomes),
            handled: Mutex::default(),
        }
    }

    /// Customer ids of every notification passed to the handler
    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for ScriptedHandler {
    async fn handle(&self, notification: &Notification) -> Result<(), Error> {
        self.handled.lock().unwrap().push(notification.cid.clone());
        match self.outcomes.lock().unwrap().pop_front().flatten() {
            Some(kind) => Err(Error::new(kind, "scripted failure")),
            None => Ok(()),
        }
    }
}

type ObjectId = (String, String);

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<ObjectId, Bytes>,
    failing_reads: HashSet<ObjectId>,
    failing_writes: HashSet<ObjectId>,
    requested: Vec<ObjectLocator>,
}

/// In-memory S3 shared by every client it hands out.
///
/// Reads are served with a single `GetObject`, writes are stored from a single `PutObject`.
///
/// NOTE: Multipart uploads are not supported, objects must stay below the multipart threshold.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

fn id(bucket: &str, key: &str) -> ObjectId {
    (bucket.to_owned(), key.to_owned())
}

/// S3 error document answered with `status`
fn error_response(status: u16, code: &str) -> HttpResponse {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <Error>
            <Code>{code}</Code>
            <Message>{code}</Message>
            <RequestId>4442587FB7D0A2F9</RequestId>
        </Error>"#
    );
    HttpResponse::new(StatusCode::try_from(status).unwrap(), SdkBody::from(body))
}

impl MemoryStore {
    /// Store an object
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(id(bucket, key), data.into());
    }

    /// Contents of an object, if present
    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state.lock().unwrap().objects.get(&id(bucket, key)).cloned()
    }

    /// Keys present in `bucket`
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Make reads of an object fail with `AccessDenied`
    pub fn fail_reads_of(&self, bucket: &str, key: &str) {
        self.state.lock().unwrap().failing_reads.insert(id(bucket, key));
    }

    /// Make writes to an object fail with `AccessDenied`
    pub fn fail_writes_to(&self, bucket: &str, key: &str) {
        self.state.lock().unwrap().failing_writes.insert(id(bucket, key));
    }

    /// Every locator a client was requested for, in order
    pub fn requested(&self) -> Vec<ObjectLocator> {
        self.state.lock().unwrap().requested.clone()
    }

    fn get_object_rule(&self, locator: &ObjectLocator) -> Rule {
        let object = id(locator.bucket(), locator.key());
        let state = self.state.lock().unwrap();
        if state.failing_reads.contains(&object) {
            return mock!(aws_sdk_s3::Client::get_object)
                .then_http_response(|| error_response(403, "AccessDenied"));
        }
        match state.objects.get(&object).cloned() {
            Some(data) => mock!(aws_sdk_s3::Client::get_object).then_output(move || {
                GetObjectOutput::builder()
                    .content_length(data.len() as i64)
                    .body(ByteStream::from(data.clone()))
                    .build()
            }),
            None => mock!(aws_sdk_s3::Client::get_object)
                .then_http_response(|| error_response(404, "NoSuchKey")),
        }
    }

    fn put_object_rule(&self, locator: &ObjectLocator) -> Rule {
        let object = id(locator.bucket(), locator.key());
        if self.state.lock().unwrap().failing_writes.contains(&object) {
            return mock!(aws_sdk_s3::Client::put_object)
                .then_http_response(|| error_response(403, "AccessDenied"));
        }
        let state = self.state.clone();
        mock!(aws_sdk_s3::Client::put_object)
            .match_requests(move |r| {
                let data = Bytes::copy_from_slice(r.body.bytes().unwrap_or_default());
                let object = id(r.bucket().unwrap_or_default(), r.key().unwrap_or_default());
                state.lock().unwrap().objects.insert(object, data);
                true
            })
            .then_output(|| PutObjectOutput::builder().e_tag("memory-etag").build())
    }
}

impl ClientProvider for MemoryStore {
    fn s3_client(&self, locator: &ObjectLocator) -> aws_sdk_s3::Client {
        self.state.lock().unwrap().requested.push(locator.clone());
        let get = self.get_object_rule(locator);
        let put = self.put_object_rule(locator);
        mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&get, &put])
    }
}

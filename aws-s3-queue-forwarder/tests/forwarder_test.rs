/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use aws_s3_queue_forwarder::error::ErrorKind;
use aws_s3_queue_forwarder::types::Credentials;
use aws_s3_queue_forwarder::{Config, Forwarder, MessageHandler, QueueDrainer};
use test_common::{notification, notification_body, FakeQueue, MemoryStore, QUEUE_URL};
use tokio_util::sync::CancellationToken;

const TS: u64 = 1492726639137;
const SOURCE: &str = "provider-bucket";
const DESTINATION: &str = "my-bucket";

fn config(offset: Option<&str>) -> Config {
    let mut builder = Config::builder()
        .destination_bucket(DESTINATION)
        .destination_prefix("out/")
        .destination_region("ap-northeast-1")
        .queue_url(QUEUE_URL)
        .source_credentials(Credentials::explicit("AKIDSOURCE", "source-secret"));
    if let Some(offset) = offset {
        let offset: aws_s3_queue_forwarder::partition::PartitionOffset = offset.parse().unwrap();
        builder = builder.partition_offset(offset.0);
    }
    builder.build().unwrap()
}

fn store_with(paths: &[&str]) -> MemoryStore {
    let store = MemoryStore::default();
    for path in paths {
        store.insert(SOURCE, path, format!("contents of {path}"));
    }
    store
}

#[tokio::test]
async fn test_forwards_every_file() {
    let store = store_with(&["data/test_data.gz", "data/test_data2.gz"]);
    let forwarder = Forwarder::new(&config(None), Arc::new(store.clone()));
    let n = notification(
        "c-0",
        TS,
        SOURCE,
        &[("data/test_data.gz", 10), ("data/test_data2.gz", 10)],
    );

    forwarder.handle(&n).await.unwrap();

    assert_eq!(
        vec![
            "out/2017/04/20/22/data/test_data.gz",
            "out/2017/04/20/22/data/test_data2.gz"
        ],
        store.keys(DESTINATION)
    );
    assert_eq!(
        "contents of data/test_data.gz".as_bytes(),
        &store
            .get(DESTINATION, "out/2017/04/20/22/data/test_data.gz")
            .unwrap()[..]
    );
    assert_eq!(2, forwarder.metrics().files_copied());
    assert_eq!(1, forwarder.metrics().notifications_handled());
}

#[tokio::test]
async fn test_partition_offset() {
    let store = store_with(&["data/test_data.gz"]);
    let forwarder = Forwarder::new(&config(Some("+05:00")), Arc::new(store.clone()));
    let n = notification("c-0", TS, SOURCE, &[("data/test_data.gz", 10)]);

    forwarder.handle(&n).await.unwrap();

    assert_eq!(
        vec!["out/2017/04/21/03/data/test_data.gz"],
        store.keys(DESTINATION)
    );
}

#[tokio::test]
async fn test_stops_at_first_failing_file() {
    let store = store_with(&["data/a.gz", "data/c.gz"]);
    // data/b.gz was never uploaded by the provider
    let forwarder = Forwarder::new(&config(None), Arc::new(store.clone()));
    let n = notification(
        "c-0",
        TS,
        SOURCE,
        &[("data/a.gz", 1), ("data/b.gz", 1), ("data/c.gz", 1)],
    );

    let err = forwarder.handle(&n).await.unwrap_err();

    assert_eq!(&ErrorKind::SourceAccess, err.kind());
    assert_eq!(
        vec!["out/2017/04/20/22/data/a.gz"],
        store.keys(DESTINATION)
    );
    assert!(store.requested().iter().all(|l| l.key() != "data/c.gz"));
    assert_eq!(1, forwarder.metrics().notifications_failed());
}

#[tokio::test]
async fn test_destination_failure() {
    let store = store_with(&["data/a.gz"]);
    store.fail_writes_to(DESTINATION, "out/2017/04/20/22/data/a.gz");
    let forwarder = Forwarder::new(&config(None), Arc::new(store.clone()));
    let n = notification("c-0", TS, SOURCE, &[("data/a.gz", 1)]);

    let err = forwarder.handle(&n).await.unwrap_err();
    assert_eq!(&ErrorKind::DestinationAccess, err.kind());
    assert!(store.keys(DESTINATION).is_empty());
}

#[tokio::test]
async fn test_credential_isolation() {
    let store = store_with(&["data/a.gz"]);
    let forwarder = Forwarder::new(&config(None), Arc::new(store.clone()));
    let n = notification("c-0", TS, SOURCE, &[("data/a.gz", 1)]);

    forwarder.handle(&n).await.unwrap();

    let requested = store.requested();
    assert_eq!(2, requested.len());
    for locator in requested {
        if locator.bucket() == SOURCE {
            assert_eq!(
                &Credentials::explicit("AKIDSOURCE", "source-secret"),
                locator.credentials()
            );
            assert_eq!("us-west-1", locator.region());
        } else {
            assert_eq!(DESTINATION, locator.bucket());
            assert_eq!(&Credentials::Ambient, locator.credentials());
            assert_eq!("ap-northeast-1", locator.region());
        }
    }
}

#[tokio::test]
async fn test_drain_redelivery_is_idempotent() {
    let store = store_with(&["data/a.gz", "data/b.gz"]);
    store.fail_reads_of(SOURCE, "data/b.gz");
    let n = notification("c-0", TS, SOURCE, &[("data/a.gz", 1), ("data/b.gz", 1)]);
    let queue = FakeQueue::with_bodies([notification_body(&n)]);
    let drainer = QueueDrainer::new(queue.clone());

    let forwarder = Forwarder::new(&config(None), Arc::new(store.clone()));
    let err = drainer
        .drain(&forwarder, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(&ErrorKind::SourceAccess, err.kind());
    assert!(queue.deleted().is_empty());
    let first_copy = store.get(DESTINATION, "out/2017/04/20/22/data/a.gz").unwrap();

    // the provider fixes access and the message is redelivered
    let store = store_with(&[]);
    store.insert(SOURCE, "data/a.gz", "contents of data/a.gz");
    store.insert(SOURCE, "data/b.gz", "contents of data/b.gz");
    store.insert(DESTINATION, "out/2017/04/20/22/data/a.gz", first_copy.clone());
    queue.push(notification_body(&n));

    let forwarder = Forwarder::new(&config(None), Arc::new(store.clone()));
    let output = drainer
        .drain(&forwarder, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(1, output.messages_handled());
    assert_eq!(1, queue.deleted().len());
    assert_eq!(
        first_copy,
        store.get(DESTINATION, "out/2017/04/20/22/data/a.gz").unwrap()
    );
    assert_eq!(2, store.keys(DESTINATION).len());
    assert_eq!(2, forwarder.metrics().files_copied());
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use async_trait::async_trait;
use aws_types::SdkConfig;

use crate::client::{ClientProvider, SdkClientProvider};
use crate::config::Config;
use crate::drain::MessageHandler;
use crate::error;
use crate::metrics::{ByteUnit, ForwarderMetrics};
use crate::notification::{FileEntry, Notification};
use crate::partition::KeyPartitioner;
use crate::relay::ObjectRelay;
use crate::types::{Credentials, ObjectLocator};

/// Copies every file of a notification into the destination bucket.
///
/// Files are copied one after another in the order they are listed. The first failed copy ends
/// the notification; files after it are not attempted and all of them are copied again when the
/// message is redelivered.
#[derive(Debug, Clone)]
pub struct Forwarder {
    destination_region: String,
    destination_bucket: String,
    destination_prefix: String,
    source_region: String,
    source_credentials: Credentials,
    partitioner: KeyPartitioner,
    relay: ObjectRelay,
    metrics: ForwarderMetrics,
}

impl Forwarder {
    /// Create a forwarder reaching S3 through `clients`
    pub fn new(config: &Config, clients: Arc<dyn ClientProvider>) -> Self {
        let relay = ObjectRelay::new(clients).with_part_sizes(
            config.multipart_threshold().clone(),
            config.part_size().clone(),
        );
        Self {
            destination_region: config.destination_region().to_owned(),
            destination_bucket: config.destination_bucket().to_owned(),
            destination_prefix: config.destination_prefix().to_owned(),
            source_region: config.source_region().to_owned(),
            source_credentials: config.source_credentials().clone(),
            partitioner: config.partitioner(),
            relay,
            metrics: ForwarderMetrics::new(),
        }
    }

    /// Create a forwarder whose S3 clients derive from a loaded AWS configuration
    pub fn from_sdk_config(config: &Config, sdk_config: &SdkConfig) -> Self {
        Self::new(config, Arc::new(SdkClientProvider::new(sdk_config)))
    }

    /// Counters accumulated by this forwarder
    pub fn metrics(&self) -> &ForwarderMetrics {
        &self.metrics
    }

    /// The source and destination of one file.
    ///
    /// The source is read with the provider's credentials, the destination is always written
    /// with the ambient credentials.
    pub fn locators(
        &self,
        notification: &Notification,
        file: &FileEntry,
    ) -> Result<(ObjectLocator, ObjectLocator), error::Error> {
        let source = ObjectLocator::new(
            &self.source_region,
            &notification.bucket,
            &file.path,
            self.source_credentials.clone(),
        );
        let key = self.partitioner.destination_key(
            &self.destination_prefix,
            notification.timestamp,
            &file.path,
        )?;
        let destination = ObjectLocator::new(
            &self.destination_region,
            &self.destination_bucket,
            key,
            Credentials::Ambient,
        );
        Ok((source, destination))
    }

    async fn forward_file(
        &self,
        notification: &Notification,
        file: &FileEntry,
    ) -> Result<(), error::Error> {
        let (source, destination) = self.locators(notification, file)?;
        tracing::debug!(declared_size = file.size, "copying {source} to {destination}");
        let output = self.relay.copy(&source, &destination).await?;
        self.metrics.record_copy(output.bytes_copied());
        Ok(())
    }

    /// Log the counters accumulated so far
    pub fn log_metrics(&self) {
        tracing::info!(
            notifications_handled = self.metrics.notifications_handled(),
            notifications_failed = self.metrics.notifications_failed(),
            files_copied = self.metrics.files_copied(),
            bytes_copied = self.metrics.bytes_copied(),
            "forwarded {}",
            ByteUnit::display(self.metrics.bytes_copied())
        );
    }
}

#[async_trait]
impl MessageHandler for Forwarder {
    async fn handle(&self, notification: &Notification) -> Result<(), error::Error> {
        for (i, file) in notification.files.iter().enumerate() {
            if let Err(err) = self.forward_file(notification, file).await {
                tracing::error!(
                    "copy of {} ({} of {}) failed: {err}",
                    file.path,
                    i + 1,
                    notification.files.len()
                );
                self.metrics.record_notification(false);
                return Err(err);
            }
        }
        self.metrics.record_notification(true);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    #[derive(Debug)]
    struct UnusedClients;

    impl ClientProvider for UnusedClients {
        fn s3_client(&self, _locator: &ObjectLocator) -> aws_sdk_s3::Client {
            unreachable!("no requests expected")
        }
    }

    fn config(credentials: Credentials) -> Config {
        Config::builder()
            .destination_bucket("my-bucket")
            .destination_prefix("out/")
            .destination_region("ap-northeast-1")
            .queue_url("https://sqs.ap-northeast-1.amazonaws.com/210987654321/test-queue")
            .source_credentials(credentials)
            .build()
            .unwrap()
    }

    fn notification(timestamp: u64) -> Notification {
        Notification {
            cid: "abcdefghijklmn0123456789".to_owned(),
            timestamp,
            file_count: 1,
            total_size: 10,
            bucket: "provider-bucket".to_owned(),
            path_prefix: "data/".to_owned(),
            files: vec![FileEntry {
                path: "data/test_data.gz".to_owned(),
                size: 10,
                checksum: "d0f566f37295e46f28c75f71ddce9422".to_owned(),
            }],
        }
    }

    #[test]
    fn test_locators() {
        let forwarder = Forwarder::new(
            &config(Credentials::explicit("AKIDSOURCE", "source-secret")),
            Arc::new(UnusedClients),
        );
        let n = notification(1492726639137);
        let (src, dst) = forwarder.locators(&n, &n.files[0]).unwrap();

        assert_eq!("us-west-1", src.region());
        assert_eq!("provider-bucket", src.bucket());
        assert_eq!("data/test_data.gz", src.key());
        assert_eq!(
            &Credentials::explicit("AKIDSOURCE", "source-secret"),
            src.credentials()
        );

        assert_eq!("ap-northeast-1", dst.region());
        assert_eq!("my-bucket", dst.bucket());
        assert_eq!("out/2017/04/20/22/data/test_data.gz", dst.key());
    }

    #[test]
    fn test_destination_never_carries_source_credentials() {
        let forwarder = Forwarder::new(
            &config(Credentials::explicit("AKIDSOURCE", "source-secret")),
            Arc::new(UnusedClients),
        );
        let n = notification(1492726639137);
        let (_, dst) = forwarder.locators(&n, &n.files[0]).unwrap();
        assert!(dst.credentials().is_ambient());
        assert!(!format!("{dst:?}").contains("AKIDSOURCE"));
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_fails_before_any_request() {
        let forwarder = Forwarder::new(&config(Credentials::Ambient), Arc::new(UnusedClients));
        let err = forwarder.handle(&notification(u64::MAX)).await.unwrap_err();
        assert_eq!(&ErrorKind::Decode, err.kind());
        assert_eq!(1, forwarder.metrics().notifications_failed());
    }

    #[tokio::test]
    async fn test_empty_file_list_succeeds() {
        let forwarder = Forwarder::new(&config(Credentials::Ambient), Arc::new(UnusedClients));
        let mut n = notification(1492726639137);
        n.files.clear();
        forwarder.handle(&n).await.unwrap();
        assert_eq!(1, forwarder.metrics().notifications_handled());
        assert_eq!(0, forwarder.metrics().files_copied());
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::cmp;

use chrono::{FixedOffset, Offset, Utc};

use crate::error;
use crate::metrics::ByteUnit;
use crate::partition::KeyPartitioner;
use crate::types::{Credentials, PartSize};

/// Loads a [`Config`] from the environment and an optional parameter file
pub mod loader;

/// Minimum upload part size in bytes
const MIN_MULTIPART_PART_SIZE_BYTES: u64 = 5 * ByteUnit::Mebibyte.as_bytes_u64();

/// Region of the provider's bucket when none is configured
pub const DEFAULT_SOURCE_REGION: &str = "us-west-1";

/// Configuration for one drain
#[derive(Debug, Clone)]
pub struct Config {
    destination_bucket: String,
    destination_prefix: String,
    destination_region: String,
    queue_url: String,
    source_region: String,
    source_credentials: Credentials,
    partition_offset: FixedOffset,
    multipart_threshold: PartSize,
    target_part_size: PartSize,
}

impl Config {
    /// Create a new `Config` builder
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Bucket the objects are copied into
    pub fn destination_bucket(&self) -> &str {
        &self.destination_bucket
    }

    /// Key prefix prepended to every destination key, possibly empty
    pub fn destination_prefix(&self) -> &str {
        &self.destination_prefix
    }

    /// Region of the destination bucket
    pub fn destination_region(&self) -> &str {
        &self.destination_region
    }

    /// URL of the notification queue
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Region of the provider's bucket
    pub fn source_region(&self) -> &str {
        &self.source_region
    }

    /// Credentials for the provider's bucket and the notification queue
    pub fn source_credentials(&self) -> &Credentials {
        &self.source_credentials
    }

    /// UTC offset the destination hour buckets are rendered at
    pub fn partition_offset(&self) -> FixedOffset {
        self.partition_offset
    }

    /// Key partitioner for this configuration
    pub fn partitioner(&self) -> KeyPartitioner {
        KeyPartitioner::with_offset(self.partition_offset)
    }

    /// Returns a reference to the multipart upload threshold part size
    pub fn multipart_threshold(&self) -> &PartSize {
        &self.multipart_threshold
    }

    /// Returns a reference to the target part size to use for multipart uploads
    pub fn part_size(&self) -> &PartSize {
        &self.target_part_size
    }
}

/// Fluent style builder for [Config]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    destination_bucket: Option<String>,
    destination_prefix: Option<String>,
    destination_region: Option<String>,
    queue_url: Option<String>,
    source_region: Option<String>,
    source_credentials: Option<Credentials>,
    partition_offset: Option<FixedOffset>,
    multipart_threshold_part_size: PartSize,
    target_part_size: PartSize,
}

impl Builder {
    /// Bucket the objects are copied into. Required.
    pub fn destination_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.destination_bucket = Some(bucket.into());
        self
    }

    /// Key prefix for destination keys. Defaults to empty.
    pub fn destination_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.destination_prefix = Some(prefix.into());
        self
    }

    /// Region of the destination bucket. Required.
    pub fn destination_region(mut self, region: impl Into<String>) -> Self {
        self.destination_region = Some(region.into());
        self
    }

    /// URL of the notification queue. Required.
    pub fn queue_url(mut self, url: impl Into<String>) -> Self {
        self.queue_url = Some(url.into());
        self
    }

    /// Region of the provider's bucket. Defaults to [`DEFAULT_SOURCE_REGION`].
    pub fn source_region(mut self, region: impl Into<String>) -> Self {
        self.source_region = Some(region.into());
        self
    }

    /// Credentials for the provider's bucket and the queue. Defaults to [`Credentials::Ambient`].
    pub fn source_credentials(mut self, credentials: Credentials) -> Self {
        self.source_credentials = Some(credentials);
        self
    }

    /// UTC offset of the destination hour buckets. Defaults to UTC.
    pub fn partition_offset(mut self, offset: FixedOffset) -> Self {
        self.partition_offset = Some(offset);
        self
    }

    /// Minimum object size that should trigger a multipart upload.
    ///
    /// The minimum part size is 5 MiB, any part size less than that will be rounded up.
    /// Default is [PartSize::Auto]
    pub fn multipart_threshold(self, threshold: PartSize) -> Self {
        self.set_multipart_threshold(clamp_part_size(threshold))
    }

    /// The target size of each part when using a multipart upload.
    ///
    /// The minimum part size is 5 MiB. The actual part size used may be larger when an object
    /// would otherwise need more than 10,000 parts.
    ///
    /// Default is [PartSize::Auto]
    pub fn part_size(self, part_size: PartSize) -> Self {
        self.set_target_part_size(clamp_part_size(part_size))
    }

    /// Minimum object size that should trigger a multipart upload.
    ///
    /// NOTE: This does not validate the setting and is meant for internal use only.
    pub(crate) fn set_multipart_threshold(mut self, threshold: PartSize) -> Self {
        self.multipart_threshold_part_size = threshold;
        self
    }

    /// Target part size for a multipart upload.
    ///
    /// NOTE: This does not validate the setting and is meant for internal use only.
    pub(crate) fn set_target_part_size(mut self, part_size: PartSize) -> Self {
        self.target_part_size = part_size;
        self
    }

    /// Consumes the builder and constructs a [`Config`].
    ///
    /// Fails with a [`Configuration`](crate::error::ErrorKind::Configuration) error when a
    /// required setting is missing or empty.
    pub fn build(self) -> Result<Config, error::Error> {
        Ok(Config {
            destination_bucket: required(self.destination_bucket, "destination bucket")?,
            destination_prefix: self.destination_prefix.unwrap_or_default(),
            destination_region: required(self.destination_region, "destination region")?,
            queue_url: required(self.queue_url, "queue URL")?,
            source_region: self
                .source_region
                .unwrap_or_else(|| DEFAULT_SOURCE_REGION.to_owned()),
            source_credentials: self.source_credentials.unwrap_or(Credentials::Ambient),
            partition_offset: self.partition_offset.unwrap_or_else(|| Utc.fix()),
            multipart_threshold: self.multipart_threshold_part_size,
            target_part_size: self.target_part_size,
        })
    }
}

/// Raise explicit sizes to the smallest part S3 accepts
pub(crate) fn clamp_part_size(size: PartSize) -> PartSize {
    match size {
        PartSize::Target(part_size) => {
            PartSize::Target(cmp::max(part_size, MIN_MULTIPART_PART_SIZE_BYTES))
        }
        auto => auto,
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, error::Error> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(error::configuration(format!("{name} is not set"))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    fn minimal() -> Builder {
        Config::builder()
            .destination_bucket("my-bucket")
            .destination_region("ap-northeast-1")
            .queue_url("https://sqs.ap-northeast-1.amazonaws.com/210987654321/test-queue")
    }

    #[test]
    fn test_defaults() {
        let config = minimal().build().unwrap();
        assert_eq!("", config.destination_prefix());
        assert_eq!("us-west-1", config.source_region());
        assert!(config.source_credentials().is_ambient());
        assert_eq!(0, config.partition_offset().local_minus_utc());
        assert_eq!(&PartSize::Auto, config.multipart_threshold());
        assert_eq!(&PartSize::Auto, config.part_size());
    }

    #[test]
    fn test_missing_required_setting() {
        let err = Config::builder()
            .destination_bucket("my-bucket")
            .queue_url("https://sqs.ap-northeast-1.amazonaws.com/1/q")
            .build()
            .unwrap_err();
        assert_eq!(&ErrorKind::Configuration, err.kind());

        let err = minimal().destination_bucket("").build().unwrap_err();
        assert_eq!(&ErrorKind::Configuration, err.kind());
    }

    #[test]
    fn test_part_sizes_rounded_up_to_minimum() {
        let config = minimal()
            .multipart_threshold(PartSize::Target(1024))
            .part_size(PartSize::Target(64 * ByteUnit::Mebibyte.as_bytes_u64()))
            .build()
            .unwrap();
        assert_eq!(
            &PartSize::Target(MIN_MULTIPART_PART_SIZE_BYTES),
            config.multipart_threshold()
        );
        assert_eq!(
            &PartSize::Target(64 * ByteUnit::Mebibyte.as_bytes_u64()),
            config.part_size()
        );
    }
}

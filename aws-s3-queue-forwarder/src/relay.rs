/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

mod part_reader;

use std::cmp;
use std::sync::Arc;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::error::display::DisplayErrorContext;
use bytes::Bytes;
use tracing::Instrument;

use crate::client::ClientProvider;
use crate::config;
use crate::error;
use crate::metrics::ByteUnit;
use crate::types::{ObjectLocator, PartSize};
use part_reader::PartReader;

/// Maximum number of parts that a single S3 multipart upload supports
const MAX_PARTS: u64 = 10_000;

/// Result of a successful [`ObjectRelay::copy`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyOutput {
    bytes_copied: u64,
    e_tag: Option<String>,
    upload_id: Option<String>,
}

impl CopyOutput {
    /// Number of bytes written to the destination
    pub fn bytes_copied(&self) -> u64 {
        self.bytes_copied
    }

    /// Entity tag of the destination object
    pub fn e_tag(&self) -> Option<&str> {
        self.e_tag.as_deref()
    }

    /// Multipart upload id, when the object was written in parts
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }
}

/// Streams objects from one bucket to another, each side with its own identity.
///
/// The destination object is replaced atomically: bodies below the multipart threshold are sent
/// with a single `PutObject`, larger ones through a multipart upload that only becomes visible
/// on completion and is aborted on failure. Copying the same source to the same destination
/// again overwrites the previous result.
#[derive(Debug, Clone)]
pub struct ObjectRelay {
    clients: Arc<dyn ClientProvider>,
    multipart_threshold: PartSize,
    part_size: PartSize,
}

impl ObjectRelay {
    /// Create a relay with default part sizes
    pub fn new(clients: Arc<dyn ClientProvider>) -> Self {
        Self {
            clients,
            multipart_threshold: PartSize::Auto,
            part_size: PartSize::Auto,
        }
    }

    /// Set the upload sizes.
    ///
    /// Explicit sizes below the 5 MiB minimum part size of S3 are raised to it.
    pub fn with_part_sizes(self, multipart_threshold: PartSize, part_size: PartSize) -> Self {
        self.set_part_sizes(
            config::clamp_part_size(multipart_threshold),
            config::clamp_part_size(part_size),
        )
    }

    /// Set the upload sizes without enforcing the S3 minimum
    pub(crate) fn set_part_sizes(
        mut self,
        multipart_threshold: PartSize,
        part_size: PartSize,
    ) -> Self {
        self.multipart_threshold = multipart_threshold;
        self.part_size = part_size;
        self
    }

    /// Get the concrete minimum upload size in bytes to use to determine whether multipart uploads
    /// are used for a given object.
    pub(crate) fn mpu_threshold_bytes(&self) -> u64 {
        match self.multipart_threshold {
            PartSize::Auto => 16 * ByteUnit::Mebibyte.as_bytes_u64(),
            PartSize::Target(explicit) => explicit,
        }
    }

    /// Get the concrete target part size to use for uploads
    pub(crate) fn upload_part_size_bytes(&self) -> u64 {
        match self.part_size {
            PartSize::Auto => 8 * ByteUnit::Mebibyte.as_bytes_u64(),
            PartSize::Target(explicit) => explicit,
        }
    }

    /// Copy `source` to `destination`.
    ///
    /// Read failures are reported as [`SourceAccess`](crate::error::ErrorKind::SourceAccess)
    /// errors, write failures as [`DestinationAccess`](crate::error::ErrorKind::DestinationAccess).
    pub async fn copy(
        &self,
        source: &ObjectLocator,
        destination: &ObjectLocator,
    ) -> Result<CopyOutput, error::Error> {
        let span = tracing::info_span!(
            "copy",
            src_bucket = source.bucket(),
            src_key = source.key(),
            dst_bucket = destination.bucket(),
            dst_key = destination.key(),
        );
        self.do_copy(source, destination).instrument(span).await
    }

    async fn do_copy(
        &self,
        source: &ObjectLocator,
        destination: &ObjectLocator,
    ) -> Result<CopyOutput, error::Error> {
        if self.upload_part_size_bytes() == 0 {
            return Err(error::configuration("upload part size must be greater than zero"));
        }

        let src_client = self.clients.s3_client(source);
        let resp = src_client
            .get_object()
            .bucket(source.bucket())
            .key(source.key())
            .send()
            .instrument(tracing::debug_span!("send-get-object"))
            .await
            .map_err(error::source_access)?;

        let content_length = resp.content_length().and_then(|len| u64::try_from(len).ok());
        let mut reader = PartReader::new(resp.body);

        let dst_client = self.clients.s3_client(destination);
        let threshold = self.mpu_threshold_bytes();
        reader.fill(to_usize(threshold)?).await?;

        let output = if reader.is_exhausted() && (reader.buffered() as u64) < threshold {
            tracing::trace!(
                "object size ({}) less than multipart threshold ({threshold}); sending as single PutObject request",
                reader.buffered()
            );
            put_object(&dst_client, destination, reader.take_buffered()).await?
        } else {
            // keep under the part count limit when the size is known up front
            let part_size = cmp::max(
                self.upload_part_size_bytes(),
                content_length.unwrap_or_default().div_ceil(MAX_PARTS),
            );
            tracing::trace!("copying using multipart upload with part size: {part_size} bytes");
            multipart_upload(&dst_client, destination, &mut reader, to_usize(part_size)?).await?
        };

        tracing::info!(
            bytes_read = reader.bytes_read(),
            "copied {} bytes ({})",
            output.bytes_copied,
            ByteUnit::display(output.bytes_copied)
        );
        Ok(output)
    }
}

fn to_usize(size: u64) -> Result<usize, error::Error> {
    usize::try_from(size)
        .map_err(|_| error::configuration(format!("part size {size} does not fit in memory")))
}

async fn put_object(
    client: &aws_sdk_s3::Client,
    destination: &ObjectLocator,
    data: Bytes,
) -> Result<CopyOutput, error::Error> {
    let bytes_copied = data.len() as u64;
    let resp = client
        .put_object()
        .bucket(destination.bucket())
        .key(destination.key())
        .content_length(bytes_copied as i64)
        .body(ByteStream::from(data))
        .send()
        .instrument(tracing::debug_span!("send-put-object"))
        .await
        .map_err(error::destination_access)?;

    Ok(CopyOutput {
        bytes_copied,
        e_tag: resp.e_tag,
        upload_id: None,
    })
}

/// Write the rest of `reader` through a multipart upload, aborting it on any failure.
async fn multipart_upload(
    client: &aws_sdk_s3::Client,
    destination: &ObjectLocator,
    reader: &mut PartReader,
    part_size: usize,
) -> Result<CopyOutput, error::Error> {
    let mpu = client
        .create_multipart_upload()
        .bucket(destination.bucket())
        .key(destination.key())
        .send()
        .instrument(tracing::debug_span!("send-create-multipart-upload"))
        .await
        .map_err(error::destination_access)?;
    let upload_id = mpu.upload_id.ok_or_else(|| {
        error::destination_access("CreateMultipartUpload response did not include an upload id")
    })?;
    tracing::trace!("multipart upload started with upload id: {upload_id}");

    match upload_parts(client, destination, &upload_id, reader, part_size).await {
        Ok(output) => Ok(output),
        Err(err) => {
            tracing::error!("multipart upload failed, aborting");
            if let Err(abort_err) = abort_multipart_upload(client, destination, &upload_id).await {
                tracing::error!("failed to abort upload: {}", DisplayErrorContext(abort_err));
            }
            Err(err)
        }
    }
}

async fn upload_parts(
    client: &aws_sdk_s3::Client,
    destination: &ObjectLocator,
    upload_id: &str,
    reader: &mut PartReader,
    part_size: usize,
) -> Result<CopyOutput, error::Error> {
    let mut completed = Vec::new();
    let mut bytes_copied = 0;
    let mut part_number = 1;

    loop {
        let data = match reader.next_part(part_size).await? {
            Some(data) => data,
            // an upload needs at least one part, even for an empty object
            None if completed.is_empty() => Bytes::new(),
            None => break,
        };
        let len = data.len() as u64;
        let resp = client
            .upload_part()
            .bucket(destination.bucket())
            .key(destination.key())
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(len as i64)
            .body(ByteStream::from(data))
            .send()
            .instrument(tracing::debug_span!("send-upload-part", part_number))
            .await
            .map_err(error::destination_access)?;

        completed.push(
            CompletedPart::builder()
                .part_number(part_number)
                .set_e_tag(resp.e_tag)
                .build(),
        );
        bytes_copied += len;
        part_number += 1;

        if len == 0 {
            break;
        }
    }

    tracing::trace!("completing multipart upload");
    let resp = client
        .complete_multipart_upload()
        .bucket(destination.bucket())
        .key(destination.key())
        .upload_id(upload_id)
        .multipart_upload(
            CompletedMultipartUpload::builder()
                .set_parts(Some(completed))
                .build(),
        )
        .send()
        .instrument(tracing::debug_span!("send-complete-multipart-upload"))
        .await
        .map_err(error::destination_access)?;

    Ok(CopyOutput {
        bytes_copied,
        e_tag: resp.e_tag,
        upload_id: Some(upload_id.to_owned()),
    })
}

async fn abort_multipart_upload(
    client: &aws_sdk_s3::Client,
    destination: &ObjectLocator,
    upload_id: &str,
) -> Result<(), error::Error> {
    client
        .abort_multipart_upload()
        .bucket(destination.bucket())
        .key(destination.key())
        .upload_id(upload_id)
        .send()
        .instrument(tracing::debug_span!("send-abort-multipart-upload"))
        .await
        .map_err(error::destination_access)?;
    Ok(())
}

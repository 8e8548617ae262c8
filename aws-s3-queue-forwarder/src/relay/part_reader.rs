/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::cmp;

use aws_sdk_s3::primitives::ByteStream;
use bytes::{Bytes, BytesMut};

use crate::error;

/// Cuts a source object body into parts while it is being read.
///
/// The buffer only grows to the largest target it is filled to, plus the tail of the last chunk
/// received. A copy fills it to the multipart threshold first, so a copy holds at most
/// `max(threshold, part size)` bytes and one chunk.
#[derive(Debug)]
pub(crate) struct PartReader {
    body: ByteStream,
    buf: BytesMut,
    exhausted: bool,
    bytes_read: u64,
}

impl PartReader {
    pub(crate) fn new(body: ByteStream) -> Self {
        Self {
            body,
            buf: BytesMut::new(),
            exhausted: false,
            bytes_read: 0,
        }
    }

    /// Read until at least `target` bytes are buffered or the body ends.
    pub(crate) async fn fill(&mut self, target: usize) -> Result<(), error::Error> {
        while !self.exhausted && self.buf.len() < target {
            match self.body.next().await {
                Some(chunk) => {
                    let chunk = chunk.map_err(error::source_access)?;
                    self.bytes_read += chunk.len() as u64;
                    self.buf.extend_from_slice(&chunk);
                }
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    /// The next part of at most `part_size` bytes, `None` once the body is consumed.
    pub(crate) async fn next_part(
        &mut self,
        part_size: usize,
    ) -> Result<Option<Bytes>, error::Error> {
        self.fill(part_size).await?;
        if self.buf.is_empty() {
            return Ok(None);
        }
        let len = cmp::min(part_size, self.buf.len());
        Ok(Some(self.buf.split_to(len).freeze()))
    }

    /// Take everything currently buffered.
    pub(crate) fn take_buffered(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub(crate) fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Total bytes pulled from the body so far.
    pub(crate) fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::error::{self, BoxError};

/// strftime pattern of the hour bucket, including the trailing separator
const HOUR_BUCKET_FORMAT: &str = "%Y/%m/%d/%H/";

/// Derive the destination key for a file announced at `timestamp_ms`, bucketed by UTC hour.
///
/// ```
/// use aws_s3_queue_forwarder::partition::derive_destination_key;
///
/// let key = derive_destination_key("out/", 1492726639137, "data/test_data.gz").unwrap();
/// assert_eq!("out/2017/04/20/22/data/test_data.gz", key);
/// ```
pub fn derive_destination_key(
    prefix: &str,
    timestamp_ms: u64,
    path: &str,
) -> Result<String, error::Error> {
    KeyPartitioner::default().destination_key(prefix, timestamp_ms, path)
}

/// Renders `<prefix><YYYY/MM/DD/HH/><path>` destination keys.
///
/// The hour bucket is computed from the notification timestamp truncated to whole seconds and
/// rendered at a fixed UTC offset (UTC unless configured otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPartitioner {
    offset: FixedOffset,
}

impl Default for KeyPartitioner {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }
}

impl KeyPartitioner {
    /// Partition hours at the given UTC offset
    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// The `YYYY/MM/DD/HH/` bucket for a millisecond timestamp
    pub fn hour_bucket(&self, timestamp_ms: u64) -> Result<String, error::Error> {
        let secs = i64::try_from(timestamp_ms / 1000).map_err(error::decode)?;
        let instant = DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
            error::decode(format!(
                "timestamp {timestamp_ms} is outside the supported calendar range"
            ))
        })?;
        Ok(instant
            .with_timezone(&self.offset)
            .format(HOUR_BUCKET_FORMAT)
            .to_string())
    }

    /// The full destination key
    pub fn destination_key(
        &self,
        prefix: &str,
        timestamp_ms: u64,
        path: &str,
    ) -> Result<String, error::Error> {
        let bucket = self.hour_bucket(timestamp_ms)?;
        Ok([prefix, bucket.as_str(), path].concat())
    }
}

/// A UTC offset written as `Z`, `UTC`, `+HH:MM` or `-HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionOffset(pub FixedOffset);

impl FromStr for PartitionOffset {
    type Err = BoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
            return Ok(PartitionOffset(Utc.fix()));
        }

        let (sign, rest) = match s.as_bytes()[0] {
            b'+' => (1, &s[1..]),
            b'-' => (-1, &s[1..]),
            _ => return Err(format!("offset `{s}` must start with `+` or `-`").into()),
        };
        let (hours, minutes) = rest
            .split_once(':')
            .ok_or_else(|| format!("offset `{s}` must be formatted as +HH:MM"))?;
        let hours: i32 = hours.parse()?;
        let minutes: i32 = minutes.parse()?;
        if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
            return Err(format!("offset `{s}` is out of range").into());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(PartitionOffset)
            .ok_or_else(|| format!("offset `{s}` is out of range").into())
    }
}

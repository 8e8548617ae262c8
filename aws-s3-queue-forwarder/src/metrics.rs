/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// A monotonically increasing numeric value.
#[derive(Debug, Clone, Default)]
pub struct IncreasingCounter {
    value: Arc<AtomicU64>,
}

impl IncreasingCounter {
    /// Increment the counter by the given amount and return the new value.
    pub fn increment(&self, amount: u64) -> u64 {
        self.value.fetch_add(amount, Ordering::Relaxed) + amount
    }

    /// Get the current value of the counter.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Binary byte units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteUnit {
    /// 1 byte
    Byte,
    /// 2<sup>10</sup> bytes.
    Kibibyte,
    /// 2<sup>20</sup> bytes.
    Mebibyte,
    /// 2<sup>30</sup> bytes.
    Gibibyte,
}

impl ByteUnit {
    /// The number of bytes represented by this unit
    pub const fn as_bytes_u64(&self) -> u64 {
        match self {
            ByteUnit::Byte => 1,
            ByteUnit::Kibibyte => 1 << 10,
            ByteUnit::Mebibyte => 1 << 20,
            ByteUnit::Gibibyte => 1 << 30,
        }
    }

    /// Pick the largest unit the byte count reaches, for display
    pub fn display(total_bytes: u64) -> ByteCountDisplayContext {
        let unit = [ByteUnit::Gibibyte, ByteUnit::Mebibyte, ByteUnit::Kibibyte]
            .into_iter()
            .find(|u| total_bytes >= u.as_bytes_u64())
            .unwrap_or(ByteUnit::Byte);
        ByteCountDisplayContext {
            total_bytes,
            unit,
        }
    }

    const fn as_str(&self) -> &'static str {
        match self {
            ByteUnit::Byte => "B",
            ByteUnit::Kibibyte => "KiB",
            ByteUnit::Mebibyte => "MiB",
            ByteUnit::Gibibyte => "GiB",
        }
    }
}

/// Formats a byte count in a chosen [`ByteUnit`]
#[derive(Debug, Clone, Copy)]
pub struct ByteCountDisplayContext {
    total_bytes: u64,
    unit: ByteUnit,
}

impl fmt::Display for ByteCountDisplayContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.total_bytes as f64 / self.unit.as_bytes_u64() as f64;
        write!(f, "{:.2}{}", value, self.unit.as_str())
    }
}

/// Counters kept by a [`Forwarder`](crate::Forwarder) across one drain.
#[derive(Debug, Clone, Default)]
pub struct ForwarderMetrics {
    notifications_handled: IncreasingCounter,
    notifications_failed: IncreasingCounter,
    files_copied: IncreasingCounter,
    bytes_copied: IncreasingCounter,
}

impl ForwarderMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_copy(&self, bytes: u64) {
        self.files_copied.increment(1);
        self.bytes_copied.increment(bytes);
    }

    pub(crate) fn record_notification(&self, success: bool) {
        if success {
            self.notifications_handled.increment(1);
        } else {
            self.notifications_failed.increment(1);
        }
    }

    /// Notifications whose files were all copied
    pub fn notifications_handled(&self) -> u64 {
        self.notifications_handled.value()
    }

    /// Notifications that stopped at a failed copy
    pub fn notifications_failed(&self) -> u64 {
        self.notifications_failed.value()
    }

    /// Objects copied successfully
    pub fn files_copied(&self) -> u64 {
        self.files_copied.value()
    }

    /// Bytes written to the destination bucket
    pub fn bytes_copied(&self) -> u64 {
        self.bytes_copied.value()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_byte_unit_display() {
        assert_eq!("512.00B", ByteUnit::display(512).to_string());
        assert_eq!("1.50KiB", ByteUnit::display(1536).to_string());
        assert_eq!(
            "8.00MiB",
            ByteUnit::display(8 * ByteUnit::Mebibyte.as_bytes_u64()).to_string()
        );
    }

    #[test]
    fn test_forwarder_metrics() {
        let metrics = ForwarderMetrics::new();
        metrics.record_copy(10);
        metrics.record_copy(5);
        metrics.record_notification(true);
        metrics.record_notification(false);
        assert_eq!(2, metrics.files_copied());
        assert_eq!(15, metrics.bytes_copied());
        assert_eq!(1, metrics.notifications_handled());
        assert_eq!(1, metrics.notifications_failed());
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::{Deserialize, Serialize};

use crate::error;

/// A batch of newly available objects announced by the data provider.
///
/// The declared counts, sizes and checksums are informational: they are logged but never
/// compared against the bytes that get copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Provider customer id
    pub cid: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Declared number of files
    pub file_count: u64,
    /// Declared total size in bytes
    pub total_size: u64,
    /// Source bucket holding every file in this batch
    pub bucket: String,
    /// Common key prefix of the batch
    pub path_prefix: String,
    /// Files to copy, in order
    pub files: Vec<FileEntry>,
}

/// One object referenced by a [`Notification`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Object key in the source bucket
    pub path: String,
    /// Declared size in bytes
    pub size: u64,
    /// Declared checksum
    pub checksum: String,
}

impl Notification {
    /// Decode a queue message body.
    pub fn from_body(body: &str) -> Result<Notification, error::Error> {
        serde_json::from_str(body).map_err(error::decode)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    const SAMPLE: &str = r#"{
        "cid": "abcdefghijklmn0123456789",
        "timestamp": 1492726639137,
        "fileCount": 4,
        "totalSize": 349986220,
        "bucket": "provider-bucket",
        "pathPrefix": "data/",
        "files": [
            {"path": "data/test_data.gz", "size": 89118480, "checksum": "d0f566f37295e46f28c75f71ddce9422"},
            {"path": "data/test_data2.gz", "size": 1024, "checksum": "0f566f37295e46f28c75f71ddce9422d"}
        ]
    }"#;

    #[test]
    fn test_decode_notification() {
        let n = Notification::from_body(SAMPLE).unwrap();
        assert_eq!("abcdefghijklmn0123456789", n.cid);
        assert_eq!(1492726639137, n.timestamp);
        assert_eq!(4, n.file_count);
        assert_eq!(349986220, n.total_size);
        assert_eq!("provider-bucket", n.bucket);
        assert_eq!(
            vec!["data/test_data.gz", "data/test_data2.gz"],
            n.files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_declared_counts_are_not_validated() {
        // fileCount says 4, only two entries are present
        let n = Notification::from_body(SAMPLE).unwrap();
        assert_ne!(n.file_count as usize, n.files.len());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let body = r#"{"cid":"c","timestamp":1,"fileCount":0,"totalSize":0,"bucket":"b",
            "pathPrefix":"","files":[],"extra":true}"#;
        assert!(Notification::from_body(body).unwrap().files.is_empty());
    }

    #[test]
    fn test_malformed_body() {
        let err = Notification::from_body("{not json").unwrap_err();
        assert_eq!(&ErrorKind::Decode, err.kind());
    }

    #[test]
    fn test_missing_required_field() {
        let body = r#"{"cid":"c","timestamp":1,"fileCount":0,"totalSize":0,"pathPrefix":"","files":[]}"#;
        let err = Notification::from_body(body).unwrap_err();
        assert_eq!(&ErrorKind::Decode, err.kind());
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let body = r#"{"cid":"c","timestamp":-5,"fileCount":0,"totalSize":0,"bucket":"b",
            "pathPrefix":"","files":[]}"#;
        assert!(Notification::from_body(body).is_err());
    }
}

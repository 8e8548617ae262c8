/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// The target part size for an upload or the threshold at which uploads switch to multipart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PartSize {
    /// Use the default size for the setting.
    #[default]
    Auto,

    /// Size explicitly given, in bytes.
    ///
    /// NOTE: This is a suggestion and will be used if possible but may be adjusted for an individual request
    /// as required by the underlying API.
    Target(u64),
}

/// The identity used to sign requests against one bucket or queue.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A static access key pair, e.g. one issued by the data provider.
    Explicit {
        /// AWS access key id
        access_key_id: String,
        /// AWS secret access key
        secret_access_key: String,
    },

    /// The execution environment's own credential chain (role, profile, environment).
    Ambient,
}

impl Credentials {
    /// Create explicit credentials from a key pair
    pub fn explicit(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Credentials::Explicit {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Returns true if these are the ambient credentials of the execution environment
    pub fn is_ambient(&self) -> bool {
        matches!(self, Credentials::Ambient)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Explicit { access_key_id, .. } => f
                .debug_struct("Explicit")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"** redacted **")
                .finish(),
            Credentials::Ambient => f.write_str("Ambient"),
        }
    }
}

/// Identifies one object for reading or writing, together with the identity used to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocator {
    region: String,
    bucket: String,
    key: String,
    credentials: Credentials,
}

impl ObjectLocator {
    /// Create a new locator
    pub fn new(
        region: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            region: region.into(),
            bucket: bucket.into(),
            key: key.into(),
            credentials,
        }
    }

    /// The region the bucket lives in
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The object key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The credentials used for requests against this object
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{} ({})", self.bucket, self.key, self.region)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::explicit("AKIDEXAMPLE", "wJalrXUtnFEMI");
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKIDEXAMPLE"));
        assert!(!debug.contains("wJalrXUtnFEMI"));
        assert_eq!("Ambient", format!("{:?}", Credentials::Ambient));
    }

    #[test]
    fn test_locator_display() {
        let locator = ObjectLocator::new("us-west-1", "bucket", "a/b.gz", Credentials::Ambient);
        assert_eq!("s3://bucket/a/b.gz (us-west-1)", locator.to_string());
    }
}

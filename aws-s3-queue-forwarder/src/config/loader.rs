/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{Builder, Config};
use crate::error;
use crate::partition::PartitionOffset;
use crate::types::{Credentials, PartSize};

/// Environment variable naming the JSON parameter file
pub const CONFIG_FILE_ENV_VAR: &str = "FORWARDER_CONFIG";

/// A named configuration value.
///
/// Each setting is looked up under its environment variable name first, then under its key in
/// the parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Setting {
    /// Destination bucket
    DestinationBucket,
    /// Destination key prefix
    DestinationPrefix,
    /// Destination bucket region
    DestinationRegion,
    /// Notification queue URL
    QueueUrl,
    /// Provider access key id
    SourceAccessKey,
    /// Provider secret access key
    SourceSecretKey,
    /// Provider bucket region
    SourceRegion,
    /// UTC offset of the destination hour buckets
    PartitionOffset,
}

impl Setting {
    /// Environment variable holding this setting
    pub const fn env_var(&self) -> &'static str {
        match self {
            Setting::DestinationBucket => "S3_BUCKET",
            Setting::DestinationPrefix => "S3_PREFIX",
            Setting::DestinationRegion => "S3_REGION",
            Setting::QueueUrl => "SQS_URL",
            Setting::SourceAccessKey => "SOURCE_AWS_KEY",
            Setting::SourceSecretKey => "SOURCE_AWS_SECRET",
            Setting::SourceRegion => "SOURCE_REGION",
            Setting::PartitionOffset => "PARTITION_UTC_OFFSET",
        }
    }

    /// Key of this setting in the parameter file
    pub const fn file_key(&self) -> &'static str {
        match self {
            Setting::DestinationBucket => "S3Bucket",
            Setting::DestinationPrefix => "S3Prefix",
            Setting::DestinationRegion => "S3Region",
            Setting::QueueUrl => "SqsURL",
            Setting::SourceAccessKey => "SourceAwsKey",
            Setting::SourceSecretKey => "SourceAwsSecret",
            Setting::SourceRegion => "SourceRegion",
            Setting::PartitionOffset => "PartitionUtcOffset",
        }
    }
}

#[derive(Debug, Clone, Default)]
enum Environment {
    #[default]
    Process,
    Fixed(HashMap<String, String>),
}

impl Environment {
    fn get(&self, name: &str) -> Option<String> {
        match self {
            Environment::Process => std::env::var(name).ok(),
            Environment::Fixed(vars) => vars.get(name).cloned(),
        }
    }
}

/// Load a [`Config`] from the environment and an optional JSON parameter file.
///
/// Values are resolved in order: explicit overrides, environment variables, then the parameter
/// file named by `FORWARDER_CONFIG` (a JSON object of string values). Empty values count as
/// unset.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    env: Environment,
    config_file: Option<PathBuf>,
    overrides: HashMap<Setting, String>,
    multipart_threshold: PartSize,
    part_size: PartSize,
}

impl ConfigLoader {
    /// Read variables from the given pairs instead of the process environment
    pub fn environment<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Environment::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Read this parameter file instead of the one named by `FORWARDER_CONFIG`
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Set a value that takes precedence over the environment and the parameter file
    pub fn set(mut self, setting: Setting, value: impl Into<String>) -> Self {
        self.overrides.insert(setting, value.into());
        self
    }

    /// Minimum object size that triggers a multipart upload, see [`Builder::multipart_threshold`]
    pub fn multipart_threshold(mut self, threshold: PartSize) -> Self {
        self.multipart_threshold = threshold;
        self
    }

    /// Multipart upload part size, see [`Builder::part_size`]
    pub fn part_size(mut self, part_size: PartSize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Resolve every setting and build the [`Config`].
    pub fn load(self) -> Result<Config, error::Error> {
        let file_path = self
            .config_file
            .clone()
            .or_else(|| non_empty(self.env.get(CONFIG_FILE_ENV_VAR)).map(PathBuf::from));
        let file = match file_path {
            Some(path) => read_parameter_file(&path)?,
            None => HashMap::new(),
        };
        let get = |setting: Setting| -> Option<String> {
            non_empty(self.overrides.get(&setting).cloned())
                .or_else(|| non_empty(self.env.get(setting.env_var())))
                .or_else(|| non_empty(file.get(setting.file_key()).cloned()))
        };

        let key_pair = (get(Setting::SourceAccessKey), get(Setting::SourceSecretKey));
        let source_credentials = match key_pair {
            (Some(key), Some(secret)) => Credentials::explicit(key, secret),
            (None, None) => {
                tracing::warn!(
                    "{} and {} are not set, using role permissions for the source bucket",
                    Setting::SourceAccessKey.env_var(),
                    Setting::SourceSecretKey.env_var()
                );
                Credentials::Ambient
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(error::configuration(format!(
                    "{} and {} must be set together",
                    Setting::SourceAccessKey.env_var(),
                    Setting::SourceSecretKey.env_var()
                )))
            }
        };

        let mut builder = Builder::default()
            .source_credentials(source_credentials)
            .multipart_threshold(self.multipart_threshold.clone())
            .part_size(self.part_size.clone());
        if let Some(bucket) = get(Setting::DestinationBucket) {
            builder = builder.destination_bucket(bucket);
        }
        if let Some(prefix) = get(Setting::DestinationPrefix) {
            builder = builder.destination_prefix(prefix);
        }
        if let Some(region) = get(Setting::DestinationRegion) {
            builder = builder.destination_region(region);
        }
        if let Some(url) = get(Setting::QueueUrl) {
            builder = builder.queue_url(url);
        }
        if let Some(region) = get(Setting::SourceRegion) {
            builder = builder.source_region(region);
        }
        if let Some(offset) = get(Setting::PartitionOffset) {
            let PartitionOffset(offset) = offset.parse::<PartitionOffset>().map_err(|err| {
                error::configuration(format!(
                    "invalid {}: {err}",
                    Setting::PartitionOffset.env_var()
                ))
            })?;
            builder = builder.partition_offset(offset);
        }

        builder.build()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn read_parameter_file(path: &Path) -> Result<HashMap<String, String>, error::Error> {
    tracing::debug!("reading parameter file {}", path.display());
    let contents = std::fs::read_to_string(path).map_err(|err| {
        error::configuration(format!("failed to read {}: {err}", path.display()))
    })?;
    serde_json::from_str(&contents).map_err(|err| {
        error::configuration(format!("invalid parameter file {}: {err}", path.display()))
    })
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
use std::error::Error;
use std::path::PathBuf;
use std::time;

use aws_s3_queue_forwarder::config::loader::Setting;
use aws_s3_queue_forwarder::types::PartSize;
use aws_s3_queue_forwarder::{Forwarder, QueueDrainer, SqsQueue};
use aws_sdk_s3::error::DisplayErrorContext;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "forwarder")]
#[command(about = "Drains the notification queue, copying every announced object into the destination bucket.")]
struct Args {
    /// JSON parameter file (overrides FORWARDER_CONFIG)
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Destination bucket (overrides S3_BUCKET)
    #[arg(long)]
    bucket: Option<String>,

    /// Destination key prefix (overrides S3_PREFIX)
    #[arg(long)]
    prefix: Option<String>,

    /// Destination region (overrides S3_REGION)
    #[arg(long)]
    region: Option<String>,

    /// Notification queue URL (overrides SQS_URL)
    #[arg(long)]
    queue_url: Option<String>,

    /// Provider bucket region (overrides SOURCE_REGION)
    #[arg(long)]
    source_region: Option<String>,

    /// Provider access key id (overrides SOURCE_AWS_KEY)
    #[arg(long)]
    source_access_key: Option<String>,

    /// Provider secret access key (overrides SOURCE_AWS_SECRET)
    #[arg(long)]
    source_secret_key: Option<String>,

    /// UTC offset of the destination hour buckets, e.g. +09:00 (overrides PARTITION_UTC_OFFSET)
    #[arg(long)]
    partition_offset: Option<String>,

    /// Part size to use for multipart uploads
    #[arg(long)]
    part_size: Option<u64>,

    /// Object size from which multipart uploads are used
    #[arg(long)]
    multipart_threshold: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "FORWARDER_LOG_FORMAT")]
    log_format: LogFormat,
}

impl Args {
    fn overrides(&self) -> Vec<(Setting, &str)> {
        [
            (Setting::DestinationBucket, &self.bucket),
            (Setting::DestinationPrefix, &self.prefix),
            (Setting::DestinationRegion, &self.region),
            (Setting::QueueUrl, &self.queue_url),
            (Setting::SourceRegion, &self.source_region),
            (Setting::SourceAccessKey, &self.source_access_key),
            (Setting::SourceSecretKey, &self.source_secret_key),
            (Setting::PartitionOffset, &self.partition_offset),
        ]
        .into_iter()
        .filter_map(|(setting, value)| value.as_deref().map(|v| (setting, v)))
        .collect()
    }
}

async fn run(args: Args, cancel: CancellationToken) -> Result<(), BoxError> {
    let mut loader = aws_s3_queue_forwarder::from_env();
    for (setting, value) in args.overrides() {
        loader = loader.set(setting, value);
    }
    if let Some(path) = args.config_file {
        loader = loader.config_file(path);
    }
    if let Some(part_size) = args.part_size {
        loader = loader.part_size(PartSize::Target(part_size));
    }
    if let Some(threshold) = args.multipart_threshold {
        loader = loader.multipart_threshold(PartSize::Target(threshold));
    }
    let config = loader.load()?;
    let sdk_config = aws_config::from_env().load().await;

    let queue = SqsQueue::connect(&sdk_config, config.queue_url(), config.source_credentials())?;
    let forwarder = Forwarder::from_sdk_config(&config, &sdk_config);

    let start = time::Instant::now();
    let result = QueueDrainer::new(queue).drain(&forwarder, &cancel).await;
    forwarder.log_metrics();
    let output = result?;

    println!(
        "forwarded {} notifications ({} files, {} bytes) in {:?}",
        output.messages_handled(),
        forwarder.metrics().files_copied(),
        forwarder.metrics().bytes_copied(),
        start.elapsed()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match args.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .init(),
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, stopping drain; the in-flight message is left on the queue");
                cancel.cancel();
            }
        }
        .instrument(tracing::debug_span!("ctrl-c"))
    });

    let result = run(args, cancel).await;
    if let Err(ref err) = result {
        tracing::error!("forwarding failed: {}", DisplayErrorContext(err.as_ref()));
    }
    result
}

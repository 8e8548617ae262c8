/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aws_s3_queue_forwarder::{Forwarder, QueueDrainer, SqsQueue};
use aws_smithy_types::error::display::DisplayErrorContext;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Time left to the runtime after the drain is cancelled
const DEADLINE_MARGIN: Duration = Duration::from_secs(10);

/// Time until the drain must stop, given the invocation deadline in epoch milliseconds
fn drain_budget(deadline_ms: u64) -> Duration {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Duration::from_millis(deadline_ms)
        .saturating_sub(now)
        .saturating_sub(DEADLINE_MARGIN)
}

/// Drain the notification queue once. The invocation payload is ignored.
async fn function_handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let config = aws_s3_queue_forwarder::from_env().load()?;
    let sdk_config = aws_config::from_env().load().await;

    let queue = SqsQueue::connect(&sdk_config, config.queue_url(), config.source_credentials())?;
    let forwarder = Forwarder::from_sdk_config(&config, &sdk_config);

    let cancel = CancellationToken::new();
    let budget = drain_budget(event.context.deadline);
    tracing::debug!("draining for at most {budget:?}");
    let timer = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(budget).await;
            tracing::warn!("invocation deadline approaching, stopping drain");
            cancel.cancel();
        }
    });

    let result = QueueDrainer::new(queue).drain(&forwarder, &cancel).await;
    timer.abort();
    forwarder.log_metrics();

    match result {
        Ok(output) => Ok(json!({ "messagesHandled": output.messages_handled() })),
        Err(err) => {
            tracing::error!("drain failed: {}", DisplayErrorContext(&err));
            Err(err.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    lambda_runtime::run(service_fn(function_handler)).await
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use aws_sdk_s3::config::Region;
use aws_types::SdkConfig;

use crate::types::{Credentials, ObjectLocator};

/// Provides the S3 client used for requests against one [`ObjectLocator`].
///
/// Implementations must derive the client from the locator's own region and credentials only,
/// so that a source identity is never used against the destination bucket and vice versa.
pub trait ClientProvider: Send + Sync + fmt::Debug {
    /// The client to reach `locator` with.
    fn s3_client(&self, locator: &ObjectLocator) -> aws_sdk_s3::Client;
}

/// [`ClientProvider`] building clients from a shared [`SdkConfig`].
///
/// Every call builds a fresh client: the region is overridden with the locator's region, and
/// explicit credentials replace the shared credential chain.
#[derive(Debug, Clone)]
pub struct SdkClientProvider {
    sdk_config: SdkConfig,
}

impl SdkClientProvider {
    /// Create a provider from a loaded AWS configuration
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
        }
    }
}

impl ClientProvider for SdkClientProvider {
    fn s3_client(&self, locator: &ObjectLocator) -> aws_sdk_s3::Client {
        let mut builder = aws_sdk_s3::config::Builder::from(&self.sdk_config)
            .region(Region::new(locator.region().to_owned()));
        if let Some(creds) = static_credentials(locator.credentials(), "object") {
            builder = builder.credentials_provider(creds);
        }
        aws_sdk_s3::Client::from_conf(builder.build())
    }
}

/// Static SDK credentials for an explicit key pair, `None` for ambient credentials.
pub(crate) fn static_credentials(
    credentials: &Credentials,
    scope: &'static str,
) -> Option<aws_sdk_s3::config::Credentials> {
    match credentials {
        Credentials::Explicit {
            access_key_id,
            secret_access_key,
        } => Some(aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            scope,
        )),
        Credentials::Ambient => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use aws_credential_types::provider::SharedCredentialsProvider;
    use aws_smithy_http_client::test_util::{ReplayEvent, StaticReplayClient};
    use aws_smithy_types::body::SdkBody;

    /// Answers a single request with an empty `200 OK`
    fn replay_client() -> StaticReplayClient {
        StaticReplayClient::new(vec![ReplayEvent::new(
            http::Request::builder()
                .uri("https://not-used")
                .body(SdkBody::empty())
                .unwrap(),
            http::Response::builder()
                .status(200)
                .body(SdkBody::empty())
                .unwrap(),
        )])
    }

    fn sdk_config(http_client: StaticReplayClient) -> SdkConfig {
        SdkConfig::builder()
            .region(Region::from_static("eu-west-1"))
            .credentials_provider(SharedCredentialsProvider::new(
                aws_credential_types::Credentials::new(
                    "AKIDAMBIENT",
                    "ambient-secret",
                    None,
                    None,
                    "test",
                ),
            ))
            .http_client(http_client)
            .build()
    }

    /// Send a `GetObject` for `locator` and return the authorization header it was signed with
    async fn signed_authorization(locator: &ObjectLocator) -> String {
        let http_client = replay_client();
        let provider = SdkClientProvider::new(&sdk_config(http_client.clone()));

        let client = provider.s3_client(locator);
        assert_eq!(
            Some(locator.region()),
            client.config().region().map(|r| r.as_ref())
        );
        client
            .get_object()
            .bucket(locator.bucket())
            .key(locator.key())
            .send()
            .await
            .unwrap();

        let requests = http_client.actual_requests().collect::<Vec<_>>();
        assert_eq!(1, requests.len());
        requests[0]
            .headers()
            .get("authorization")
            .expect("request is signed")
            .to_owned()
    }

    #[tokio::test]
    async fn test_explicit_credentials_override_chain() {
        let locator = ObjectLocator::new(
            "us-west-1",
            "provider-bucket",
            "a.gz",
            Credentials::explicit("AKIDSOURCE", "source-secret"),
        );

        let authorization = signed_authorization(&locator).await;
        assert!(
            authorization.contains("Credential=AKIDSOURCE/"),
            "{authorization}"
        );
        assert!(
            authorization.contains("/us-west-1/s3/aws4_request"),
            "{authorization}"
        );
    }

    #[tokio::test]
    async fn test_ambient_credentials_keep_chain() {
        let locator = ObjectLocator::new("ap-northeast-1", "dst", "k", Credentials::Ambient);

        let authorization = signed_authorization(&locator).await;
        assert!(
            authorization.contains("Credential=AKIDAMBIENT/"),
            "{authorization}"
        );
        assert!(
            authorization.contains("/ap-northeast-1/s3/aws4_request"),
            "{authorization}"
        );
    }
}

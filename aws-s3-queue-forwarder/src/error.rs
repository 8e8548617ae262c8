/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// A boxed error that is `Send` and `Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by this library
///
/// NOTE: Use [`aws_smithy_types::error::display::DisplayErrorContext`] or similar to display
/// the entire error cause/source chain.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: BoxError,
}

/// General categories of forwarding errors.
///
/// None of these are retried by this crate. Every kind stops the drain and leaves the
/// in-flight message on the queue.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Missing or malformed settings (e.g. an unrecognized queue URL)
    Configuration,

    /// A queue message body that is not a valid notification
    Decode,

    /// Reading from the provider's bucket failed
    SourceAccess,

    /// Writing to the destination bucket failed
    DestinationAccess,

    /// Receiving or deleting a queue message failed
    QueueProtocol,

    /// The drain was cancelled before the in-flight message completed
    OperationCancelled,
}

impl Error {
    /// Creates a new forwarding [`Error`] from a known kind of error as well as an arbitrary error
    /// source.
    pub fn new<E>(kind: ErrorKind, err: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            source: err.into(),
        }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Configuration => write!(f, "invalid configuration"),
            ErrorKind::Decode => write!(f, "failed to decode queue message"),
            ErrorKind::SourceAccess => write!(f, "failed to read from source bucket"),
            ErrorKind::DestinationAccess => write!(f, "failed to write to destination bucket"),
            ErrorKind::QueueProtocol => write!(f, "queue request failed"),
            ErrorKind::OperationCancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::new(ErrorKind::Decode, value)
    }
}

pub(crate) fn configuration<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::Configuration, err)
}

pub(crate) fn decode<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::Decode, err)
}

pub(crate) fn source_access<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::SourceAccess, err)
}

pub(crate) fn destination_access<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::DestinationAccess, err)
}

pub(crate) fn queue_protocol<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::QueueProtocol, err)
}

static CANCELLATION_ERROR: &str =
    "drain cancelled before the in-flight message completed; it will be redelivered";

pub(crate) fn operation_cancelled() -> Error {
    Error::new(ErrorKind::OperationCancelled, CANCELLATION_ERROR)
}

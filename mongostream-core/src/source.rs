// Copyright 2025 Mongostream Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Record sources: the snapshot cursor and the change tail.
//!
//! A [`RecordSource`] yields raw BSON documents one at a time. Two variants
//! back the connector:
//!
//! - [`SnapshotCursor`]: an unfiltered `find` over the collection. Finite.
//! - [`ChangeTail`]: a change stream opened with `fullDocument: updateLookup`,
//!   read as raw envelopes. Infinite in normal operation.
//!
//! # Cancellation
//!
//! [`RecordSource::next`] takes a [`CancellationToken`] and races the driver
//! fetch against it, so an idle change stream never pins the ingestion pump:
//!
//! ```text
//! next(cancel) ──┬── cursor.next()      → Ok(Some(doc)) | Err(..) | exhausted
//!                └── cancel.cancelled() → Ok(None)
//! ```
//!
//! # Error Classification
//!
//! Driver errors become [`SourceError`]. Codes and labels are kept so the
//! host's restart policy can tell transient failures from permanent ones via
//! [`SourceError::is_transient`]. No retry happens in this crate.

use crate::metrics::ErrorCategory;
use async_trait::async_trait;
use bson::{doc, Document};
use futures::StreamExt;
use mongodb::{
    change_stream::ChangeStream,
    error::{Error as MongoError, ErrorKind as MongoErrorKind},
    options::{ChangeStreamOptions, FullDocumentType},
    Collection, Cursor,
};
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Errors raised while establishing or iterating a record source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network, server or command failure
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// MongoDB error code
        code: Option<i32>,
        /// MongoDB error labels (e.g., "NetworkError")
        labels: Vec<String>,
    },

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The URI or client options are invalid
    #[error("Invalid connection settings: {0}")]
    InvalidSettings(String),

    /// A record could not be decoded as a BSON document
    #[error("Failed to decode record: {0}")]
    Decode(String),

    /// The server closed the change stream (collection dropped, renamed, ...)
    #[error("Change stream ended by the server")]
    StreamEnded,
}

impl From<MongoError> for SourceError {
    fn from(err: MongoError) -> Self {
        Self::from_mongo_error(err)
    }
}

impl SourceError {
    /// Creates a `SourceError` from a MongoDB error with proper classification.
    pub fn from_mongo_error(err: MongoError) -> Self {
        match err.kind.as_ref() {
            MongoErrorKind::Authentication { message, .. } => {
                return Self::Authentication(message.clone());
            }
            MongoErrorKind::InvalidArgument { message, .. } => {
                return Self::InvalidSettings(message.clone());
            }
            MongoErrorKind::BsonDeserialization(e) => return Self::Decode(e.to_string()),
            _ => {}
        }

        let code = match err.kind.as_ref() {
            MongoErrorKind::Command(cmd_err) => Some(cmd_err.code),
            _ => None,
        };
        let labels: Vec<String> = err.labels().iter().cloned().collect();

        Self::Connection {
            message: err.to_string(),
            source: Some(Box::new(err)),
            code,
            labels,
        }
    }

    /// Returns true if restarting the connector may succeed.
    ///
    /// Uses MongoDB error codes and labels:
    /// - Error labels: `RetryableWriteError`, `TransientTransactionError`, `NetworkError`
    /// - Transient error codes: 6, 7, 43, 89, 91, 10107, 11600, 11602, 13435, 13436
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection { code, labels, .. } => {
                if labels.iter().any(|l| {
                    l == "RetryableWriteError"
                        || l == "TransientTransactionError"
                        || l == "NetworkError"
                }) {
                    return true;
                }

                code.is_some_and(|c| {
                    matches!(
                        c,
                        6 |    // HostUnreachable
                        7 |    // HostNotFound
                        43 |   // CursorNotFound
                        89 |   // NetworkTimeout
                        91 |   // ShutdownInProgress
                        10107 | // NotPrimary
                        11600 | // InterruptedAtShutdown
                        11602 | // InterruptedDueToReplStateChange
                        13435 | // NotPrimaryNoSecondaryOk
                        13436 // NotPrimaryOrSecondary
                    )
                })
            }
            Self::Authentication(_)
            | Self::InvalidSettings(_)
            | Self::Decode(_)
            | Self::StreamEnded => false,
        }
    }

    /// Returns the error category label shared by logs and metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        ErrorCategory::from_source_error(self).as_str()
    }
}

/// Which read mode a source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Full-collection scan
    Snapshot,
    /// Live change stream
    Tail,
}

impl SourceKind {
    /// Returns the kind as a static string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Tail => "tail",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pull-based sequence of raw records.
///
/// `next` returning `Ok(None)` means the sequence has no more records: the
/// scan is exhausted, or `cancel` fired. Callers distinguish the two by
/// checking the token.
#[async_trait]
pub trait RecordSource: Send {
    /// Returns the read mode this source serves.
    fn kind(&self) -> SourceKind;

    /// Fetches the next raw record.
    ///
    /// Returns promptly with `Ok(None)` once `cancel` is cancelled, even if
    /// the underlying fetch is still waiting on the server.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the driver fails or a record cannot be
    /// decoded. Errors are not retried.
    async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Document>, SourceError>;

    /// Releases the underlying cursor. Idempotent.
    async fn close(&mut self);
}

/// Finite source backed by an unfiltered `find`.
pub struct SnapshotCursor {
    cursor: Option<Cursor<Document>>,
    fetched: u64,
}

impl SnapshotCursor {
    /// Starts a full scan of `collection`.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the `find` command fails.
    pub async fn open(
        collection: &Collection<Document>,
        batch_size: Option<u32>,
    ) -> Result<Self, SourceError> {
        debug!(namespace = %collection.namespace(), "Opening snapshot cursor");

        let mut find = collection.find(doc! {});
        if let Some(size) = batch_size {
            find = find.batch_size(size);
        }
        let cursor = find.await?;

        Ok(Self {
            cursor: Some(cursor),
            fetched: 0,
        })
    }

    /// Number of documents fetched so far.
    #[must_use]
    pub fn fetched(&self) -> u64 {
        self.fetched
    }
}

#[async_trait]
impl RecordSource for SnapshotCursor {
    fn kind(&self) -> SourceKind {
        SourceKind::Snapshot
    }

    async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Document>, SourceError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(None),
            item = cursor.next() => item,
        };

        match item {
            Some(Ok(document)) => {
                self.fetched += 1;
                Ok(Some(document))
            }
            Some(Err(e)) => Err(SourceError::from_mongo_error(e)),
            None => {
                debug!(documents = self.fetched, "Snapshot cursor exhausted");
                self.cursor = None;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        if self.cursor.take().is_some() {
            debug!(documents = self.fetched, "Closing snapshot cursor");
        }
    }
}

/// Infinite source backed by a change stream with full-document lookup.
pub struct ChangeTail {
    stream: Option<ChangeStream<Document>>,
}

impl ChangeTail {
    /// Opens a change stream on `collection`.
    ///
    /// Non-delete events carry the complete post-change document
    /// (`fullDocument: updateLookup`). Events are read as raw documents so
    /// operation types the driver does not model pass through untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the `watch` aggregation fails, e.g. on a
    /// standalone server without an oplog.
    pub async fn open(
        collection: &Collection<Document>,
        batch_size: Option<u32>,
    ) -> Result<Self, SourceError> {
        debug!(namespace = %collection.namespace(), "Opening change stream");

        let stream = collection
            .watch()
            .with_options(tail_options(batch_size))
            .await?
            .with_type::<Document>();

        Ok(Self {
            stream: Some(stream),
        })
    }
}

/// Change stream options used by [`ChangeTail::open`].
fn tail_options(batch_size: Option<u32>) -> ChangeStreamOptions {
    let mut options = ChangeStreamOptions::default();
    options.full_document = Some(FullDocumentType::UpdateLookup);
    options.batch_size = batch_size;
    options
}

#[async_trait]
impl RecordSource for ChangeTail {
    fn kind(&self) -> SourceKind {
        SourceKind::Tail
    }

    async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Document>, SourceError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(None),
            item = stream.next() => item,
        };

        match item {
            Some(Ok(envelope)) => Ok(Some(envelope)),
            Some(Err(e)) => Err(SourceError::from_mongo_error(e)),
            None => {
                // Change streams only end after an invalidate event
                warn!("Change stream ended unexpectedly");
                self.stream = None;
                Err(SourceError::StreamEnded)
            }
        }
    }

    async fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("Closing change stream");
        }
    }
}

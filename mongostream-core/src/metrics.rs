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

//! Metrics instrumentation for connector observability.
//!
//! Built on the `metrics` facade, so any exporter (Prometheus, StatsD, ...)
//! can be installed by the host. Without a recorder every call is a no-op.
//!
//! # Naming Conventions
//!
//! - Prefixed with `mongostream_`
//! - Unit suffix (`_seconds`), counters end with `_total`
//!
//! # Labels
//!
//! - **collection**: configured collection name
//! - **action**: `insert`, `update`, `delete`, ... (pass-through actions included)
//! - **phase**: `snapshot` or `tail`
//! - **error\_type**: [`ErrorCategory`] label
//!
//! # Examples
//!
//! ```rust
//! use mongostream_core::metrics;
//! use mongostream_core::source::SourceKind;
//!
//! metrics::init_metrics();
//! metrics::increment_events_captured("users", "insert", SourceKind::Snapshot);
//! metrics::set_connector_status("users", metrics::ConnectorStatus::Running);
//! ```

use crate::source::{SourceError, SourceKind};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric name prefix for all connector metrics.
#[doc(hidden)]
pub const METRIC_PREFIX: &str = "mongostream";

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Records normalized and pushed by the ingestion pump.
///
/// Type: Counter
/// Labels: collection, action, phase
#[doc(hidden)]
pub const EVENTS_CAPTURED_TOTAL: &str = "mongostream_events_captured_total";

/// Messages handed to the host by `read`.
///
/// Type: Counter
/// Labels: collection, action
#[doc(hidden)]
pub const EVENTS_DELIVERED_TOTAL: &str = "mongostream_events_delivered_total";

/// Fatal source errors.
///
/// Type: Counter
/// Labels: collection, error_type
#[doc(hidden)]
pub const SOURCE_ERRORS_TOTAL: &str = "mongostream_source_errors_total";

/// Wall time of the snapshot scan.
///
/// Type: Histogram
/// Labels: collection
/// Unit: seconds
#[doc(hidden)]
pub const SNAPSHOT_DURATION_SECONDS: &str = "mongostream_snapshot_duration_seconds";

/// Documents delivered by a completed snapshot scan.
///
/// Type: Histogram
/// Labels: collection
const SNAPSHOT_DOCUMENTS: &str = "mongostream_snapshot_documents";

/// Connector status (0=stopped, 1=running, 2=error).
///
/// Type: Gauge
/// Labels: collection
#[doc(hidden)]
pub const CONNECTOR_STATUS: &str = "mongostream_connector_status";

// ============================================================================
// Initialization
// ============================================================================

/// Registers metric descriptions with the installed recorder.
///
/// Call once at startup, after installing an exporter.
pub fn init_metrics() {
    describe_counter!(
        EVENTS_CAPTURED_TOTAL,
        "Total number of source records normalized and queued for delivery"
    );

    describe_counter!(
        EVENTS_DELIVERED_TOTAL,
        "Total number of messages returned to the host by read"
    );

    describe_counter!(
        SOURCE_ERRORS_TOTAL,
        "Total number of fatal snapshot or change stream errors"
    );

    describe_histogram!(
        SNAPSHOT_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Time taken to scan the collection before tailing"
    );

    describe_histogram!(
        SNAPSHOT_DOCUMENTS,
        metrics::Unit::Count,
        "Number of documents delivered by a completed snapshot scan"
    );

    describe_gauge!(
        CONNECTOR_STATUS,
        "Current connector status: 0=stopped, 1=running, 2=error"
    );
}

// ============================================================================
// Counter Metrics
// ============================================================================

/// Increments the count of records captured from a source.
pub fn increment_events_captured(collection: &str, action: &str, phase: SourceKind) {
    counter!(
        EVENTS_CAPTURED_TOTAL,
        "collection" => collection.to_string(),
        "action" => action.to_string(),
        "phase" => phase.as_str()
    )
    .increment(1);
}

/// Increments the count of messages handed to the host.
pub fn increment_events_delivered(collection: &str, action: &str) {
    counter!(EVENTS_DELIVERED_TOTAL, "collection" => collection.to_string(), "action" => action.to_string())
        .increment(1);
}

/// Increments the count of fatal source errors.
pub fn increment_source_errors(collection: &str, error_category: ErrorCategory) {
    counter!(SOURCE_ERRORS_TOTAL, "collection" => collection.to_string(), "error_type" => error_category.as_str())
        .increment(1);
}

// ============================================================================
// Histogram Metrics
// ============================================================================

/// Records how long the snapshot scan took.
pub fn record_snapshot_duration(duration: Duration, collection: &str) {
    histogram!(SNAPSHOT_DURATION_SECONDS, "collection" => collection.to_string())
        .record(duration.as_secs_f64());
}

/// Records how many documents a completed snapshot delivered.
#[allow(clippy::cast_precision_loss)]
pub fn record_snapshot_documents(count: u64, collection: &str) {
    histogram!(SNAPSHOT_DOCUMENTS, "collection" => collection.to_string()).record(count as f64);
}

// ============================================================================
// Gauge Metrics
// ============================================================================

/// Sets the status gauge of the connector capturing `collection`.
pub fn set_connector_status(collection: &str, status: ConnectorStatus) {
    gauge!(CONNECTOR_STATUS, "collection" => collection.to_string()).set(f64::from(status as u8));
}

/// Connector status values for [`set_connector_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectorStatus {
    /// Not connected, or closed.
    Stopped = 0,
    /// The ingestion pump is running.
    Running = 1,
    /// The ingestion pump stopped on an error.
    Error = 2,
}

/// Error categories used as the `error_type` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network, server or command failure
    Connection,
    /// Rejected credentials
    Permission,
    /// Invalid URI or client options
    Configuration,
    /// Record could not be decoded
    Serialization,
    /// Server closed the change stream
    StreamEnded,
}

impl ErrorCategory {
    /// Maps a source error to its category.
    #[must_use]
    pub fn from_source_error(err: &SourceError) -> Self {
        match err {
            SourceError::Connection { .. } => Self::Connection,
            SourceError::Authentication(_) => Self::Permission,
            SourceError::InvalidSettings(_) => Self::Configuration,
            SourceError::Decode(_) => Self::Serialization,
            SourceError::StreamEnded => Self::StreamEnded,
        }
    }

    /// Returns the error category as a static string for metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection_error",
            Self::Permission => "permission_error",
            Self::Configuration => "configuration_error",
            Self::Serialization => "serialization_error",
            Self::StreamEnded => "stream_ended",
        }
    }
}

// ============================================================================
// Metric Helper Utilities
// ============================================================================

/// Runs a closure with the elapsed time when dropped.
///
/// ```rust
/// use mongostream_core::metrics::{self, Timer};
///
/// {
///     let _timer = Timer::new("users", |elapsed, collection| {
///         metrics::record_snapshot_duration(elapsed, collection);
///     });
///     // ... scan ...
/// }
/// ```
pub struct Timer<F>
where
    F: FnOnce(Duration, &str),
{
    start: std::time::Instant,
    label: String,
    record_fn: Option<F>,
}

impl<F> Timer<F>
where
    F: FnOnce(Duration, &str),
{
    /// Creates a new timer that will record the duration when dropped.
    pub fn new(label: impl Into<String>, record_fn: F) -> Self {
        Self {
            start: std::time::Instant::now(),
            label: label.into(),
            record_fn: Some(record_fn),
        }
    }
}

impl<F> Drop for Timer<F>
where
    F: FnOnce(Duration, &str),
{
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        if let Some(record_fn) = self.record_fn.take() {
            record_fn(duration, &self.label);
        }
    }
}

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

//! Ingestion pump: drives record sources into the delivery channel.
//!
//! The pump runs on its own task, started once per successful connect. It
//! drains its sources strictly in sequence, normalizes every record and
//! pushes the result onto the [`delivery channel`](crate::channel).
//!
//! # Run Modes
//!
//! ```text
//! TailOnly:          [tail ─────────────────────────────▶]
//! SnapshotThenTail:  [snapshot ──▶ exhausted] [tail ────▶]
//! ```
//!
//! In snapshot-then-tail mode the tail is opened when the scan finishes,
//! unless the connector already opened it before the scan
//! (`open_tail_before_snapshot`). With the default ordering, writes that land
//! while the scan runs are seen by neither source.
//!
//! # Failure
//!
//! Any source or decode error is fatal. The pump pushes the error onto the
//! channel, so the reader sees it after every event emitted before it, and
//! stops. Cancellation stops the pump without pushing anything.

use crate::channel::{EventSender, SendError};
use crate::driver::CollectionHandle;
use crate::event::{normalize, Namespace};
use crate::metrics::{self, ErrorCategory, Timer};
use crate::source::{RecordSource, SourceError, SourceKind};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Errors that stop the ingestion pump.
#[derive(Debug, Error)]
pub enum PumpError {
    /// A source failed while being iterated
    #[error("{phase} iteration failed: {source}")]
    Source {
        /// Which source failed
        phase: SourceKind,
        #[source]
        source: SourceError,
    },

    /// The change stream could not be opened after the snapshot
    #[error("failed to open change stream after snapshot: {0}")]
    OpenTail(#[source] SourceError),
}

impl PumpError {
    /// Returns the underlying source error.
    #[must_use]
    pub fn source_error(&self) -> &SourceError {
        match self {
            Self::Source { source, .. } | Self::OpenTail(source) => source,
        }
    }

    /// Returns true if a record could not be decoded.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self.source_error(), SourceError::Decode(_))
    }

    /// Returns the error category for metrics/logging.
    #[must_use]
    pub fn category(&self) -> &'static str {
        self.source_error().category()
    }
}

/// How the pump sequences its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Only the live change stream
    TailOnly,
    /// Full scan first, then the live change stream
    SnapshotThenTail,
}

impl RunMode {
    /// Selects the mode from the `stream_snapshot` flag.
    #[must_use]
    pub const fn from_stream_snapshot(stream_snapshot: bool) -> Self {
        if stream_snapshot {
            Self::SnapshotThenTail
        } else {
            Self::TailOnly
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TailOnly => f.write_str("tail_only"),
            Self::SnapshotThenTail => f.write_str("snapshot_then_tail"),
        }
    }
}

/// Sources handed to the pump at start.
///
/// A missing `tail` alongside a `snapshot` means the pump opens the tail
/// itself once the scan is exhausted.
#[derive(Default)]
pub struct PumpSources {
    /// Full-collection scan to drain first
    pub snapshot: Option<Box<dyn RecordSource>>,
    /// Change tail, if already opened
    pub tail: Option<Box<dyn RecordSource>>,
}

impl PumpSources {
    /// Sources for tail-only mode.
    #[must_use]
    pub fn tail_only(tail: Box<dyn RecordSource>) -> Self {
        Self {
            snapshot: None,
            tail: Some(tail),
        }
    }

    /// Sources for snapshot-then-tail mode with the tail opened after the scan.
    #[must_use]
    pub fn snapshot_then_tail(snapshot: Box<dyn RecordSource>) -> Self {
        Self {
            snapshot: Some(snapshot),
            tail: None,
        }
    }
}

/// How a pump run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpOutcome {
    /// Cancellation was requested
    #[default]
    Cancelled,
    /// Every source ran out of records
    Completed,
    /// The reader side went away
    Disconnected,
    /// A fatal error was pushed to the reader
    Failed(&'static str),
}

/// Summary returned by [`IngestionPump::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Events delivered from the snapshot scan
    pub snapshot_events: u64,
    /// Events delivered from the change tail
    pub tail_events: u64,
    /// How the run ended
    pub outcome: PumpOutcome,
}

impl PumpReport {
    /// Total events delivered.
    #[must_use]
    pub fn total_events(&self) -> u64 {
        self.snapshot_events + self.tail_events
    }
}

enum Drained {
    Exhausted,
    Stopped(PumpOutcome),
}

/// Background task driving record sources into the delivery channel.
pub struct IngestionPump {
    handle: Arc<dyn CollectionHandle>,
    namespace: Namespace,
    sender: EventSender,
    cancel: CancellationToken,
}

impl IngestionPump {
    /// Creates a pump. Nothing runs until [`run`](Self::run) is awaited.
    pub fn new(
        handle: Arc<dyn CollectionHandle>,
        sender: EventSender,
        cancel: CancellationToken,
    ) -> Self {
        let namespace = handle.namespace().clone();
        Self {
            handle,
            namespace,
            sender,
            cancel,
        }
    }

    /// Runs the pump until its sources are done, it fails or it is cancelled.
    #[instrument(skip_all, fields(namespace = %self.namespace))]
    pub async fn run(self, sources: PumpSources) -> PumpReport {
        let mut report = PumpReport::default();
        metrics::set_connector_status(&self.namespace.collection, metrics::ConnectorStatus::Running);

        report.outcome = match self.run_sources(sources, &mut report).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, category = err.category(), "Ingestion pump failed");
                metrics::increment_source_errors(
                    &self.namespace.collection,
                    ErrorCategory::from_source_error(err.source_error()),
                );
                metrics::set_connector_status(&self.namespace.collection, metrics::ConnectorStatus::Error);

                let category = err.category();
                if self.sender.send(Err(err), &self.cancel).await.is_err() {
                    debug!("Reader gone before the pump error could be delivered");
                }
                PumpOutcome::Failed(category)
            }
        };

        info!(
            snapshot_events = report.snapshot_events,
            tail_events = report.tail_events,
            outcome = ?report.outcome,
            "Ingestion pump stopped"
        );
        report
    }

    async fn run_sources(
        &self,
        sources: PumpSources,
        report: &mut PumpReport,
    ) -> Result<PumpOutcome, PumpError> {
        let PumpSources { snapshot, tail } = sources;

        if let Some(mut snapshot) = snapshot {
            info!("Starting snapshot scan");
            let collection = self.namespace.collection.clone();
            let timer = Timer::new(collection, |elapsed, collection| {
                metrics::record_snapshot_duration(elapsed, collection);
            });

            let drained = self
                .drain(snapshot.as_mut(), &mut report.snapshot_events)
                .await;
            snapshot.close().await;
            drop(timer);

            match drained? {
                Drained::Exhausted => {
                    metrics::record_snapshot_documents(
                        report.snapshot_events,
                        &self.namespace.collection,
                    );
                    info!(documents = report.snapshot_events, "Snapshot scan complete");
                }
                Drained::Stopped(outcome) => {
                    if let Some(mut tail) = tail {
                        tail.close().await;
                    }
                    return Ok(outcome);
                }
            }
        }

        let mut tail = match tail {
            Some(tail) => tail,
            None => match self.open_tail().await? {
                Some(tail) => tail,
                None => return Ok(PumpOutcome::Cancelled),
            },
        };

        info!("Tailing change stream");
        let drained = self.drain(tail.as_mut(), &mut report.tail_events).await;
        tail.close().await;

        match drained? {
            Drained::Exhausted => Ok(PumpOutcome::Completed),
            Drained::Stopped(outcome) => Ok(outcome),
        }
    }

    /// Opens the change tail after a snapshot; `None` if cancelled meanwhile.
    async fn open_tail(&self) -> Result<Option<Box<dyn RecordSource>>, PumpError> {
        debug!("Opening change stream after snapshot");
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Ok(None),
            tail = self.handle.tail() => tail.map(Some).map_err(PumpError::OpenTail),
        }
    }

    async fn drain(
        &self,
        source: &mut dyn RecordSource,
        delivered: &mut u64,
    ) -> Result<Drained, PumpError> {
        let phase = source.kind();

        loop {
            let raw = match source.next(&self.cancel).await {
                Ok(Some(raw)) => raw,
                Ok(None) if self.cancel.is_cancelled() => {
                    debug!(%phase, "Source iteration cancelled");
                    return Ok(Drained::Stopped(PumpOutcome::Cancelled));
                }
                Ok(None) => return Ok(Drained::Exhausted),
                Err(source_err) => {
                    return Err(PumpError::Source {
                        phase,
                        source: source_err,
                    })
                }
            };

            let event = normalize(raw, &self.namespace);
            metrics::increment_events_captured(
                &self.namespace.collection,
                event.action.as_str(),
                phase,
            );

            match self.sender.send(Ok(event), &self.cancel).await {
                Ok(()) => *delivered += 1,
                Err(SendError::Cancelled) => {
                    return Ok(Drained::Stopped(PumpOutcome::Cancelled));
                }
                Err(SendError::Disconnected) => {
                    warn!(%phase, "Reader dropped, stopping pump");
                    return Ok(Drained::Stopped(PumpOutcome::Disconnected));
                }
            }
        }
    }
}

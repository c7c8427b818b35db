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

//! The `mongodb_stream` input.
//!
//! [`MongoStreamInput`] owns the connection, the delivery channel and the
//! ingestion pump task, and exposes them through the pull-based [`Input`]
//! contract.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──connect──▶ Connected ──close──▶ Closed
//!    └─────────────────close──────────────────▲
//! ```
//!
//! - `connect` opens the connection and the first source(s), then spawns the
//!   pump. A failed `connect` releases the connection and stays in `Created`.
//!   A `close` issued while `connect` is still waiting on the server aborts
//!   it with [`ConnectError::InvalidState`].
//! - `read` waits on the delivery channel. `close` wakes a waiting reader,
//!   which then returns [`ReadError::EndOfInput`].
//! - `close` cancels the pump, waits for it to exit, then disconnects.
//!
//! # Example
//!
//! ```rust,no_run
//! use mongostream_core::config::MongoStreamConfig;
//! use mongostream_core::connector::MongoStreamInput;
//! use mongostream_core::input::Input;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MongoStreamConfig::builder()
//!     .uri("mongodb://localhost:27017/?replicaSet=rs0")
//!     .database("shop")
//!     .collection("orders")
//!     .stream_snapshot(true)
//!     .build()?;
//!
//! let input = MongoStreamInput::new(config);
//! input.connect().await?;
//!
//! let message = input.read().await?;
//! println!("{:?} {:?}", message.meta_get("event"), message.as_json()?);
//!
//! input.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::channel::{delivery_channel, EventReceiver};
use crate::config::MongoStreamConfig;
use crate::driver::{CollectionHandle, Driver, MongoDriver};
use crate::event::Namespace;
use crate::input::{CloseError, ConnectError, ConnectorState, Input, ReadError};
use crate::message::Message;
use crate::metrics;
use crate::pump::{IngestionPump, PumpReport, PumpSources, RunMode};
use crate::source::SourceError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

enum Lifecycle {
    Created,
    Connected {
        handle: Arc<dyn CollectionHandle>,
        pump: JoinHandle<PumpReport>,
    },
    Closed,
}

impl Lifecycle {
    fn state(&self) -> ConnectorState {
        match self {
            Self::Created => ConnectorState::Created,
            Self::Connected { .. } => ConnectorState::Connected,
            Self::Closed => ConnectorState::Closed,
        }
    }
}

/// `MongoDB` snapshot + change stream input.
pub struct MongoStreamInput {
    config: MongoStreamConfig,
    namespace: Namespace,
    driver: Arc<dyn Driver>,
    lifecycle: Mutex<Lifecycle>,
    receiver: Mutex<Option<EventReceiver>>,
    cancel: CancellationToken,
}

impl MongoStreamInput {
    /// Creates an input backed by the `mongodb` driver.
    ///
    /// No connection is made until [`connect`](Input::connect).
    #[must_use]
    pub fn new(config: MongoStreamConfig) -> Self {
        Self::with_driver(config, Arc::new(MongoDriver))
    }

    /// Creates an input backed by a custom [`Driver`].
    #[must_use]
    pub fn with_driver(config: MongoStreamConfig, driver: Arc<dyn Driver>) -> Self {
        let namespace = config.namespace();
        Self {
            config,
            namespace,
            driver,
            lifecycle: Mutex::new(Lifecycle::Created),
            receiver: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the configuration this input was built with.
    #[must_use]
    pub fn config(&self) -> &MongoStreamConfig {
        &self.config
    }

    /// Returns the run mode selected by `stream_snapshot`.
    #[must_use]
    pub fn run_mode(&self) -> RunMode {
        RunMode::from_stream_snapshot(self.config.stream_snapshot)
    }

    /// Returns the current lifecycle state.
    pub async fn state(&self) -> ConnectorState {
        self.lifecycle.lock().await.state()
    }

    /// Opens the sources the pump starts with.
    ///
    /// With `open_tail_before_snapshot` the change stream is opened first so
    /// it covers writes made during the scan.
    async fn open_sources(&self, handle: &dyn CollectionHandle) -> Result<PumpSources, SourceError> {
        match self.run_mode() {
            RunMode::TailOnly => Ok(PumpSources::tail_only(handle.tail().await?)),
            RunMode::SnapshotThenTail if self.config.open_tail_before_snapshot => {
                let tail = handle.tail().await?;
                let snapshot = handle.snapshot().await?;
                Ok(PumpSources {
                    snapshot: Some(snapshot),
                    tail: Some(tail),
                })
            }
            RunMode::SnapshotThenTail => {
                Ok(PumpSources::snapshot_then_tail(handle.snapshot().await?))
            }
        }
    }
}

#[async_trait]
impl Input for MongoStreamInput {
    #[instrument(skip(self), fields(namespace = %self.namespace, mode = %self.run_mode()))]
    async fn connect(&self) -> Result<(), ConnectError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Created) {
            return Err(ConnectError::InvalidState(lifecycle.state()));
        }

        // close() cancels before it takes the lifecycle lock
        let handle = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                info!("Connect abandoned, input closed");
                return Err(ConnectError::InvalidState(ConnectorState::Closed));
            }
            handle = self.driver.connect(&self.config) => handle.map_err(ConnectError::Connection)?,
        };

        let opened = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            sources = self.open_sources(handle.as_ref()) => Some(sources),
        };

        let sources = match opened {
            Some(Ok(sources)) => sources,
            Some(Err(e)) => {
                error!(error = %e, "Failed to open source");
                release(handle.as_ref()).await;
                return Err(ConnectError::Source(e));
            }
            None => {
                info!("Connect abandoned, input closed");
                release(handle.as_ref()).await;
                return Err(ConnectError::InvalidState(ConnectorState::Closed));
            }
        };

        let (sender, receiver) = delivery_channel(self.config.channel_capacity);
        *self.receiver.lock().await = Some(receiver);

        let pump = IngestionPump::new(Arc::clone(&handle), sender, self.cancel.clone());
        let task = tokio::spawn(pump.run(sources));

        *lifecycle = Lifecycle::Connected { handle, pump: task };
        info!("Input connected");
        Ok(())
    }

    async fn read(&self) -> Result<Message, ReadError> {
        let mut guard = self.receiver.lock().await;
        let Some(receiver) = guard.as_mut() else {
            return Err(if self.cancel.is_cancelled() {
                ReadError::EndOfInput
            } else {
                ReadError::NotConnected
            });
        };

        let delivery = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            delivery = receiver.recv() => delivery,
        };

        match delivery {
            Some(Ok(event)) => {
                let message = Message::from_event(&event)?;
                metrics::increment_events_delivered(event.collection_name(), event.action.as_str());
                Ok(message)
            }
            Some(Err(err)) => {
                warn!(error = %err, "Delivering ingestion failure to reader");
                Err(ReadError::Source(err))
            }
            None => Err(ReadError::EndOfInput),
        }
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn close(&self) -> Result<(), CloseError> {
        self.cancel.cancel();

        let mut lifecycle = self.lifecycle.lock().await;
        match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
            Lifecycle::Closed => {
                debug!("Input already closed");
                Ok(())
            }
            Lifecycle::Created => {
                info!("Input closed before connecting");
                Ok(())
            }
            Lifecycle::Connected { handle, pump } => {
                match pump.await {
                    Ok(report) => info!(
                        snapshot_events = report.snapshot_events,
                        tail_events = report.tail_events,
                        outcome = ?report.outcome,
                        "Ingestion pump joined"
                    ),
                    Err(e) => error!(error = ?e, "Ingestion pump panicked"),
                }

                // Discard anything still queued
                self.receiver.lock().await.take();

                handle.disconnect().await.map_err(CloseError::Disconnect)?;
                metrics::set_connector_status(&self.namespace.collection, metrics::ConnectorStatus::Stopped);
                info!("Input closed");
                Ok(())
            }
        }
    }
}

/// Disconnects a handle from an unfinished connect.
async fn release(handle: &dyn CollectionHandle) {
    if let Err(e) = handle.disconnect().await {
        warn!(error = %e, "Failed to release connection after connect error");
    }
}

impl Drop for MongoStreamInput {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

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

//! Pull-based input contract shared with the host framework.
//!
//! The host drives an [`Input`] through `connect`, then repeated `read`
//! calls (one in flight at a time), then `close`. Messages are
//! auto-acknowledged; redelivery, if any, is the host's concern.
//!
//! ```rust,no_run
//! use mongostream_core::input::{Input, ReadError};
//!
//! # async fn drive(input: &dyn Input) -> Result<(), Box<dyn std::error::Error>> {
//! input.connect().await?;
//! loop {
//!     match input.read().await {
//!         Ok(message) => println!("{}", String::from_utf8_lossy(message.as_bytes())),
//!         Err(ReadError::EndOfInput) => break,
//!         Err(e) => return Err(e.into()),
//!     }
//! }
//! input.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::message::Message;
use crate::pump::PumpError;
use crate::source::SourceError;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Lifecycle state of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    /// Configured, no connection yet
    Created,
    /// Connected, ingestion pump started
    Connected,
    /// Terminal
    Closed,
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Connected => f.write_str("connected"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Errors returned by [`Input::connect`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The database could not be reached or refused the credentials
    #[error("Connection failed: {0}")]
    Connection(#[source] SourceError),

    /// The snapshot cursor or change stream could not be opened
    #[error("Failed to open source: {0}")]
    Source(#[source] SourceError),

    /// `connect` was called outside the `Created` state
    #[error("Cannot connect in state {0}")]
    InvalidState(ConnectorState),
}

/// Errors returned by [`Input::read`].
#[derive(Debug, Error)]
pub enum ReadError {
    /// `read` was called before `connect`
    #[error("Input is not connected")]
    NotConnected,

    /// No more messages will be produced
    #[error("End of input")]
    EndOfInput,

    /// The ingestion pump stopped on a fatal error
    #[error("Ingestion failed: {0}")]
    Source(#[from] PumpError),

    /// The event payload could not be encoded
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ReadError {
    /// Returns true for the terminal end-of-input signal.
    #[must_use]
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, Self::EndOfInput)
    }
}

/// Errors returned by [`Input::close`].
#[derive(Debug, Error)]
pub enum CloseError {
    /// Releasing the connection failed
    #[error("Failed to disconnect: {0}")]
    Disconnect(#[source] SourceError),
}

/// A pull-based message input.
#[async_trait]
pub trait Input: Send + Sync {
    /// Establishes the connection and starts producing messages.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] if the connection or the initial source
    /// cannot be established.
    async fn connect(&self) -> Result<(), ConnectError>;

    /// Waits for the next message.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::EndOfInput`] once the input is closed or
    /// exhausted, and [`ReadError::Source`] once if ingestion failed.
    async fn read(&self) -> Result<Message, ReadError>;

    /// Stops production and releases resources. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a [`CloseError`] if the connection could not be released.
    async fn close(&self) -> Result<(), CloseError>;
}

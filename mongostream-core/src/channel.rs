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

//! Delivery channel between the ingestion pump and the reader.
//!
//! Single producer, single consumer, FIFO. Unbounded by default; with a
//! capacity the pump's push becomes a suspension point that still honours
//! cancellation.

use crate::event::CanonicalEvent;
use crate::pump::PumpError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One item on the channel: an event, or the error that stopped the pump.
pub type Delivery = Result<CanonicalEvent, PumpError>;

/// Why a push did not reach the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Cancellation fired while waiting for room
    Cancelled,
    /// The receiving side was dropped
    Disconnected,
}

enum SenderInner {
    Bounded(mpsc::Sender<Delivery>),
    Unbounded(mpsc::UnboundedSender<Delivery>),
}

enum ReceiverInner {
    Bounded(mpsc::Receiver<Delivery>),
    Unbounded(mpsc::UnboundedReceiver<Delivery>),
}

/// Producer half, owned by the ingestion pump.
pub struct EventSender {
    inner: SenderInner,
}

/// Consumer half, owned by the connector's read path.
pub struct EventReceiver {
    inner: ReceiverInner,
}

/// Creates a delivery channel, bounded when `capacity` is set.
#[must_use]
pub fn delivery_channel(capacity: Option<usize>) -> (EventSender, EventReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (
                EventSender {
                    inner: SenderInner::Bounded(tx),
                },
                EventReceiver {
                    inner: ReceiverInner::Bounded(rx),
                },
            )
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                EventSender {
                    inner: SenderInner::Unbounded(tx),
                },
                EventReceiver {
                    inner: ReceiverInner::Unbounded(rx),
                },
            )
        }
    }
}

impl EventSender {
    /// Pushes one item, waiting for room on a bounded channel.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Cancelled`] if `cancel` fires first and
    /// [`SendError::Disconnected`] if the receiver is gone.
    pub async fn send(&self, item: Delivery, cancel: &CancellationToken) -> Result<(), SendError> {
        if cancel.is_cancelled() {
            return Err(SendError::Cancelled);
        }

        match &self.inner {
            SenderInner::Unbounded(tx) => tx.send(item).map_err(|_| SendError::Disconnected),
            SenderInner::Bounded(tx) => tokio::select! {
                biased;
                () = cancel.cancelled() => Err(SendError::Cancelled),
                res = tx.send(item) => res.map_err(|_| SendError::Disconnected),
            },
        }
    }

    /// Returns true once the receiver has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match &self.inner {
            SenderInner::Bounded(tx) => tx.is_closed(),
            SenderInner::Unbounded(tx) => tx.is_closed(),
        }
    }
}

impl EventReceiver {
    /// Waits for the next item. `None` once the pump has dropped its sender
    /// and every queued item was taken.
    pub async fn recv(&mut self) -> Option<Delivery> {
        match &mut self.inner {
            ReceiverInner::Bounded(rx) => rx.recv().await,
            ReceiverInner::Unbounded(rx) => rx.recv().await,
        }
    }
}

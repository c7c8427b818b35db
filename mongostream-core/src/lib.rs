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

//! Mongostream Core - MongoDB change data capture input
//!
//! This crate reads one MongoDB collection as an ordered stream of canonical
//! change events, optionally starting with a full snapshot of the collection,
//! and hands them to a host framework through a pull-based input contract.
//!
//! # Key Components
//!
//! - **Input**: [`input::Input`] (connect / read / close) and its
//!   implementation [`connector::MongoStreamInput`]
//! - **Events**: [`event`] normalizes raw snapshot documents and change
//!   stream envelopes into [`event::CanonicalEvent`]
//! - **Pump**: [`pump::IngestionPump`] drains the snapshot and the change tail
//!   into a [`channel`] on a background task
//! - **Registry**: [`registry::InputRegistry`] builds inputs by name
//!
//! # Example
//!
//! ```rust
//! use mongostream_core::event::{normalize, Action, Namespace};
//! use bson::doc;
//!
//! let ns = Namespace::new("shop", "orders");
//! let event = normalize(
//!     doc! { "operationType": "delete", "documentKey": { "_id": 7 } },
//!     &ns,
//! );
//! assert_eq!(event.action, Action::Delete);
//! assert_eq!(event.payload, bson::Bson::Document(doc! { "_id": 7 }));
//! ```

pub mod channel;
pub mod config;
pub mod connector;
pub mod driver;
pub mod event;
pub mod input;
pub mod message;
pub mod metrics;
pub mod pump;
pub mod registry;
pub mod source;

pub use config::{ConfigError, MongoStreamConfig};
pub use connector::MongoStreamInput;
pub use event::{Action, CanonicalEvent, Namespace};
pub use input::{CloseError, ConnectError, Input, ReadError};
pub use message::Message;
pub use registry::{InputRegistry, MONGODB_STREAM};

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

//! Canonical event representation and the record normalizer.
//!
//! Both read modes of the connector produce raw BSON documents: the snapshot
//! scan yields plain collection documents, the change stream yields change
//! event envelopes. [`normalize`] folds both shapes into a single
//! [`CanonicalEvent`] that flows through the delivery channel.
//!
//! # Examples
//!
//! ```rust
//! use mongostream_core::event::{normalize, Action, Namespace};
//! use bson::{doc, Bson};
//!
//! let ns = Namespace::new("db", "c");
//!
//! // Change stream envelope
//! let event = normalize(
//!     doc! { "operationType": "update", "fullDocument": { "_id": 1, "x": 2 } },
//!     &ns,
//! );
//! assert_eq!(event.action, Action::Update);
//! assert_eq!(event.payload, Bson::Document(doc! { "_id": 1, "x": 2 }));
//!
//! // Plain snapshot document
//! let event = normalize(doc! { "_id": 5, "name": "a" }, &ns);
//! assert!(event.action.is_insert());
//! assert_eq!(event.database_name(), "db");
//! ```

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field that marks a raw record as a change stream envelope.
pub const OPERATION_TYPE_FIELD: &str = "operationType";

/// Envelope field holding the deleted document's identifying key.
pub const DOCUMENT_KEY_FIELD: &str = "documentKey";

/// Envelope field holding the post-change document body.
pub const FULL_DOCUMENT_FIELD: &str = "fullDocument";

/// Action carried by a canonical event.
///
/// The four data operations get their own variants. Any other operation type
/// reported by the server (`drop`, `rename`, `invalidate`, or types added by
/// newer `MongoDB` versions) is passed through verbatim in [`Action::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// A document was inserted, or read by the snapshot scan
    Insert,

    /// A document was updated in place
    Update,

    /// A document was replaced entirely
    Replace,

    /// A document was deleted
    Delete,

    /// Any other operation type, kept as reported
    #[serde(untagged)]
    Other(String),
}

impl Action {
    /// Parses an operation type string as reported by a change stream.
    #[must_use]
    pub fn from_operation_type(op: &str) -> Self {
        match op {
            "insert" => Self::Insert,
            "update" => Self::Update,
            "replace" => Self::Replace,
            "delete" => Self::Delete,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the action as the string the host sees in the `event` metadata.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Other(op) => op,
        }
    }

    /// Returns true for insert actions, including snapshot documents.
    #[inline]
    #[must_use]
    pub fn is_insert(&self) -> bool {
        matches!(self, Self::Insert)
    }

    /// Returns true for delete actions.
    #[inline]
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }

    /// Returns true if this action was not one of the known data operations.
    #[inline]
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `MongoDB` namespace (database + collection).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    /// Database name
    pub database: String,

    /// Collection name
    pub collection: String,
}

impl Namespace {
    /// Creates a new namespace from database and collection names.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Returns the fully qualified namespace as "database.collection".
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// The normalized unit flowing from the ingestion pump to the reader.
///
/// `namespace` always comes from the connector configuration, never from the
/// raw record. `payload` is selected from the raw record as-is:
///
/// | raw record                    | `payload`          |
/// |-------------------------------|--------------------|
/// | plain document                | the document       |
/// | envelope, `delete`            | `documentKey`      |
/// | envelope, any other operation | `fullDocument`     |
///
/// A missing sub-record yields [`Bson::Null`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// What happened to the document
    pub action: Action,

    /// Configured database and collection
    pub namespace: Namespace,

    /// Selected document body
    pub payload: Bson,
}

impl CanonicalEvent {
    /// Returns the database name.
    #[inline]
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.namespace.database
    }

    /// Returns the collection name.
    #[inline]
    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.namespace.collection
    }

    /// Returns the payload as a document, if it is one.
    #[must_use]
    pub fn payload_document(&self) -> Option<&Document> {
        self.payload.as_document()
    }

    /// Returns the `_id` of the payload, if present.
    ///
    /// For deletes this is the `_id` from the document key.
    #[must_use]
    pub fn document_id(&self) -> Option<&Bson> {
        self.payload_document()?.get("_id")
    }
}

/// Folds a raw record into a [`CanonicalEvent`].
///
/// Never fails: a record without `operationType` is a snapshot document and
/// becomes an `insert` of itself; an envelope whose selected sub-record is
/// missing carries a `Null` payload.
#[must_use]
pub fn normalize(mut raw: Document, namespace: &Namespace) -> CanonicalEvent {
    let Some(operation) = raw.remove(OPERATION_TYPE_FIELD) else {
        return CanonicalEvent {
            action: Action::Insert,
            namespace: namespace.clone(),
            payload: Bson::Document(raw),
        };
    };

    let action = match operation {
        Bson::String(op) => Action::from_operation_type(&op),
        other => Action::Other(other.to_string()),
    };

    let field = if action.is_delete() {
        DOCUMENT_KEY_FIELD
    } else {
        FULL_DOCUMENT_FIELD
    };

    CanonicalEvent {
        action,
        namespace: namespace.clone(),
        payload: raw.remove(field).unwrap_or(Bson::Null),
    }
}

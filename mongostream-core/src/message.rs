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

//! Host message envelope.
//!
//! Each [`CanonicalEvent`] leaves the connector as a [`Message`]: the payload
//! encoded as relaxed Extended JSON bytes, plus three metadata entries naming
//! the collection, the database and the action.

use crate::event::CanonicalEvent;
use std::collections::BTreeMap;

/// Metadata key holding the collection name.
pub const META_TABLE: &str = "table";

/// Metadata key holding the database name.
pub const META_SCHEMA: &str = "schema";

/// Metadata key holding the event action.
pub const META_EVENT: &str = "event";

/// A message handed to the host framework by [`Input::read`](crate::input::Input::read).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    payload: Vec<u8>,
    metadata: BTreeMap<String, String>,
}

impl Message {
    /// Creates a message with the given body and no metadata.
    #[must_use]
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            metadata: BTreeMap::new(),
        }
    }

    /// Encodes a canonical event into a message.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if the payload cannot be rendered as JSON.
    pub fn from_event(event: &CanonicalEvent) -> Result<Self, serde_json::Error> {
        let json = event.payload.clone().into_relaxed_extjson();
        let mut message = Self::new(serde_json::to_vec(&json)?);

        message.meta_set(META_TABLE, event.collection_name());
        message.meta_set(META_SCHEMA, event.database_name());
        message.meta_set(META_EVENT, event.action.as_str());

        Ok(message)
    }

    /// Returns the raw message body.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the message, returning the body.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.payload
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON.
    pub fn as_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Sets a metadata entry, replacing any previous value.
    pub fn meta_set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Returns a metadata value.
    #[must_use]
    pub fn meta_get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Iterates over all metadata entries in key order.
    pub fn metadata(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{normalize, Namespace};
    use bson::{doc, oid::ObjectId};
    use serde_json::json;

    #[test]
    fn test_message_from_update_event() {
        let event = normalize(
            doc! { "operationType": "update", "fullDocument": { "_id": 1, "x": 2 } },
            &Namespace::new("db", "c"),
        );

        let message = Message::from_event(&event).unwrap();

        assert_eq!(message.as_json().unwrap(), json!({ "_id": 1, "x": 2 }));
        assert_eq!(message.meta_get(META_TABLE), Some("c"));
        assert_eq!(message.meta_get(META_SCHEMA), Some("db"));
        assert_eq!(message.meta_get(META_EVENT), Some("update"));
        assert_eq!(message.metadata().count(), 3);
    }

    #[test]
    fn test_object_id_uses_extended_json() {
        let oid = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
        let event = normalize(doc! { "_id": oid }, &Namespace::new("db", "c"));

        let message = Message::from_event(&event).unwrap();

        assert_eq!(
            message.as_json().unwrap(),
            json!({ "_id": { "$oid": "65a1b2c3d4e5f60718293a4b" } })
        );
    }

    #[test]
    fn test_null_payload_encodes_as_json_null() {
        let event = normalize(doc! { "operationType": "drop" }, &Namespace::new("db", "c"));
        let message = Message::from_event(&event).unwrap();

        assert_eq!(message.as_bytes(), b"null");
        assert_eq!(message.meta_get(META_EVENT), Some("drop"));
    }
}

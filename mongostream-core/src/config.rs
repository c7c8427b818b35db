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

//! Connector configuration.
//!
//! [`MongoStreamConfig`] is built either with [`MongoStreamConfig::builder`]
//! or deserialized from a host-provided value with
//! [`MongoStreamConfig::from_value`]. Both paths run [`MongoStreamConfig::validate`].
//!
//! ```rust
//! use mongostream_core::config::MongoStreamConfig;
//!
//! let config = MongoStreamConfig::builder()
//!     .uri("mongodb://localhost:27017")
//!     .database("shop")
//!     .collection("orders")
//!     .stream_snapshot(true)
//!     .build()
//!     .unwrap();
//!
//! assert!(config.stream_snapshot);
//! assert_eq!(config.namespace().full_name(), "shop.orders");
//! ```

use crate::event::Namespace;
use serde::Deserialize;
use thiserror::Error;

/// Characters `MongoDB` rejects in database names.
const INVALID_DATABASE_CHARS: &[char] = &['/', '\\', '.', ' ', '"', '$'];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not provided
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A field was provided but is not acceptable
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// The host-provided value could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Configuration of a `mongodb_stream` input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MongoStreamConfig {
    /// `MongoDB` connection string
    pub uri: String,

    /// Database holding the collection
    pub database: String,

    /// Collection to capture
    pub collection: String,

    /// Snapshot the collection before tailing its change stream
    pub stream_snapshot: bool,

    /// Open the change stream before the snapshot scan starts
    ///
    /// Only meaningful with `stream_snapshot`. Writes that land during the
    /// scan are then delivered after the snapshot instead of being lost, at
    /// the cost of possible duplicates.
    #[serde(default)]
    pub open_tail_before_snapshot: bool,

    /// Cursor batch size for both the scan and the change stream
    #[serde(default)]
    pub batch_size: Option<u32>,

    /// Bound of the delivery channel (unbounded when unset)
    #[serde(default)]
    pub channel_capacity: Option<usize>,
}

impl MongoStreamConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> MongoStreamConfigBuilder {
        MongoStreamConfigBuilder::default()
    }

    /// Parses and validates a host-provided configuration value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for missing or mistyped fields and the
    /// validation errors of [`validate`](Self::validate).
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the configured namespace.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        Namespace::new(&self.database, &self.collection)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `uri` does not use the `mongodb://` or `mongodb+srv://` scheme
    /// - `database` is empty or contains a character `MongoDB` rejects
    /// - `collection` is empty, contains `$` or targets a `system.` collection
    /// - `batch_size` or `channel_capacity` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.is_empty() {
            return Err(ConfigError::MissingField("uri"));
        }
        if !self.uri.starts_with("mongodb://") && !self.uri.starts_with("mongodb+srv://") {
            return Err(ConfigError::invalid(
                "uri",
                "must start with mongodb:// or mongodb+srv://",
            ));
        }

        if self.database.is_empty() {
            return Err(ConfigError::MissingField("database"));
        }
        if let Some(c) = self.database.chars().find(|c| INVALID_DATABASE_CHARS.contains(c)) {
            return Err(ConfigError::invalid(
                "database",
                format!("contains forbidden character {c:?}"),
            ));
        }

        if self.collection.is_empty() {
            return Err(ConfigError::MissingField("collection"));
        }
        if self.collection.contains('$') {
            return Err(ConfigError::invalid("collection", "must not contain '$'"));
        }
        if self.collection.starts_with("system.") {
            return Err(ConfigError::invalid(
                "collection",
                "system collections cannot be captured",
            ));
        }

        if self.batch_size == Some(0) {
            return Err(ConfigError::invalid("batch_size", "must be greater than 0"));
        }
        if self.channel_capacity == Some(0) {
            return Err(ConfigError::invalid(
                "channel_capacity",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Builder for [`MongoStreamConfig`].
#[derive(Debug, Default)]
pub struct MongoStreamConfigBuilder {
    uri: Option<String>,
    database: Option<String>,
    collection: Option<String>,
    stream_snapshot: bool,
    open_tail_before_snapshot: bool,
    batch_size: Option<u32>,
    channel_capacity: Option<usize>,
}

impl MongoStreamConfigBuilder {
    /// Sets the `MongoDB` connection string.
    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the collection name.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Selects snapshot-then-tail (`true`) or tail-only (`false`).
    ///
    /// Default: tail-only
    #[must_use]
    pub fn stream_snapshot(mut self, enabled: bool) -> Self {
        self.stream_snapshot = enabled;
        self
    }

    /// Opens the change stream before the snapshot scan.
    #[must_use]
    pub fn open_tail_before_snapshot(mut self, enabled: bool) -> Self {
        self.open_tail_before_snapshot = enabled;
        self
    }

    /// Sets the cursor batch size.
    #[must_use]
    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Bounds the delivery channel.
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if `uri`, `database` or
    /// `collection` was not set, and any error from
    /// [`MongoStreamConfig::validate`].
    pub fn build(self) -> Result<MongoStreamConfig, ConfigError> {
        let config = MongoStreamConfig {
            uri: self.uri.ok_or(ConfigError::MissingField("uri"))?,
            database: self.database.ok_or(ConfigError::MissingField("database"))?,
            collection: self
                .collection
                .ok_or(ConfigError::MissingField("collection"))?,
            stream_snapshot: self.stream_snapshot,
            open_tail_before_snapshot: self.open_tail_before_snapshot,
            batch_size: self.batch_size,
            channel_capacity: self.channel_capacity,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> MongoStreamConfigBuilder {
        MongoStreamConfig::builder()
            .uri("mongodb://localhost:27017")
            .database("db")
            .collection("c")
    }

    #[test]
    fn test_builder_defaults() {
        let config = builder().build().unwrap();

        assert!(!config.stream_snapshot);
        assert!(!config.open_tail_before_snapshot);
        assert_eq!(config.batch_size, None);
        assert_eq!(config.channel_capacity, None);
        assert_eq!(config.namespace(), Namespace::new("db", "c"));
    }

    #[test]
    fn test_builder_missing_fields() {
        let err = MongoStreamConfig::builder()
            .database("db")
            .collection("c")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("uri")));

        let err = MongoStreamConfig::builder()
            .uri("mongodb://localhost")
            .collection("c")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("database")));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let err = builder().uri("postgres://localhost").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "uri", .. }));

        let err = builder().database("my.db").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "database", .. }));

        let err = builder().collection("system.views").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "collection", .. }));

        let err = builder().batch_size(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "batch_size", .. }));

        let err = builder().channel_capacity(0).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "channel_capacity",
                ..
            }
        ));
    }

    #[test]
    fn test_srv_uri_is_accepted() {
        let config = builder().uri("mongodb+srv://cluster0.example.net").build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_from_value() {
        let config = MongoStreamConfig::from_value(json!({
            "uri": "mongodb://localhost:27017",
            "database": "db",
            "collection": "c",
            "stream_snapshot": true,
            "channel_capacity": 16,
        }))
        .unwrap();

        assert!(config.stream_snapshot);
        assert_eq!(config.channel_capacity, Some(16));
        assert!(!config.open_tail_before_snapshot);
    }

    #[test]
    fn test_from_value_requires_stream_snapshot() {
        let err = MongoStreamConfig::from_value(json!({
            "uri": "mongodb://localhost:27017",
            "database": "db",
            "collection": "c",
        }))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_value_rejects_unknown_fields() {
        let err = MongoStreamConfig::from_value(json!({
            "uri": "mongodb://localhost:27017",
            "database": "db",
            "collection": "c",
            "stream_snapshot": false,
            "resume_token": "abc",
        }))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

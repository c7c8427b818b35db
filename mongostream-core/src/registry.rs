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

//! Named input registry.
//!
//! The host keeps one [`InputRegistry`] and builds inputs from configuration
//! values by name. [`register_mongodb_stream`] adds the `mongodb_stream`
//! input.
//!
//! ```rust
//! use mongostream_core::registry::{self, InputRegistry, MONGODB_STREAM};
//! use serde_json::json;
//!
//! let mut registry = InputRegistry::new();
//! registry::register_mongodb_stream(&mut registry).unwrap();
//!
//! let input = registry
//!     .build(
//!         MONGODB_STREAM,
//!         json!({
//!             "uri": "mongodb://localhost:27017",
//!             "database": "shop",
//!             "collection": "orders",
//!             "stream_snapshot": false
//!         }),
//!     )
//!     .unwrap();
//! # drop(input);
//! ```

use crate::config::{ConfigError, MongoStreamConfig};
use crate::connector::MongoStreamInput;
use crate::driver::{Driver, MongoDriver};
use crate::input::Input;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Registered name of the `MongoDB` input.
pub const MONGODB_STREAM: &str = "mongodb_stream";

const MONGODB_STREAM_SUMMARY: &str =
    "Reads a MongoDB collection as a stream of change events, optionally starting with a full snapshot.";

/// Errors returned by [`InputRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An input with this name is already registered
    #[error("Input '{0}' is already registered")]
    Duplicate(String),

    /// No input with this name is registered
    #[error("Unknown input '{0}'")]
    Unknown(String),

    /// The configuration value was rejected
    #[error("Invalid configuration for input '{name}': {source}")]
    Config {
        name: String,
        #[source]
        source: ConfigError,
    },
}

type Constructor = Box<dyn Fn(serde_json::Value) -> Result<Box<dyn Input>, ConfigError> + Send + Sync>;

struct Registration {
    summary: String,
    constructor: Constructor,
}

/// Name-keyed collection of input constructors.
#[derive(Default)]
pub struct InputRegistry {
    inputs: HashMap<String, Registration>,
}

impl InputRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if `name` is taken.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        summary: impl Into<String>,
        constructor: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(serde_json::Value) -> Result<Box<dyn Input>, ConfigError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.inputs.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        debug!(input = %name, "Registering input");
        self.inputs.insert(
            name,
            Registration {
                summary: summary.into(),
                constructor: Box::new(constructor),
            },
        );
        Ok(())
    }

    /// Builds the input registered as `name` from a configuration value.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unknown`] for an unregistered name and
    /// [`RegistryError::Config`] if the constructor rejects the value.
    pub fn build(&self, name: &str, config: serde_json::Value) -> Result<Box<dyn Input>, RegistryError> {
        let registration = self
            .inputs
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;

        (registration.constructor)(config).map_err(|source| RegistryError::Config {
            name: name.to_string(),
            source,
        })
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inputs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the one-line summary registered for `name`.
    #[must_use]
    pub fn summary(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).map(|r| r.summary.as_str())
    }
}

/// Registers the `mongodb_stream` input backed by the `mongodb` driver.
///
/// # Errors
///
/// Returns [`RegistryError::Duplicate`] if already registered.
pub fn register_mongodb_stream(registry: &mut InputRegistry) -> Result<(), RegistryError> {
    register_mongodb_stream_with_driver(registry, Arc::new(MongoDriver))
}

/// Registers the `mongodb_stream` input with a custom [`Driver`].
///
/// # Errors
///
/// Returns [`RegistryError::Duplicate`] if already registered.
pub fn register_mongodb_stream_with_driver(
    registry: &mut InputRegistry,
    driver: Arc<dyn Driver>,
) -> Result<(), RegistryError> {
    registry.register(MONGODB_STREAM, MONGODB_STREAM_SUMMARY, move |value| {
        let config = MongoStreamConfig::from_value(value)?;
        let input: Box<dyn Input> =
            Box::new(MongoStreamInput::with_driver(config, Arc::clone(&driver)));
        Ok(input)
    })
}

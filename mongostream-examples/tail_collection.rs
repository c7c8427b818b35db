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

//! Tail a collection and print every message
//!
//! Builds the `mongodb_stream` input through the registry, the way a host
//! framework would, and prints each message with its metadata until Ctrl+C.
//!
//! To run this example:
//! ```bash
//! # MongoDB must run as a replica set for change streams
//! MONGODB_URI="mongodb://localhost:27017/?directConnection=true" \
//! MONGODB_DATABASE=shop MONGODB_COLLECTION=orders STREAM_SNAPSHOT=true \
//!     cargo run --package mongostream-core --example tail_collection
//! ```

use mongostream_core::input::{Input, ReadError};
use mongostream_core::message::{META_EVENT, META_SCHEMA, META_TABLE};
use mongostream_core::registry::{self, InputRegistry, MONGODB_STREAM};
use serde_json::json;
use std::error::Error;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,mongostream_core=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let mut registry = InputRegistry::new();
    registry::register_mongodb_stream(&mut registry)?;

    let config = json!({
        "uri": env_or("MONGODB_URI", "mongodb://localhost:27017/?directConnection=true"),
        "database": env_or("MONGODB_DATABASE", "mongostream_examples"),
        "collection": env_or("MONGODB_COLLECTION", "events"),
        "stream_snapshot": env_or("STREAM_SNAPSHOT", "true") == "true",
    });

    let input = registry.build(MONGODB_STREAM, config)?;
    input.connect().await?;
    info!("Connected, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            result = input.read() => match result {
                Ok(message) => {
                    println!(
                        "[{}.{}] {}: {}",
                        message.meta_get(META_SCHEMA).unwrap_or("?"),
                        message.meta_get(META_TABLE).unwrap_or("?"),
                        message.meta_get(META_EVENT).unwrap_or("?"),
                        String::from_utf8_lossy(message.as_bytes()),
                    );
                }
                Err(ReadError::EndOfInput) => {
                    warn!("Input ended");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Ingestion failed");
                    break;
                }
            },
        }
    }

    input.close().await?;
    info!("Input closed");
    Ok(())
}

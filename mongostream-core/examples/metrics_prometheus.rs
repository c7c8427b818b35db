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

//! Prometheus Metrics Exporter Example
//!
//! Exposes the input's metrics to Prometheus while draining a collection.
//!
//! # Running the Example
//!
//! ```bash
//! MONGODB_URI="mongodb://localhost:27017/?directConnection=true" \
//!     cargo run --package mongostream-core --example metrics_prometheus
//! ```
//!
//! # Viewing Metrics
//!
//! ```bash
//! curl http://localhost:9000/metrics
//! ```
//!
//! # Prometheus Configuration
//!
//! ```yaml
//! scrape_configs:
//!   - job_name: 'mongostream'
//!     static_configs:
//!       - targets: ['localhost:9000']
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use mongostream_core::config::MongoStreamConfig;
use mongostream_core::connector::MongoStreamInput;
use mongostream_core::input::{Input, ReadError};
use mongostream_core::metrics;
use std::error::Error;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let prometheus_addr: SocketAddr = ([0, 0, 0, 0], 9000).into();
    PrometheusBuilder::new()
        .with_http_listener(prometheus_addr)
        .install()?;
    metrics::init_metrics();
    info!(addr = %prometheus_addr, "Prometheus exporter listening");

    let config = MongoStreamConfig::builder()
        .uri(
            std::env::var("MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017/?directConnection=true".to_string()),
        )
        .database("mongostream_examples")
        .collection("events")
        .stream_snapshot(true)
        .batch_size(500)
        .channel_capacity(1024)
        .build()?;

    let input = MongoStreamInput::new(config);
    input.connect().await?;

    let mut delivered: u64 = 0;
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            result = input.read() => match result {
                Ok(_) => {
                    delivered += 1;
                    if delivered % 1000 == 0 {
                        info!(delivered, "Progress");
                    }
                }
                Err(ReadError::EndOfInput) => break,
                Err(e) => {
                    error!(error = %e, "Ingestion failed");
                    break;
                }
            },
        }
    }

    input.close().await?;
    info!(delivered, "Done");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mongostream_core=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .with_line_number(true)
        .init();
}

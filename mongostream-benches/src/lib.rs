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

//! Fixtures shared by the benchmarks.

use async_trait::async_trait;
use bson::{doc, Document};
use mongostream_core::config::MongoStreamConfig;
use mongostream_core::driver::{CollectionHandle, Driver};
use mongostream_core::event::Namespace;
use mongostream_core::source::{RecordSource, SourceError, SourceKind};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Plain collection documents, as a snapshot scan yields them.
#[must_use]
pub fn sample_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            doc! {
                "_id": i as i64,
                "user_id": format!("user_{}", i % 1000),
                "value": i as i32,
                "metadata": {
                    "source": "benchmark",
                    "version": "1.0.0",
                },
            }
        })
        .collect()
}

/// Change stream envelopes cycling through insert, update and delete.
#[must_use]
pub fn sample_envelopes(count: usize) -> Vec<Document> {
    sample_documents(count)
        .into_iter()
        .enumerate()
        .map(|(i, full)| {
            let key = doc! { "_id": i as i64 };
            match i % 3 {
                0 => doc! { "operationType": "insert", "fullDocument": full, "documentKey": key },
                1 => doc! { "operationType": "update", "fullDocument": full, "documentKey": key },
                _ => doc! { "operationType": "delete", "documentKey": key },
            }
        })
        .collect()
}

/// [`Driver`] serving fixed documents: a snapshot scan and a change stream
/// that ends after its envelopes.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    snapshot: Arc<Vec<Document>>,
    tail: Arc<Vec<Document>>,
}

impl MemoryDriver {
    #[must_use]
    pub fn new(snapshot: Vec<Document>, tail: Vec<Document>) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            tail: Arc::new(tail),
        }
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn connect(
        &self,
        config: &MongoStreamConfig,
    ) -> Result<Arc<dyn CollectionHandle>, SourceError> {
        Ok(Arc::new(MemoryHandle {
            namespace: config.namespace(),
            driver: self.clone(),
        }))
    }
}

struct MemoryHandle {
    namespace: Namespace,
    driver: MemoryDriver,
}

#[async_trait]
impl CollectionHandle for MemoryHandle {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn snapshot(&self) -> Result<Box<dyn RecordSource>, SourceError> {
        Ok(Box::new(MemorySource::new(
            SourceKind::Snapshot,
            Arc::clone(&self.driver.snapshot),
        )))
    }

    async fn tail(&self) -> Result<Box<dyn RecordSource>, SourceError> {
        Ok(Box::new(MemorySource::new(
            SourceKind::Tail,
            Arc::clone(&self.driver.tail),
        )))
    }

    async fn disconnect(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

struct MemorySource {
    kind: SourceKind,
    records: Arc<Vec<Document>>,
    position: usize,
}

impl MemorySource {
    fn new(kind: SourceKind, records: Arc<Vec<Document>>) -> Self {
        Self {
            kind,
            records,
            position: 0,
        }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Document>, SourceError> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let record = self.records.get(self.position).cloned();
        self.position += 1;
        Ok(record)
    }

    async fn close(&mut self) {
        self.position = self.records.len();
    }
}

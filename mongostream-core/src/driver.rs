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

//! Database collaborator seam.
//!
//! The connector never talks to the `mongodb` crate directly. It asks a
//! [`Driver`] for a [`CollectionHandle`] and opens its record sources through
//! that handle. [`MongoDriver`] is the production implementation; tests
//! substitute in-memory drivers.

use crate::config::MongoStreamConfig;
use crate::event::Namespace;
use crate::source::{ChangeTail, RecordSource, SnapshotCursor, SourceError};
use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::{Client, Collection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Establishes connections to the database.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Connects to the collection named by `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] for URI, authentication or network failures.
    async fn connect(
        &self,
        config: &MongoStreamConfig,
    ) -> Result<Arc<dyn CollectionHandle>, SourceError>;
}

/// A live connection scoped to one collection.
///
/// Owned by the connector; the ingestion pump borrows it to open the change
/// tail once a snapshot completes.
#[async_trait]
pub trait CollectionHandle: Send + Sync {
    /// Namespace this handle is bound to.
    fn namespace(&self) -> &Namespace;

    /// Opens a full-collection scan.
    async fn snapshot(&self) -> Result<Box<dyn RecordSource>, SourceError>;

    /// Opens a change stream with full-document lookup.
    async fn tail(&self) -> Result<Box<dyn RecordSource>, SourceError>;

    /// Releases the connection. Idempotent.
    ///
    /// Every source opened through this handle must be dropped first.
    async fn disconnect(&self) -> Result<(), SourceError>;
}

/// [`Driver`] backed by the official `mongodb` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDriver;

#[async_trait]
impl Driver for MongoDriver {
    async fn connect(
        &self,
        config: &MongoStreamConfig,
    ) -> Result<Arc<dyn CollectionHandle>, SourceError> {
        let client = Client::with_uri_str(&config.uri).await?;

        // The client connects lazily; ping so bad hosts and credentials fail here
        client
            .database(&config.database)
            .run_command(doc! { "ping": 1 })
            .await?;

        info!(database = %config.database, collection = %config.collection, "Connected to MongoDB");

        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        Ok(Arc::new(MongoCollectionHandle {
            namespace: config.namespace(),
            client,
            collection,
            batch_size: config.batch_size,
            disconnected: AtomicBool::new(false),
        }))
    }
}

/// [`CollectionHandle`] over a `mongodb::Client`.
pub struct MongoCollectionHandle {
    namespace: Namespace,
    client: Client,
    collection: Collection<Document>,
    batch_size: Option<u32>,
    disconnected: AtomicBool,
}

#[async_trait]
impl CollectionHandle for MongoCollectionHandle {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn snapshot(&self) -> Result<Box<dyn RecordSource>, SourceError> {
        let cursor = SnapshotCursor::open(&self.collection, self.batch_size).await?;
        Ok(Box::new(cursor))
    }

    async fn tail(&self) -> Result<Box<dyn RecordSource>, SourceError> {
        let tail = ChangeTail::open(&self.collection, self.batch_size).await?;
        Ok(Box::new(tail))
    }

    async fn disconnect(&self) -> Result<(), SourceError> {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            debug!("Client already disconnected");
            return Ok(());
        }

        self.client.clone().shutdown().await;
        info!(namespace = %self.namespace, "Disconnected from MongoDB");
        Ok(())
    }
}

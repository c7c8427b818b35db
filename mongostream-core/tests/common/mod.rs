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

//! In-memory driver shared by the connector and registry tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bson::{doc, Document};
use mongostream_core::config::MongoStreamConfig;
use mongostream_core::driver::{CollectionHandle, Driver};
use mongostream_core::event::Namespace;
use mongostream_core::source::{RecordSource, SourceError, SourceKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// One scripted change stream step.
#[derive(Debug, Clone)]
pub enum Step {
    Record(Document),
    Fail(String),
}

pub fn insert(id: i32) -> Step {
    Step::Record(doc! {
        "operationType": "insert",
        "fullDocument": { "_id": id },
        "documentKey": { "_id": id },
    })
}

pub fn update(id: i32, field: &str, value: &str) -> Step {
    Step::Record(doc! {
        "operationType": "update",
        "fullDocument": { "_id": id, field: value },
        "documentKey": { "_id": id },
    })
}

pub fn delete(id: i32) -> Step {
    Step::Record(doc! {
        "operationType": "delete",
        "documentKey": { "_id": id },
    })
}

/// Shared state observed by tests.
#[derive(Default)]
pub struct FakeState {
    snapshot: Vec<Document>,
    tail: Vec<Step>,
    tail_ends: bool,
    hang_connect: bool,
    hang_snapshot: bool,
    fail_connect: bool,
    fail_snapshot: bool,
    fail_tail: bool,
    opened: Mutex<Vec<SourceKind>>,
    live_sources: AtomicUsize,
    live_at_disconnect: Mutex<Option<usize>>,
    disconnects: AtomicUsize,
    connects: AtomicUsize,
}

impl FakeState {
    pub fn opened(&self) -> Vec<SourceKind> {
        self.opened.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Sources still alive when the connection was released.
    pub fn live_at_disconnect(&self) -> Option<usize> {
        *self.live_at_disconnect.lock().unwrap()
    }
}

/// Builder for an in-memory [`Driver`].
#[derive(Default)]
pub struct FakeDriver {
    state: FakeState,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(mut self, docs: Vec<Document>) -> Self {
        self.state.snapshot = docs;
        self
    }

    /// Steps the change stream yields before going idle.
    pub fn tail(mut self, steps: Vec<Step>) -> Self {
        self.state.tail = steps;
        self
    }

    /// Has the server end the change stream after its steps instead of
    /// idling, as it does after an `invalidate`.
    pub fn tail_ends(mut self) -> Self {
        self.state.tail_ends = true;
        self
    }

    /// Connecting never completes.
    pub fn hang_connect(mut self) -> Self {
        self.state.hang_connect = true;
        self
    }

    /// Opening the snapshot cursor never completes.
    pub fn hang_snapshot(mut self) -> Self {
        self.state.hang_snapshot = true;
        self
    }

    pub fn fail_connect(mut self) -> Self {
        self.state.fail_connect = true;
        self
    }

    pub fn fail_snapshot(mut self) -> Self {
        self.state.fail_snapshot = true;
        self
    }

    pub fn fail_tail(mut self) -> Self {
        self.state.fail_tail = true;
        self
    }

    pub fn build(self) -> (Arc<dyn Driver>, Arc<FakeState>) {
        let state = Arc::new(self.state);
        (
            Arc::new(SharedDriver {
                state: Arc::clone(&state),
            }),
            state,
        )
    }
}

struct SharedDriver {
    state: Arc<FakeState>,
}

#[async_trait]
impl Driver for SharedDriver {
    async fn connect(
        &self,
        config: &MongoStreamConfig,
    ) -> Result<Arc<dyn CollectionHandle>, SourceError> {
        if self.state.hang_connect {
            std::future::pending::<()>().await;
        }
        if self.state.fail_connect {
            return Err(SourceError::Authentication("bad credentials".into()));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(FakeHandle {
            namespace: config.namespace(),
            state: Arc::clone(&self.state),
            disconnected: AtomicBool::new(false),
        }))
    }
}

struct FakeHandle {
    namespace: Namespace,
    state: Arc<FakeState>,
    disconnected: AtomicBool,
}

impl FakeHandle {
    fn open(&self, kind: SourceKind, steps: Vec<Step>, idle: bool) -> Box<dyn RecordSource> {
        self.state.opened.lock().unwrap().push(kind);
        self.state.live_sources.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeSource {
            kind,
            steps: steps.into(),
            idle,
            state: Arc::clone(&self.state),
        })
    }
}

#[async_trait]
impl CollectionHandle for FakeHandle {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn snapshot(&self) -> Result<Box<dyn RecordSource>, SourceError> {
        if self.state.hang_snapshot {
            std::future::pending::<()>().await;
        }
        if self.state.fail_snapshot {
            return Err(SourceError::Authentication("find not authorized".into()));
        }
        let steps = self.state.snapshot.iter().cloned().map(Step::Record).collect();
        Ok(self.open(SourceKind::Snapshot, steps, false))
    }

    async fn tail(&self) -> Result<Box<dyn RecordSource>, SourceError> {
        if self.state.fail_tail {
            return Err(SourceError::InvalidSettings(
                "change streams require a replica set".into(),
            ));
        }
        let steps = self.state.tail.clone();
        Ok(self.open(SourceKind::Tail, steps, !self.state.tail_ends))
    }

    async fn disconnect(&self) -> Result<(), SourceError> {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        *self.state.live_at_disconnect.lock().unwrap() =
            Some(self.state.live_sources.load(Ordering::SeqCst));
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeSource {
    kind: SourceKind,
    steps: VecDeque<Step>,
    idle: bool,
    state: Arc<FakeState>,
}

#[async_trait]
impl RecordSource for FakeSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Document>, SourceError> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        match self.steps.pop_front() {
            Some(Step::Record(doc)) => Ok(Some(doc)),
            Some(Step::Fail(reason)) => Err(SourceError::Decode(reason)),
            None if self.idle => {
                cancel.cancelled().await;
                Ok(None)
            }
            None if self.kind == SourceKind::Tail => Err(SourceError::StreamEnded),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.steps.clear();
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.state.live_sources.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn config(stream_snapshot: bool) -> MongoStreamConfig {
    MongoStreamConfig::builder()
        .uri("mongodb://localhost:27017")
        .database("shop")
        .collection("orders")
        .stream_snapshot(stream_snapshot)
        .build()
        .unwrap()
}

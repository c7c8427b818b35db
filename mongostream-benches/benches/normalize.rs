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

//! Normalization and Encoding Benchmarks
//!
//! Measures the per-record cost on the hot path:
//! - Normalizing snapshot documents and change stream envelopes
//! - Encoding canonical events into host messages
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench --package mongostream-benches --bench normalize
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mongostream_benches::{sample_documents, sample_envelopes};
use mongostream_core::event::{normalize, Namespace};
use mongostream_core::message::Message;

fn bench_normalize(c: &mut Criterion) {
    let namespace = Namespace::new("bench_db", "events");
    let mut group = c.benchmark_group("normalize");

    for count in [100, 1000, 10000].iter() {
        let documents = sample_documents(*count);
        let envelopes = sample_envelopes(*count);
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::new("snapshot", count), &documents, |b, docs| {
            b.iter(|| {
                for doc in docs.iter().cloned() {
                    black_box(normalize(doc, &namespace));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("envelope", count), &envelopes, |b, docs| {
            b.iter(|| {
                for doc in docs.iter().cloned() {
                    black_box(normalize(doc, &namespace));
                }
            });
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let namespace = Namespace::new("bench_db", "events");
    let mut group = c.benchmark_group("encode_message");

    for count in [100, 1000].iter() {
        let events: Vec<_> = sample_envelopes(*count)
            .into_iter()
            .map(|doc| normalize(doc, &namespace))
            .collect();
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &events, |b, events| {
            b.iter(|| {
                for event in events {
                    black_box(Message::from_event(event).unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_encode);
criterion_main!(benches);

// Copyright 2025 Shoal Authors
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

//! # Shoal Metrics
//!
//! Process-wide request metrics for the shoal worker pool.
//!
//! The pool records one [`RequestRecord`] per completed dispatch into a
//! [`RequestRegistry`], which keeps a bounded rolling window of recent
//! records plus cumulative counters. Readers take a [`RequestMetrics`]
//! snapshot: totals, success rate, response-time aggregates, and a
//! requests-per-second rate computed over the time span of the retained
//! window.
//!
//! The registry can be constructed disabled, in which case recording is a
//! no-op and snapshots report zeros. This lets the pool wire metrics
//! unconditionally and gate the cost with a single config flag.

pub mod registry;
pub mod snapshot;

pub use registry::{RequestRecord, RequestRegistry};
pub use snapshot::RequestMetrics;

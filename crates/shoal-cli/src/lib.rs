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

//! # Shoal CLI
//!
//! Command-line driver for the shoal inference load balancer.
//!
//! The `shoal` binary loads a worker fleet definition, opens a
//! [`shoal_pool::WorkerPool`], and runs one of a handful of modes:
//!
//! - `shoal status`: probe the fleet once and print the worker table
//! - `shoal check`: connectivity smoke test (probe + one test prompt)
//! - `shoal prompt`: dispatch a single prompt
//! - `shoal batch`: fan a file of prompts out with bounded concurrency
//! - `shoal bench`: throughput measurement over canned prompts
//!
//! `prompt` and `batch` keep stdout clean (raw text / JSON) so they
//! compose with unix tools; progress and diagnostics go to stderr.

pub mod status;

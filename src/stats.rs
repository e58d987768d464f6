// Copyright 2026 The Task Shuffle Authors
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

//! Per-worker task statistics.
//!
//! Accumulated across one task attempt and, for `time_used` on the owning
//! `DagTask`, across all retries of one logical task.

use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct TaskStats {
    /// Wall-clock time of the whole attempt, `ResultTask` and
    /// `ShuffleMapTask` alike.
    pub secs_all: Duration,
    /// Time spent inside `dumper.dump` calls.
    pub secs_dump: Duration,
    /// Total bytes written across all reducer buckets by this attempt.
    pub bytes_dump: u64,
    /// Number of dump rotations performed, including the final one.
    pub num_dump_rotate: u64,
}

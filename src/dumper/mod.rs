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

//! Bucket dumper family.
//!
//! Both on-disk layouts share the same `dump`/`commit` protocol and the
//! same empty-bucket guarantee; they differ in per-spill layout and in
//! what `commit` does to combine multiple spills into one file. This
//! module holds the shared trait and the bits both strategies need
//! (`ShuffleWorkDir` per reducer, running byte counters).

pub mod append;
pub mod sort_merge;

use std::path::PathBuf;

use indexmap::IndexMap;

use crate::error::TaskError;
use crate::workdir::ShuffleWorkDir;

/// `dump`/`commit` protocol shared by both bucket dumper layouts.
///
/// `commit` only needs the `merge_combiners` half of the aggregator (the
/// append-mode dumper never needs it at all; the sort-merge dumper uses it
/// to fold duplicate keys across spills).
pub trait BucketDumper<K, C> {
    fn dump(&mut self, buckets: &mut [IndexMap<K, C>], is_final: bool) -> Result<(), TaskError>;
    fn commit(&mut self, merge_combiners: &dyn Fn(C, C) -> C) -> Result<Vec<PathBuf>, TaskError>;
    /// Total bytes written across all reducers by this dumper so far.
    fn bytes_dumped(&self) -> u64;
}

/// Per-reducer bookkeeping both dumper layouts share: a work-dir slot, the
/// temporaries written into it so far, and a running byte counter.
pub(crate) struct ReducerSlot {
    pub workdir: ShuffleWorkDir,
    pub tmp_paths: Vec<PathBuf>,
    pub bytes: u64,
}

pub(crate) fn make_reducer_slots(shuffle_id: u64, map_id: usize, num_reduce: usize, disk_dir: &std::path::Path) -> Vec<ReducerSlot> {
    (0..num_reduce)
        .map(|reduce_id| ReducerSlot {
            workdir: ShuffleWorkDir::new(shuffle_id, map_id, reduce_id, disk_dir),
            tmp_paths: Vec::new(),
            bytes: 0,
        })
        .collect()
}

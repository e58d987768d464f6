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

//! Configuration flags, plus the per-shuffle rddconf carried by a
//! `ShuffleMapTask`.

/// The op-kind used when re-deriving an rddconf for the sort-merge commit
/// pass. Only `GroupBy` is referenced by this core; other op kinds belong
/// to the surrounding RDD graph, which this crate does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    GroupBy,
    Other,
}

/// Worker-wide flags.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// When on, the combine loop spills on memory pressure; when off,
    /// buckets are held until completion.
    pub multi_segment_dump: bool,
    /// Promotes rotation log messages from debug to info.
    pub log_rotate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            multi_segment_dump: true,
            log_rotate: false,
        }
    }
}

/// Per-shuffle-dependency record carried by a `ShuffleMapTask`: selects
/// which bucket dumper mode to use and which serializer backs it.
#[derive(Debug, Clone)]
pub struct RddConf {
    pub sort_merge: bool,
    pub op: OpKind,
}

impl RddConf {
    pub fn new(sort_merge: bool) -> Self {
        RddConf { sort_merge, op: OpKind::Other }
    }

    /// The sort-merge commit pass re-derives an rddconf tagged as a
    /// groupBy so the stream serializer it asks for matches what a plain
    /// groupBy shuffle would use.
    pub fn dup_for_groupby(&self) -> Self {
        RddConf { sort_merge: self.sort_merge, op: OpKind::GroupBy }
    }
}

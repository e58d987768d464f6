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

pub mod aggregator;
pub mod attempt;
pub mod config;
pub mod dumper;
pub mod error;
pub mod frame;
pub mod memory;
pub mod partition;
pub mod result_task;
pub mod serialize;
pub mod shuffle_map_task;
pub mod stats;
pub mod task;
pub mod ttid;
pub mod workdir;

pub use aggregator::Aggregator;
pub use config::{Config, OpKind, RddConf};
pub use dumper::append::AppendBucketDumper;
pub use dumper::sort_merge::SortMergeBucketDumper;
pub use dumper::BucketDumper;
pub use error::{TaskEndReason, TaskError};
pub use memory::MemoryAccountant;
pub use partition::{HashPartitioner, Partitioner};
pub use result_task::ResultTask;
pub use shuffle_map_task::{Record, ShuffleMapTask};
pub use stats::TaskStats;
pub use task::{DagTask, ResourceDemand, RunOutcome};
pub use ttid::Ttid;

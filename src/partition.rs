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

//! Partitioner collaborator contract.
//!
//! Pure, deterministic, hash-stable across workers: the same key must map
//! to the same reducer index no matter which worker computes it.

pub trait Partitioner<K: ?Sized> {
    fn num_partitions(&self) -> usize;
    fn partition(&self, key: &K) -> usize;
}

/// A `k mod n` partitioner over hashable keys, used throughout this
/// crate's tests.
pub struct HashPartitioner {
    num_partitions: usize,
}

impl HashPartitioner {
    pub fn new(num_partitions: usize) -> Self {
        assert!(num_partitions > 0, "a partitioner needs at least one reducer");
        HashPartitioner { num_partitions }
    }
}

impl Partitioner<i64> for HashPartitioner {
    fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    fn partition(&self, key: &i64) -> usize {
        key.rem_euclid(self.num_partitions as i64) as usize
    }
}

impl Partitioner<i32> for HashPartitioner {
    fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    fn partition(&self, key: &i32) -> usize {
        key.rem_euclid(self.num_partitions as i32) as usize
    }
}

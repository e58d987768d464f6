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

//! Aggregator collaborator contract.
//!
//! `create_combiner`, `merge_value`, `merge_combiners` as captured function
//! values rather than a trait object: `ShuffleMapTask` is parameterized
//! over `(K, V, C)` and carries the aggregator as three closures.
//!
//! `merge_combiners` must be associative — that law is what makes spill
//! rotations and sort-merge's k-way merge result-preserving regardless of
//! how the input happened to be split across spill segments.

pub struct Aggregator<V, C> {
    create_combiner: Box<dyn Fn(V) -> C + Send>,
    merge_value: Box<dyn Fn(C, V) -> C + Send>,
    merge_combiners: Box<dyn Fn(C, C) -> C + Send>,
}

impl<V, C> Aggregator<V, C> {
    pub fn new(
        create_combiner: impl Fn(V) -> C + Send + 'static,
        merge_value: impl Fn(C, V) -> C + Send + 'static,
        merge_combiners: impl Fn(C, C) -> C + Send + 'static,
    ) -> Self {
        Aggregator {
            create_combiner: Box::new(create_combiner),
            merge_value: Box::new(merge_value),
            merge_combiners: Box::new(merge_combiners),
        }
    }

    pub fn create_combiner(&self, v: V) -> C {
        (self.create_combiner)(v)
    }

    pub fn merge_value(&self, c: C, v: V) -> C {
        (self.merge_value)(c, v)
    }

    pub fn merge_combiners(&self, a: C, b: C) -> C {
        (self.merge_combiners)(a, b)
    }
}

impl<T> Aggregator<T, T>
where
    T: Clone,
{
    /// Convenience constructor for the common case where the combiner type
    /// equals the value type and combining is a single associative
    /// operation (e.g. sum, concatenation).
    pub fn associative(op: impl Fn(T, T) -> T + Send + Clone + 'static) -> Self {
        let op_value = op.clone();
        let op_combine = op;
        Aggregator::new(
            |v: T| v,
            move |c: T, v: T| op_value(c, v),
            move |a: T, b: T| op_combine(a, b),
        )
    }
}

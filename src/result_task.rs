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

//! Result task: drives a function over one input split and hands the
//! value straight back to the driver rather than into a shuffle.

use std::time::Instant;

use crate::error::TaskError;
use crate::stats::TaskStats;
use crate::task::DagTask;

/// `ResultTask` pairs a `DagTask` header with an input split type, the
/// user function to apply, and an output slot id in the driver's result
/// array.
pub struct ResultTask<I, T> {
    pub header: DagTask,
    pub output_id: usize,
    pub preferred_locations: Vec<String>,
    split: std::marker::PhantomData<I>,
    result: std::marker::PhantomData<T>,
}

impl<I, T> ResultTask<I, T> {
    pub fn new(header: DagTask, output_id: usize, preferred_locations: Vec<String>) -> Self {
        ResultTask {
            header,
            output_id,
            preferred_locations,
            split: std::marker::PhantomData,
            result: std::marker::PhantomData,
        }
    }

    /// Drives `input` through `func` and records elapsed wall-clock into
    /// `stats.secs_all`. Any error from `func` propagates as
    /// `TaskError::Other` carrying its stringified cause.
    pub fn run(
        &self,
        task_try_id: &str,
        input: impl Iterator<Item = I>,
        func: impl FnOnce(&mut dyn Iterator<Item = I>) -> Result<T, String>,
        stats: &mut TaskStats,
    ) -> Result<T, TaskError> {
        log::debug!("run task {}: result task {}", task_try_id, self.header.task_id);
        let t0 = Instant::now();
        let mut input = input;
        let result = func(&mut input).map_err(TaskError::Other);
        stats.secs_all = t0.elapsed();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ttid::make_taskset_id;

    #[test]
    fn runs_the_user_function_over_the_input_and_records_elapsed_time() {
        let header = DagTask::new(1, make_taskset_id(1, 1), 0);
        let task: ResultTask<i64, i64> = ResultTask::new(header, 0, vec![]);
        let mut stats = TaskStats::default();

        let result = task.run(
            "1.1_0.0",
            vec![1i64, 2, 3].into_iter(),
            |iter| Ok(iter.sum()),
            &mut stats,
        );

        assert_eq!(result.unwrap(), 6);
    }

    #[test]
    fn propagates_a_user_error_as_other_failure() {
        let header = DagTask::new(1, make_taskset_id(1, 1), 0);
        let task: ResultTask<i64, i64> = ResultTask::new(header, 0, vec![]);
        let mut stats = TaskStats::default();

        let result = task.run(
            "1.1_0.0",
            vec![1i64].into_iter(),
            |_iter| Err("boom".to_string()),
            &mut stats,
        );

        match result {
            Err(TaskError::Other(msg)) => assert_eq!(msg, "boom"),
            _ => panic!("expected TaskError::Other"),
        }
    }
}

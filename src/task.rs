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

//! DAG task base: shared retry/attempt bookkeeping for every concrete task
//! kind, plus the worker-side run wrapper that decides between a normal
//! result and an immediate OOM exit.

use std::collections::HashMap;
use std::time::Duration;

use crate::attempt::{TaskAttempt, TaskReason, TaskState};
use crate::error::{TaskError, ERROR_TASK_OOM};
use crate::memory::MemoryAccountant;
use crate::ttid::{make_task_id, make_ttid, Ttid};

/// `(mem, cpus, gpus)` resource demand carried by one logical task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceDemand {
    pub mem: u64,
    pub cpus: f64,
    pub gpus: f64,
}

/// Outcome of `DagTask::run`: either the run body returned, or the worker
/// process was told to exit immediately and never gets here.
pub enum RunOutcome<T> {
    Finished(Result<T, TaskError>),
}

/// Shared header carried by every concrete task kind: retry/attempt
/// bookkeeping and resource demand common to result tasks and shuffle-map
/// tasks alike, held as a field rather than a base class.
pub struct DagTask {
    pub stage_id: u64,
    pub taskset_id: String,
    pub task_id: String,
    pub partition: u64,
    pub num_try: u64,
    pub reason_next: TaskReason,
    pub tries: HashMap<u64, TaskAttempt>,
    pub demand: ResourceDemand,
    /// Sum of elapsed wall time across every retry of this logical task.
    pub time_used: Duration,
    pub stage_start: Option<std::time::Instant>,
    pub run_start: Option<std::time::Instant>,
}

impl DagTask {
    pub fn new(stage_id: u64, taskset_id: String, partition: u64) -> Self {
        DagTask {
            task_id: make_task_id(&taskset_id, partition),
            stage_id,
            taskset_id,
            partition,
            num_try: 0,
            reason_next: TaskReason::First,
            tries: HashMap::new(),
            demand: ResourceDemand::default(),
            time_used: Duration::ZERO,
            stage_start: None,
            run_start: None,
        }
    }

    /// The current attempt's full task-try id, `"{task_id}.{num_try}"`.
    pub fn try_id(&self) -> String {
        make_ttid(&self.task_id, self.num_try)
    }

    /// Sets the reason the *next* call to `try_next` will stamp the new
    /// attempt with. The scheduler calls this externally; the task never
    /// infers its own retry reason.
    pub fn set_reason_next(&mut self, reason: TaskReason) {
        self.reason_next = reason;
    }

    /// Increments the retry counter and opens a fresh `TaskAttempt` stamped
    /// with whatever reason was last staged via `set_reason_next`.
    pub fn try_next(&mut self) -> u64 {
        self.num_try += 1;
        self.tries.insert(self.num_try, TaskAttempt::new(self.reason_next));
        self.num_try
    }

    /// Appends a transition to the given attempt's log.
    pub fn update_status(&mut self, state: TaskState, num_try: u64) {
        if let Some(attempt) = self.tries.get_mut(&num_try) {
            attempt.append(state);
        }
    }

    pub fn ttid(&self) -> Ttid {
        Ttid::parse(&self.try_id()).expect("try_id is always well-formed")
    }

    /// Worker entry point. `run_body` is the concrete task's own run logic;
    /// a panic crossing it is treated as a cooperative interrupt and, if the
    /// memory accountant has flagged OOM, exits the process immediately
    /// instead of unwinding further.
    pub fn run<T>(
        &mut self,
        task_try_id: &str,
        meminfo: &dyn MemoryAccountant,
        multi_segment_dump: bool,
        run_body: impl FnOnce() -> Result<T, TaskError>,
    ) -> RunOutcome<T> {
        log::debug!("run task {}", task_try_id);
        if self.demand.mem != 0 {
            meminfo.start(task_try_id, self.demand.mem);
            if multi_segment_dump {
                meminfo.set_check(false);
            }
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(run_body));

        if self.demand.mem != 0 {
            meminfo.set_check(true);
            meminfo.stop();
        }

        match result {
            Ok(outcome) => RunOutcome::Finished(outcome),
            Err(payload) => {
                if self.demand.mem != 0 && meminfo.oom() {
                    // OOM-classified interrupt exits the worker process
                    // immediately with the reserved code.
                    std::process::exit(ERROR_TASK_OOM);
                } else {
                    std::panic::resume_unwind(payload);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SimpleMemoryAccountant;
    use crate::ttid::make_taskset_id;

    #[test]
    fn try_next_increments_and_stamps_the_staged_reason() {
        let taskset_id = make_taskset_id(1, 1);
        let mut task = DagTask::new(1, taskset_id, 0);
        assert_eq!(task.try_next(), 1);
        task.set_reason_next(TaskReason::RunTimeout);
        assert_eq!(task.try_next(), 2);
        assert_eq!(task.tries[&2].reason, TaskReason::RunTimeout);
        assert_eq!(task.tries[&1].reason, TaskReason::First);
    }

    #[test]
    fn run_returns_the_body_result_when_not_interrupted() {
        let mut task = DagTask::new(1, make_taskset_id(1, 1), 0);
        task.demand.mem = 1024;
        let acc = SimpleMemoryAccountant::new(2048);

        let outcome = task.run("1.1_0.0", &acc, true, || Ok::<_, TaskError>(42));
        match outcome {
            RunOutcome::Finished(Ok(v)) => assert_eq!(v, 42),
            _ => panic!("expected a finished Ok outcome"),
        }
        assert!(acc.checking(), "run must re-enable eager checking on exit");
    }

    #[test]
    fn run_reraises_a_non_oom_interrupt() {
        let mut task = DagTask::new(1, make_taskset_id(1, 1), 0);
        task.demand.mem = 1024;
        let acc = SimpleMemoryAccountant::new(2048);
        acc.set_oom(false);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            task.run("1.1_0.0", &acc, true, || -> Result<(), TaskError> {
                panic!("cooperative interrupt");
            })
        }));
        assert!(result.is_err(), "non-OOM interrupt must propagate rather than exit the process");
    }
}

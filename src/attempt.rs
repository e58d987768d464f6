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

//! Per-attempt state log.

use std::time::{Duration, Instant};

/// Why a given attempt was spawned. Set externally (by the scheduler) on
/// the owning `DAGTask` before `try_next()` is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskReason {
    First,
    RunTimeout,
    StageTimeout,
    Fail,
}

/// Non-terminal and terminal attempt states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Staging,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Failed | TaskState::Killed | TaskState::Lost | TaskState::Error
        )
    }
}

/// One `(state, wall-time)` transition.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub state: TaskState,
    pub at: Instant,
}

/// A reason-tagged, append-only log of state transitions for one attempt.
/// Invariant: starts with `(Staging, t0)` and ends at most once in a
/// terminal state.
#[derive(Debug, Clone)]
pub struct TaskAttempt {
    pub reason: TaskReason,
    log: Vec<Transition>,
}

impl TaskAttempt {
    pub fn new(reason: TaskReason) -> Self {
        TaskAttempt {
            reason,
            log: vec![Transition { state: TaskState::Staging, at: Instant::now() }],
        }
    }

    /// Appends a transition. Panics if the attempt already ended in a
    /// terminal state — per the invariant a terminal state may appear at
    /// most once, as the final entry.
    pub fn append(&mut self, state: TaskState) {
        assert!(
            !self.is_finished(),
            "attempt already ended in a terminal state, cannot append {:?}",
            state
        );
        self.log.push(Transition { state, at: Instant::now() });
    }

    pub fn is_finished(&self) -> bool {
        self.log.last().map(|t| t.state.is_terminal()).unwrap_or(false)
    }

    pub fn last_state(&self) -> TaskState {
        self.log.last().expect("log always has at least the staging entry").state
    }

    pub fn started_at(&self) -> Instant {
        self.log[0].at
    }

    /// Wall time elapsed between the first transition and the terminal one,
    /// or `None` if the attempt has not yet finished.
    pub fn elapsed(&self) -> Option<Duration> {
        if self.is_finished() {
            Some(self.log.last().unwrap().at.duration_since(self.started_at()))
        } else {
            None
        }
    }

    pub fn history(&self) -> &[Transition] {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_staging_and_ends_at_most_once_terminal() {
        let mut a = TaskAttempt::new(TaskReason::First);
        assert_eq!(a.last_state(), TaskState::Staging);
        assert!(!a.is_finished());

        a.append(TaskState::Running);
        assert!(!a.is_finished());

        a.append(TaskState::Finished);
        assert!(a.is_finished());
        assert_eq!(a.last_state(), TaskState::Finished);
        assert!(a.elapsed().is_some());
    }

    #[test]
    #[should_panic]
    fn cannot_append_after_terminal() {
        let mut a = TaskAttempt::new(TaskReason::Fail);
        a.append(TaskState::Killed);
        a.append(TaskState::Running);
    }
}

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

//! Error taxonomy.
//!
//! `TaskError` is what `_run` / the combine loop actually raises; it is
//! turned into a `TaskEndReason` by the executor once the attempt settles.

use std::io;

use thiserror::Error;

/// Errors raised while running one task attempt.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A shuffle-map input record was not a `(k, v)` pair. Not retryable.
    #[error("item of {scope} should be a (k, v) pair: {detail}")]
    MalformedRecord { scope: String, detail: String },

    /// Task attempt could not be deserialized by the worker before running.
    #[error("failed to load task: {0}")]
    LoadFailed(String),

    /// I/O error while spilling, dumping, or committing bucket files.
    #[error("shuffle I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error in the bucket or frame codec.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// A reducer could not find this map's output; carries routing info so
    /// the scheduler can invalidate the map output and restart the stage.
    #[error("fetch failed: server={server_uri} shuffle={shuffle_id} map={map_id} reduce={reduce_id}")]
    FetchFailed {
        server_uri: String,
        shuffle_id: u64,
        map_id: usize,
        reduce_id: usize,
    },

    /// Any other error surfaced by user code (the function passed to a
    /// `ResultTask`, or a panic-free failure inside an aggregator).
    #[error("{0}")]
    Other(String),
}

impl TaskError {
    pub fn fetch_failed(server_uri: impl Into<String>, shuffle_id: u64, map_id: usize, reduce_id: usize) -> Self {
        TaskError::FetchFailed {
            server_uri: server_uri.into(),
            shuffle_id,
            map_id,
            reduce_id,
        }
    }
}

/// Outward-facing classification of how an attempt ended.
///
/// Distinct from `TaskError`: this also covers outcomes that never flow
/// through `_run` at all (`Success`, signals, container-level OOM observed
/// by the agent rather than the worker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEndReason {
    Success,
    OtherEcs,
    LoadFailed,
    OtherFailure,
    FetchFailed,
    TaskOom,
    RecvSig,
    RecvSigKill,
    LaunchFailed,
    /// Agent-originated: the container's memory limit was hit.
    ContainerOom,
}

impl TaskEndReason {
    /// Whether this reason should make the scheduler raise the next
    /// attempt's memory budget.
    pub fn maybe_oom(self) -> bool {
        matches!(
            self,
            TaskEndReason::TaskOom | TaskEndReason::RecvSigKill | TaskEndReason::ContainerOom
        )
    }
}

impl From<&TaskError> for TaskEndReason {
    fn from(err: &TaskError) -> Self {
        match err {
            TaskError::MalformedRecord { .. } | TaskError::Other(_) | TaskError::Serialize(_) => {
                TaskEndReason::OtherFailure
            }
            TaskError::LoadFailed(_) => TaskEndReason::LoadFailed,
            TaskError::Io(_) => TaskEndReason::OtherFailure,
            TaskError::FetchFailed { .. } => TaskEndReason::FetchFailed,
        }
    }
}

/// Reserved process exit code used when the worker is interrupted while the
/// memory accountant has flagged OOM.
pub const ERROR_TASK_OOM: i32 = 99;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maybe_oom_classifies_the_three_reasons() {
        assert!(TaskEndReason::TaskOom.maybe_oom());
        assert!(TaskEndReason::RecvSigKill.maybe_oom());
        assert!(TaskEndReason::ContainerOom.maybe_oom());
        assert!(!TaskEndReason::OtherFailure.maybe_oom());
        assert!(!TaskEndReason::Success.maybe_oom());
    }

    #[test]
    fn fetch_failed_carries_routing_info() {
        let err = TaskError::fetch_failed("http://host:1234", 7, 3, 2);
        match &err {
            TaskError::FetchFailed { server_uri, shuffle_id, map_id, reduce_id } => {
                assert_eq!(server_uri, "http://host:1234");
                assert_eq!(*shuffle_id, 7);
                assert_eq!(*map_id, 3);
                assert_eq!(*reduce_id, 2);
            }
            _ => panic!("wrong variant"),
        }
        assert_eq!(TaskEndReason::from(&err), TaskEndReason::FetchFailed);
    }
}

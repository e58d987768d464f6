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

//! Task-try identifier.
//!
//! Rendered as `S.T_P.R`: stage id, stage-retry counter, partition index,
//! task-retry counter.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TtidParseError {
    #[error("malformed ttid {0:?}: missing '_' separating taskset and partition/retry")]
    MissingPartitionSeparator(String),
    #[error("malformed ttid {0:?}: taskset id must be 'stage.stage_try'")]
    MalformedTaskset(String),
    #[error("malformed ttid {0:?}: partition/retry must be 'partition.retry'")]
    MalformedPartitionRetry(String),
    #[error("malformed ttid {0:?}: non-integer component: {1}")]
    NotAnInteger(String, String),
}

/// A fully parsed task-try id: `(stage_id, stage_try, partition, task_try)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ttid {
    pub stage_id: u64,
    pub stage_try: u64,
    pub partition: u64,
    pub task_try: u64,
}

impl Ttid {
    pub fn new(stage_id: u64, stage_try: u64, partition: u64, task_try: u64) -> Self {
        Ttid { stage_id, stage_try, partition, task_try }
    }

    /// `"{stage_id}.{stage_try}"` — identifies one stage attempt.
    pub fn taskset_id(&self) -> String {
        make_taskset_id(self.stage_id, self.stage_try)
    }

    /// `"{taskset_id}_{partition}"` — identifies the logical work item.
    pub fn task_id(&self) -> String {
        make_task_id(&self.taskset_id(), self.partition)
    }

    /// The full `S.T_P.R` string.
    pub fn render(&self) -> String {
        make_ttid(&self.task_id(), self.task_try)
    }

    /// Parses `S.T_P.R` back into its four integer components. Total over
    /// this grammar: any other shape is a `TtidParseError`.
    pub fn parse(s: &str) -> Result<Self, TtidParseError> {
        let (taskset_id, part_try) = s
            .split_once('_')
            .ok_or_else(|| TtidParseError::MissingPartitionSeparator(s.to_string()))?;

        let (stage_id, stage_try) = taskset_id
            .split_once('.')
            .ok_or_else(|| TtidParseError::MalformedTaskset(s.to_string()))?;
        let stage_id = parse_u64(s, stage_id)?;
        let stage_try = parse_u64(s, stage_try)?;

        let (partition, task_try) = part_try
            .split_once('.')
            .ok_or_else(|| TtidParseError::MalformedPartitionRetry(s.to_string()))?;
        let partition = parse_u64(s, partition)?;
        let task_try = parse_u64(s, task_try)?;

        Ok(Ttid { stage_id, stage_try, partition, task_try })
    }
}

fn parse_u64(whole: &str, part: &str) -> Result<u64, TtidParseError> {
    part.parse::<u64>()
        .map_err(|_| TtidParseError::NotAnInteger(whole.to_string(), part.to_string()))
}

impl fmt::Display for Ttid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

pub fn make_taskset_id(stage_id: u64, stage_try: u64) -> String {
    format!("{}.{}", stage_id, stage_try)
}

pub fn make_task_id(taskset_id: &str, partition: u64) -> String {
    format!("{}_{}", taskset_id, partition)
}

pub fn make_ttid(task_id: &str, task_try: u64) -> String {
    format!("{}.{}", task_id, task_try)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_literal_scenario() {
        let ttid = Ttid::parse("3.2_17.1").unwrap();
        assert_eq!(ttid, Ttid::new(3, 2, 17, 1));
        assert_eq!(ttid.taskset_id(), "3.2");
        assert_eq!(ttid.task_id(), "3.2_17");
    }

    #[test]
    fn round_trips_for_arbitrary_valid_components() {
        for (s, t, p, r) in [(1, 1, 0, 0), (9999, 1, 0, 5), (1, 3, 42, 0), (7, 2, 128, 9)] {
            let ttid = Ttid::new(s, t, p, r);
            let rendered = ttid.render();
            let parsed = Ttid::parse(&rendered).unwrap();
            assert_eq!(parsed, ttid);
        }
    }

    #[test]
    fn format_is_injective_across_distinct_tuples() {
        let a = Ttid::new(1, 1, 0, 0).render();
        let b = Ttid::new(1, 1, 0, 1).render();
        let c = Ttid::new(1, 10, 0, 0).render();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_malformed_shapes() {
        assert!(Ttid::parse("garbage").is_err());
        assert!(Ttid::parse("1.2.3.4").is_err());
        assert!(Ttid::parse("1.2_3").is_err());
        assert!(Ttid::parse("a.b_c.d").is_err());
        assert!(Ttid::parse("1.2_3.x").is_err());
    }
}

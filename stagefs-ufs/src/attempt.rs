// Copyright 2025 OPPO.
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

use crate::HADOOP_ATTEMPT;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static ATTEMPT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^attempt_([^_]+)_(\d+)_([mr])_(\d+)_(\d+)$").expect("valid attempt regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Map,
    Reduce,
}

impl TaskType {
    pub fn as_char(&self) -> char {
        match self {
            TaskType::Map => 'm',
            TaskType::Reduce => 'r',
        }
    }
}

/// A task attempt identifier such as `attempt_201610052038_0001_m_000007_15`.
///
/// Only [TaskAttemptId::parse] creates one. The original text is kept as is,
/// leading zeros included, because it becomes part of committed object keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskAttemptId {
    text: String,
    jt_identifier: String,
    job: u32,
    task_type: TaskType,
    task: u32,
    attempt: u32,
}

impl TaskAttemptId {
    /// `None` means "not a task attempt", never an error.
    pub fn parse(candidate: &str) -> Option<Self> {
        if !candidate.starts_with(HADOOP_ATTEMPT) {
            return None;
        }
        let caps = ATTEMPT_REGEX.captures(candidate)?;

        let task_type = match &caps[3] {
            "m" => TaskType::Map,
            "r" => TaskType::Reduce,
            _ => return None,
        };

        Some(Self {
            text: candidate.to_string(),
            jt_identifier: caps[1].to_string(),
            job: caps[2].parse().ok()?,
            task_type,
            task: caps[4].parse().ok()?,
            attempt: caps[5].parse().ok()?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn jt_identifier(&self) -> &str {
        &self.jt_identifier
    }

    pub fn job(&self) -> u32 {
        self.job
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn task(&self) -> u32 {
        self.task
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn job_id(&self) -> String {
        format!("job_{}_{:04}", self.jt_identifier, self.job)
    }

    pub fn task_id(&self) -> String {
        format!(
            "task_{}_{:04}_{}_{:06}",
            self.jt_identifier,
            self.job,
            self.task_type.as_char(),
            self.task
        )
    }

    /// Two attempts of the same task differ only in the attempt index.
    pub fn same_task(&self, other: &TaskAttemptId) -> bool {
        self.jt_identifier == other.jt_identifier
            && self.job == other.job
            && self.task_type == other.task_type
            && self.task == other.task
    }
}

impl fmt::Display for TaskAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::{TaskAttemptId, TaskType};

    #[test]
    fn parse_canonical() {
        let id = TaskAttemptId::parse("attempt_201610052038_0001_m_000007_15").unwrap();
        assert_eq!(id.jt_identifier(), "201610052038");
        assert_eq!(id.job(), 1);
        assert_eq!(id.task_type(), TaskType::Map);
        assert_eq!(id.task(), 7);
        assert_eq!(id.attempt(), 15);
        assert_eq!(id.as_str(), "attempt_201610052038_0001_m_000007_15");
        assert_eq!(id.job_id(), "job_201610052038_0001");
        assert_eq!(id.task_id(), "task_201610052038_0001_m_000007");

        let reduce = TaskAttemptId::parse("attempt_20181119190906_0045_r_000000_0").unwrap();
        assert_eq!(reduce.task_type(), TaskType::Reduce);
        assert_eq!(reduce.to_string(), "attempt_20181119190906_0045_r_000000_0");
    }

    #[test]
    fn reject_non_attempts() {
        for s in [
            "",
            "attampt_201610052038_0001_m_000007_15",
            "attempt_201610052038_0001_x_000007_15",
            "attempt_201610052038_0001_m_000007",
            "attempt_201610052038_0001_m_000007_15.json",
            "attempt_201610052038_0001_m_000007_15_3",
            "attempt__0001_m_000007_15",
            "attempt_2016_0001_m_000007_99999999999",
            "part-00000",
        ] {
            assert!(TaskAttemptId::parse(s).is_none(), "{} parsed", s);
        }
    }

    #[test]
    fn same_task() {
        let a = TaskAttemptId::parse("attempt_20180405072427_0001_m_000000_0").unwrap();
        let b = TaskAttemptId::parse("attempt_20180405072427_0001_m_000000_1").unwrap();
        let c = TaskAttemptId::parse("attempt_20180405072427_0001_m_000001_0").unwrap();
        assert!(a.same_task(&b));
        assert!(!a.same_task(&c));
        assert_ne!(a, b);
    }
}

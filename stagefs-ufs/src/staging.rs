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

use crate::attempt::TaskAttemptId;
use crate::HADOOP_TEMPORARY;
use once_cell::sync::Lazy;
use stagefs_common::error::FsError;
use stagefs_common::{FsResult, PATH_SEPARATOR};
use std::fmt;

const JOB_ATTEMPT_SLOT: &str = "<jobAttempt>";
const TASK_ATTEMPT_SLOT: &str = "<taskAttempt>";
const TASK_ATTEMPT_ID: &str = "attempt_ID";
const ID_SUFFIX: &str = "_ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentMatcher {
    Literal(String),
    // Any single segment, e.g. the application attempt number "0".
    JobAttempt,
    // A segment that parses as a task attempt id.
    TaskAttempt,
}

static LEGACY_V1: Lazy<Vec<SegmentMatcher>> = Lazy::new(|| {
    vec![
        SegmentMatcher::Literal(HADOOP_TEMPORARY.to_string()),
        SegmentMatcher::JobAttempt,
        SegmentMatcher::Literal(HADOOP_TEMPORARY.to_string()),
        SegmentMatcher::TaskAttempt,
    ]
});

static V2: Lazy<Vec<SegmentMatcher>> = Lazy::new(|| {
    vec![
        SegmentMatcher::Literal(HADOOP_TEMPORARY.to_string()),
        SegmentMatcher::TaskAttempt,
    ]
});

/// A compiled staging layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingPattern {
    /// `_temporary/<jobAttempt>/_temporary/<taskAttempt>/`
    LegacyV1,
    /// `_temporary/<taskAttempt>/`
    V2,
    Custom(Vec<SegmentMatcher>),
}

/// Where a staging pattern sits inside a segment sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingMatch {
    /// Segments `start..end` are the staging sequence, `attempt` is its task attempt.
    Complete {
        start: usize,
        end: usize,
        attempt: TaskAttemptId,
    },
    /// The path ends inside the staging sequence that begins at `start`.
    /// `literals` are the indices of the marker segments that were matched.
    Partial { start: usize, literals: Vec<usize> },
}

impl StagingMatch {
    pub fn start(&self) -> usize {
        match self {
            StagingMatch::Complete { start, .. } => *start,
            StagingMatch::Partial { start, .. } => *start,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, StagingMatch::Complete { .. })
    }

    pub fn attempt(&self) -> Option<&TaskAttemptId> {
        match self {
            StagingMatch::Complete { attempt, .. } => Some(attempt),
            StagingMatch::Partial { .. } => None,
        }
    }
}

impl StagingPattern {
    /// Compiles a layout template such as `_temporary/st_ID/_temporary/attempt_ID/`.
    pub fn from_template(template: &str) -> FsResult<Self> {
        let matchers: Vec<SegmentMatcher> = template
            .split(PATH_SEPARATOR)
            .filter(|x| !x.is_empty())
            .map(|seg| {
                if seg == TASK_ATTEMPT_SLOT || seg == TASK_ATTEMPT_ID {
                    SegmentMatcher::TaskAttempt
                } else if seg == JOB_ATTEMPT_SLOT || seg.ends_with(ID_SUFFIX) {
                    SegmentMatcher::JobAttempt
                } else {
                    SegmentMatcher::Literal(seg.to_string())
                }
            })
            .collect();

        match matchers.first() {
            Some(SegmentMatcher::Literal(_)) => (),
            _ => {
                return Err(FsError::invalid_conf(format!(
                    "staging template '{}' must start with a literal marker",
                    template
                )))
            }
        }

        let slots = matchers
            .iter()
            .filter(|x| **x == SegmentMatcher::TaskAttempt)
            .count();
        if slots != 1 {
            return Err(FsError::invalid_conf(format!(
                "staging template '{}' must contain exactly one task attempt slot, found {}",
                template, slots
            )));
        }

        let pattern = if matchers == *LEGACY_V1 {
            StagingPattern::LegacyV1
        } else if matchers == *V2 {
            StagingPattern::V2
        } else {
            StagingPattern::Custom(matchers)
        };
        Ok(pattern)
    }

    /// Compiles templates keeping their order, which is the evaluation priority.
    pub fn compile_all<S: AsRef<str>>(templates: &[S]) -> FsResult<Vec<StagingPattern>> {
        let mut patterns: Vec<StagingPattern> = Vec::with_capacity(templates.len());
        for template in templates {
            let pattern = Self::from_template(template.as_ref())?;
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }
        Ok(patterns)
    }

    pub fn matchers(&self) -> &[SegmentMatcher] {
        match self {
            StagingPattern::LegacyV1 => &LEGACY_V1,
            StagingPattern::V2 => &V2,
            StagingPattern::Custom(m) => m,
        }
    }

    /// The first segment of the layout, e.g. `_temporary`.
    pub fn leading_marker(&self) -> &str {
        match self.matchers().first() {
            Some(SegmentMatcher::Literal(s)) => s,
            _ => HADOOP_TEMPORARY,
        }
    }

    /// Finds this layout in `segs`. A complete occurrence wins over one the path
    /// ends inside of, and the latter only counts at the first marker occurrence.
    /// A task attempt slot that does not parse is not a match.
    pub fn find<S: AsRef<str>>(&self, segs: &[S]) -> Option<StagingMatch> {
        let matchers = self.matchers();
        let marker = self.leading_marker();
        let mut partial = None;
        let mut first_occurrence = true;

        for start in 0..segs.len() {
            if segs[start].as_ref() != marker {
                continue;
            }
            let partial_allowed = first_occurrence;
            first_occurrence = false;

            let mut literals = vec![];
            let mut attempt = None;
            let mut matched = true;
            for (offset, matcher) in matchers.iter().enumerate() {
                let index = start + offset;
                let seg = match segs.get(index) {
                    Some(s) => s.as_ref(),
                    None => break,
                };

                match matcher {
                    SegmentMatcher::Literal(lit) if lit == seg => literals.push(index),
                    SegmentMatcher::Literal(_) => matched = false,
                    SegmentMatcher::JobAttempt => (),
                    SegmentMatcher::TaskAttempt => match TaskAttemptId::parse(seg) {
                        Some(id) => attempt = Some(id),
                        None => matched = false,
                    },
                }
                if !matched {
                    break;
                }
            }

            if !matched {
                continue;
            }

            if start + matchers.len() <= segs.len() {
                if let Some(attempt) = attempt {
                    return Some(StagingMatch::Complete {
                        start,
                        end: start + matchers.len(),
                        attempt,
                    });
                }
            } else if partial_allowed {
                partial = Some(StagingMatch::Partial { start, literals });
            }
        }

        partial
    }

    /// Evaluates `patterns` in priority order. Complete matches are preferred.
    pub fn find_any<S: AsRef<str>>(patterns: &[StagingPattern], segs: &[S]) -> Option<StagingMatch> {
        let mut partial = None;
        for pattern in patterns {
            match pattern.find(segs) {
                Some(m @ StagingMatch::Complete { .. }) => return Some(m),
                Some(m) if partial.is_none() => partial = Some(m),
                _ => (),
            }
        }
        partial
    }
}

impl fmt::Display for StagingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .matchers()
            .iter()
            .map(|m| match m {
                SegmentMatcher::Literal(s) => s.as_str(),
                SegmentMatcher::JobAttempt => JOB_ATTEMPT_SLOT,
                SegmentMatcher::TaskAttempt => TASK_ATTEMPT_SLOT,
            })
            .collect();
        write!(f, "{}/", parts.join(PATH_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::{SegmentMatcher, StagingMatch, StagingPattern};

    fn segs(s: &str) -> Vec<&str> {
        s.split('/').filter(|x| !x.is_empty()).collect()
    }

    #[test]
    fn compile_templates() {
        let v1 = StagingPattern::from_template("_temporary/st_ID/_temporary/attempt_ID/").unwrap();
        assert_eq!(v1, StagingPattern::LegacyV1);
        assert_eq!(
            StagingPattern::from_template("_temporary/<jobAttempt>/_temporary/<taskAttempt>").unwrap(),
            StagingPattern::LegacyV1
        );
        assert_eq!(
            StagingPattern::from_template("_temporary/<taskAttempt>/").unwrap(),
            StagingPattern::V2
        );

        let custom = StagingPattern::from_template("__magic/job_ID/<taskAttempt>").unwrap();
        assert_eq!(
            custom.matchers(),
            &[
                SegmentMatcher::Literal("__magic".to_string()),
                SegmentMatcher::JobAttempt,
                SegmentMatcher::TaskAttempt
            ]
        );
        assert_eq!(custom.leading_marker(), "__magic");
        assert_eq!(custom.to_string(), "__magic/<jobAttempt>/<taskAttempt>/");

        assert!(StagingPattern::from_template("st_ID/_temporary/attempt_ID").is_err());
        assert!(StagingPattern::from_template("_temporary/st_ID").is_err());
        assert!(StagingPattern::from_template("_temporary/attempt_ID/attempt_ID").is_err());
        assert!(StagingPattern::from_template("").is_err());

        let all = StagingPattern::compile_all(&[
            "_temporary/st_ID/_temporary/attempt_ID/",
            "_temporary/<taskAttempt>",
            "_temporary/<jobAttempt>/_temporary/<taskAttempt>",
        ])
        .unwrap();
        assert_eq!(all, vec![StagingPattern::LegacyV1, StagingPattern::V2]);
    }

    #[test]
    fn find_complete_and_partial() {
        let p = StagingPattern::LegacyV1;
        let full = segs("one3.txt/_temporary/0/_temporary/attempt_201610052038_0001_m_000007_15/part-1");
        match p.find(&full) {
            Some(StagingMatch::Complete { start, end, attempt }) => {
                assert_eq!((start, end), (1, 5));
                assert_eq!(attempt.as_str(), "attempt_201610052038_0001_m_000007_15");
            }
            other => panic!("unexpected {:?}", other),
        }

        let partial = segs("d=29/data2.json/_temporary/0");
        assert_eq!(
            p.find(&partial),
            Some(StagingMatch::Partial {
                start: 2,
                literals: vec![2]
            })
        );

        let bad = segs("one3.txt/_temporary/0/_temporary/attampt_201610052038_0001_m_000007_15");
        assert_eq!(p.find(&bad), None);
        assert_eq!(p.find(&segs("a/b/c.txt")), None);
    }

    #[test]
    fn priority_prefers_complete() {
        let patterns = vec![StagingPattern::LegacyV1, StagingPattern::V2];
        let path = segs("out/_temporary/attempt_20180405072427_0001_m_000000_0");
        let m = StagingPattern::find_any(&patterns, &path).unwrap();
        assert!(m.is_complete());
        assert_eq!(m.start(), 1);

        let path = segs("out/_temporary/1");
        let m = StagingPattern::find_any(&patterns, &path).unwrap();
        assert!(!m.is_complete());
        assert!(m.attempt().is_none());
    }
}

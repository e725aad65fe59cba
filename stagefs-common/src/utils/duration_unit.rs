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

use crate::error::FsError;
use crate::FsResult;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

static DURATION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+)\s*(ms|s|m|min|h|d)?\s*$").expect("valid regex"));

/// Human readable durations used in configuration files: `100ms`, `5s`, `10m`, `6h`, `1d`.
/// A bare number is milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationUnit {
    millis: u64,
}

impl DurationUnit {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> FsResult<Self> {
        let caps = DURATION_REGEX
            .captures(s)
            .ok_or_else(|| FsError::invalid_conf(format!("invalid duration '{}'", s)))?;

        let value: u64 = caps[1]
            .parse()
            .map_err(|e| FsError::invalid_conf(format!("invalid duration '{}': {}", s, e)))?;

        let unit = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let factor = match unit.as_str() {
            "" | "ms" => 1,
            "s" => 1000,
            "m" | "min" => 60 * 1000,
            "h" => 60 * 60 * 1000,
            "d" => 24 * 60 * 60 * 1000,
            _ => return Err(FsError::invalid_conf(format!("invalid duration '{}'", s))),
        };

        let millis = value
            .checked_mul(factor)
            .ok_or_else(|| FsError::invalid_conf(format!("duration '{}' overflows", s)))?;
        Ok(Self { millis })
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }
}

#[cfg(test)]
mod tests {
    use super::DurationUnit;
    use std::time::Duration;

    #[test]
    fn parse_units() {
        assert_eq!(DurationUnit::from_str("250").unwrap().as_millis(), 250);
        assert_eq!(DurationUnit::from_str("100ms").unwrap().as_millis(), 100);
        assert_eq!(
            DurationUnit::from_str("5s").unwrap().as_duration(),
            Duration::from_secs(5)
        );
        assert_eq!(DurationUnit::from_str("10m").unwrap().as_millis(), 600_000);
        assert_eq!(DurationUnit::from_str("6H").unwrap().as_millis(), 21_600_000);
        assert_eq!(DurationUnit::from_str("1d").unwrap().as_millis(), 86_400_000);
    }

    #[test]
    fn reject_garbage() {
        assert!(DurationUnit::from_str("").is_err());
        assert!(DurationUnit::from_str("5 weeks").is_err());
        assert!(DurationUnit::from_str("-1s").is_err());
    }
}

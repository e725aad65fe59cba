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
use crate::{FsResult, PATH_SEPARATOR};
use std::fmt;

const SCHEME_SEPARATOR: &str = "://";

/// A hierarchical path: an optional `scheme://authority` mount identity followed by
/// an ordered list of non-empty segments.
///
/// Repeated separators are collapsed and a trailing separator is dropped, so
/// `s3://b/x//y/` and `s3://b/x/y` are the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    scheme: Option<String>,
    authority: Option<String>,
    segments: Vec<String>,
    absolute: bool,
    path: String,
    full_path: String,
}

impl Path {
    pub fn new(s: impl AsRef<str>) -> FsResult<Self> {
        Self::from_str(s)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: impl AsRef<str>) -> FsResult<Self> {
        let raw = s.as_ref();
        if raw.is_empty() {
            return Err(FsError::invalid_path(raw, "empty path"));
        }

        match raw.split_once(SCHEME_SEPARATOR) {
            Some((scheme, rest)) => {
                let valid_scheme = !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
                if !valid_scheme {
                    return Err(FsError::invalid_path(raw, "invalid scheme"));
                }

                let (authority, rest) = match rest.split_once('/') {
                    Some((a, r)) => (a, r),
                    None => (rest, ""),
                };
                if authority.is_empty() {
                    return Err(FsError::invalid_path(raw, "missing authority"));
                }

                Ok(Self::build(
                    Some(scheme.to_string()),
                    Some(authority.to_string()),
                    Self::split(rest),
                    true,
                ))
            }

            None => Ok(Self::build(
                None,
                None,
                Self::split(raw),
                raw.starts_with(PATH_SEPARATOR),
            )),
        }
    }

    /// A path under the same mount identity as `self` made of `segments`.
    pub fn with_segments<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = segments
            .into_iter()
            .flat_map(|s| Self::split(s.as_ref()))
            .collect();
        Self::build(
            self.scheme.clone(),
            self.authority.clone(),
            segments,
            self.absolute,
        )
    }

    pub fn join(&self, child: impl AsRef<str>) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(Self::split(child.as_ref()));
        Self::build(
            self.scheme.clone(),
            self.authority.clone(),
            segments,
            self.absolute,
        )
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let segments = self.segments[..self.segments.len() - 1].to_vec();
        Some(Self::build(
            self.scheme.clone(),
            self.authority.clone(),
            segments,
            self.absolute,
        ))
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// The path part without scheme and authority, `/` for the mount root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// `scheme://authority` when the path carries a mount identity.
    pub fn root_uri(&self) -> Option<String> {
        match (&self.scheme, &self.authority) {
            (Some(s), Some(a)) => Some(format!("{}{}{}", s, SCHEME_SEPARATOR, a)),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        self.segments.last().map(|s| s.as_str()).unwrap_or("")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Same mount identity (scheme and authority).
    pub fn same_mount(&self, other: &Path) -> bool {
        self.scheme == other.scheme && self.authority == other.authority
    }

    /// The object key addressed by this path: the segments joined, no leading separator.
    pub fn key(&self) -> String {
        self.segments.join(PATH_SEPARATOR)
    }

    pub fn has_prefix(path: &str, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches(PATH_SEPARATOR);
        if prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with(PATH_SEPARATOR),
            None => false,
        }
    }

    fn split(s: &str) -> Vec<String> {
        s.split(PATH_SEPARATOR)
            .filter(|x| !x.is_empty())
            .map(|x| x.to_string())
            .collect()
    }

    fn build(
        scheme: Option<String>,
        authority: Option<String>,
        segments: Vec<String>,
        absolute: bool,
    ) -> Self {
        let joined = segments.join(PATH_SEPARATOR);
        let path = if absolute {
            format!("{}{}", PATH_SEPARATOR, joined)
        } else {
            joined
        };
        let full_path = match (&scheme, &authority) {
            (Some(s), Some(a)) => format!("{}{}{}{}", s, SCHEME_SEPARATOR, a, path),
            _ => path.clone(),
        };

        Self {
            scheme,
            authority,
            segments,
            absolute,
            path,
            full_path,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path)
    }
}

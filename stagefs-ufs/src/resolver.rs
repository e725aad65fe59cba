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
use crate::staging::{StagingMatch, StagingPattern};
use crate::HADOOP_ATTEMPT;
use log::trace;
use stagefs_common::conf::StagingConf;
use stagefs_common::fs::Path;
use stagefs_common::{FsResult, PATH_SEPARATOR, SUCCESS_MARKER};

const ATTEMPT_SUFFIX: &str = "-attempt_";

/// Maps committer paths to flat object keys and keys back to logical paths.
///
/// Every method is pure: nothing here touches the store.
#[derive(Debug, Clone)]
pub struct TempPathResolver {
    mount: Path,
    data_root: String,
    patterns: Vec<StagingPattern>,
}

impl TempPathResolver {
    pub fn new(mount: &Path, data_root: impl Into<String>, patterns: Vec<StagingPattern>) -> Self {
        Self {
            mount: mount.with_segments(Vec::<String>::new()),
            data_root: data_root.into(),
            patterns,
        }
    }

    pub fn with_conf(mount: &Path, data_root: impl Into<String>, conf: &StagingConf) -> FsResult<Self> {
        let patterns = StagingPattern::compile_all(&conf.temp_identifiers)?;
        Ok(Self::new(mount, data_root, patterns))
    }

    pub fn patterns(&self) -> &[StagingPattern] {
        &self.patterns
    }

    pub fn data_root(&self) -> &str {
        &self.data_root
    }

    /// `scheme://authority/` of the mount.
    pub fn mount_root(&self) -> String {
        format!("{}{}", self.mount.full_path().trim_end_matches(PATH_SEPARATOR), PATH_SEPARATOR)
    }

    pub fn is_temporary(&self, path: &Path) -> bool {
        StagingPattern::find_any(&self.patterns, path.segments()).is_some()
    }

    /// The leaf of `path` is the task attempt directory itself.
    pub fn is_temporary_target(&self, path: &Path) -> bool {
        match StagingPattern::find_any(&self.patterns, path.segments()) {
            Some(StagingMatch::Complete { end, .. }) => end == path.segments().len(),
            _ => false,
        }
    }

    /// A file written inside a task attempt directory.
    pub fn is_staged_file(&self, path: &Path) -> bool {
        match StagingPattern::find_any(&self.patterns, path.segments()) {
            Some(StagingMatch::Complete { end, .. }) => end < path.segments().len(),
            _ => false,
        }
    }

    pub fn contains_staging_marker(&self, path: &Path) -> bool {
        self.first_marker(path.segments()).is_some()
    }

    pub fn base_directory(&self, path: &Path) -> Path {
        match self.first_marker(path.segments()) {
            Some(index) => path.with_segments(&path.segments()[..index]),
            None => path.clone(),
        }
    }

    pub fn final_key_from_temporary_path(
        &self,
        path: &Path,
        embed_attempt_in_name: bool,
        data_root: &str,
        with_root_prefix: bool,
    ) -> String {
        let key = self
            .resolve_segments(path.segments(), embed_attempt_in_name)
            .join(PATH_SEPARATOR);

        let root = data_root.trim_matches('/');
        let res = if !with_root_prefix || root.is_empty() {
            key
        } else if key.is_empty() {
            root.to_string()
        } else {
            format!("{}{}{}", root, PATH_SEPARATOR, key)
        };

        trace!("final key of {} is {}", path, res);
        res
    }

    /// The object key `path` is stored under, relative to the data root.
    pub fn object_key(&self, path: &Path, embed_attempt_in_name: bool) -> String {
        self.final_key_from_temporary_path(path, embed_attempt_in_name, &self.data_root, false)
    }

    pub fn modify_path_to_final_destination(&self, path: &Path) -> Path {
        let key = self.final_key_from_temporary_path(path, true, "", false);
        path.with_segments([key])
    }

    /// Like `final_key_from_temporary_path`, for a path given relative to `mount_root`.
    /// A path outside `mount_root` is resolved from its own key.
    pub fn extract_name_from_temp_path(&self, path: &Path, flatten: bool, mount_root: &str) -> String {
        let root = mount_root.trim_end_matches(PATH_SEPARATOR);
        let segs: Vec<&str> = match path.full_path().strip_prefix(root) {
            Some(rest) if rest.is_empty() || rest.starts_with(PATH_SEPARATOR) => {
                rest.split(PATH_SEPARATOR).filter(|x| !x.is_empty()).collect()
            }
            _ => path.segments().iter().map(|x| x.as_str()).collect(),
        };

        self.resolve_segments(&segs, flatten).join(PATH_SEPARATOR)
    }

    pub fn logical_path_for_key(&self, key: &str) -> Path {
        self.mount.with_segments([key])
    }

    /// Name shared by every object of one logical output: the parent of a leaf carrying
    /// an attempt suffix or of a `_SUCCESS` marker, otherwise the key itself.
    pub fn unified_name(key: &str) -> String {
        let (parent, leaf) = match key.rsplit_once(PATH_SEPARATOR) {
            Some((p, l)) => (p, l),
            None => ("", key),
        };

        if leaf == SUCCESS_MARKER || Self::attempt_suffix(leaf).is_some() {
            parent.to_string()
        } else {
            key.to_string()
        }
    }

    /// `key` without its `-<attempt>` suffix, extension preserved.
    pub fn task_invariant_name(key: &str) -> String {
        let leaf_start = key.rfind(PATH_SEPARATOR).map(|x| x + 1).unwrap_or(0);
        match Self::attempt_suffix(&key[leaf_start..]) {
            Some((from, to)) => {
                format!("{}{}", &key[..leaf_start + from], &key[leaf_start + to..])
            }
            None => key.to_string(),
        }
    }

    // Byte range of a valid "-attempt_..." suffix inside a leaf.
    fn attempt_suffix(leaf: &str) -> Option<(usize, usize)> {
        let from = leaf.rfind(ATTEMPT_SUFFIX)?;
        let id_start = from + 1;
        let to = leaf[id_start..]
            .find('.')
            .map(|x| id_start + x)
            .unwrap_or(leaf.len());

        TaskAttemptId::parse(&leaf[id_start..to]).map(|_| (from, to))
    }

    fn first_marker<S: AsRef<str>>(&self, segs: &[S]) -> Option<usize> {
        segs.iter().position(|seg| {
            self.patterns
                .iter()
                .any(|p| p.leading_marker() == seg.as_ref())
        })
    }

    fn resolve_segments<S: AsRef<str>>(&self, segs: &[S], embed: bool) -> Vec<String> {
        let owned = || segs.iter().map(|x| x.as_ref().to_string()).collect::<Vec<_>>();

        match StagingPattern::find_any(&self.patterns, segs) {
            Some(StagingMatch::Complete {
                start,
                end,
                attempt,
            }) => {
                let mut out = owned();
                let relative = out.split_off(end);
                out.truncate(start);

                if let Some((leaf, dirs)) = relative.split_last() {
                    out.extend_from_slice(dirs);
                    if embed && !leaf.starts_with(HADOOP_ATTEMPT) {
                        out.push(Self::embed_attempt(leaf, &attempt));
                    } else {
                        out.push(leaf.clone());
                    }
                }
                out
            }

            Some(StagingMatch::Partial { literals, .. }) => segs
                .iter()
                .enumerate()
                .filter(|(i, _)| !literals.contains(i))
                .map(|(_, x)| x.as_ref().to_string())
                .collect(),

            None => owned(),
        }
    }

    // The attempt goes before the first dot of the name, a leading dot excluded.
    fn embed_attempt(leaf: &str, attempt: &TaskAttemptId) -> String {
        match leaf.char_indices().skip(1).find(|(_, c)| *c == '.') {
            Some((i, _)) => format!("{}-{}{}", &leaf[..i], attempt, &leaf[i..]),
            None => format!("{}-{}", leaf, attempt),
        }
    }
}

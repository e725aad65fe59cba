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

use thiserror::Error;

/// Errors surfaced by the staged file system.
///
/// Lookups that only feed cached facts (origin, job status) never produce one of
/// these for the caller; they are logged and the object is hidden.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("{0}")]
    Common(String),

    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("failed to list prefix '{prefix}': {reason}")]
    ListFailed { prefix: String, reason: String },

    #[error("listing of prefix '{prefix}' is out of order: '{key}' returned after '{previous}'")]
    ListOrder {
        prefix: String,
        previous: String,
        key: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConf(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl FsError {
    pub fn common(msg: impl Into<String>) -> Self {
        FsError::Common(msg.into())
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        FsError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        FsError::FileNotFound(path.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        FsError::Unsupported(msg.into())
    }

    pub fn list_failed(prefix: impl Into<String>, reason: impl ToString) -> Self {
        FsError::ListFailed {
            prefix: prefix.into(),
            reason: reason.to_string(),
        }
    }

    pub fn list_order(
        prefix: impl Into<String>,
        previous: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        FsError::ListOrder {
            prefix: prefix.into(),
            previous: previous.into(),
            key: key.into(),
        }
    }

    pub fn invalid_conf(msg: impl Into<String>) -> Self {
        FsError::InvalidConf(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::FileNotFound(_))
    }
}

/// Builds a `FsError::Common` from a format string or an expression.
#[macro_export]
macro_rules! err_msg {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::error::FsError::common(format!($fmt $(, $arg)*))
    };
    ($msg:expr) => {
        $crate::error::FsError::common($msg)
    };
}

/// `Err(FsError::Common(..))`, converted into the caller's error type.
#[macro_export]
macro_rules! err_box {
    ($($arg:tt)*) => {
        Err($crate::err_msg!($($arg)*).into())
    };
}

/// Wraps an existing error value into `Err`.
#[macro_export]
macro_rules! err_ext {
    ($e:expr) => {
        Err($e.into())
    };
}

/// Unwraps an `Option` or returns early with a `FsError::Common`.
#[macro_export]
macro_rules! try_option {
    ($opt:expr) => {
        match $opt {
            Some(v) => v,
            None => return $crate::err_box!("{} is none", stringify!($opt)),
        }
    };

    ($opt:expr, $($arg:tt)*) => {
        match $opt {
            Some(v) => v,
            None => return $crate::err_box!($($arg)*),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::FsError;
    use crate::FsResult;

    fn first_char(s: &str) -> FsResult<char> {
        let c = try_option!(s.chars().next(), "empty input '{}'", s);
        Ok(c)
    }

    #[test]
    fn macros_build_common_errors() {
        let res: FsResult<()> = err_box!("bad key {}", "a/b");
        assert_eq!(res.unwrap_err().to_string(), "bad key a/b");

        let msg = String::from("plain message");
        let res: FsResult<()> = err_box!(msg);
        assert!(matches!(res, Err(FsError::Common(_))));

        assert_eq!(first_char("xy").unwrap(), 'x');
        assert_eq!(first_char("").unwrap_err().to_string(), "empty input ''");
    }

    #[test]
    fn err_ext_keeps_variant() {
        let res: FsResult<()> = err_ext!(FsError::file_not_found("s3://b/k"));
        assert!(res.unwrap_err().is_not_found());
    }
}

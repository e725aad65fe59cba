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

pub mod conf;
pub mod error;
pub mod fs;
pub mod state;
pub mod utils;

pub type FsResult<T> = Result<T, error::FsError>;

// Zero-length object written by a job that completed successfully.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

pub const PATH_SEPARATOR: &str = "/";

pub const FOLDER_SUFFIX: &str = "/";

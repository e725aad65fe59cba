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

use crate::conf::LogConf;
use once_cell::sync::OnceCell;
use std::str::FromStr;
use tracing::Level;

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Process-wide logging setup.
///
/// Library code logs through the `log` facade; records are bridged into a
/// `tracing` fmt subscriber. Only the first call in a process has an effect.
pub struct Logger;

impl Logger {
    pub fn init(conf: &LogConf) {
        LOGGER_INIT.get_or_init(|| {
            let level = Level::from_str(&conf.level).unwrap_or(Level::INFO);

            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_thread_names(conf.display_thread)
                .with_file(conf.display_position)
                .with_line_number(conf.display_position)
                .finish();

            // Another subscriber may already be installed by the host application.
            let _ = tracing::subscriber::set_global_default(subscriber);
            let _ = tracing_log::LogTracer::init();
        });
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::init(&LogConf::default());
        Logger
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use ps2kbd::{Keycode, RetryPolicy};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub main: Main,

    #[serde(default)]
    pub retry: Retry,

    #[serde(default)]
    pub script: Script,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Main {
    /// Path of the Unix socket the host side connects to.
    pub socket: String,
}

/// Line write retry settings
///
/// Default: retry forever, without pausing between attempts
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Retry {
    pub max_attempts: Option<NonZeroU32>,
    #[serde(default)]
    pub backoff_us: u64,
}
impl Retry {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_micros(self.backoff_us),
        }
    }
}

/// Keys typed at the host once the keyboard has come up.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Script {
    #[serde(default)]
    pub keys: Vec<String>,
}
impl Script {
    pub fn keycodes(&self) -> anyhow::Result<Vec<Keycode>> {
        self.keys
            .iter()
            .map(|name| {
                Keycode::from_str(name)
                    .with_context(|| format!("unrecognized key {name:?}"))
            })
            .collect()
    }
}

pub fn parse(path: &str) -> anyhow::Result<Config> {
    let file_data =
        std::fs::read(path).context("Failed to read given config.toml")?;
    parse_str(
        std::str::from_utf8(&file_data)
            .context("config should be valid utf-8")?,
    )
}

pub fn parse_str(data: &str) -> anyhow::Result<Config> {
    Ok(toml::from_str::<Config>(data)?)
}

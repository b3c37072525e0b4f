// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(clippy::style)]

pub extern crate usdt;
#[macro_use]
extern crate bitflags;

pub mod error;
pub mod kbd;
pub mod keycode;
pub mod line;
pub mod scancode;

pub use error::Error;
pub use kbd::{DeviceConfiguration, HostCommand, LedState, PS2Kbd};
pub use keycode::Keycode;
pub use line::{Delay, LineStatus, PS2Line, RetryPolicy, StdDelay};

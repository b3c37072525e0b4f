// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("keycode {0:#x} is outside the keyboard keyspace")]
    UnknownKeycode(u16),

    #[error("line did not accept byte {byte:#04x} after {attempts} attempts")]
    WriteRetriesExhausted { byte: u8, attempts: u32 },

    #[error("PS/2 line IO error")]
    Line(#[from] std::io::Error),
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;

use ps2kbd::{LineStatus, PS2Line};

/// PS/2 line carried over a connected Unix socket, one byte per PS/2 frame.
pub struct SockLine<S = UnixStream> {
    sock: S,
}
impl<S: Read + Write> SockLine<S> {
    pub fn new(sock: S) -> Self {
        Self { sock }
    }
}

impl<S: Read + Write> PS2Line for SockLine<S> {
    fn write(&mut self, byte: u8) -> io::Result<LineStatus> {
        match self.sock.write(&[byte]) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "host socket accepted no data",
            )),
            Ok(_) => Ok(LineStatus::Accepted),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(LineStatus::Busy)
            }
            Err(e) => Err(e),
        }
    }

    fn read(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.sock.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

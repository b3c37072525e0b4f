// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte-level PS/2 bus primitives consumed by the keyboard.
//!
//! The clock/data bit timing lives below this interface. The keyboard only
//! ever deals in whole bytes: it pushes one byte at a time towards the host
//! and blocks for one byte at a time coming from the host.

use std::io;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::Error;

/// Outcome of offering a byte to the line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineStatus {
    /// The byte was clocked out to the host.
    Accepted,
    /// The host inhibited the bus (or otherwise refused the byte); the write
    /// should be attempted again.
    Busy,
}

/// A PS/2 device-side line.
#[cfg_attr(test, mockall::automock)]
pub trait PS2Line {
    /// Offer a byte to the host.
    ///
    /// An `Err` means the line itself is unusable, as opposed to
    /// [LineStatus::Busy], which is an ordinary request to retry.
    fn write(&mut self, byte: u8) -> io::Result<LineStatus>;

    /// Block until the host sends a byte.
    fn read(&mut self) -> io::Result<u8>;
}

/// Suspends the calling context for a fixed duration.
pub trait Delay {
    fn delay(&mut self, dur: Duration);
}

/// [Delay] backed by [std::thread::sleep].
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, dur: Duration) {
        std::thread::sleep(dur);
    }
}

/// How hard to try when the line reports [LineStatus::Busy].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Give up after this many attempts.  `None` retries forever.
    pub max_attempts: Option<NonZeroU32>,

    /// Pause between consecutive attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Keep offering the byte until the line takes it.
    pub const fn unbounded() -> Self {
        Self { max_attempts: None, backoff: Duration::ZERO }
    }

    pub const fn bounded(max_attempts: NonZeroU32) -> Self {
        Self { max_attempts: Some(max_attempts), backoff: Duration::ZERO }
    }

    pub const fn with_backoff(self, backoff: Duration) -> Self {
        Self { backoff, ..self }
    }

    /// Write `byte` to `line`, retrying while the line is busy.
    ///
    /// `on_retry` is called with the attempt number after every busy
    /// response, before any backoff is applied.
    pub(crate) fn write(
        &self,
        line: &mut dyn PS2Line,
        delay: &mut dyn Delay,
        byte: u8,
        mut on_retry: impl FnMut(u32),
    ) -> Result<(), Error> {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            match line.write(byte)? {
                LineStatus::Accepted => return Ok(()),
                LineStatus::Busy => {}
            }
            on_retry(attempts);
            if let Some(max) = self.max_attempts {
                if attempts >= max.get() {
                    return Err(Error::WriteRetriesExhausted { byte, attempts });
                }
            }
            if !self.backoff.is_zero() {
                delay.delay(self.backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockall::Sequence;

    #[derive(Default)]
    struct CountingDelay {
        calls: Vec<Duration>,
    }
    impl Delay for CountingDelay {
        fn delay(&mut self, dur: Duration) {
            self.calls.push(dur);
        }
    }

    #[test]
    fn accepted_first_try() {
        let mut line = MockPS2Line::new();
        line.expect_write()
            .withf(|b| *b == 0xfa)
            .times(1)
            .returning(|_| Ok(LineStatus::Accepted));
        let mut delay = CountingDelay::default();

        let mut retries = 0;
        RetryPolicy::unbounded()
            .write(&mut line, &mut delay, 0xfa, |_| retries += 1)
            .unwrap();
        assert_eq!(retries, 0);
        assert!(delay.calls.is_empty());
    }

    #[test]
    fn busy_then_accepted() {
        let mut seq = Sequence::new();
        let mut line = MockPS2Line::new();
        line.expect_write()
            .times(3)
            .in_sequence(&mut seq)
            .returning(|_| Ok(LineStatus::Busy));
        line.expect_write()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(LineStatus::Accepted));
        let mut delay = CountingDelay::default();

        let policy = RetryPolicy::unbounded()
            .with_backoff(Duration::from_micros(50));
        let mut seen = Vec::new();
        policy.write(&mut line, &mut delay, 0xaa, |n| seen.push(n)).unwrap();

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(delay.calls, vec![Duration::from_micros(50); 3]);
    }

    #[test]
    fn bounded_gives_up() {
        let mut line = MockPS2Line::new();
        line.expect_write().times(4).returning(|_| Ok(LineStatus::Busy));
        let mut delay = CountingDelay::default();

        let policy = RetryPolicy::bounded(NonZeroU32::new(4).unwrap());
        let err =
            policy.write(&mut line, &mut delay, 0x1c, |_| {}).unwrap_err();
        match err {
            Error::WriteRetriesExhausted { byte, attempts } => {
                assert_eq!(byte, 0x1c);
                assert_eq!(attempts, 4);
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn line_error_is_not_retried() {
        let mut line = MockPS2Line::new();
        line.expect_write().times(1).returning(|_| {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "host gone"))
        });
        let mut delay = CountingDelay::default();

        let err = RetryPolicy::unbounded()
            .write(&mut line, &mut delay, 0xfa, |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::Line(_)));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PS/2 Keyboard (device side) Emulation
//!
//! Here we play the part of the keyboard at the far end of a PS/2 cable: key
//! events from an upstream input source are turned into Set 2 scan codes and
//! clocked out to the host, and commands from the host are answered the way
//! an MF2 keyboard would answer them.
//!
//! HOST COMMANDS
//!
//!     The host sends a single command byte, which the keyboard acknowledges
//!     with `0xfa` before anything else happens.  A few commands are followed
//!     by one parameter byte.  The exceptions are Echo, which is answered with
//!     `0xee` instead of an acknowledgement, and Resend, which is answered by
//!     repeating the last byte put on the line.  Anything not understood is
//!     answered with a resend request (`0xfe`) so the host may try again.
//!
//! TIMING
//!
//!     Everything is synchronous.  Writes to the line are retried according
//!     to the configured [RetryPolicy] until the host accepts them, and the
//!     self test and key press helpers suspend the caller through [Delay].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use slog::{debug, info, o, warn};

use crate::error::Error;
use crate::keycode::Keycode;
use crate::line::{Delay, PS2Line, RetryPolicy, StdDelay};
use crate::scancode;

#[usdt::provider(provider = "ps2kbd")]
mod probes {
    // commands from the host, and the parameter byte if one was needed
    fn ps2kbd_cmd(v: u8) {}
    fn ps2kbd_cmd_param(cmd: u8, v: u8) {}
    fn ps2kbd_unknown_cmd(v: u8) {}

    // bytes clocked out to the host
    fn ps2kbd_data(v: u8) {}
    fn ps2kbd_write_retry(v: u8, attempt: u32) {}

    // key events from upstream
    fn ps2kbd_keyevent(keycode: u16, is_pressed: u8) {}
    fn ps2kbd_keyevent_dropped(keycode: u16, is_pressed: u8) {}
}

// Keyboard commands

// Set LEDs: bit 0 is ScrollLock, bit 1 is NumberLock, bit 2 is CapsLock
const PS2K_CMD_SET_LEDS: u8 = 0xed;

const PS2K_CMD_ECHO: u8 = 0xee;
const PS2K_CMD_SCAN_CODE: u8 = 0xf0;
const PS2K_CMD_IDENT: u8 = 0xf2;
const PS2K_CMD_TYPEMATIC: u8 = 0xf3;
const PS2K_CMD_SCAN_EN: u8 = 0xf4;
const PS2K_CMD_SCAN_DIS: u8 = 0xf5;
const PS2K_CMD_SET_DEFAULT: u8 = 0xf6;

// Scan code set 3 only: per-key and all-key make/break/typematic types
const PS2K_CMD_SC3_KEY_TYPE_START: u8 = 0xf7;
const PS2K_CMD_SC3_KEY_TYPE_END: u8 = 0xfd;

const PS2K_CMD_RESEND: u8 = 0xfe;
const PS2K_CMD_RESET: u8 = 0xff;

pub const PS2K_R_ACK: u8 = 0xfa;
pub const PS2K_R_ECHO: u8 = 0xee;
pub const PS2K_R_RESEND: u8 = 0xfe;
pub const PS2K_R_ERROR: u8 = 0xfc;
pub const PS2K_R_SELF_TEST_PASS: u8 = 0xaa;

const PS2K_TYPEMATIC_DELAYS_MS: [u16; 4] = [250, 500, 750, 1000];

const DEFAULT_TYPEMATIC_DELAY_MS: u16 = 500;
const DEFAULT_TYPEMATIC_RATE_HZ: f32 = 10.9;
// Parameter byte a host would send for the default 10.9cps/500ms setting
const DEFAULT_TYPEMATIC: u8 = 0x2b;
const DEFAULT_SCAN_CODE_SET: u8 = 2;

/// How long [PS2Kbd::key_press] holds a key down.
pub const KEY_PRESS_HOLD: Duration = Duration::from_millis(20);
/// Settle time between the power-on code and the self test.
pub const POWER_ON_SETTLE: Duration = Duration::from_millis(10);
/// Time the Basic Assurance Test takes before reporting success.
pub const BAT_DURATION: Duration = Duration::from_millis(520);

bitflags! {
    /// LED state as carried in the Set LEDs parameter byte.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct LedState: u8 {
        const SCROLL_LOCK = 1 << 0;
        const NUM_LOCK = 1 << 1;
        const CAPS_LOCK = 1 << 2;
    }
}

/// Split a Set Typematic parameter byte into its delay (bits 5-6) and its
/// repeat period in seconds (A in bits 0-2, B in bits 3-4).
///
/// The period is `2^B * (8 + A) / 240`, i.e. `(8 + A) * 2^B * 4.17ms`.
pub fn decode_typematic(v: u8) -> (u16, f32) {
    let delay = PS2K_TYPEMATIC_DELAYS_MS[usize::from((v >> 5) & 0b11)];
    let a = f32::from(v & 0b111);
    let b = (v >> 3) & 0b11;
    let period = f32::from(1u8 << b) * (8.0 + a) / 240.0;
    (delay, period)
}

/// Host command, as decoded by [PS2Kbd::process_command].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HostCommand {
    SetLeds(LedState),
    Echo,
    /// Get (0) or set the scan code set; carries the raw parameter.
    ScanCodeSet(u8),
    ReadId,
    /// Set typematic rate/delay; carries the raw parameter.
    Typematic(u8),
    Enable,
    DisableDefaults,
    SetDefaults,
    /// One of the scan code set 3 key-type commands (0xf7 - 0xfd).
    KeyType(u8),
    Resend,
    Reset,
    Unknown(u8),
}

/// Configuration and protocol state of the emulated keyboard.
///
/// Restored state passes through the same setters the host commands use, so
/// out-of-range values are coerced on the way in.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(from = "StoredConfiguration")]
pub struct DeviceConfiguration {
    typematic_delay_ms: u16,
    typematic_rate_hz: f32,
    /// Repeat period (seconds) decoded from the last Set Typematic command.
    typematic_period: f32,
    scan_code_set: u8,
    all_keys_mode: u8,
    led_num_lock: bool,
    led_caps_lock: bool,
    led_scroll_lock: bool,
    pub(crate) enabled: bool,
    pub(crate) last_sent_byte: u8,
    pub(crate) buffer_length: u16,
}

#[derive(Deserialize)]
struct StoredConfiguration {
    typematic_delay_ms: u16,
    typematic_rate_hz: f32,
    typematic_period: f32,
    scan_code_set: u8,
    all_keys_mode: u8,
    led_num_lock: bool,
    led_caps_lock: bool,
    led_scroll_lock: bool,
    enabled: bool,
    last_sent_byte: u8,
    buffer_length: u16,
}
impl From<StoredConfiguration> for DeviceConfiguration {
    fn from(st: StoredConfiguration) -> Self {
        let mut cfg = Self::new();
        cfg.set_typematic_delay(st.typematic_delay_ms);
        cfg.set_typematic_rate(st.typematic_rate_hz);
        cfg.typematic_period = st.typematic_period;
        cfg.set_scan_code_set(st.scan_code_set);
        cfg.set_all_keys_mode(st.all_keys_mode);
        cfg.set_led_num_lock(st.led_num_lock);
        cfg.set_led_caps_lock(st.led_caps_lock);
        cfg.set_led_scroll_lock(st.led_scroll_lock);
        cfg.set_enabled(st.enabled);
        cfg.last_sent_byte = st.last_sent_byte;
        cfg.buffer_length = st.buffer_length;
        cfg
    }
}

impl DeviceConfiguration {
    pub fn new() -> Self {
        let mut cfg = Self {
            typematic_delay_ms: 0,
            typematic_rate_hz: 0.0,
            typematic_period: 0.0,
            scan_code_set: 0,
            all_keys_mode: 0,
            led_num_lock: false,
            led_caps_lock: false,
            led_scroll_lock: false,
            enabled: true,
            last_sent_byte: 0,
            buffer_length: 0,
        };
        cfg.set_defaults();
        cfg
    }

    /// Restore power-on defaults.  LEDs and the enabled flag are left alone.
    pub fn set_defaults(&mut self) {
        self.set_typematic_delay(DEFAULT_TYPEMATIC_DELAY_MS);
        self.set_typematic_rate(DEFAULT_TYPEMATIC_RATE_HZ);
        self.typematic_period = decode_typematic(DEFAULT_TYPEMATIC).1;
        self.set_scan_code_set(DEFAULT_SCAN_CODE_SET);
        self.set_all_keys_mode(0);
        self.buffer_length = 0;
        self.last_sent_byte = 0;
    }

    pub fn typematic_delay(&self) -> u16 {
        self.typematic_delay_ms
    }
    /// Anything outside 250..=1000 ms falls back to 500 ms.
    pub fn set_typematic_delay(&mut self, ms: u16) {
        self.typematic_delay_ms =
            if (250..=1000).contains(&ms) { ms } else { 500 };
    }

    pub fn typematic_rate(&self) -> f32 {
        self.typematic_rate_hz
    }
    pub fn set_typematic_rate(&mut self, hz: f32) {
        self.typematic_rate_hz = hz;
    }

    pub fn typematic_period(&self) -> f32 {
        self.typematic_period
    }

    /// Apply a Set Typematic parameter byte.
    pub fn set_typematic(&mut self, v: u8) {
        let (delay, period) = decode_typematic(v);
        self.set_typematic_delay(delay);
        self.typematic_period = period;
        self.set_typematic_rate(1.0 / period);
    }

    pub fn scan_code_set(&self) -> u8 {
        self.scan_code_set
    }
    /// Anything other than 1, 2 or 3 falls back to set 2.
    pub fn set_scan_code_set(&mut self, set: u8) {
        self.scan_code_set = match set {
            1..=3 => set,
            _ => DEFAULT_SCAN_CODE_SET,
        };
    }

    pub fn all_keys_mode(&self) -> u8 {
        self.all_keys_mode
    }
    pub fn set_all_keys_mode(&mut self, mode: u8) {
        self.all_keys_mode = mode;
    }

    pub fn led_num_lock(&self) -> bool {
        self.led_num_lock
    }
    pub fn set_led_num_lock(&mut self, on: bool) {
        self.led_num_lock = on;
    }

    pub fn led_caps_lock(&self) -> bool {
        self.led_caps_lock
    }
    pub fn set_led_caps_lock(&mut self, on: bool) {
        self.led_caps_lock = on;
    }

    pub fn led_scroll_lock(&self) -> bool {
        self.led_scroll_lock
    }
    pub fn set_led_scroll_lock(&mut self, on: bool) {
        self.led_scroll_lock = on;
    }

    pub fn leds(&self) -> LedState {
        let mut leds = LedState::empty();
        leds.set(LedState::SCROLL_LOCK, self.led_scroll_lock);
        leds.set(LedState::NUM_LOCK, self.led_num_lock);
        leds.set(LedState::CAPS_LOCK, self.led_caps_lock);
        leds
    }
    pub fn set_leds(&mut self, leds: LedState) {
        self.led_scroll_lock = leds.contains(LedState::SCROLL_LOCK);
        self.led_num_lock = leds.contains(LedState::NUM_LOCK);
        self.led_caps_lock = leds.contains(LedState::CAPS_LOCK);
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn last_sent_byte(&self) -> u8 {
        self.last_sent_byte
    }

    pub fn buffer_length(&self) -> u16 {
        self.buffer_length
    }
}
impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PS2Kbd<L: PS2Line, D: Delay = StdDelay> {
    line: L,
    delay: D,
    retry: RetryPolicy,
    cfg: DeviceConfiguration,
    log: slog::Logger,
}

impl<L: PS2Line> PS2Kbd<L, StdDelay> {
    pub fn new(line: L, log: &slog::Logger) -> Self {
        Self::with_delay(line, StdDelay, log)
    }
}

impl<L: PS2Line, D: Delay> PS2Kbd<L, D> {
    pub fn with_delay(line: L, delay: D, log: &slog::Logger) -> Self {
        Self {
            line,
            delay,
            retry: RetryPolicy::unbounded(),
            cfg: DeviceConfiguration::new(),
            log: log.new(o!("component" => "ps2kbd")),
        }
    }

    pub fn with_retry_policy(self, retry: RetryPolicy) -> Self {
        Self { retry, ..self }
    }

    pub fn config(&self) -> &DeviceConfiguration {
        &self.cfg
    }
    pub fn config_mut(&mut self) -> &mut DeviceConfiguration {
        &mut self.cfg
    }

    /// Send the make code for `key`.
    pub fn key_down(&mut self, key: Keycode) -> Result<(), Error> {
        self.key_event(key, true)
    }

    /// Send the break code for `key`.  Pause has none, so releasing it sends
    /// nothing.
    pub fn key_up(&mut self, key: Keycode) -> Result<(), Error> {
        self.key_event(key, false)
    }

    /// Press and release `key`, holding it for [KEY_PRESS_HOLD].
    pub fn key_press(&mut self, key: Keycode) -> Result<(), Error> {
        self.key_down(key)?;
        self.delay.delay(KEY_PRESS_HOLD);
        self.key_up(key)
    }

    pub fn key_down_raw(&mut self, raw: u16) -> Result<(), Error> {
        self.key_down(Keycode::from_raw(raw)?)
    }
    pub fn key_up_raw(&mut self, raw: u16) -> Result<(), Error> {
        self.key_up(Keycode::from_raw(raw)?)
    }
    pub fn key_press_raw(&mut self, raw: u16) -> Result<(), Error> {
        self.key_press(Keycode::from_raw(raw)?)
    }

    /// Press and release each key in turn.
    pub fn type_keys(&mut self, keys: &[Keycode]) -> Result<(), Error> {
        for key in keys {
            self.key_press(*key)?;
        }
        Ok(())
    }

    fn key_event(&mut self, key: Keycode, make: bool) -> Result<(), Error> {
        if !self.cfg.enabled {
            // scanning disabled by the host
            probes::ps2kbd_keyevent_dropped!(|| (key.raw(), u8::from(make)));
            warn!(self.log, "key event while disabled";
                "key" => key.name(), "make" => make);
            return Ok(());
        }
        probes::ps2kbd_keyevent!(|| (key.raw(), u8::from(make)));

        if make {
            debug!(self.log, "make"; "key" => key.name());
            for &b in scancode::make_sequence(key) {
                self.send(b)?;
            }
        } else if scancode::has_break(key) {
            debug!(self.log, "break"; "key" => key.name());
            for b in scancode::break_sequence(key) {
                self.send(b)?;
            }
        }
        Ok(())
    }

    /// Power-on sequence: announce ourselves, then run the self test.
    pub fn initialize(&mut self) -> Result<(), Error> {
        info!(self.log, "sending keyboard initialization codes");
        self.send(PS2K_R_SELF_TEST_PASS)?;
        self.delay.delay(POWER_ON_SETTLE);
        self.run_bat()?;
        info!(self.log, "keyboard initialization complete");
        Ok(())
    }

    /// Basic Assurance Test.
    ///
    /// Lights every LED, restores defaults, re-enables scanning and, after
    /// [BAT_DURATION], reports success to the host.
    pub fn run_bat(&mut self) -> Result<(), Error> {
        debug!(self.log, "running basic assurance test");
        self.cfg.set_led_num_lock(true);
        self.cfg.set_led_caps_lock(true);
        self.cfg.set_led_scroll_lock(true);
        self.set_defaults();
        self.cfg.enabled = true;
        self.delay.delay(BAT_DURATION);
        debug!(self.log, "basic assurance test passed");
        self.send(PS2K_R_SELF_TEST_PASS)
    }

    pub fn set_defaults(&mut self) {
        debug!(self.log, "restoring keyboard defaults");
        self.cfg.set_defaults();
    }

    /// Read and carry out one command from the host.
    pub fn process_command(&mut self) -> Result<HostCommand, Error> {
        let cmd = self.line.read()?;
        probes::ps2kbd_cmd!(|| cmd);
        debug!(self.log, "host command"; "cmd" => format!("{cmd:#04x}"));

        let res = match cmd {
            PS2K_CMD_SET_LEDS => {
                self.ack()?;
                let leds = LedState::from_bits_truncate(self.read_param(cmd)?);
                self.cfg.set_leds(leds);
                HostCommand::SetLeds(leds)
            }
            PS2K_CMD_ECHO => {
                self.send(PS2K_R_ECHO)?;
                HostCommand::Echo
            }
            PS2K_CMD_SCAN_CODE => {
                self.ack()?;
                let v = self.read_param(cmd)?;
                if v == 0 {
                    // get scan code set
                    self.send(self.cfg.scan_code_set())?;
                } else {
                    self.cfg.set_scan_code_set(v);
                }
                HostCommand::ScanCodeSet(v)
            }
            PS2K_CMD_IDENT => {
                // ID bytes are left to whatever sits in front of the line
                self.ack()?;
                HostCommand::ReadId
            }
            PS2K_CMD_TYPEMATIC => {
                self.ack()?;
                let v = self.read_param(cmd)?;
                self.cfg.set_typematic(v);
                HostCommand::Typematic(v)
            }
            PS2K_CMD_SCAN_EN => {
                self.ack()?;
                self.cfg.enabled = true;
                self.cfg.buffer_length = 0;
                HostCommand::Enable
            }
            PS2K_CMD_SCAN_DIS => {
                // disable and set defaults, without a full BAT
                self.ack()?;
                self.set_defaults();
                self.cfg.enabled = false;
                HostCommand::DisableDefaults
            }
            PS2K_CMD_SET_DEFAULT => {
                self.ack()?;
                self.run_bat()?;
                HostCommand::SetDefaults
            }
            PS2K_CMD_SC3_KEY_TYPE_START..=PS2K_CMD_SC3_KEY_TYPE_END => {
                self.ack()?;
                HostCommand::KeyType(cmd)
            }
            PS2K_CMD_RESEND => {
                self.send(self.cfg.last_sent_byte)?;
                HostCommand::Resend
            }
            PS2K_CMD_RESET => {
                self.ack()?;
                self.run_bat()?;
                HostCommand::Reset
            }
            _ => {
                probes::ps2kbd_unknown_cmd!(|| cmd);
                warn!(self.log, "unrecognized host command";
                    "cmd" => format!("{cmd:#04x}"));
                self.send(PS2K_R_RESEND)?;
                HostCommand::Unknown(cmd)
            }
        };
        Ok(res)
    }

    fn read_param(&mut self, cmd: u8) -> Result<u8, Error> {
        let v = self.line.read()?;
        probes::ps2kbd_cmd_param!(|| (cmd, v));
        Ok(v)
    }

    fn ack(&mut self) -> Result<(), Error> {
        self.send(PS2K_R_ACK)
    }

    /// Put `v` on the line and remember it for a later Resend.
    fn send(&mut self, v: u8) -> Result<(), Error> {
        let log = &self.log;
        self.retry.write(&mut self.line, &mut self.delay, v, |attempt| {
            probes::ps2kbd_write_retry!(|| (v, attempt));
            if attempt == 1 {
                debug!(log, "line busy, retrying"; "byte" => v);
            }
        })?;
        probes::ps2kbd_data!(|| v);
        self.cfg.last_sent_byte = v;
        Ok(())
    }
}

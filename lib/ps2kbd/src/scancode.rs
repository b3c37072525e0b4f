// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scan Code Set 2 sequences.
//!
//! Keyboards send a "make" code when a key is pressed, and a "break" code
//! when it is released.  A make code is usually a single base byte, or the
//! extended prefix followed by a base byte.  The break code is formed from
//! the make code by placing the release code in front of every base byte,
//! leaving the extended prefix where it is:
//!
//! - `[base]`            breaks as `[0xf0, base]`
//! - `[0xe0, base]`      breaks as `[0xe0, 0xf0, base]`
//!
//! Print Screen is sent as two extended make codes and breaks by the same
//! rule applied to each.  Pause is a single fixed burst starting with the
//! 0xe1 prefix and has no break code at all.

use crate::keycode::{Keycode, DENSE_KEYS};

pub const SC2_RELEASE_CODE: u8 = 0xf0;
pub const SC2_EXTENDED_PREFIX_0: u8 = 0xe0;
pub const SC2_EXTENDED_PREFIX_1: u8 = 0xe1;

const E0: u8 = SC2_EXTENDED_PREFIX_0;

pub const SC2_PRINTSCREEN: [u8; 4] = [E0, 0x12, E0, 0x7c];
pub const SC2_PAUSE: [u8; 8] = [
    SC2_EXTENDED_PREFIX_1,
    0x14,
    0x77,
    SC2_EXTENDED_PREFIX_1,
    SC2_RELEASE_CODE,
    0x14,
    SC2_RELEASE_CODE,
    0x77,
];

/// Make sequences indexed by [Keycode] discriminant.
static SC2_MAKE: [&[u8]; DENSE_KEYS] = [
    // A - Z
    &[0x1c],
    &[0x32],
    &[0x21],
    &[0x23],
    &[0x24],
    &[0x2b],
    &[0x34],
    &[0x33],
    &[0x43],
    &[0x3b],
    &[0x42],
    &[0x4b],
    &[0x3a],
    &[0x31],
    &[0x44],
    &[0x4d],
    &[0x15],
    &[0x2d],
    &[0x1b],
    &[0x2c],
    &[0x3c],
    &[0x2a],
    &[0x1d],
    &[0x22],
    &[0x35],
    &[0x1a],
    // 1 - 9, 0
    &[0x16],
    &[0x1e],
    &[0x26],
    &[0x25],
    &[0x2e],
    &[0x36],
    &[0x3d],
    &[0x3e],
    &[0x46],
    &[0x45],
    // Enter, Escape, Backspace, Tab, Space
    &[0x5a],
    &[0x76],
    &[0x66],
    &[0x0d],
    &[0x29],
    // - = [ ] \ ; ' ` , . /
    &[0x4e],
    &[0x55],
    &[0x54],
    &[0x5b],
    &[0x5d],
    &[0x4c],
    &[0x52],
    &[0x0e],
    &[0x41],
    &[0x49],
    &[0x4a],
    // CapsLock
    &[0x58],
    // F1 - F12
    &[0x05],
    &[0x06],
    &[0x04],
    &[0x0c],
    &[0x03],
    &[0x0b],
    &[0x83],
    &[0x0a],
    &[0x01],
    &[0x09],
    &[0x78],
    &[0x07],
    // ScrollLock
    &[0x7e],
    // Insert, Home, PageUp, Delete, End, PageDown
    &[E0, 0x70],
    &[E0, 0x6c],
    &[E0, 0x7d],
    &[E0, 0x71],
    &[E0, 0x69],
    &[E0, 0x7a],
    // Right, Left, Down, Up
    &[E0, 0x74],
    &[E0, 0x6b],
    &[E0, 0x72],
    &[E0, 0x75],
    // NumLock, KP / * - + Enter
    &[0x77],
    &[E0, 0x4a],
    &[0x7c],
    &[0x7b],
    &[0x79],
    &[E0, 0x5a],
    // KP 1 - 9, 0, .
    &[0x69],
    &[0x72],
    &[0x7a],
    &[0x6b],
    &[0x73],
    &[0x74],
    &[0x6c],
    &[0x75],
    &[0x7d],
    &[0x70],
    &[0x71],
    // Menu
    &[E0, 0x2f],
    // Left Ctrl, Shift, Alt, Super
    &[0x14],
    &[0x12],
    &[0x11],
    &[E0, 0x1f],
    // Right Ctrl, Shift, Alt, Super
    &[E0, 0x14],
    &[0x59],
    &[E0, 0x11],
    &[E0, 0x27],
    // Power, Sleep, Wake
    &[E0, 0x37],
    &[E0, 0x3f],
    &[E0, 0x5e],
];

/// Set 2 make sequence for `key`.
pub fn make_sequence(key: Keycode) -> &'static [u8] {
    match key {
        Keycode::PrintScreen => &SC2_PRINTSCREEN,
        Keycode::Pause => &SC2_PAUSE,
        // Every other key has a discriminant below DENSE_KEYS.
        k => SC2_MAKE[k as usize],
    }
}

/// Whether `key` produces a break code on release.
pub fn has_break(key: Keycode) -> bool {
    make_sequence(key).first() != Some(&SC2_EXTENDED_PREFIX_1)
}

/// Set 2 break sequence for `key`; empty for Pause.
///
/// The 0xe0 prefix is repeated as-is, every other byte of the make sequence
/// is preceded by the release code.
pub fn break_sequence(key: Keycode) -> Vec<u8> {
    if !has_break(key) {
        return Vec::new();
    }
    let make = make_sequence(key);
    let mut out = Vec::with_capacity(make.len() * 2);
    for &b in make {
        if b == SC2_EXTENDED_PREFIX_0 {
            out.push(b);
        } else {
            out.push(SC2_RELEASE_CODE);
            out.push(b);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use strum::IntoEnumIterator;

    #[test]
    fn single_byte_keys() {
        assert_eq!(make_sequence(Keycode::A), &[0x1c]);
        assert_eq!(break_sequence(Keycode::A), vec![0xf0, 0x1c]);
        assert_eq!(make_sequence(Keycode::Num2), &[0x1e]);
        assert_eq!(make_sequence(Keycode::F7), &[0x83]);
        assert_eq!(make_sequence(Keycode::Wake), &[0xe0, 0x5e]);
    }

    #[test]
    fn extended_keys() {
        assert_eq!(make_sequence(Keycode::AltRight), &[0xe0, 0x11]);
        assert_eq!(
            break_sequence(Keycode::AltRight),
            vec![0xe0, 0xf0, 0x11]
        );
        assert_eq!(make_sequence(Keycode::KeypadEnter), &[0xe0, 0x5a]);
    }

    #[test]
    fn print_screen() {
        assert_eq!(
            make_sequence(Keycode::PrintScreen),
            &[0xe0, 0x12, 0xe0, 0x7c]
        );
        assert_eq!(
            break_sequence(Keycode::PrintScreen),
            vec![0xe0, 0xf0, 0x12, 0xe0, 0xf0, 0x7c]
        );
    }

    #[test]
    fn pause_has_no_break() {
        assert_eq!(make_sequence(Keycode::Pause)[0], 0xe1);
        assert_eq!(make_sequence(Keycode::Pause).len(), 8);
        assert!(!has_break(Keycode::Pause));
        assert!(break_sequence(Keycode::Pause).is_empty());
    }

    #[test]
    fn table_shape() {
        for key in Keycode::iter() {
            let make = make_sequence(key);
            assert!(!make.is_empty(), "{key:?}");
            // zero was the end-of-sequence marker and never a real byte
            assert!(!make.contains(&0), "{key:?}");
            if key != Keycode::Pause {
                assert!(has_break(key), "{key:?}");
                assert_ne!(make[0], SC2_EXTENDED_PREFIX_1, "{key:?}");
            }
        }
    }

    #[test]
    fn make_codes_are_unique() {
        let mut seen = std::collections::HashMap::new();
        for key in Keycode::iter() {
            if let Some(other) = seen.insert(make_sequence(key), key) {
                panic!("{key:?} shares a make code with {other:?}");
            }
        }
    }
}

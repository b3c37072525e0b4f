// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::Error;

/// Logical keys the keyboard can report.
///
/// Discriminants `0..DENSE_KEYS` index the dense Set 2 table in
/// [crate::scancode].  [Keycode::PrintScreen] and [Keycode::Pause] sit past
/// the end of that table, as their sequences do not follow the usual
/// prefix/base shape.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum::FromRepr,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[repr(u16)]
pub enum Keycode {
    // Letters
    A = 0,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,

    // Number row
    #[strum(serialize = "1")]
    Num1,
    #[strum(serialize = "2")]
    Num2,
    #[strum(serialize = "3")]
    Num3,
    #[strum(serialize = "4")]
    Num4,
    #[strum(serialize = "5")]
    Num5,
    #[strum(serialize = "6")]
    Num6,
    #[strum(serialize = "7")]
    Num7,
    #[strum(serialize = "8")]
    Num8,
    #[strum(serialize = "9")]
    Num9,
    #[strum(serialize = "0")]
    Num0,

    Enter,
    Escape,
    Backspace,
    Tab,
    Space,
    Minus,
    Equal,
    LeftBracket,
    RightBracket,
    Backslash,
    Semicolon,
    Quote,
    Backtick,
    Comma,
    Period,
    Slash,
    CapsLock,

    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,

    ScrollLock,
    Insert,
    Home,
    PageUp,
    Delete,
    End,
    PageDown,
    Right,
    Left,
    Down,
    Up,

    // Keypad
    NumLock,
    KeypadSlash,
    KeypadAsterisk,
    KeypadMinus,
    KeypadPlus,
    KeypadEnter,
    Keypad1,
    Keypad2,
    Keypad3,
    Keypad4,
    Keypad5,
    Keypad6,
    Keypad7,
    Keypad8,
    Keypad9,
    Keypad0,
    KeypadPeriod,

    Menu,

    // Modifiers
    ControlLeft,
    ShiftLeft,
    AltLeft,
    SuperLeft,
    ControlRight,
    ShiftRight,
    AltRight,
    SuperRight,

    // ACPI
    Power,
    Sleep,
    Wake,

    // Irregular sequences, outside the dense table
    PrintScreen,
    Pause,
}

/// Number of keycodes served by the dense scancode table.
pub const DENSE_KEYS: usize = Keycode::PrintScreen as usize;

impl Keycode {
    /// Validate a raw keycode from an upstream event source.
    pub fn from_raw(raw: u16) -> Result<Self, Error> {
        Self::from_repr(raw).ok_or(Error::UnknownKeycode(raw))
    }

    pub fn raw(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl TryFrom<u16> for Keycode {
    type Error = Error;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Keycode::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn raw_values_are_dense() {
        for (idx, key) in Keycode::iter().enumerate() {
            assert_eq!(key.raw() as usize, idx, "{key:?}");
        }
        assert_eq!(Keycode::Pause.raw() as usize, DENSE_KEYS + 1);
    }

    #[test]
    fn from_raw_bounds() {
        assert_eq!(Keycode::from_raw(0).unwrap(), Keycode::A);
        assert_eq!(
            Keycode::from_raw(DENSE_KEYS as u16).unwrap(),
            Keycode::PrintScreen
        );
        let past_end = Keycode::Pause.raw() + 1;
        assert!(matches!(
            Keycode::from_raw(past_end),
            Err(Error::UnknownKeycode(v)) if v == past_end
        ));
        assert!(Keycode::try_from(u16::MAX).is_err());
    }

    #[test]
    fn parse_names() {
        assert_eq!(Keycode::from_str("Enter").unwrap(), Keycode::Enter);
        assert_eq!(Keycode::from_str("7").unwrap(), Keycode::Num7);
        assert_eq!(
            Keycode::from_str("PrintScreen").unwrap(),
            Keycode::PrintScreen
        );
        assert!(Keycode::from_str("NotAKey").is_err());
        assert_eq!(Keycode::Num0.name(), "0");
    }
}

//! Key code translation.
//!
//! The binding delivers X keysyms folded into `0..0x200` (`keysym & 0x1ff`),
//! so the function/cursor block `0xff00..0xffff` lands at `256..511` and plain
//! Latin-1 keysyms keep their character value.

use std::fmt;

/// Translated value carried by the `key_press` signal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    /// Well-known key, e.g. `"up"`, `"F1"`, `"left-ctrl"`.
    Named(&'static str),
    /// Printable character for codes below 255.
    Char(char),
    /// Unknown code, passed through untouched.
    Code(u32),
}

impl Key {
    /// Name or character as a string; `None` for raw codes.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Key::Named(name) => Some((*name).to_string()),
            Key::Char(c) => Some(c.to_string()),
            Key::Code(_) => None,
        }
    }

    #[inline]
    pub fn is_named(&self, name: &str) -> bool {
        matches!(self, Key::Named(n) if *n == name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Named(name) => f.write_str(name),
            Key::Char(c) => write!(f, "{c}"),
            Key::Code(code) => write!(f, "{code}"),
        }
    }
}

/// Map a raw key code to its semantic value.
///
/// Known codes win over the character range; anything else at or above 255
/// is returned as [`Key::Code`].
pub fn translate(code: u32) -> Key {
    if let Some(name) = named(code) {
        return Key::Named(name);
    }
    if code < 255 {
        // Latin-1 keysyms map 1:1 onto Unicode scalar values.
        return Key::Char(char::from(code as u8));
    }
    Key::Code(code)
}

fn named(code: u32) -> Option<&'static str> {
    let name = match code {
        264 => "backspace",
        265 => "tab",
        269 => "enter",
        275 => "pause",
        276 => "scroll-lock",
        283 => "esc",
        336 => "home",
        337 => "left",
        338 => "up",
        339 => "right",
        340 => "down",
        341 => "pageup",
        342 => "pagedown",
        343 => "end",
        353 => "print",
        355 => "insert",
        359 => "menu",
        383 => "num-lock",
        397 => "kp-enter",
        446 => "F1",
        447 => "F2",
        448 => "F3",
        449 => "F4",
        450 => "F5",
        451 => "F6",
        452 => "F7",
        453 => "F8",
        454 => "F9",
        455 => "F10",
        456 => "F11",
        457 => "F12",
        481 => "left-shift",
        482 => "right-shift",
        483 => "left-ctrl",
        484 => "right-ctrl",
        485 => "caps-lock",
        487 => "left-meta",
        488 => "right-meta",
        489 => "left-alt",
        490 => "right-alt",
        491 => "left-super",
        492 => "right-super",
        511 => "delete",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_codes_become_chars() {
        assert_eq!(translate(64), Key::Char('@'));
        assert_eq!(translate(u32::from(b'q')), Key::Char('q'));
        assert_eq!(translate(32), Key::Char(' '));
    }

    #[test]
    fn known_codes_become_names() {
        assert_eq!(translate(338), Key::Named("up"));
        assert_eq!(translate(446), Key::Named("F1"));
        assert_eq!(translate(483), Key::Named("left-ctrl"));
        assert!(translate(283).is_named("esc"));
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(translate(999), Key::Code(999));
        assert_eq!(translate(255), Key::Code(255));
        assert_eq!(translate(999).to_string(), "999");
        assert_eq!(translate(999).as_text(), None);
    }
}

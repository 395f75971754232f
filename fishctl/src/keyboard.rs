use crate::error::{Error, Result};
use evdev::Key;

/// Named keys accepted by [`parse_key_name`], besides single letters and digits.
const NAMED_KEYS: &[(&str, Key)] = &[
    ("enter", Key::KEY_ENTER),
    ("return", Key::KEY_ENTER),
    ("space", Key::KEY_SPACE),
    ("tab", Key::KEY_TAB),
    ("backspace", Key::KEY_BACKSPACE),
    ("escape", Key::KEY_ESC),
    ("esc", Key::KEY_ESC),
    ("shift", Key::KEY_LEFTSHIFT),
    ("lshift", Key::KEY_LEFTSHIFT),
    ("rshift", Key::KEY_RIGHTSHIFT),
    ("ctrl", Key::KEY_LEFTCTRL),
    ("control", Key::KEY_LEFTCTRL),
    ("lctrl", Key::KEY_LEFTCTRL),
    ("rctrl", Key::KEY_RIGHTCTRL),
    ("alt", Key::KEY_LEFTALT),
    ("lalt", Key::KEY_LEFTALT),
    ("ralt", Key::KEY_RIGHTALT),
    ("up", Key::KEY_UP),
    ("down", Key::KEY_DOWN),
    ("left", Key::KEY_LEFT),
    ("right", Key::KEY_RIGHT),
    ("f1", Key::KEY_F1),
    ("f2", Key::KEY_F2),
    ("f3", Key::KEY_F3),
    ("f4", Key::KEY_F4),
    ("f5", Key::KEY_F5),
    ("f6", Key::KEY_F6),
    ("f7", Key::KEY_F7),
    ("f8", Key::KEY_F8),
    ("f9", Key::KEY_F9),
    ("f10", Key::KEY_F10),
    ("f11", Key::KEY_F11),
    ("f12", Key::KEY_F12),
];

const LETTER_KEYS: [Key; 26] = [
    Key::KEY_A,
    Key::KEY_B,
    Key::KEY_C,
    Key::KEY_D,
    Key::KEY_E,
    Key::KEY_F,
    Key::KEY_G,
    Key::KEY_H,
    Key::KEY_I,
    Key::KEY_J,
    Key::KEY_K,
    Key::KEY_L,
    Key::KEY_M,
    Key::KEY_N,
    Key::KEY_O,
    Key::KEY_P,
    Key::KEY_Q,
    Key::KEY_R,
    Key::KEY_S,
    Key::KEY_T,
    Key::KEY_U,
    Key::KEY_V,
    Key::KEY_W,
    Key::KEY_X,
    Key::KEY_Y,
    Key::KEY_Z,
];

const DIGIT_KEYS: [Key; 10] = [
    Key::KEY_0,
    Key::KEY_1,
    Key::KEY_2,
    Key::KEY_3,
    Key::KEY_4,
    Key::KEY_5,
    Key::KEY_6,
    Key::KEY_7,
    Key::KEY_8,
    Key::KEY_9,
];

/// Parse a key name string into an evdev Key
///
/// Supports:
/// - Special keys: "enter", "space", "tab", "backspace", "escape"/"esc"
/// - Modifiers: "shift", "ctrl", "alt"
/// - Arrows: "up", "down", "left", "right"
/// - Function keys: "f1" through "f12"
/// - Single characters: "a"-"z", "0"-"9"
pub fn parse_key_name(name: &str) -> Result<Key> {
    let lower = name.trim().to_lowercase();

    if let Some((_, key)) = NAMED_KEYS.iter().find(|(n, _)| *n == lower) {
        return Ok(*key);
    }

    let mut chars = lower.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_lowercase() {
            return Ok(LETTER_KEYS[(c as u8 - b'a') as usize]);
        }
        if c.is_ascii_digit() {
            return Ok(DIGIT_KEYS[(c as u8 - b'0') as usize]);
        }
    }

    Err(Error::UnknownKey(name.to_string()))
}

/// Every keyboard key the virtual device registers
pub(crate) fn supported_keys() -> impl Iterator<Item = Key> {
    NAMED_KEYS
        .iter()
        .map(|(_, key)| *key)
        .chain(LETTER_KEYS)
        .chain(DIGIT_KEYS)
}

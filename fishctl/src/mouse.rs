use crate::error::Error;
use evdev::Key;
use std::str::FromStr;

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Side,
    Extra,
}

impl MouseButton {
    pub const ALL: [MouseButton; 5] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::Side,
        MouseButton::Extra,
    ];

    /// Convert to evdev Key code
    pub fn to_key(self) -> Key {
        match self {
            MouseButton::Left => Key::BTN_LEFT,
            MouseButton::Right => Key::BTN_RIGHT,
            MouseButton::Middle => Key::BTN_MIDDLE,
            MouseButton::Side => Key::BTN_SIDE,
            MouseButton::Extra => Key::BTN_EXTRA,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
            MouseButton::Side => "side",
            MouseButton::Extra => "extra",
        }
    }
}

impl FromStr for MouseButton {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MouseButton::ALL
            .into_iter()
            .find(|button| button.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownButton(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_to_key_mapping() {
        assert_eq!(MouseButton::Left.to_key(), Key::BTN_LEFT);
        assert_eq!(MouseButton::Right.to_key(), Key::BTN_RIGHT);
        assert_eq!(MouseButton::Middle.to_key(), Key::BTN_MIDDLE);
        assert_eq!(MouseButton::Side.to_key(), Key::BTN_SIDE);
        assert_eq!(MouseButton::Extra.to_key(), Key::BTN_EXTRA);
    }

    #[test]
    fn buttons_are_distinct() {
        for (i, a) in MouseButton::ALL.iter().enumerate() {
            for (j, b) in MouseButton::ALL.iter().enumerate() {
                if i != j {
                    assert_ne!(a.to_key(), b.to_key());
                }
            }
        }
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for button in MouseButton::ALL {
            assert_eq!(button.name().parse::<MouseButton>().unwrap(), button);
        }
        assert_eq!("RIGHT".parse::<MouseButton>().unwrap(), MouseButton::Right);
        assert!(matches!(
            "fourth".parse::<MouseButton>(),
            Err(Error::UnknownButton(_))
        ));
    }
}

use glam::Vec2;

/// A logical movement key. Physical bindings live in the platform adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HoldKey {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
}

impl HoldKey {
    pub const ALL: [HoldKey; 6] = [
        HoldKey::Forward,
        HoldKey::Back,
        HoldKey::Left,
        HoldKey::Right,
        HoldKey::Up,
        HoldKey::Down,
    ];

    /// Look up a key by logical name or its default WASD binding, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "forward" | "w" => Some(HoldKey::Forward),
            "back" | "s" => Some(HoldKey::Back),
            "left" | "a" => Some(HoldKey::Left),
            "right" | "d" => Some(HoldKey::Right),
            "up" | " " | "space" => Some(HoldKey::Up),
            "down" | "shift" => Some(HoldKey::Down),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HoldKey::Forward => "forward",
            HoldKey::Back => "back",
            HoldKey::Left => "left",
            HoldKey::Right => "right",
            HoldKey::Up => "up",
            HoldKey::Down => "down",
        }
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Copyable snapshot of which movement keys are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeldKeys(u8);

impl HeldKeys {
    pub const NONE: HeldKeys = HeldKeys(0);

    pub fn contains(self, key: HoldKey) -> bool {
        self.0 & key.bit() != 0
    }

    pub fn with(self, key: HoldKey) -> Self {
        HeldKeys(self.0 | key.bit())
    }

    pub fn set(&mut self, key: HoldKey, held: bool) {
        if held {
            self.0 |= key.bit();
        } else {
            self.0 &= !key.bit();
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<HoldKey> for HeldKeys {
    fn from_iter<I: IntoIterator<Item = HoldKey>>(iter: I) -> Self {
        iter.into_iter().fold(HeldKeys::NONE, HeldKeys::with)
    }
}

/// A platform-neutral input event produced by an adapter (winit, headless script).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key { key: HoldKey, held: bool },
    /// Relative pointer motion in pixels, screen-down positive.
    PointerMotion { delta: Vec2 },
    /// Absolute pointer position in pixels inside a viewport of `viewport` size.
    PointerPosition { position: Vec2, viewport: Vec2 },
    /// Pointer lock acquired: relative motion drives the look offset.
    FocusGained,
    /// Pointer lock released or window unfocused.
    FocusLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(HoldKey::from_name("W"), Some(HoldKey::Forward));
        assert_eq!(HoldKey::from_name("Shift"), Some(HoldKey::Down));
        assert_eq!(HoldKey::from_name("FORWARD"), Some(HoldKey::Forward));
        assert_eq!(HoldKey::from_name("q"), None);
    }

    #[test]
    fn every_key_round_trips_through_its_name() {
        for key in HoldKey::ALL {
            assert_eq!(HoldKey::from_name(key.name()), Some(key));
        }
    }

    #[test]
    fn held_keys_bitset() {
        let mut keys: HeldKeys = [HoldKey::Forward, HoldKey::Up].into_iter().collect();
        assert!(keys.contains(HoldKey::Forward));
        assert!(keys.contains(HoldKey::Up));
        assert!(!keys.contains(HoldKey::Back));
        keys.set(HoldKey::Forward, false);
        assert!(!keys.contains(HoldKey::Forward));
        keys.set(HoldKey::Up, false);
        assert!(keys.is_empty());
    }
}

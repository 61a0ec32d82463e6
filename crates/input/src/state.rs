use glam::Vec2;

use crate::action::{HeldKeys, HoldKey, InputEvent};

/// How pointer events feed the look offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerMode {
    /// Pointer lock held: relative motion accumulates without bound.
    Locked,
    /// No lock: the offset is the pointer's distance from the viewport centre.
    #[default]
    Unlocked,
}

/// Hold-state map plus pointer look offset, mutated by event callbacks.
#[derive(Debug, Clone)]
pub struct InputState {
    held: HeldKeys,
    mode: PointerMode,
    offset: Vec2,
    max_abs_y: f32,
    menu_signal: Option<bool>,
}

impl InputState {
    pub fn new(max_abs_y: f32) -> Self {
        Self {
            held: HeldKeys::NONE,
            mode: PointerMode::default(),
            offset: Vec2::ZERO,
            max_abs_y,
            menu_signal: None,
        }
    }

    pub fn set_held(&mut self, key: HoldKey, held: bool) {
        self.held.set(key, held);
    }

    /// Set a key by name. Unrecognized names are ignored; returns whether the name matched.
    pub fn set_held_by_name(&mut self, name: &str, held: bool) -> bool {
        match HoldKey::from_name(name) {
            Some(key) => {
                self.set_held(key, held);
                true
            }
            None => {
                tracing::trace!(name, "ignoring unbound key");
                false
            }
        }
    }

    pub fn is_held(&self, key: HoldKey) -> bool {
        self.held.contains(key)
    }

    pub fn held_keys(&self) -> HeldKeys {
        self.held
    }

    pub fn pointer_mode(&self) -> PointerMode {
        self.mode
    }

    /// Accumulated pointer offset in pixels, screen-up positive on Y.
    ///
    /// Locked mode sums relative motion since the tracker was created;
    /// unlocked mode reports the last position relative to the viewport centre.
    pub fn mouse_delta(&self) -> Vec2 {
        self.offset
    }

    pub fn max_abs_y(&self) -> f32 {
        self.max_abs_y
    }

    /// Relative pointer motion. Only counted while the pointer is locked.
    pub fn pointer_motion(&mut self, delta: Vec2) {
        if self.mode != PointerMode::Locked {
            return;
        }
        self.offset.x += delta.x;
        self.offset.y -= delta.y;
        self.clamp_y();
    }

    /// Absolute pointer position. Only used while the pointer is not locked.
    pub fn pointer_position(&mut self, position: Vec2, viewport: Vec2) {
        if self.mode != PointerMode::Unlocked {
            return;
        }
        self.offset = Vec2::new(position.x - viewport.x / 2.0, viewport.y / 2.0 - position.y);
        self.clamp_y();
    }

    pub fn focus_gained(&mut self) {
        self.focus_gained_with(PointerMode::Locked);
    }

    /// Leave the menu in the given pointer mode. Unlocked is the fallback
    /// when the host refuses a pointer lock.
    pub fn focus_gained_with(&mut self, mode: PointerMode) {
        self.mode = mode;
        self.menu_signal = Some(false);
        tracing::debug!(?mode, "pointer captured");
    }

    /// Focus loss safety reset: release every key and ask for the menu.
    pub fn focus_lost(&mut self) {
        self.held = HeldKeys::NONE;
        self.mode = PointerMode::Unlocked;
        self.menu_signal = Some(true);
        tracing::debug!("pointer released, held keys cleared");
    }

    /// Take the pending menu request, if focus changed since the last call.
    pub fn take_menu_signal(&mut self) -> Option<bool> {
        self.menu_signal.take()
    }

    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Key { key, held } => self.set_held(key, held),
            InputEvent::PointerMotion { delta } => self.pointer_motion(delta),
            InputEvent::PointerPosition { position, viewport } => {
                self.pointer_position(position, viewport)
            }
            InputEvent::FocusGained => self.focus_gained(),
            InputEvent::FocusLost => self.focus_lost(),
        }
    }

    fn clamp_y(&mut self) {
        self.offset.y = self.offset.y.clamp(-self.max_abs_y, self.max_abs_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked(max_abs_y: f32) -> InputState {
        let mut s = InputState::new(max_abs_y);
        s.focus_gained();
        s.take_menu_signal();
        s
    }

    #[test]
    fn set_held_tracks_keys() {
        let mut s = InputState::new(100.0);
        s.set_held(HoldKey::Forward, true);
        assert!(s.is_held(HoldKey::Forward));
        s.set_held(HoldKey::Forward, false);
        assert!(!s.is_held(HoldKey::Forward));
    }

    #[test]
    fn unknown_key_names_are_ignored() {
        let mut s = InputState::new(100.0);
        assert!(!s.set_held_by_name("escape", true));
        assert!(s.held_keys().is_empty());
        assert!(s.set_held_by_name("a", true));
        assert!(s.is_held(HoldKey::Left));
    }

    #[test]
    fn locked_motion_accumulates_without_bound_on_x() {
        let mut s = locked(100.0);
        for _ in 0..1000 {
            s.pointer_motion(Vec2::new(10.0, 0.0));
        }
        assert_eq!(s.mouse_delta().x, 10_000.0);
    }

    #[test]
    fn locked_motion_is_screen_up_positive() {
        let mut s = locked(100.0);
        s.pointer_motion(Vec2::new(0.0, -5.0));
        assert_eq!(s.mouse_delta().y, 5.0);
    }

    #[test]
    fn vertical_offset_is_clamped() {
        let mut s = locked(50.0);
        s.pointer_motion(Vec2::new(0.0, -500.0));
        assert_eq!(s.mouse_delta().y, 50.0);
        s.pointer_motion(Vec2::new(0.0, 1000.0));
        assert_eq!(s.mouse_delta().y, -50.0);
    }

    #[test]
    fn unlocked_position_is_relative_to_centre() {
        let mut s = InputState::new(1000.0);
        s.pointer_position(Vec2::new(500.0, 100.0), Vec2::new(800.0, 600.0));
        assert_eq!(s.mouse_delta(), Vec2::new(100.0, 200.0));
        // relative motion is ignored without a lock
        s.pointer_motion(Vec2::new(30.0, 30.0));
        assert_eq!(s.mouse_delta(), Vec2::new(100.0, 200.0));
    }

    #[test]
    fn absolute_position_ignored_while_locked() {
        let mut s = locked(1000.0);
        s.pointer_motion(Vec2::new(7.0, 0.0));
        s.pointer_position(Vec2::ZERO, Vec2::new(800.0, 600.0));
        assert_eq!(s.mouse_delta(), Vec2::new(7.0, 0.0));
    }

    #[test]
    fn focus_loss_clears_keys_and_requests_menu() {
        let mut s = locked(100.0);
        for key in HoldKey::ALL {
            s.set_held(key, true);
        }
        s.focus_lost();
        assert!(s.held_keys().is_empty());
        assert_eq!(s.pointer_mode(), PointerMode::Unlocked);
        assert_eq!(s.take_menu_signal(), Some(true));
        assert_eq!(s.take_menu_signal(), None);
    }

    #[test]
    fn look_offset_survives_menu_round_trip() {
        let mut s = locked(100.0);
        s.pointer_motion(Vec2::new(40.0, 0.0));
        s.focus_lost();
        s.focus_gained();
        assert_eq!(s.mouse_delta().x, 40.0);
        assert_eq!(s.take_menu_signal(), Some(false));
    }

    #[test]
    fn focus_can_resume_unlocked() {
        let mut s = InputState::new(100.0);
        s.focus_gained_with(PointerMode::Unlocked);
        assert_eq!(s.pointer_mode(), PointerMode::Unlocked);
        assert_eq!(s.take_menu_signal(), Some(false));
        s.pointer_position(Vec2::new(10.0, 10.0), Vec2::new(20.0, 20.0));
        assert_eq!(s.mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn apply_dispatches_events() {
        let mut s = InputState::new(100.0);
        s.apply(InputEvent::FocusGained);
        s.apply(InputEvent::Key {
            key: HoldKey::Up,
            held: true,
        });
        s.apply(InputEvent::PointerMotion {
            delta: Vec2::new(3.0, 4.0),
        });
        assert!(s.is_held(HoldKey::Up));
        assert_eq!(s.mouse_delta(), Vec2::new(3.0, -4.0));
        s.apply(InputEvent::FocusLost);
        assert!(!s.is_held(HoldKey::Up));
    }
}

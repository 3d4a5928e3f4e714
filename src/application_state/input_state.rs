//! # Input State
//!
//! Types describing one frame's view of the keyboard and mouse.

use std::collections::HashMap;

use winit::{event::MouseButton, keyboard::KeyCode};

/// Transition of a key or button between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawInputState {
    /// Up in both frames
    #[default]
    NotPressed,
    /// Went down this frame
    Pressed,
    /// Down in both frames
    Held,
    /// Went up this frame
    Released,
}

impl RawInputState {
    /// Whether the input is down (pressed or held).
    pub fn is_active(&self) -> bool {
        matches!(self, RawInputState::Pressed | RawInputState::Held)
    }

    /// Whether the input went down this frame.
    pub fn is_just_pressed(&self) -> bool {
        matches!(self, RawInputState::Pressed)
    }

    /// Derives the transition from the previous and current raw states.
    pub fn from_raw_states(previous: bool, current: bool) -> Self {
        match (previous, current) {
            (false, true) => RawInputState::Pressed,
            (true, true) => RawInputState::Held,
            (true, false) => RawInputState::Released,
            (false, false) => RawInputState::NotPressed,
        }
    }
}

/// A snapshot of the processed input of one frame.
#[derive(Debug, Clone, Default)]
pub struct ProcessedInputState {
    /// Transition of each tracked key
    pub keyboard_states: HashMap<KeyCode, RawInputState>,
    /// Transition of each tracked mouse button
    pub mouse_button_states: HashMap<MouseButton, RawInputState>,
    /// Mouse motion since the last frame in pixels, if any
    pub mouse_delta: Option<(f64, f64)>,
}

impl ProcessedInputState {
    /// Gets the state of a keyboard key
    pub fn get_key_state(&self, key: KeyCode) -> RawInputState {
        self.keyboard_states.get(&key).copied().unwrap_or_default()
    }

    /// Gets the state of a mouse button
    pub fn get_mouse_button_state(&self, button: MouseButton) -> RawInputState {
        self.mouse_button_states.get(&button).copied().unwrap_or_default()
    }
}

/// Raw mouse state between two frames.
#[derive(Debug, Clone, Default)]
pub struct MouseInput {
    /// Whether each tracked button was down last frame
    pub mouse_button_inputs_old: HashMap<MouseButton, bool>,
    /// Whether each tracked button is down now
    pub mouse_button_inputs_new: HashMap<MouseButton, bool>,
    /// Motion accumulated since the last frame
    pub mouse_delta: Option<(f64, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert_eq!(RawInputState::from_raw_states(false, true), RawInputState::Pressed);
        assert_eq!(RawInputState::from_raw_states(true, true), RawInputState::Held);
        assert_eq!(RawInputState::from_raw_states(true, false), RawInputState::Released);
        assert_eq!(RawInputState::from_raw_states(false, false), RawInputState::NotPressed);
    }

    #[test]
    fn test_only_press_is_edge() {
        assert!(RawInputState::Pressed.is_just_pressed());
        assert!(!RawInputState::Held.is_just_pressed());
        assert!(RawInputState::Held.is_active());
        assert!(!RawInputState::Released.is_active());
    }

    #[test]
    fn test_untracked_key_is_not_pressed() {
        let state = ProcessedInputState::default();
        assert_eq!(state.get_key_state(KeyCode::KeyZ), RawInputState::NotPressed);
    }
}

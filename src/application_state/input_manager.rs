//! # Input Manager
//!
//! Tracks the keys and mouse buttons the engine reacts to and turns raw window
//! events into one [`ProcessedInputState`] per frame.

use std::collections::HashMap;

use winit::{
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use super::input_state::{MouseInput, ProcessedInputState, RawInputState};

/// Keys with a binding: movement, roll and the culling toggle.
const KEY_CODES: [KeyCode; 9] = [
    KeyCode::KeyW,
    KeyCode::KeyS,
    KeyCode::KeyA,
    KeyCode::KeyD,
    KeyCode::KeyQ,
    KeyCode::KeyE,
    KeyCode::KeyR,
    KeyCode::KeyF,
    KeyCode::Space,
];

const MOUSE_BUTTONS: [MouseButton; 2] = [MouseButton::Left, MouseButton::Right];

/// Raw input state between two frames.
pub struct InputManager {
    /// Previous state of all tracked keyboard keys
    pub keyboard_inputs_old: HashMap<KeyCode, bool>,
    /// Current state of all tracked keyboard keys
    pub keyboard_inputs_new: HashMap<KeyCode, bool>,
    /// Current state of mouse inputs
    pub mouse_inputs: MouseInput,
}

impl InputManager {
    /// Creates a manager with every tracked key and button released.
    pub fn new() -> Self {
        let released_keys: HashMap<_, _> = KEY_CODES.iter().map(|&key| (key, false)).collect();
        let released_buttons: HashMap<_, _> =
            MOUSE_BUTTONS.iter().map(|&button| (button, false)).collect();

        Self {
            keyboard_inputs_old: released_keys.clone(),
            keyboard_inputs_new: released_keys,
            mouse_inputs: MouseInput {
                mouse_button_inputs_old: released_buttons.clone(),
                mouse_button_inputs_new: released_buttons,
                mouse_delta: None,
            },
        }
    }

    /// Processes a window event. Untracked keys and buttons are ignored.
    pub fn intake_input(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state,
                        physical_key: PhysicalKey::Code(key),
                        ..
                    },
                ..
            } => self.set_key(*key, *state == ElementState::Pressed),
            WindowEvent::MouseInput { button, state, .. } => {
                self.set_mouse_button(*button, *state == ElementState::Pressed)
            }
            _ => {}
        }
    }

    /// Records the current state of a key.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        if let Some(key_state) = self.keyboard_inputs_new.get_mut(&key) {
            *key_state = pressed;
        }
    }

    /// Records the current state of a mouse button.
    pub fn set_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if let Some(button_state) = self.mouse_inputs.mouse_button_inputs_new.get_mut(&button) {
            *button_state = pressed;
        }
    }

    /// Adds raw mouse motion to the motion of the current frame.
    ///
    /// # Arguments
    /// * `delta` - The (x, y) motion in pixels
    pub fn intake_mouse_motion(&mut self, delta: (f64, f64)) {
        let (x, y) = self.mouse_inputs.mouse_delta.unwrap_or((0.0, 0.0));
        self.mouse_inputs.mouse_delta = Some((x + delta.0, y + delta.1));
    }

    /// Builds this frame's input state and starts the next frame.
    pub fn get_and_reset_processed_input(&mut self) -> ProcessedInputState {
        let processed_input = self.create_processed_input_state();
        self.reset_inputs();
        processed_input
    }

    /// Releases every key and button, for when the window loses focus.
    pub fn release_all(&mut self) {
        self.keyboard_inputs_new.values_mut().for_each(|state| *state = false);
        self.mouse_inputs
            .mouse_button_inputs_new
            .values_mut()
            .for_each(|state| *state = false);
        self.mouse_inputs.mouse_delta = None;
    }

    fn create_processed_input_state(&self) -> ProcessedInputState {
        fn transitions<K: Copy + Eq + std::hash::Hash>(
            old: &HashMap<K, bool>,
            new: &HashMap<K, bool>,
        ) -> HashMap<K, RawInputState> {
            new.iter()
                .map(|(&key, &current)| {
                    let previous = old.get(&key).copied().unwrap_or(false);
                    (key, RawInputState::from_raw_states(previous, current))
                })
                .collect()
        }

        ProcessedInputState {
            keyboard_states: transitions(&self.keyboard_inputs_old, &self.keyboard_inputs_new),
            mouse_button_states: transitions(
                &self.mouse_inputs.mouse_button_inputs_old,
                &self.mouse_inputs.mouse_button_inputs_new,
            ),
            mouse_delta: self.mouse_inputs.mouse_delta,
        }
    }

    /// Carries the current states over as the previous ones and clears motion.
    fn reset_inputs(&mut self) {
        self.keyboard_inputs_old.clone_from(&self.keyboard_inputs_new);
        self.mouse_inputs
            .mouse_button_inputs_old
            .clone_from(&self.mouse_inputs.mouse_button_inputs_new);
        self.mouse_inputs.mouse_delta = None;
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_then_hold_then_release() {
        let mut input = InputManager::new();

        input.set_key(KeyCode::Space, true);
        let frame = input.get_and_reset_processed_input();
        assert!(frame.get_key_state(KeyCode::Space).is_just_pressed());

        let frame = input.get_and_reset_processed_input();
        assert_eq!(frame.get_key_state(KeyCode::Space), RawInputState::Held);

        input.set_key(KeyCode::Space, false);
        let frame = input.get_and_reset_processed_input();
        assert_eq!(frame.get_key_state(KeyCode::Space), RawInputState::Released);
    }

    #[test]
    fn test_untracked_keys_are_ignored() {
        let mut input = InputManager::new();
        input.set_key(KeyCode::KeyZ, true);
        let frame = input.get_and_reset_processed_input();
        assert!(!frame.keyboard_states.contains_key(&KeyCode::KeyZ));
    }

    #[test]
    fn test_mouse_motion_accumulates_per_frame() {
        let mut input = InputManager::new();
        input.intake_mouse_motion((2.0, -1.0));
        input.intake_mouse_motion((3.0, 4.0));
        let frame = input.get_and_reset_processed_input();
        assert_eq!(frame.mouse_delta, Some((5.0, 3.0)));

        let frame = input.get_and_reset_processed_input();
        assert_eq!(frame.mouse_delta, None);
    }

    #[test]
    fn test_release_all_clears_held_inputs() {
        let mut input = InputManager::new();
        input.set_key(KeyCode::KeyW, true);
        input.set_mouse_button(MouseButton::Left, true);
        input.get_and_reset_processed_input();

        input.release_all();
        let frame = input.get_and_reset_processed_input();
        assert_eq!(frame.get_key_state(KeyCode::KeyW), RawInputState::Released);
        assert!(!frame.get_mouse_button_state(MouseButton::Left).is_active());
    }
}

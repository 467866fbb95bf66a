//! Input handling (winit -> engine state).
//!
//! `Windowing` stays focused on window lifecycle + rendering, while `UserInput`
//! owns interpreting keyboard events into the five driving flags.

use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// One of the five logical driving controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Control {
    Forward,
    Backward,
    Left,
    Right,
    Brake,
}

impl Control {
    /// Arrow keys and WASD alias the four directions; Space brakes.
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::ArrowUp | KeyCode::KeyW => Some(Self::Forward),
            KeyCode::ArrowDown | KeyCode::KeyS => Some(Self::Backward),
            KeyCode::ArrowLeft | KeyCode::KeyA => Some(Self::Left),
            KeyCode::ArrowRight | KeyCode::KeyD => Some(Self::Right),
            KeyCode::Space => Some(Self::Brake),
            _ => None,
        }
    }
}

/// Snapshot of held controls.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub brake: bool,
}

impl InputState {
    /// State with every control in `held` pressed.
    pub fn holding(held: &[Control]) -> Self {
        let mut state = Self::default();
        for &control in held {
            state.set(control, true);
        }
        state
    }

    pub fn set(&mut self, control: Control, pressed: bool) {
        *self.flag_mut(control) = pressed;
    }

    #[inline]
    pub fn is_held(&self, control: Control) -> bool {
        match control {
            Control::Forward => self.forward,
            Control::Backward => self.backward,
            Control::Left => self.left,
            Control::Right => self.right,
            Control::Brake => self.brake,
        }
    }

    fn flag_mut(&mut self, control: Control) -> &mut bool {
        match control {
            Control::Forward => &mut self.forward,
            Control::Backward => &mut self.backward,
            Control::Left => &mut self.left,
            Control::Right => &mut self.right,
            Control::Brake => &mut self.brake,
        }
    }
}

/// Stateful input event processor.
#[derive(Default, Debug, Clone)]
pub struct UserInput {
    state: InputState,
}

impl UserInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    /// Feed a winit event into this input handler.
    ///
    /// Returns `true` if the event was recognized/consumed as a driving control.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return false;
        };
        let PhysicalKey::Code(code) = event.physical_key else {
            return false;
        };
        self.handle_key(code, event.state == ElementState::Pressed)
    }

    /// Press or release the control bound to `code`, if any.
    pub fn handle_key(&mut self, code: KeyCode, pressed: bool) -> bool {
        let Some(control) = Control::from_key(code) else {
            return false;
        };
        if self.state.is_held(control) != pressed {
            tracing::trace!(?control, pressed, "control changed");
        }
        self.state.set(control, pressed);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_aliases_map_to_the_same_control() {
        let pairs = [
            (KeyCode::ArrowUp, KeyCode::KeyW, Control::Forward),
            (KeyCode::ArrowDown, KeyCode::KeyS, Control::Backward),
            (KeyCode::ArrowLeft, KeyCode::KeyA, Control::Left),
            (KeyCode::ArrowRight, KeyCode::KeyD, Control::Right),
        ];
        for (arrow, letter, control) in pairs {
            assert_eq!(Control::from_key(arrow), Some(control));
            assert_eq!(Control::from_key(letter), Some(control));
        }
        assert_eq!(Control::from_key(KeyCode::Space), Some(Control::Brake));
        assert_eq!(Control::from_key(KeyCode::KeyQ), None);
        assert_eq!(Control::from_key(KeyCode::Enter), None);
    }

    #[test]
    fn press_and_release_toggle_flags() {
        let mut input = UserInput::new();

        assert!(input.handle_key(KeyCode::KeyW, true));
        assert!(input.state().forward);

        // Repeated presses are idempotent.
        assert!(input.handle_key(KeyCode::ArrowUp, true));
        assert!(input.state().forward);

        assert!(input.handle_key(KeyCode::ArrowUp, false));
        assert!(!input.state().forward);

        assert!(!input.handle_key(KeyCode::KeyZ, true));
        assert_eq!(*input.state(), InputState::default());
    }

    #[test]
    fn flags_are_independent() {
        let mut state = InputState::default();
        state.set(Control::Left, true);
        state.set(Control::Brake, true);

        assert!(state.is_held(Control::Left));
        assert!(state.is_held(Control::Brake));
        assert!(!state.is_held(Control::Right));
        assert!(!state.is_held(Control::Forward));
        assert!(!state.is_held(Control::Backward));
    }

    #[test]
    fn holding_sets_only_listed_controls() {
        let state = InputState::holding(&[Control::Forward, Control::Right]);
        assert_eq!(
            state,
            InputState {
                forward: true,
                right: true,
                ..InputState::default()
            }
        );
    }
}

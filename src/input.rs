//! Pointer input that triggers picks.
//!
//! Tracks the cursor and the three main mouse buttons from winit window
//! events and turns them into [`PointerAction`]s. A second press of the same
//! button within [`DOUBLE_CLICK_WINDOW`] and [`DOUBLE_CLICK_DISTANCE`] is
//! reported as a double click instead of a press; that is the usual pick
//! trigger.

use instant::{Duration, Instant};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, WindowEvent},
};

pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(300);
/// In physical pixels.
pub const DOUBLE_CLICK_DISTANCE: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerAction {
    Down {
        button: MouseButton,
        position: PhysicalPosition<f64>,
    },
    Up {
        button: MouseButton,
        position: PhysicalPosition<f64>,
    },
    /// Cursor moved while the button is held.
    Drag {
        button: MouseButton,
        position: PhysicalPosition<f64>,
    },
    DoubleClick {
        button: MouseButton,
        position: PhysicalPosition<f64>,
    },
}

/// State of a single mouse button.
#[derive(Clone, Debug)]
pub struct MouseButtonTracker {
    button: MouseButton,
    is_down: bool,
    last_press: Option<(Instant, PhysicalPosition<f64>)>,
}

impl MouseButtonTracker {
    pub fn new(button: MouseButton) -> Self {
        Self {
            button,
            is_down: false,
            last_press: None,
        }
    }

    pub fn button(&self) -> MouseButton {
        self.button
    }

    pub fn is_down(&self) -> bool {
        self.is_down
    }

    pub fn on_button(
        &mut self,
        state: ElementState,
        position: PhysicalPosition<f64>,
        now: Instant,
    ) -> Option<PointerAction> {
        let button = self.button;
        match state {
            ElementState::Pressed => {
                self.is_down = true;
                let double = self.last_press.is_some_and(|(at, last)| {
                    now >= at
                        && now.duration_since(at) <= DOUBLE_CLICK_WINDOW
                        && distance(last, position) <= DOUBLE_CLICK_DISTANCE
                });
                if double {
                    // a third press starts over
                    self.last_press = None;
                    Some(PointerAction::DoubleClick { button, position })
                } else {
                    self.last_press = Some((now, position));
                    Some(PointerAction::Down { button, position })
                }
            }
            ElementState::Released => {
                if !self.is_down {
                    return None;
                }
                self.is_down = false;
                Some(PointerAction::Up { button, position })
            }
        }
    }

    pub fn on_move(&self, position: PhysicalPosition<f64>) -> Option<PointerAction> {
        self.is_down.then_some(PointerAction::Drag {
            button: self.button,
            position,
        })
    }
}

fn distance(a: PhysicalPosition<f64>, b: PhysicalPosition<f64>) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Cursor position plus left, middle and right button state.
#[derive(Clone, Debug)]
pub struct MouseTracker {
    pub position: PhysicalPosition<f64>,
    pub left: MouseButtonTracker,
    pub middle: MouseButtonTracker,
    pub right: MouseButtonTracker,
}

impl Default for MouseTracker {
    fn default() -> Self {
        Self {
            position: PhysicalPosition::new(0.0, 0.0),
            left: MouseButtonTracker::new(MouseButton::Left),
            middle: MouseButtonTracker::new(MouseButton::Middle),
            right: MouseButtonTracker::new(MouseButton::Right),
        }
    }
}

impl MouseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn tracker_mut(&mut self, button: MouseButton) -> Option<&mut MouseButtonTracker> {
        match button {
            MouseButton::Left => Some(&mut self.left),
            MouseButton::Middle => Some(&mut self.middle),
            MouseButton::Right => Some(&mut self.right),
            _ => None,
        }
    }

    pub fn on_button(
        &mut self,
        button: MouseButton,
        state: ElementState,
        now: Instant,
    ) -> Option<PointerAction> {
        let position = self.position;
        self.tracker_mut(button)?.on_button(state, position, now)
    }

    /// Every button held while the cursor moves reports a drag.
    pub fn on_cursor_moved(&mut self, position: PhysicalPosition<f64>) -> Vec<PointerAction> {
        self.position = position;
        [&self.left, &self.middle, &self.right]
            .into_iter()
            .filter_map(|tracker| tracker.on_move(position))
            .collect()
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) -> Vec<PointerAction> {
        match event {
            WindowEvent::CursorMoved { position, .. } => self.on_cursor_moved(*position),
            WindowEvent::MouseInput { state, button, .. } => self
                .on_button(*button, *state, Instant::now())
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Cursor position as pick coordinates. Winit positions are physical, so
    /// pick with a device pixel ratio of 1.
    pub fn pick_coords(&self) -> (f32, f32) {
        (self.position.x as f32, self.position.y as f32)
    }
}

//! Pointer and keyboard input, translated into player commands

use crate::iso::IsoProjection;
use macroquad::prelude::*;
use shared::{GridBounds, Tile};

/// A player action decided from one frame of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Walk to the tile under the pointer, None when the pointer is off the grid
    Walk(Option<Tile>),
    Throw(Option<Tile>),
    Pickup,
    Revive,
    Quit,
}

/// Raw device state for a single frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSample {
    pub pointer: (f32, f32),
    pub left_click: bool,
    pub right_click: bool,
    pub key_pickup: bool,
    pub key_revive: bool,
    pub key_quit: bool,
}

impl InputSample {
    /// Reads the current frame from macroquad
    pub fn capture() -> Self {
        Self {
            pointer: mouse_position(),
            left_click: is_mouse_button_down(MouseButton::Left),
            right_click: is_mouse_button_down(MouseButton::Right),
            key_pickup: is_key_down(KeyCode::G),
            key_revive: is_key_down(KeyCode::R),
            key_quit: is_key_down(KeyCode::Escape),
        }
    }
}

/// Turns held buttons into one command per press
#[derive(Debug, Default)]
pub struct InputManager {
    // Previous frame states for edge detection
    prev: InputSample,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, projection: &IsoProjection, bounds: GridBounds) -> Vec<Command> {
        self.translate(InputSample::capture(), projection, bounds)
    }

    pub fn translate(
        &mut self,
        sample: InputSample,
        projection: &IsoProjection,
        bounds: GridBounds,
    ) -> Vec<Command> {
        let mut commands = Vec::new();
        let (px, py) = sample.pointer;

        if sample.key_quit && !self.prev.key_quit {
            commands.push(Command::Quit);
        }
        if sample.left_click && !self.prev.left_click {
            commands.push(Command::Walk(projection.tile_at(px, py, bounds)));
        }
        if sample.right_click && !self.prev.right_click {
            commands.push(Command::Throw(projection.tile_at(px, py, bounds)));
        }
        if sample.key_pickup && !self.prev.key_pickup {
            commands.push(Command::Pickup);
        }
        if sample.key_revive && !self.prev.key_revive {
            commands.push(Command::Revive);
        }

        self.prev = sample;
        commands
    }
}

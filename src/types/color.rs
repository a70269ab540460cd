//! Display colors assigned to channels

use serde::{Deserialize, Serialize};

/// RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Palette entry for the channel at `index`, cycling through [`PALETTE`].
    pub fn for_index(index: usize) -> Self {
        PALETTE[index % PALETTE.len()]
    }
}

/// Fixed channel palette. Registration assigns colors by position.
pub const PALETTE: [Color; 7] = [
    Color::new(1.0, 0.0, 0.0),
    Color::new(0.0, 1.0, 0.0),
    Color::new(0.0, 0.0, 1.0),
    Color::new(1.0, 1.0, 0.0),
    Color::new(1.0, 0.0, 1.0),
    Color::new(0.0, 1.0, 1.0),
    Color::new(1.0, 1.0, 1.0),
];

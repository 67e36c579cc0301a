//! Button and window geometry for each docking edge.
//!
//! Button rectangles are relative to the bar window; the window bounds are
//! in screen coordinates, anchored to the work area.

use crate::icon::{LARGE_ICON_SIZE, SMALL_ICON_SIZE};
use crate::settings::{Edge, Settings};

/// Gap between the window border and the buttons across the bar.
pub const EDGE_OFFSET: i32 = 2;
/// Extra gap before the first and after the last button along the bar.
pub const END_OFFSET: i32 = 12;
/// Thickness of the strip left visible by a hidden bar.
pub const HIDDEN_THICKNESS: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x && other.y >= self.y && other.right() <= self.right() && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub edge: Edge,
    pub icon_size: u32,
    pub button_size: i32,
    /// Distance between the origins of neighbouring buttons.
    pub pitch: i32,
    /// Origin of the first button inside the window.
    pub first: (i32, i32),
    pub buttons: Vec<Rect>,
    pub bounds: Rect,
}

impl Layout {
    pub fn compute(settings: &Settings, count: usize, work_area: Rect) -> Layout {
        let large = settings.large_icons;
        let icon_size = if large { LARGE_ICON_SIZE } else { SMALL_ICON_SIZE };
        let padding = if large { 5 } else { 3 };
        let button_size = icon_size as i32 + padding * 2;
        let pitch = button_size + if large { 2 } else { 0 };
        let n = count as i32;

        let thickness = EDGE_OFFSET * 2 + button_size + 2;
        let length = (EDGE_OFFSET + END_OFFSET) * 2 + n * pitch;

        let edge = settings.edge;
        let (first, bounds) = match edge {
            Edge::Left => (
                (EDGE_OFFSET, EDGE_OFFSET + END_OFFSET),
                Rect::new(work_area.x, work_area.y, thickness, length),
            ),
            Edge::Top => (
                (EDGE_OFFSET + END_OFFSET, EDGE_OFFSET),
                Rect::new(work_area.x, work_area.y, length, thickness),
            ),
            Edge::Right => (
                (EDGE_OFFSET + 1, EDGE_OFFSET + END_OFFSET),
                Rect::new(work_area.right() - thickness, work_area.y, thickness, length),
            ),
            Edge::Bottom => (
                (EDGE_OFFSET + END_OFFSET, EDGE_OFFSET),
                Rect::new(work_area.x, work_area.bottom() - thickness, length, thickness),
            ),
        };

        let (dx, dy) = if edge.is_vertical() { (0, pitch) } else { (pitch, 0) };
        let buttons = (0..n)
            .map(|i| Rect::new(first.0 + i * dx, first.1 + i * dy, button_size, button_size))
            .collect();

        Layout { edge, icon_size, button_size, pitch, first, buttons, bounds }
    }

    pub fn count(&self) -> usize {
        self.buttons.len()
    }

    /// Insertion index nearest to a window coordinate, in `0..=count`.
    pub fn position_for(&self, x: i32, y: i32) -> usize {
        let (coord, origin) = if self.edge.is_vertical() { (y, self.first.1) } else { (x, self.first.0) };
        let index = ((coord - origin) as f64 / self.pitch as f64).round() as i64;
        index.clamp(0, self.count() as i64) as usize
    }

    /// Index of the button under a window coordinate.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<usize> {
        self.buttons.iter().position(|r| r.contains(x, y))
    }

    /// Window bounds of a collapsed bar: a thin strip on the docked edge.
    pub fn hidden_bounds(&self) -> Rect {
        let b = self.bounds;
        match self.edge {
            Edge::Left => Rect::new(b.x - 1, b.y, HIDDEN_THICKNESS, b.height),
            Edge::Top => Rect::new(b.x, b.y - 1, b.width, HIDDEN_THICKNESS),
            Edge::Right => Rect::new(b.right() - HIDDEN_THICKNESS + 1, b.y, HIDDEN_THICKNESS, b.height),
            Edge::Bottom => Rect::new(b.x, b.bottom() - HIDDEN_THICKNESS, b.width, HIDDEN_THICKNESS),
        }
    }
}

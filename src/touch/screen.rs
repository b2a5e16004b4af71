use serde::{Deserialize, Serialize};

/// A point in global screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Geometry of one screen in the global pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: ScreenPoint) -> bool {
        let left = f64::from(self.x);
        let top = f64::from(self.y);
        point.x >= left
            && point.y >= top
            && point.x < left + f64::from(self.width)
            && point.y < top + f64::from(self.height)
    }
}

/// All screens attached to the session, primary first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenLayout {
    screens: Vec<ScreenRect>,
}

impl ScreenLayout {
    pub fn new(screens: Vec<ScreenRect>) -> Self {
        Self { screens }
    }

    pub fn single(width: u32, height: u32) -> Self {
        Self::new(vec![ScreenRect::new(0, 0, width, height)])
    }

    pub fn primary(&self) -> Option<&ScreenRect> {
        self.screens.first()
    }

    /// The screen containing `point`, falling back to the primary screen.
    pub fn screen_at(&self, point: ScreenPoint) -> Option<&ScreenRect> {
        self.screens
            .iter()
            .find(|s| s.contains(point))
            .or_else(|| self.primary())
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }
}

//! Box geometry in frame pixel coordinates.

/// A pixel position inside a (resized) frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Clamps to `[0, width] x [0, height]`, both ends inclusive.
    pub fn clamped(self, width: u32, height: u32) -> Self {
        Self {
            x: self.x.clamp(0, width as i32),
            y: self.y.clamp(0, height as i32),
        }
    }
}

/// A labelled rectangle as drawn by the user.
///
/// The two corners keep the order they were dragged in, so `top_left` is not
/// necessarily above and left of `bottom_right` until the box is [`normalized`].
///
/// [`normalized`]: BoundingBox::normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub top_left: Point,
    pub bottom_right: Point,
    pub class_id: usize,
}

impl BoundingBox {
    pub fn new(top_left: Point, bottom_right: Point, class_id: usize) -> Self {
        Self {
            top_left,
            bottom_right,
            class_id,
        }
    }

    pub fn from_coords(x_min: i32, y_min: i32, x_max: i32, y_max: i32, class_id: usize) -> Self {
        Self::new(Point::new(x_min, y_min), Point::new(x_max, y_max), class_id)
    }

    pub fn x_min(&self) -> i32 {
        self.top_left.x.min(self.bottom_right.x)
    }

    pub fn x_max(&self) -> i32 {
        self.top_left.x.max(self.bottom_right.x)
    }

    pub fn y_min(&self) -> i32 {
        self.top_left.y.min(self.bottom_right.y)
    }

    pub fn y_max(&self) -> i32 {
        self.top_left.y.max(self.bottom_right.y)
    }

    pub fn width(&self) -> i32 {
        self.x_max() - self.x_min()
    }

    pub fn height(&self) -> i32 {
        self.y_max() - self.y_min()
    }

    /// Zero width or zero height, e.g. a click without a drag.
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Same box with min/max applied per axis.
    pub fn normalized(&self) -> Self {
        Self::from_coords(
            self.x_min(),
            self.y_min(),
            self.x_max(),
            self.y_max(),
            self.class_id,
        )
    }
}

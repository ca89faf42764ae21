use std::fmt;

use crate::resolution::AspectRatio;

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Rectangles are allowed to extend past the bounds of the image they refer to, and are allowed to
/// have zero height and/or width.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Rect {
    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            w: width,
            h: height,
        }
    }

    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self::from_top_left(
            x_center - width * 0.5,
            y_center - height * 0.5,
            width,
            height,
        )
    }

    /// Computes the bounding rectangle that encompasses `points`.
    ///
    /// Returns `None` if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = (f32, f32)>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();

        let (x, y) = iter.next()?;
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (x, x, y, y);
        for (x, y) in iter {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        Some(Self::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min))
    }

    /// Grows this rectangle by adding a margin relative to width and height.
    ///
    /// `amount` is the relative amount of the rectangle's width and height to add to each side.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        let dx = self.w * amount;
        let dy = self.h * amount;
        Self::from_top_left(self.x - dx, self.y - dy, self.w + dx * 2.0, self.h + dy * 2.0)
    }

    /// Symmetrically extends one dimension of `self` so that the resulting rectangle has the given
    /// aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        let (cx, cy) = self.center();
        let target_width = self.h * target_aspect.as_f32();
        if target_width >= self.w {
            Self::from_center(cx, cy, target_width, self.h)
        } else {
            Self::from_center(cx, cy, self.w, self.w / target_aspect.as_f32())
        }
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// Computes the overlapping region of `self` and `other`.
    ///
    /// Returns [`None`] if the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let (x_min, y_min) = (self.x.max(other.x), self.y.max(other.y));
        let x_max = (self.x + self.w).min(other.x + other.w);
        let y_max = (self.y + self.h).min(other.y + other.h);
        if x_min > x_max || y_min > y_max {
            return None;
        }
        Some(Self::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min))
    }

    /// Computes the Intersection over Union (IoU) of `self` and `other`.
    ///
    /// Two empty rectangles have an IoU of 0.
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |rect| rect.area());
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Maps a point given relative to this rectangle (`(0, 0)` is the top left corner, `(1, 1)`
    /// the bottom right) to the coordinate system `self` is expressed in.
    #[inline]
    pub fn point_at(&self, u: f32, v: f32) -> (f32, f32) {
        (self.x + u * self.w, self.y + v * self.h)
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({:.1},{:.1})/{:.1}x{:.1}",
            self.x, self.y, self.w, self.h
        )
    }
}

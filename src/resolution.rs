//! Image, window and camera resolutions.

use std::fmt;

use crate::image::Rect;

/// Resolution (`width x height`) of an image, window, or camera stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// 720p resolution: `1280x720`
    pub const RES_720P: Self = Self {
        width: 1280,
        height: 720,
    };

    /// VGA resolution: `640x480`, the format nearly every webcam supports.
    pub const VGA: Self = Self {
        width: 640,
        height: 480,
    };

    /// Creates a new [`Resolution`] of `width x height`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the width of this [`Resolution`].
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of this [`Resolution`].
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Computes the [`AspectRatio`] of this [`Resolution`].
    ///
    /// If `self` has a width or height of 0, `None` is returned.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width(), self.height())
    }

    /// Computes a centered, maximally sized [`Rect`] that lies inside of `self` and has the given
    /// aspect ratio.
    pub fn fit_aspect_ratio(&self, ratio: AspectRatio) -> Rect {
        let to_ratio = match self.aspect_ratio() {
            Some(ratio) => ratio,
            None => return Rect::from_top_left(0.0, 0.0, self.width as f32, self.height as f32),
        };

        let from_ratio = ratio.as_f32();
        let to_ratio = to_ratio.as_f32();

        let (w, h) = if from_ratio > to_ratio {
            // Letterboxing: limited by the target width.
            let w = self.width();
            (w, (w as f32 / from_ratio) as u32)
        } else {
            // Pillarboxing: limited by the target height.
            let h = self.height();
            ((h as f32 * from_ratio) as u32, h)
        };

        let x_min = (self.width() - w) / 2;
        let y_min = (self.height() - h) / 2;
        let rect = Rect::from_top_left(x_min as f32, y_min as f32, w as f32, h as f32);
        log::trace!(
            "fit aspect ratio {} in resolution {} -> {:?}",
            ratio,
            self,
            rect
        );
        rect
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Ratio of a width to a height of an image.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Invariant: `width` and `height` are nonzero and their GCD is 1.
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1 aspect ratio, the input shape of the hand landmark network.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Creates the aspect ratio representing `width:height`.
    ///
    /// If either `width` or `height` is `0`, returns `None`.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let gcd = gcd(width, height);
        Some(Self {
            width: width / gcd,
            height: height / gcd,
        })
    }

    /// Returns the `f32` corresponding to this ratio.
    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b > 0 {
        let t = b;
        b = a % b;
        a = t;
    }

    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(6, 9), 3);
        assert_eq!(1280 / gcd(1280, 720), 16);
        assert_eq!(480 / gcd(640, 480), 3);
        assert_eq!(gcd(0, 7), 7);
    }

    #[test]
    fn webcam_aspect_ratios() {
        assert_eq!(Resolution::VGA.aspect_ratio().unwrap().to_string(), "4:3");
        assert_eq!(Resolution::RES_720P.aspect_ratio().unwrap().to_string(), "16:9");
        assert!(Resolution::new(0, 480).aspect_ratio().is_none());
    }

    #[test]
    fn square_fit_is_centered() {
        assert_eq!(
            Resolution::VGA.fit_aspect_ratio(AspectRatio::SQUARE),
            Rect::from_top_left(80.0, 0.0, 480.0, 480.0)
        );
        assert_eq!(
            Resolution::new(480, 640).fit_aspect_ratio(AspectRatio::SQUARE),
            Rect::from_top_left(0.0, 80.0, 480.0, 480.0)
        );
        assert_eq!(
            Resolution::new(16, 16).fit_aspect_ratio(AspectRatio::SQUARE),
            Rect::from_top_left(0.0, 0.0, 16.0, 16.0)
        );
    }
}

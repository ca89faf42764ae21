//! Frame annotation: hand skeletons, markers and labels.
//!
//! Annotation is split into two steps. [`Annotator::layout`] computes the overlay geometry of one
//! hand in pixel coordinates and classifies its gesture, and [`Annotator::annotate`] draws the
//! overlays of all hands onto a copy of the frame.

use std::fmt;

use crate::{
    detection::{DetectionResult, HandDetection},
    hand::{
        gesture::{classify, Gesture},
        landmark::{HandLandmarks, Handedness, Landmark, LandmarkIdx, CONNECTIONS},
    },
    image::{
        draw::{self, Font},
        Color, Image,
    },
    resolution::Resolution,
};

/// Maps a normalized landmark position to pixel coordinates in an image of size `res`.
///
/// Coordinates are scaled by the image size and truncated towards zero.
pub fn to_pixel(landmark: Landmark, res: Resolution) -> (i32, i32) {
    (
        (landmark.x * res.width() as f32) as i32,
        (landmark.y * res.height() as f32) as i32,
    )
}

/// Colors and sizes of the hand overlay.
#[derive(Debug, Clone)]
pub struct AnnotatorStyle {
    pub connection_color: Color,
    pub landmark_color: Color,
    pub handedness_color: Color,
    pub gesture_color: Color,
    /// Stroke width of the skeleton lines.
    pub line_width: u32,
    /// Radius of the filled landmark markers.
    pub marker_radius: u32,
    /// Distance between the hand's topmost landmark and the handedness label's baseline.
    pub text_margin: i32,
    /// Vertical distance between the handedness label and the gesture label.
    pub gesture_offset: i32,
}

impl Default for AnnotatorStyle {
    fn default() -> Self {
        Self {
            connection_color: Color::RED,
            landmark_color: Color::GREEN,
            handedness_color: Color::YELLOW,
            gesture_color: Color::CYAN,
            line_width: 2,
            marker_radius: 5,
            text_margin: 10,
            gesture_offset: 40,
        }
    }
}

/// How the model's handedness is turned into the displayed side label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelConvention {
    /// Display the opposite of the detected handedness.
    ///
    /// Used when the frame is mirrored before detection, like a selfie view: the network then sees
    /// a right hand where the user holds up their left one.
    #[default]
    Mirrored,
    /// Display the handedness as detected.
    AsDetected,
}

impl LabelConvention {
    pub fn side(self, detected: Handedness) -> Handedness {
        match self {
            LabelConvention::Mirrored => detected.opposite(),
            LabelConvention::AsDetected => detected,
        }
    }
}

/// Pixel-space overlay geometry of a single hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandOverlay {
    /// Skeleton line segments, one per entry in [`CONNECTIONS`].
    pub lines: Vec<((i32, i32), (i32, i32))>,
    /// Marker position of every landmark.
    pub markers: Vec<(i32, i32)>,
    /// Left end of the handedness label's baseline.
    pub text_anchor: (i32, i32),
    pub side: Handedness,
    /// Left end of the gesture label's baseline.
    pub gesture_anchor: (i32, i32),
    pub gesture: Gesture,
}

/// Per-hand diagnostic record.
#[derive(Debug, Clone, PartialEq)]
pub struct HandReport {
    /// Displayed side label.
    pub side: Handedness,
    pub gesture: Gesture,
    /// Normalized position of the index fingertip.
    pub index_tip: (f32, f32),
}

impl fmt::Display for HandReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.index_tip;
        write!(
            f,
            "{} index finger at X={:.2}, Y={:.2} | gesture: {}",
            self.side, x, y, self.gesture
        )
    }
}

/// An annotated frame.
#[derive(Debug)]
pub struct Annotated {
    pub image: Image,
    /// Overlay of every hand, in detection order.
    pub overlays: Vec<HandOverlay>,
    /// Diagnostics of every hand, in detection order.
    pub reports: Vec<HandReport>,
}

/// Draws hand skeletons and gesture labels onto frames.
#[derive(Debug, Clone, Default)]
pub struct Annotator {
    style: AnnotatorStyle,
    labels: LabelConvention,
}

impl Annotator {
    pub fn new(style: AnnotatorStyle, labels: LabelConvention) -> Self {
        Self { style, labels }
    }

    pub fn style(&self) -> &AnnotatorStyle {
        &self.style
    }

    pub fn labels(&self) -> LabelConvention {
        self.labels
    }

    /// Computes the overlay of `hand` in an image of size `res`.
    pub fn layout(&self, res: Resolution, hand: &HandDetection) -> HandOverlay {
        let landmarks = &hand.landmarks;
        let markers = landmarks
            .iter()
            .map(|&lm| to_pixel(lm, res))
            .collect::<Vec<_>>();
        let lines = CONNECTIONS
            .iter()
            .map(|&(a, b)| (markers[a as usize], markers[b as usize]))
            .collect();

        // Landmarks are never empty, so the fallback is never used.
        let min_x = markers.iter().map(|&(x, _)| x).min().unwrap_or(0);
        let min_y = markers.iter().map(|&(_, y)| y).min().unwrap_or(0);
        let text_anchor = (min_x, min_y - self.style.text_margin);
        let gesture_anchor = (min_x, text_anchor.1 + self.style.gesture_offset);

        HandOverlay {
            lines,
            markers,
            text_anchor,
            side: self.labels.side(hand.handedness),
            gesture_anchor,
            gesture: classify(landmarks),
        }
    }

    /// Creates the diagnostic record of `hand`.
    pub fn report(&self, hand: &HandDetection, gesture: Gesture) -> HandReport {
        HandReport {
            side: self.labels.side(hand.handedness),
            gesture,
            index_tip: index_tip(&hand.landmarks),
        }
    }

    /// Draws a single hand's overlay onto `image`.
    pub fn draw(&self, image: &mut Image, overlay: &HandOverlay) {
        let style = &self.style;
        for &((x1, y1), (x2, y2)) in &overlay.lines {
            draw::line(image, x1, y1, x2, y2)
                .color(style.connection_color)
                .stroke_width(style.line_width);
        }
        for &(x, y) in &overlay.markers {
            draw::circle(image, x, y, style.marker_radius)
                .filled()
                .color(style.landmark_color);
        }

        let (x, y) = overlay.text_anchor;
        draw::text(image, x, y, &overlay.side.to_string())
            .align_left()
            .align_baseline()
            .font(Font::Large)
            .color(style.handedness_color);
        let gesture = overlay.gesture.to_string();
        let (x, y) = overlay.gesture_anchor;
        draw::text(image, x, y, &gesture)
            .align_left()
            .align_baseline()
            .font(Font::Medium)
            .color(style.gesture_color);
    }

    /// Annotates a copy of `image` with every hand in `detections`.
    ///
    /// `image` itself is left untouched.
    pub fn annotate(&self, image: &Image, detections: &DetectionResult) -> Annotated {
        let mut annotated = image.clone();
        let res = image.resolution();

        let mut overlays = Vec::with_capacity(detections.len());
        let mut reports = Vec::with_capacity(detections.len());
        for hand in detections {
            let overlay = self.layout(res, hand);
            self.draw(&mut annotated, &overlay);

            let report = self.report(hand, overlay.gesture);
            log::debug!("{}", report);
            reports.push(report);
            overlays.push(overlay);
        }

        Annotated {
            image: annotated,
            overlays,
            reports,
        }
    }
}

fn index_tip(landmarks: &HandLandmarks) -> (f32, f32) {
    let tip = landmarks.get(LandmarkIdx::IndexFingerTip);
    (tip.x, tip.y)
}

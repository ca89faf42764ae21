//! Per-frame detection results and the landmark detector interface.

pub mod nms;
pub mod ssd;

use anyhow::{bail, ensure};

use crate::{
    hand::landmark::{HandLandmarks, Handedness},
    image::Image,
    timer::Timer,
};

/// One detected hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandDetection {
    pub landmarks: HandLandmarks,
    pub handedness: Handedness,
    /// Detector confidence that this is a hand, between 0.0 and 1.0.
    pub score: f32,
}

/// All hands detected in a single frame.
///
/// Each hand is stored together with its handedness, so the two can never get out of step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    hands: Vec<HandDetection>,
}

impl DetectionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(hands: Vec<HandDetection>) -> Self {
        Self { hands }
    }

    /// Pairs up a list of hands with a list of handedness labels, as returned by detectors that
    /// report them separately.
    ///
    /// Returns an error if the two lists differ in length.
    pub fn from_parts(
        hands: Vec<HandLandmarks>,
        handedness: Vec<Handedness>,
    ) -> anyhow::Result<Self> {
        if hands.len() != handedness.len() {
            bail!(
                "detector returned {} hands but {} handedness labels",
                hands.len(),
                handedness.len()
            );
        }

        Ok(Self {
            hands: hands
                .into_iter()
                .zip(handedness)
                .map(|(landmarks, handedness)| HandDetection {
                    landmarks,
                    handedness,
                    score: 1.0,
                })
                .collect(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HandDetection> {
        self.hands.iter()
    }

    /// Drops all but the first `max_hands` detections.
    pub fn truncate(&mut self, max_hands: usize) {
        self.hands.truncate(max_hands);
    }
}

impl<'a> IntoIterator for &'a DetectionResult {
    type Item = &'a HandDetection;
    type IntoIter = std::slice::Iter<'a, HandDetection>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A hand landmark detector.
///
/// Implementations are handed every frame of a video stream in order, together with a timestamp
/// that must increase from frame to frame. They may use previous frames to track hands.
pub trait HandDetector {
    fn detect(&mut self, image: &Image, timestamp_ms: u64) -> anyhow::Result<DetectionResult>;

    /// Returns profiling timers to include in FPS logs.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<D: HandDetector + ?Sized> HandDetector for Box<D> {
    fn detect(&mut self, image: &Image, timestamp_ms: u64) -> anyhow::Result<DetectionResult> {
        (**self).detect(image, timestamp_ms)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

/// Limits and thresholds for a [`HandDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOptions {
    /// The maximum number of hands to report per frame.
    pub max_hands: usize,
    /// Minimum confidence for a new hand to be detected in a frame.
    pub min_detection_confidence: f32,
    /// Minimum hand presence score for a detection to be reported.
    pub min_presence_confidence: f32,
    /// Minimum confidence for a hand to keep being tracked from one frame to the next.
    pub min_tracking_confidence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_detection_confidence: 0.5,
            min_presence_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl DetectorOptions {
    /// Checks that all confidence thresholds are in range `[0.0, 1.0]`.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_presence_confidence", self.min_presence_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "{name} must be between 0.0 and 1.0, got {value}"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::hand::landmark::{Landmark, NUM_LANDMARKS};

    use super::*;

    fn landmarks(x: f32) -> HandLandmarks {
        HandLandmarks::from_array([Landmark::new(x, 0.5); NUM_LANDMARKS])
    }

    #[test]
    fn from_parts_pairs_in_order() {
        let result = DetectionResult::from_parts(
            vec![landmarks(0.1), landmarks(0.9)],
            vec![Handedness::Left, Handedness::Right],
        )
        .unwrap();
        assert_eq!(result.len(), 2);

        let hands = result.iter().collect::<Vec<_>>();
        assert_eq!(hands[0].handedness, Handedness::Left);
        assert_eq!(hands[0].landmarks, landmarks(0.1));
        assert_eq!(hands[1].handedness, Handedness::Right);
        assert_eq!(hands[1].landmarks, landmarks(0.9));
    }

    #[test]
    fn from_parts_length_mismatch() {
        let err = DetectionResult::from_parts(vec![landmarks(0.5)], vec![]).unwrap_err();
        assert!(err.to_string().contains("1 hands but 0"), "{err}");
    }

    #[test]
    fn truncate() {
        let mut result = DetectionResult::from_parts(
            vec![landmarks(0.1), landmarks(0.2), landmarks(0.3)],
            vec![Handedness::Left; 3],
        )
        .unwrap();
        result.truncate(2);
        assert_eq!(result.len(), 2);
        result.truncate(5);
        assert_eq!(result.len(), 2);
        assert!(DetectionResult::empty().is_empty());
    }

    #[test]
    fn options() {
        let options = DetectorOptions::default();
        assert_eq!(options.max_hands, 2);
        assert_eq!(options.min_detection_confidence, 0.5);
        options.validate().unwrap();

        let options = DetectorOptions {
            min_tracking_confidence: 1.5,
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("min_tracking_confidence"), "{err}");

        let options = DetectorOptions {
            min_presence_confidence: f32::NAN,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}

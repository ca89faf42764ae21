//! The default [`HandDetector`]: a hand landmark network run with `tract`.
//!
//! The landmark network expects a single hand roughly centered in its square input image, and
//! outputs 21 landmarks in input pixel coordinates, a hand presence score and a handedness score.
//! Each tracked hand has its own region of interest, which follows the hand's landmarks from frame
//! to frame until the hand is lost.
//!
//! New hands are found by a [`PalmDetector`], which runs whenever fewer than `max_hands` hands are
//! tracked, at most once every [`REDETECT_INTERVAL`] timestamps while some hand is tracked. Without
//! a palm detector, a single hand is picked up from the centered square of the frame.

use std::path::Path;

use anyhow::{bail, ensure};
use itertools::Itertools;

use crate::{
    detection::{
        nms::NonMaxSuppression, DetectionResult, DetectorOptions, HandDetection, HandDetector,
    },
    hand::{
        landmark::{HandLandmarks, Handedness, Landmark, NUM_LANDMARKS},
        palm::{hand_roi, PalmDetector},
    },
    image::{Image, Rect},
    nn::{Cnn, ColorMapper, NeuralNetwork, Outputs},
    resolution::{AspectRatio, Resolution},
    timer::Timer,
};

/// Relative padding added to each side of the landmarks' bounding rectangle when tracking.
const ROI_PADDING: f32 = 0.3;

/// Minimum number of timestamp units between palm detection runs while any hand is tracked.
pub const REDETECT_INTERVAL: u64 = 10;

/// Regions of interest overlapping by at least this much are considered to contain the same hand.
const IOU_THRESH: f32 = NonMaxSuppression::DEFAULT_IOU_THRESH;

/// A hand landmark network tracking up to `max_hands` hands.
pub struct LandmarkNetwork {
    cnn: Cnn,
    palm: Option<PalmDetector>,
    hands: HandSet,
    last_timestamp: Option<u64>,
    t_infer: Timer,
}

impl LandmarkNetwork {
    /// Loads the landmark network from an ONNX file.
    ///
    /// The network must take a single `1x224x224x3` (NHWC) or `1x3x224x224` (NCHW) image with
    /// color values in range `[0, 1]`.
    pub fn load<P: AsRef<Path>>(path: P, options: DetectorOptions) -> anyhow::Result<Self> {
        let path = path.as_ref();
        options.validate()?;

        let nn = NeuralNetwork::from_path(path)?;
        ensure!(
            nn.num_outputs() >= 3,
            "hand landmark network must have at least 3 outputs, '{}' has {}",
            path.display(),
            nn.num_outputs(),
        );
        let cnn = Cnn::new(nn, ColorMapper::linear(0.0..=1.0))?;
        log::info!(
            "loaded hand landmark network from '{}' ({} input)",
            path.display(),
            cnn.input_resolution(),
        );

        Ok(Self {
            cnn,
            palm: None,
            hands: HandSet::new(options),
            last_timestamp: None,
            t_infer: Timer::new("infer"),
        })
    }

    /// Uses `palm` to find new hands anywhere in the frame.
    pub fn with_palm_detector(mut self, palm: PalmDetector) -> Self {
        self.palm = Some(palm);
        self
    }
}

impl HandDetector for LandmarkNetwork {
    fn detect(&mut self, image: &Image, timestamp_ms: u64) -> anyhow::Result<DetectionResult> {
        check_timestamp(&mut self.last_timestamp, timestamp_ms)?;

        let res = image.resolution();
        match &mut self.palm {
            Some(palm) if self.hands.detection_due(timestamp_ms) => {
                let threshold = self.hands.options.min_detection_confidence;
                let palms = palm.detect(image, threshold)?;
                self.hands.add_candidates(timestamp_ms, palms.iter().map(hand_roi));
            }
            None if self.hands.is_empty() => {
                let roi = res.fit_aspect_ratio(AspectRatio::SQUARE);
                self.hands.add_candidates(timestamp_ms, [roi]);
            }
            _ => {}
        }

        let (cnn, t_infer) = (&self.cnn, &self.t_infer);
        self.hands.update(res, |roi| {
            let outputs = t_infer.time(|| cnn.estimate(image, roi))?;
            RawEstimate::from_outputs(&outputs, cnn.input_resolution())
        })
    }

    fn timers(&self) -> Vec<&Timer> {
        let mut timers = vec![&self.t_infer];
        if let Some(palm) = &self.palm {
            timers.extend(palm.timers());
        }
        timers
    }
}

fn check_timestamp(last: &mut Option<u64>, timestamp_ms: u64) -> anyhow::Result<()> {
    if let Some(last) = *last {
        if timestamp_ms <= last {
            bail!("frame timestamp {timestamp_ms} is not after previous timestamp {last}");
        }
    }
    *last = Some(timestamp_ms);
    Ok(())
}

/// Network outputs for one region of interest.
#[derive(Debug)]
struct RawEstimate {
    /// Landmarks relative to the region of interest, in range `[0, 1]` inside of it.
    landmarks: [Landmark; NUM_LANDMARKS],
    presence: f32,
    raw_handedness: f32,
}

impl RawEstimate {
    fn from_outputs(outputs: &Outputs, input_res: Resolution) -> anyhow::Result<Self> {
        let screen_landmarks = outputs.get(0)?;
        let presence = outputs.get(1)?;
        let handedness = outputs.get(2)?;

        ensure!(
            screen_landmarks.len() == NUM_LANDMARKS * 3,
            "expected {} landmark coordinates, network returned {}",
            NUM_LANDMARKS * 3,
            screen_landmarks.len(),
        );
        let (Some(&presence), Some(&raw_handedness)) = (presence.first(), handedness.first())
        else {
            bail!("network returned empty presence or handedness output");
        };

        let (w, h) = (input_res.width() as f32, input_res.height() as f32);
        let mut landmarks = [Landmark::default(); NUM_LANDMARKS];
        for (coords, out) in screen_landmarks.chunks_exact(3).zip_eq(&mut landmarks) {
            *out = Landmark::with_z(coords[0] / w, coords[1] / h, coords[2] / w);
        }

        Ok(Self {
            landmarks,
            presence,
            raw_handedness,
        })
    }

    fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }
}

/// The set of tracked hands, one [`RoiTracker`] each.
#[derive(Debug)]
struct HandSet {
    options: DetectorOptions,
    trackers: Vec<RoiTracker>,
    last_detection: Option<u64>,
}

impl HandSet {
    fn new(options: DetectorOptions) -> Self {
        Self {
            options,
            trackers: Vec::new(),
            last_detection: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Returns whether new hands should be looked for in the frame at `timestamp`.
    fn detection_due(&self, timestamp: u64) -> bool {
        if self.trackers.len() >= self.options.max_hands {
            return false;
        }
        match self.last_detection {
            Some(last) if !self.is_empty() => timestamp.saturating_sub(last) >= REDETECT_INTERVAL,
            _ => true,
        }
    }

    /// Starts tracking a hand in each of `rois`, in order, until `max_hands` hands are tracked.
    ///
    /// Regions overlapping an already tracked hand are skipped.
    fn add_candidates<I: IntoIterator<Item = Rect>>(&mut self, timestamp: u64, rois: I) {
        self.last_detection = Some(timestamp);
        for roi in rois {
            if self.trackers.len() >= self.options.max_hands {
                log::trace!("ignoring {roi:?}, already tracking {} hands", self.trackers.len());
                break;
            }
            if self.overlaps(&roi) {
                log::trace!("ignoring {roi:?}, hand is already tracked");
                continue;
            }
            log::trace!("new hand candidate at {roi:?}");
            self.trackers.push(RoiTracker::new(roi));
        }
    }

    fn overlaps(&self, roi: &Rect) -> bool {
        self.trackers
            .iter()
            .any(|tracker| tracker.roi.iou(roi) >= IOU_THRESH)
    }

    /// Runs `estimate` on every tracked region of interest and updates the trackers.
    ///
    /// Lost hands are dropped, and so are hands whose region of interest has moved onto another
    /// hand's. Hands are reported in the order they were first found.
    fn update<F>(&mut self, res: Resolution, mut estimate: F) -> anyhow::Result<DetectionResult>
    where
        F: FnMut(Rect) -> anyhow::Result<RawEstimate>,
    {
        let mut hands = Vec::new();
        for mut tracker in std::mem::take(&mut self.trackers) {
            let raw = estimate(tracker.roi)?;
            let Tracking::Tracked(hand) = tracker.update(&self.options, res, &raw) else {
                continue;
            };
            if self.overlaps(&tracker.roi) {
                log::debug!("dropping hand at {:?}, another hand is tracked there", tracker.roi);
                continue;
            }
            self.trackers.push(tracker);
            hands.extend(hand);
        }

        let mut result = DetectionResult::new(hands);
        result.truncate(self.options.max_hands);
        Ok(result)
    }
}

/// Outcome of a [`RoiTracker::update`].
#[derive(Debug)]
enum Tracking {
    Lost,
    /// The hand is still tracked, and reported if its presence is high enough.
    Tracked(Option<HandDetection>),
}

/// Follows a single hand from frame to frame.
#[derive(Debug)]
struct RoiTracker {
    /// Region of interest in pixels.
    roi: Rect,
    /// Whether the hand has been confirmed by the landmark network.
    confirmed: bool,
}

impl RoiTracker {
    fn new(roi: Rect) -> Self {
        Self {
            roi,
            confirmed: false,
        }
    }

    /// Processes the network's estimate for the current region of interest, moving it to follow
    /// the hand.
    ///
    /// Landmarks of the reported hand are in normalized coordinates of the full frame.
    fn update(
        &mut self,
        options: &DetectorOptions,
        res: Resolution,
        estimate: &RawEstimate,
    ) -> Tracking {
        let (threshold, what) = if self.confirmed {
            (options.min_tracking_confidence, "tracking")
        } else {
            (options.min_detection_confidence, "detection")
        };
        if estimate.presence < threshold {
            if self.confirmed {
                log::debug!(
                    "hand lost (presence {:.2} < {} threshold {})",
                    estimate.presence,
                    what,
                    threshold,
                );
            }
            return Tracking::Lost;
        }

        let (w, h) = (res.width() as f32, res.height() as f32);
        let landmarks = estimate.landmarks.map(|lm| {
            let (x, y) = self.roi.point_at(lm.x, lm.y);
            Landmark::with_z(x / w, y / h, lm.z)
        });

        if !self.confirmed {
            log::debug!("hand found (presence {:.2})", estimate.presence);
            self.confirmed = true;
        }
        if let Some(bounds) = Rect::bounding(landmarks.iter().map(|lm| (lm.x * w, lm.y * h))) {
            self.roi = bounds
                .grow_rel(ROI_PADDING)
                .grow_to_fit_aspect(AspectRatio::SQUARE);
        }

        if estimate.presence < options.min_presence_confidence {
            return Tracking::Tracked(None);
        }

        Tracking::Tracked(Some(HandDetection {
            landmarks: HandLandmarks::from_array(landmarks),
            handedness: estimate.handedness(),
            score: estimate.presence,
        }))
    }
}

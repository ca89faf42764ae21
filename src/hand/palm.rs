//! Palm detection.
//!
//! The palm detection network finds any number of hands in a frame. It is much slower than the
//! landmark network, so it is only run to pick up new hands; [`hand_roi`] turns each palm into a
//! region of interest for the landmark network to track.

use std::path::Path;

use anyhow::{bail, ensure};

use crate::{
    detection::{
        nms::NonMaxSuppression,
        ssd::{self, Anchors, Detection, LayerInfo},
    },
    image::{Image, Rect},
    nn::{Cnn, ColorMapper, NeuralNetwork},
    timer::Timer,
};

/// Output layers of the 192x192 palm detection network.
const LAYERS: [LayerInfo; 2] = [LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)];

/// Size of the hand region of interest relative to the palm.
const HAND_SCALE: f32 = 2.6;

/// How far the hand region of interest is moved from the palm towards the fingers, relative to
/// palm size.
const HAND_SHIFT: f32 = 0.5;

/// Index of a palm keypoint in [`Detection::keypoints`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

impl Keypoint {
    fn of(self, det: &Detection) -> Option<(f32, f32)> {
        det.keypoints.get(self as usize).copied()
    }
}

/// A palm detection network, run with `tract`.
pub struct PalmDetector {
    cnn: Cnn,
    anchors: Anchors,
    nms: NonMaxSuppression,
    t_infer: Timer,
    t_nms: Timer,
}

impl PalmDetector {
    /// Loads the palm detection network from an ONNX file.
    ///
    /// The network must take a single 192x192 RGB image with color values in range `[0, 1]`, and
    /// output box regressors (`1x2016x18`) followed by box scores (`1x2016x1`).
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let nn = NeuralNetwork::from_path(path)?;
        ensure!(
            nn.num_outputs() >= 2,
            "palm detection network must have at least 2 outputs, '{}' has {}",
            path.display(),
            nn.num_outputs(),
        );
        let cnn = Cnn::new(nn, ColorMapper::linear(0.0..=1.0))?;
        let anchors = Anchors::calculate(&LAYERS);
        log::info!(
            "loaded palm detection network from '{}' ({} input, {} anchors)",
            path.display(),
            cnn.input_resolution(),
            anchors.len(),
        );

        Ok(Self {
            cnn,
            anchors,
            nms: NonMaxSuppression::new(),
            t_infer: Timer::new("palm"),
            t_nms: Timer::new("nms"),
        })
    }

    /// Detects palms in `image`, returning those with a confidence of at least `threshold`.
    ///
    /// Detections are in image pixels, sorted by descending confidence.
    pub fn detect(&mut self, image: &Image, threshold: f32) -> anyhow::Result<Vec<Detection>> {
        let input_res = self.cnn.input_resolution();
        let Some(aspect) = input_res.aspect_ratio() else {
            bail!("palm detection network has empty input {input_res}");
        };
        // Letterbox the frame instead of stretching it.
        let view = image.rect().grow_to_fit_aspect(aspect);

        let outputs = self.t_infer.time(|| self.cnn.estimate(image, view))?;
        let mut raw = ssd::decode(
            outputs.get(0)?,
            outputs.get(1)?,
            &self.anchors,
            input_res,
            threshold,
        )?;
        let mut palms = self.t_nms.time(|| self.nms.process(&mut raw));
        for palm in &mut palms {
            palm.map_out(view, input_res);
        }
        log::trace!("{} palms", palms.len());
        Ok(palms)
    }

    pub fn timers(&self) -> [&Timer; 2] {
        [&self.t_infer, &self.t_nms]
    }
}

/// Computes the region of interest for the landmark network from a palm detection.
///
/// The region is a square around the palm, moved towards the fingers along the direction from the
/// wrist to the middle finger.
pub fn hand_roi(palm: &Detection) -> Rect {
    let size = palm.rect.width().max(palm.rect.height());
    let (cx, cy) = palm.rect.center();

    // Hands are assumed upright when the keypoints are missing or coincide.
    let (mut dx, mut dy) = (0.0, -1.0);
    if let (Some(wrist), Some(middle)) = (
        Keypoint::Wrist.of(palm),
        Keypoint::MiddleFingerMcp.of(palm),
    ) {
        let (vx, vy) = (middle.0 - wrist.0, middle.1 - wrist.1);
        let len = vx.hypot(vy);
        if len > f32::EPSILON {
            (dx, dy) = (vx / len, vy / len);
        }
    }

    let shift = size * HAND_SHIFT;
    Rect::from_center(
        cx + dx * shift,
        cy + dy * shift,
        size * HAND_SCALE,
        size * HAND_SCALE,
    )
}

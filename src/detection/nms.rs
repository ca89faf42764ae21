//! Non-maximum suppression.
//!
//! SSD networks report every object several times, once for each anchor close to it. This merges
//! overlapping detections into one. [`SuppressionMode::Average`] computes a confidence-weighted
//! average of each group of overlapping boxes, which jitters less from frame to frame than keeping
//! only the best one.

use crate::image::Rect;

use super::ssd::Detection;

/// Describes how [`NonMaxSuppression`] merges overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Keep only the detection with the highest confidence.
    Remove,
    /// Average the overlapping detections, weighted by confidence.
    Average,
}

/// A non-maximum suppression pass.
#[derive(Debug)]
pub struct NonMaxSuppression {
    iou_thresh: f32,
    mode: SuppressionMode,
    group: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The IoU at or above which two detections are considered to be the same object.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            mode: SuppressionMode::Average,
            group: Vec::new(),
        }
    }

    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Merges overlapping `detections`, returning the result in order of descending confidence.
    ///
    /// `detections` is drained in the process.
    pub fn process(&mut self, detections: &mut Vec<Detection>) -> Vec<Detection> {
        let mut out = Vec::new();

        // Ascending, so that the best remaining detection is always at the back.
        detections.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));

        while let Some(seed) = detections.pop() {
            self.group.clear();
            let iou_thresh = self.iou_thresh;
            let group = &mut self.group;
            detections.retain(|other| {
                if seed.rect.iou(&other.rect) >= iou_thresh {
                    group.push(other.clone());
                    false
                } else {
                    true
                }
            });

            match self.mode {
                SuppressionMode::Remove => out.push(seed),
                SuppressionMode::Average => out.push(average(seed, &self.group)),
            }
        }

        self.group.clear();
        out
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Averages `seed` with the detections overlapping it. The result keeps the seed's confidence.
fn average(seed: Detection, others: &[Detection]) -> Detection {
    let mut divisor = 0.0;
    let (mut x, mut y, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
    let mut keypoints = vec![(0.0, 0.0); seed.keypoints.len()];
    for det in std::iter::once(&seed).chain(others) {
        let weight = det.confidence;
        divisor += weight;

        let (cx, cy) = det.rect.center();
        x += cx * weight;
        y += cy * weight;
        w += det.rect.width() * weight;
        h += det.rect.height() * weight;
        for (acc, kp) in keypoints.iter_mut().zip(&det.keypoints) {
            acc.0 += kp.0 * weight;
            acc.1 += kp.1 * weight;
        }
    }

    if divisor <= 0.0 {
        return seed;
    }
    for kp in &mut keypoints {
        kp.0 /= divisor;
        kp.1 /= divisor;
    }
    Detection {
        confidence: seed.confidence,
        rect: Rect::from_center(x / divisor, y / divisor, w / divisor, h / divisor),
        keypoints,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn det(confidence: f32, rect: Rect) -> Detection {
        Detection {
            confidence,
            rect,
            keypoints: vec![rect.center()],
        }
    }

    #[test]
    fn remove_keeps_best() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let rect = Rect::from_center(0.0, 0.0, 10.0, 10.0);
        let out = nms.process(&mut vec![
            det(0.55, rect.grow_rel(0.1)),
            det(0.6, rect),
        ]);
        assert_eq!(out, [det(0.6, rect)]);
    }

    #[test]
    fn keeps_separate_objects() {
        let mut nms = NonMaxSuppression::new();
        let a = det(0.7, Rect::from_center(0.0, 0.0, 10.0, 10.0));
        let b = det(0.9, Rect::from_center(50.0, 0.0, 10.0, 10.0));
        let mut detections = vec![a.clone(), b.clone()];
        let out = nms.process(&mut detections);
        assert_eq!(out, [b, a]);
        assert!(detections.is_empty());
    }

    #[test]
    fn average_weights_by_confidence() {
        let mut nms = NonMaxSuppression::new();
        nms.set_iou_thresh(0.0);

        let out = nms.process(&mut vec![
            det(1.0, Rect::from_center(0.0, 0.0, 10.0, 10.0)),
            det(0.5, Rect::from_center(3.0, 0.0, 40.0, 10.0)),
        ]);
        assert_eq!(out.len(), 1);

        let d = &out[0];
        assert_eq!(d.confidence, 1.0);
        let (cx, cy) = d.rect.center();
        assert_relative_eq!(cx, 1.0, epsilon = 1e-5);
        assert_relative_eq!(cy, 0.0, epsilon = 1e-5);
        assert_relative_eq!(d.rect.width(), 20.0, epsilon = 1e-5);
        assert_relative_eq!(d.rect.height(), 10.0, epsilon = 1e-5);
        assert_relative_eq!(d.keypoints[0].0, 1.0, epsilon = 1e-5);
    }
}

//! Anchor generation and output decoding for Single Shot MultiBox Detectors (SSDs).
//!
//! This only covers what the palm detection network needs: anchors are fixed at the center of
//! their feature map cell, and box sizes are predicted directly in input pixels.

use anyhow::ensure;

use crate::{image::Rect, resolution::Resolution};

/// Describes an output layer of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    boxes_per_cell: u32,
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a layer description.
    ///
    /// `width` and `height` are the size of the layer's feature map, in cells.
    pub const fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// The anchor centers of an SSD network, in normalized input coordinates.
#[derive(Debug)]
pub struct Anchors {
    centers: Vec<(f32, f32)>,
}

impl Anchors {
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let mut centers = Vec::new();
        for layer in layers {
            let (w, h) = (layer.resolution.width(), layer.resolution.height());
            for y in 0..h {
                for x in 0..w {
                    let center = ((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32);
                    centers.extend((0..layer.boxes_per_cell).map(|_| center));
                }
            }
        }
        Self { centers }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

/// A single box decoded from SSD outputs, with its keypoints.
///
/// Coordinates are in input pixels until moved with [`Detection::map_out`].
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub confidence: f32,
    pub rect: Rect,
    pub keypoints: Vec<(f32, f32)>,
}

impl Detection {
    /// Maps this detection from network input pixels to the coordinate system of `view`, the
    /// region the network was run on.
    pub fn map_out(&mut self, view: Rect, input_res: Resolution) {
        let scale_x = view.width() / input_res.width() as f32;
        let scale_y = view.height() / input_res.height() as f32;
        let map = |(x, y): (f32, f32)| (view.x() + x * scale_x, view.y() + y * scale_y);

        let (cx, cy) = map(self.rect.center());
        self.rect = Rect::from_center(
            cx,
            cy,
            self.rect.width() * scale_x,
            self.rect.height() * scale_y,
        );
        for kp in &mut self.keypoints {
            *kp = map(*kp);
        }
    }
}

pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Decodes raw box regressors and scores into [`Detection`]s whose confidence is at least
/// `threshold`.
///
/// `boxes` holds one row per anchor: box center offset and size, followed by keypoint offsets.
/// `scores` holds one logit per anchor.
pub fn decode(
    boxes: &[f32],
    scores: &[f32],
    anchors: &Anchors,
    input_res: Resolution,
    threshold: f32,
) -> anyhow::Result<Vec<Detection>> {
    ensure!(
        scores.len() == anchors.len(),
        "expected {} box scores, network returned {}",
        anchors.len(),
        scores.len(),
    );
    let row = boxes.len() / anchors.len().max(1);
    ensure!(
        row >= 4 && row % 2 == 0 && row * anchors.len() == boxes.len(),
        "box output of length {} does not fit {} anchors",
        boxes.len(),
        anchors.len(),
    );

    let (w, h) = (input_res.width() as f32, input_res.height() as f32);
    let mut detections = Vec::new();
    for ((values, &score), &(ax, ay)) in boxes
        .chunks_exact(row)
        .zip(scores)
        .zip(&anchors.centers)
    {
        let confidence = sigmoid(score);
        if confidence < threshold {
            continue;
        }

        let (xc, yc) = (values[0] + ax * w, values[1] + ay * h);
        let keypoints = values[4..]
            .chunks_exact(2)
            .map(|kp| (kp[0] + ax * w, kp[1] + ay * h))
            .collect();
        detections.push(Detection {
            confidence,
            rect: Rect::from_center(xc, yc, values[2], values[3]),
            keypoints,
        });
    }
    Ok(detections)
}

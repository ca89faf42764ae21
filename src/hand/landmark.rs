//! The 21-point hand skeleton.

use std::{fmt, ops::Index};

use anyhow::bail;

/// Number of landmarks making up one hand.
pub const NUM_LANDMARKS: usize = 21;

/// A single hand landmark in normalized image coordinates.
///
/// `x` and `y` are relative to the image width and height, so that `(0, 0)` is the top left and
/// `(1, 1)` the bottom right corner of the image. `z` is the relative depth as reported by the
/// landmark network; it is carried along but not used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    #[inline]
    pub const fn with_z(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// The landmarks of one detected hand.
///
/// There are always exactly [`NUM_LANDMARKS`] of them, ordered as in [`LandmarkIdx`].
#[derive(Clone, Copy, PartialEq)]
pub struct HandLandmarks {
    points: [Landmark; NUM_LANDMARKS],
}

impl HandLandmarks {
    #[inline]
    pub const fn from_array(points: [Landmark; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Creates a [`HandLandmarks`] from a slice of landmarks.
    ///
    /// Returns an error if `points` does not contain exactly [`NUM_LANDMARKS`] elements.
    pub fn from_slice(points: &[Landmark]) -> anyhow::Result<Self> {
        match <[Landmark; NUM_LANDMARKS]>::try_from(points) {
            Ok(points) => Ok(Self { points }),
            Err(_) => bail!(
                "a hand has {} landmarks, got {}",
                NUM_LANDMARKS,
                points.len()
            ),
        }
    }

    #[inline]
    pub fn get(&self, idx: LandmarkIdx) -> Landmark {
        self.points[idx as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> + '_ {
        self.points.iter()
    }

    /// Returns the `(x, y)` position of every landmark, in [`LandmarkIdx`] order.
    pub fn positions(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.points.iter().map(|lm| (lm.x, lm.y))
    }
}

impl Index<LandmarkIdx> for HandLandmarks {
    type Output = Landmark;

    #[inline]
    fn index(&self, idx: LandmarkIdx) -> &Landmark {
        &self.points[idx as usize]
    }
}

impl TryFrom<Vec<Landmark>> for HandLandmarks {
    type Error = anyhow::Error;

    fn try_from(points: Vec<Landmark>) -> anyhow::Result<Self> {
        Self::from_slice(&points)
    }
}

impl fmt::Debug for HandLandmarks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.points.iter().map(|lm| (lm.x, lm.y)))
            .finish()
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand. This is the *base joint* that fingertips are compared against.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// All fingers, starting at the thumb.
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    pub fn tip(self) -> LandmarkIdx {
        match self {
            Finger::Thumb => LandmarkIdx::ThumbTip,
            Finger::Index => LandmarkIdx::IndexFingerTip,
            Finger::Middle => LandmarkIdx::MiddleFingerTip,
            Finger::Ring => LandmarkIdx::RingFingerTip,
            Finger::Pinky => LandmarkIdx::PinkyTip,
        }
    }

    /// Returns the base joint the fingertip is compared against.
    ///
    /// For the thumb, this is its MCP joint, not the CMC joint at the wrist.
    pub fn base(self) -> LandmarkIdx {
        match self {
            Finger::Thumb => LandmarkIdx::ThumbMcp,
            Finger::Index => LandmarkIdx::IndexFingerMcp,
            Finger::Middle => LandmarkIdx::MiddleFingerMcp,
            Finger::Ring => LandmarkIdx::RingFingerMcp,
            Finger::Pinky => LandmarkIdx::PinkyMcp,
        }
    }
}

/// Which hand a detection belongs to, as reported by the landmark network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        })
    }
}

/// The bones of the hand skeleton: the wrist connects to the first joint of every finger, and
/// every finger is a chain of 3 segments.
///
/// This is a star around the wrist with exactly 20 segments. MediaPipe's hand skeleton instead
/// draws the palm as a polygon, joining neighboring knuckles (index, middle, ring and pinky MCP)
/// and closing it with a wrist to pinky MCP segment, and drops the wrist to middle and ring MCP
/// segments, for 21 connections in total.
pub const CONNECTIONS: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Thumb:
        (Wrist, ThumbCmc),
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (Wrist, IndexFingerMcp),
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (Wrist, MiddleFingerMcp),
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (Wrist, RingFingerMcp),
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (Wrist, PinkyMcp),
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_count_is_checked() {
        let err = HandLandmarks::from_slice(&[Landmark::new(0.0, 0.0); 20]).unwrap_err();
        assert!(err.to_string().contains("got 20"), "{err}");
        assert!(HandLandmarks::try_from(vec![Landmark::default(); 22]).is_err());
        assert!(HandLandmarks::try_from(Vec::new()).is_err());

        let points = (0..NUM_LANDMARKS)
            .map(|i| Landmark::new(i as f32 / 20.0, 0.5))
            .collect::<Vec<_>>();
        let hand = HandLandmarks::try_from(points).unwrap();
        assert_eq!(hand.get(LandmarkIdx::Wrist).x, 0.0);
        assert_eq!(hand[LandmarkIdx::PinkyTip].x, 1.0);
        assert_eq!(hand.iter().count(), NUM_LANDMARKS);
        assert_eq!(hand.positions().nth(10), Some((0.5, 0.5)));
    }

    #[test]
    fn finger_joints() {
        let tips = Finger::ALL.map(|f| f.tip() as usize);
        let bases = Finger::ALL.map(|f| f.base() as usize);
        assert_eq!(tips, [4, 8, 12, 16, 20]);
        assert_eq!(bases, [2, 5, 9, 13, 17]);
        assert_eq!(LandmarkIdx::PinkyTip as usize, NUM_LANDMARKS - 1);
    }

    #[test]
    fn skeleton() {
        assert_eq!(CONNECTIONS.len(), 20);

        // Every landmark is part of at least one bone.
        for i in 0..NUM_LANDMARKS {
            assert!(
                CONNECTIONS
                    .iter()
                    .any(|&(a, b)| a as usize == i || b as usize == i),
                "landmark {i} is not connected"
            );
        }

        let from_wrist = CONNECTIONS
            .iter()
            .filter(|(a, _)| *a == LandmarkIdx::Wrist)
            .count();
        assert_eq!(from_wrist, 5);

        // Knuckles are only joined through the wrist.
        let bases = Finger::ALL.map(|f| f.base());
        assert!(CONNECTIONS
            .iter()
            .all(|(a, b)| !(bases.contains(a) && bases.contains(b))));
    }

    #[test]
    fn handedness() {
        assert_eq!(Handedness::Left.opposite(), Handedness::Right);
        assert_eq!(Handedness::Right.opposite().opposite(), Handedness::Right);
        assert_eq!(Handedness::Right.to_string(), "Right");
    }
}

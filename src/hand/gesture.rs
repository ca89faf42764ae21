//! Static hand gesture classification.
//!
//! A gesture is derived purely from which fingers are extended. A finger counts as extended when
//! its tip lies above its base joint in the image (smaller Y). The thumb moves sideways instead,
//! so it counts as extended when its tip lies to the left of its base joint (smaller X).
//!
//! The thumb rule only holds for one hand orientation: a right hand seen in a mirrored selfie
//! view, palm facing the camera. It is not adjusted for the detected handedness.

use std::fmt;

use super::landmark::{Finger, HandLandmarks};

/// The extended/curled state of all five fingers of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FingerStates {
    extended: [bool; 5],
}

impl FingerStates {
    /// Creates a [`FingerStates`] from the extended flags, in [`Finger::ALL`] order.
    pub const fn new(extended: [bool; 5]) -> Self {
        Self { extended }
    }

    /// Determines which fingers of `hand` are extended.
    pub fn of(hand: &HandLandmarks) -> Self {
        Self {
            extended: Finger::ALL.map(|finger| {
                let tip = hand.get(finger.tip());
                let base = hand.get(finger.base());
                match finger {
                    Finger::Thumb => tip.x < base.x,
                    _ => tip.y < base.y,
                }
            }),
        }
    }

    #[inline]
    pub fn is_extended(&self, finger: Finger) -> bool {
        self.extended[finger as usize]
    }

    /// Returns the number of extended fingers (0 to 5).
    pub fn count(&self) -> u8 {
        self.extended.iter().filter(|&&ext| ext).count() as u8
    }

    /// Returns whether `finger` is the only extended finger.
    pub fn only(&self, finger: Finger) -> bool {
        self.count() == 1 && self.is_extended(finger)
    }
}

/// A recognized static hand gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// No finger extended.
    Fist,
    /// All fingers extended.
    OpenPalm,
    /// Only the index finger extended.
    Pointing,
    /// Only the thumb extended.
    ThumbsUp,
    /// Index and middle finger extended.
    PeaceSign,
    ThreeFingers,
    FourFingers,
    /// Any other combination, described by its number of extended fingers.
    Fingers(u8),
}

impl Gesture {
    /// Maps finger states to a gesture.
    ///
    /// Rules are checked in order and the first matching one wins.
    pub fn from_states(states: FingerStates) -> Self {
        let count = states.count();
        let peace = states.is_extended(Finger::Index)
            && states.is_extended(Finger::Middle)
            && !states.is_extended(Finger::Thumb)
            && !states.is_extended(Finger::Ring)
            && !states.is_extended(Finger::Pinky);

        match count {
            0 => Gesture::Fist,
            5 => Gesture::OpenPalm,
            1 if states.only(Finger::Index) => Gesture::Pointing,
            1 if states.only(Finger::Thumb) => Gesture::ThumbsUp,
            2 if peace => Gesture::PeaceSign,
            3 => Gesture::ThreeFingers,
            4 => Gesture::FourFingers,
            n => Gesture::Fingers(n),
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gesture::Fist => f.write_str("fist"),
            Gesture::OpenPalm => f.write_str("open palm"),
            Gesture::Pointing => f.write_str("pointing"),
            Gesture::ThumbsUp => f.write_str("thumbs up"),
            Gesture::PeaceSign => f.write_str("peace sign"),
            Gesture::ThreeFingers => f.write_str("three fingers"),
            Gesture::FourFingers => f.write_str("four fingers"),
            Gesture::Fingers(n) => write!(f, "{n} fingers"),
        }
    }
}

/// Classifies the gesture shown by `hand`.
pub fn classify(hand: &HandLandmarks) -> Gesture {
    let states = FingerStates::of(hand);
    let gesture = Gesture::from_states(states);
    log::trace!("{:?} -> {}", states, gesture);
    gesture
}

#[cfg(test)]
mod tests {
    use crate::hand::landmark::{Landmark, NUM_LANDMARKS};

    use super::*;

    /// Builds a hand whose fingertips are placed relative to their base joints so that exactly the
    /// fingers in `extended` pass the extension test.
    fn hand(extended: [bool; 5]) -> HandLandmarks {
        let mut points = [Landmark::new(0.5, 0.5); NUM_LANDMARKS];
        for (finger, ext) in Finger::ALL.into_iter().zip(extended) {
            let base = finger.base() as usize;
            let tip = finger.tip() as usize;
            points[base] = Landmark::new(0.5, 0.6);
            points[tip] = match (finger, ext) {
                (Finger::Thumb, true) => Landmark::new(0.4, 0.6),
                (Finger::Thumb, false) => Landmark::new(0.6, 0.6),
                (_, true) => Landmark::new(0.5, 0.3),
                (_, false) => Landmark::new(0.5, 0.7),
            };
        }
        HandLandmarks::from_array(points)
    }

    fn flags(fingers: &[Finger]) -> [bool; 5] {
        Finger::ALL.map(|f| fingers.contains(&f))
    }

    #[test]
    fn finger_states() {
        for bits in 0..32u8 {
            let extended = [0, 1, 2, 3, 4].map(|i| bits & (1 << i) != 0);
            let states = FingerStates::of(&hand(extended));
            assert_eq!(states, FingerStates::new(extended));
            assert_eq!(states.count(), bits.count_ones() as u8);
        }
    }

    #[test]
    fn equal_coordinates_are_not_extended() {
        let mut points = [Landmark::new(0.5, 0.5); NUM_LANDMARKS];
        let states = FingerStates::of(&HandLandmarks::from_array(points));
        assert_eq!(states.count(), 0);

        // Only Y matters for the index finger, even if X differs.
        points[Finger::Index.tip() as usize] = Landmark::new(0.1, 0.5);
        let states = FingerStates::of(&HandLandmarks::from_array(points));
        assert!(!states.is_extended(Finger::Index));

        // Only X matters for the thumb.
        points[Finger::Thumb.tip() as usize] = Landmark::new(0.5, 0.1);
        let states = FingerStates::of(&HandLandmarks::from_array(points));
        assert!(!states.is_extended(Finger::Thumb));
    }

    #[test]
    fn fist_and_open_palm() {
        assert_eq!(classify(&hand([false; 5])), Gesture::Fist);
        assert_eq!(classify(&hand([true; 5])), Gesture::OpenPalm);
        assert_eq!(Gesture::Fist.to_string(), "fist");
        assert_eq!(Gesture::OpenPalm.to_string(), "open palm");
    }

    #[test]
    fn single_finger() {
        let pointing = classify(&hand(flags(&[Finger::Index])));
        assert_eq!(pointing, Gesture::Pointing);
        assert_eq!(pointing.to_string(), "pointing");

        let thumbs_up = classify(&hand(flags(&[Finger::Thumb])));
        assert_eq!(thumbs_up, Gesture::ThumbsUp);
        assert_eq!(thumbs_up.to_string(), "thumbs up");

        for finger in [Finger::Middle, Finger::Ring, Finger::Pinky] {
            let gesture = classify(&hand(flags(&[finger])));
            assert_eq!(gesture, Gesture::Fingers(1), "{finger:?}");
            assert_eq!(gesture.to_string(), "1 fingers");
        }
    }

    #[test]
    fn two_fingers() {
        let peace = classify(&hand(flags(&[Finger::Index, Finger::Middle])));
        assert_eq!(peace, Gesture::PeaceSign);
        assert_eq!(peace.to_string(), "peace sign");

        for pair in [
            [Finger::Thumb, Finger::Index],
            [Finger::Index, Finger::Ring],
            [Finger::Middle, Finger::Ring],
            [Finger::Ring, Finger::Pinky],
        ] {
            let gesture = classify(&hand(flags(&pair)));
            assert_eq!(gesture, Gesture::Fingers(2), "{pair:?}");
            assert_eq!(gesture.to_string(), "2 fingers");
        }
    }

    #[test]
    fn counted_fingers() {
        for bits in 0..32u8 {
            let extended = [0, 1, 2, 3, 4].map(|i| bits & (1 << i) != 0);
            let gesture = classify(&hand(extended));
            match bits.count_ones() {
                3 => assert_eq!(gesture.to_string(), "three fingers"),
                4 => assert_eq!(gesture.to_string(), "four fingers"),
                _ => {}
            }
        }
    }

    #[test]
    fn random_hands_agree_with_finger_rules() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..1000 {
            let points: [Landmark; NUM_LANDMARKS] =
                std::array::from_fn(|_| Landmark::new(rng.f32(), rng.f32()));
            let hand = HandLandmarks::from_array(points);
            let states = FingerStates::of(&hand);

            for finger in Finger::ALL {
                let tip = hand.get(finger.tip());
                let base = hand.get(finger.base());
                let expected = match finger {
                    Finger::Thumb => tip.x < base.x,
                    _ => tip.y < base.y,
                };
                assert_eq!(states.is_extended(finger), expected);
            }

            let gesture = classify(&hand);
            match states.count() {
                0 => assert_eq!(gesture, Gesture::Fist),
                5 => assert_eq!(gesture, Gesture::OpenPalm),
                3 => assert_eq!(gesture, Gesture::ThreeFingers),
                4 => assert_eq!(gesture, Gesture::FourFingers),
                n => {
                    if let Gesture::Fingers(m) = gesture {
                        assert_eq!(m, n);
                    }
                }
            }
        }
    }
}

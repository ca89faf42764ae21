use handsign::{
    annotate::{to_pixel, Annotator, AnnotatorStyle, LabelConvention},
    detection::{DetectionResult, HandDetection, HandDetector},
    hand::{
        gesture::{classify, Gesture},
        landmark::{HandLandmarks, Handedness, Landmark, LandmarkIdx, CONNECTIONS},
    },
    image::{Color, Image},
    pipeline::{FrameSink, FrameSource, Pipeline},
    resolution::Resolution,
};

/// A right hand in a selfie view with all five fingers spread out.
fn open_palm() -> HandLandmarks {
    HandLandmarks::from_array([
        // Wrist
        Landmark::new(0.50, 0.875),
        // Thumb
        Landmark::new(0.42, 0.85),
        Landmark::new(0.38, 0.78),
        Landmark::new(0.34, 0.72),
        Landmark::new(0.30, 0.66),
        // Index
        Landmark::new(0.44, 0.60),
        Landmark::new(0.43, 0.50),
        Landmark::new(0.43, 0.44),
        Landmark::new(0.43, 0.38),
        // Middle
        Landmark::new(0.50, 0.58),
        Landmark::new(0.50, 0.47),
        Landmark::new(0.50, 0.40),
        Landmark::new(0.50, 0.34),
        // Ring
        Landmark::new(0.56, 0.60),
        Landmark::new(0.57, 0.50),
        Landmark::new(0.58, 0.44),
        Landmark::new(0.58, 0.39),
        // Pinky
        Landmark::new(0.62, 0.64),
        Landmark::new(0.64, 0.56),
        Landmark::new(0.65, 0.51),
        Landmark::new(0.66, 0.46),
    ])
}

/// Same hand with every fingertip folded back below its knuckle.
fn fist() -> HandLandmarks {
    let mut points = open_palm().iter().copied().collect::<Vec<_>>();
    for (tip, base) in [(4, 2), (8, 5), (12, 9), (16, 13), (20, 17)] {
        points[tip] = Landmark::new(points[base].x + 0.02, points[base].y + 0.03);
    }
    HandLandmarks::try_from(points).unwrap()
}

struct Camera {
    res: Resolution,
}

impl FrameSource for Camera {
    fn read(&mut self) -> anyhow::Result<Image> {
        Ok(Image::new(self.res.width(), self.res.height()))
    }
}

struct Scripted(Vec<HandDetection>);

impl HandDetector for Scripted {
    fn detect(&mut self, _image: &Image, _timestamp_ms: u64) -> anyhow::Result<DetectionResult> {
        Ok(DetectionResult::new(self.0.clone()))
    }
}

#[derive(Default)]
struct Screen {
    last: Option<Image>,
}

impl FrameSink for Screen {
    fn show(&mut self, image: &Image) -> anyhow::Result<()> {
        self.last = Some(image.clone());
        Ok(())
    }

    fn exit_requested(&self) -> bool {
        self.last.is_some()
    }
}

fn hand(landmarks: HandLandmarks, handedness: Handedness) -> HandDetection {
    HandDetection {
        landmarks,
        handedness,
        score: 0.97,
    }
}

#[test]
fn open_palm_frame() {
    let res = Resolution::new(640, 480);
    let mut pipeline = Pipeline::new(
        Camera { res },
        Scripted(vec![hand(open_palm(), Handedness::Right)]),
        Screen::default(),
        Annotator::default(),
    );

    let mut out = Vec::new();
    pipeline.run(&mut out).unwrap();
    assert_eq!(pipeline.clock().frames(), 1);

    let out = String::from_utf8(out).unwrap();
    assert_eq!(
        out,
        "Left index finger at X=0.43, Y=0.38 | gesture: open palm\n"
    );

    let shown = pipeline.sink().last.as_ref().unwrap();
    assert_eq!(shown.resolution(), res);
    let (x, y) = to_pixel(open_palm().get(LandmarkIdx::Wrist), res);
    assert_eq!((x, y), (320, 420));
    assert_eq!(shown.get(x as u32, y as u32), Color::GREEN);
    // The frame corners are untouched.
    assert_eq!(shown.get(0, 0), Color::NULL);
    assert_eq!(shown.get(639, 479), Color::NULL);
}

#[test]
fn open_palm_overlay() {
    let res = Resolution::new(640, 480);
    let annotator = Annotator::default();
    let detections = DetectionResult::new(vec![hand(open_palm(), Handedness::Right)]);
    let annotated = annotator.annotate(&Image::new(640, 480), &detections);

    assert_eq!(annotated.overlays.len(), 1);
    let overlay = &annotated.overlays[0];
    assert_eq!(overlay.markers.len(), 21);
    assert_eq!(overlay.lines.len(), CONNECTIONS.len());
    assert_eq!(overlay.lines.len(), 20);
    assert_eq!(overlay.side, Handedness::Left);
    assert_eq!(overlay.gesture, Gesture::OpenPalm);

    // The handedness label sits above the topmost landmark (the middle fingertip).
    let (_, top) = to_pixel(open_palm().get(LandmarkIdx::MiddleFingerTip), res);
    assert_eq!(overlay.text_anchor.1, top - annotator.style().text_margin);
    assert_eq!(
        overlay.gesture_anchor.1,
        overlay.text_anchor.1 + annotator.style().gesture_offset
    );
}

#[test]
fn center_maps_to_frame_center() {
    let res = Resolution::new(640, 480);
    assert_eq!(to_pixel(Landmark::new(0.5, 0.5), res), (320, 240));
    assert_eq!(to_pixel(Landmark::new(0.0, 0.0), res), (0, 0));
    assert_eq!(to_pixel(Landmark::new(1.0, 1.0), res), (640, 480));
}

#[test]
fn two_hands_are_reported_in_order() {
    let mut pipeline = Pipeline::new(
        Camera {
            res: Resolution::new(320, 240),
        },
        Scripted(vec![
            hand(open_palm(), Handedness::Right),
            hand(fist(), Handedness::Left),
        ]),
        Screen::default(),
        Annotator::new(AnnotatorStyle::default(), LabelConvention::AsDetected),
    );

    let mut out = Vec::new();
    pipeline.run(&mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    let lines = out.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Right index finger"), "{}", lines[0]);
    assert!(lines[0].ends_with("gesture: open palm"), "{}", lines[0]);
    assert!(lines[1].starts_with("Left index finger"), "{}", lines[1]);
    assert!(lines[1].ends_with("gesture: fist"), "{}", lines[1]);
}

#[test]
fn no_hands_leaves_frame_alone() {
    let mut pipeline = Pipeline::new(
        Camera {
            res: Resolution::new(64, 48),
        },
        Scripted(Vec::new()),
        Screen::default(),
        Annotator::default(),
    );

    let mut out = Vec::new();
    pipeline.run(&mut out).unwrap();
    assert!(out.is_empty());
    assert_eq!(
        pipeline.sink().last.as_ref().unwrap(),
        &Image::new(64, 48)
    );
}

#[test]
fn fixture_gestures() {
    assert_eq!(classify(&open_palm()), Gesture::OpenPalm);
    assert_eq!(classify(&fist()), Gesture::Fist);
}

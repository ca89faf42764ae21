//! The frame loop.
//!
//! Frames are processed one at a time on the calling thread: read, optionally mirror, detect,
//! annotate, report and show. The loop stops at the next frame boundary after the display asks
//! for it.

use std::io::Write;

use anyhow::Context;

use crate::{
    annotate::Annotator,
    detection::HandDetector,
    image::Image,
    timer::{FpsCounter, Timer},
};

/// A source of video frames, such as a [`Webcam`][crate::webcam::Webcam].
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    ///
    /// An error means that this frame is unavailable. The next call may succeed again.
    fn read(&mut self) -> anyhow::Result<Image>;

    /// Returns profiling timers to include in FPS logs.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// A display that annotated frames are shown on.
pub trait FrameSink {
    fn show(&mut self, image: &Image) -> anyhow::Result<()>;

    /// Returns whether the user asked to stop.
    fn exit_requested(&self) -> bool;
}

/// Frame counter passed to the detector as its timestamp.
///
/// Starts at 0 and advances by 1 for every processed frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    next: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the timestamp of the next frame and advances the clock.
    pub fn tick(&mut self) -> u64 {
        let now = self.next;
        self.next += 1;
        now
    }

    /// Returns the number of frames processed so far.
    pub fn frames(&self) -> u64 {
        self.next
    }
}

/// Outcome of [`Pipeline::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A frame was processed and shown.
    Processed,
    /// No frame could be read; nothing was shown.
    Skipped,
}

/// Connects a frame source, a hand detector, the annotator and a display.
pub struct Pipeline<S, D, K> {
    source: S,
    detector: D,
    sink: K,
    annotator: Annotator,
    mirror: bool,
    clock: FrameClock,
    fps: FpsCounter,
    t_detect: Timer,
    t_annotate: Timer,
    t_show: Timer,
}

impl<S: FrameSource, D: HandDetector, K: FrameSink> Pipeline<S, D, K> {
    pub fn new(source: S, detector: D, sink: K, annotator: Annotator) -> Self {
        Self {
            source,
            detector,
            sink,
            annotator,
            mirror: true,
            clock: FrameClock::new(),
            fps: FpsCounter::new("handsign"),
            t_detect: Timer::new("detect"),
            t_annotate: Timer::new("annotate"),
            t_show: Timer::new("show"),
        }
    }

    /// Sets whether frames are flipped horizontally before detection, like a mirror.
    ///
    /// Enabled by default.
    pub fn mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn clock(&self) -> FrameClock {
        self.clock
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Processes a single frame.
    ///
    /// One line per detected hand is written to `diagnostics`. A frame that cannot be read is
    /// logged and skipped. Detector, display and diagnostics errors are returned.
    pub fn step<W: Write>(&mut self, diagnostics: &mut W) -> anyhow::Result<Step> {
        let mut image = match self.source.read() {
            Ok(image) => image,
            Err(e) => {
                log::warn!("failed to read frame: {:#}", e);
                return Ok(Step::Skipped);
            }
        };
        if self.mirror {
            image.flip_horizontal_in_place();
        }

        let timestamp = self.clock.tick();
        let detections = self
            .t_detect
            .time(|| self.detector.detect(&image, timestamp))
            .with_context(|| format!("hand detection failed on frame {timestamp}"))?;
        log::trace!("frame {}: {} hands", timestamp, detections.len());

        let annotated = self
            .t_annotate
            .time(|| self.annotator.annotate(&image, &detections));
        for report in &annotated.reports {
            writeln!(diagnostics, "{report}").context("failed to write diagnostics")?;
        }

        self.t_show.time(|| self.sink.show(&annotated.image))?;

        let mut timers = self.source.timers();
        timers.extend(self.detector.timers());
        timers.extend([&self.t_detect, &self.t_annotate, &self.t_show]);
        self.fps.tick_with(timers);

        Ok(Step::Processed)
    }

    /// Processes frames until the display requests to stop.
    pub fn run<W: Write>(&mut self, diagnostics: &mut W) -> anyhow::Result<()> {
        loop {
            if self.sink.exit_requested() {
                log::info!("exit requested after {} frames", self.clock.frames());
                return Ok(());
            }

            self.step(diagnostics)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use anyhow::bail;

    use crate::{
        detection::{DetectionResult, HandDetection},
        hand::landmark::{HandLandmarks, Handedness, Landmark, NUM_LANDMARKS},
        image::Color,
    };

    use super::*;

    struct Frames(VecDeque<anyhow::Result<Image>>);

    impl FrameSource for Frames {
        fn read(&mut self) -> anyhow::Result<Image> {
            match self.0.pop_front() {
                Some(frame) => frame,
                None => bail!("out of frames"),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        timestamps: Vec<u64>,
        first_pixels: Vec<Color>,
        fail: bool,
    }

    impl HandDetector for Recorder {
        fn detect(&mut self, image: &Image, timestamp_ms: u64) -> anyhow::Result<DetectionResult> {
            if self.fail {
                bail!("model exploded");
            }
            self.timestamps.push(timestamp_ms);
            self.first_pixels.push(image.get(0, 0));

            let landmarks = HandLandmarks::from_array([Landmark::new(0.5, 0.5); NUM_LANDMARKS]);
            Ok(DetectionResult::new(vec![HandDetection {
                landmarks,
                handedness: Handedness::Right,
                score: 0.9,
            }]))
        }
    }

    struct Window {
        shown: Vec<Image>,
        close_after: usize,
    }

    impl FrameSink for Window {
        fn show(&mut self, image: &Image) -> anyhow::Result<()> {
            self.shown.push(image.clone());
            Ok(())
        }

        fn exit_requested(&self) -> bool {
            self.shown.len() >= self.close_after
        }
    }

    fn frame() -> Image {
        let mut image = Image::new(8, 4);
        image.set(7, 0, Color::RED);
        image
    }

    fn pipeline(
        frames: Vec<anyhow::Result<Image>>,
        close_after: usize,
    ) -> Pipeline<Frames, Recorder, Window> {
        Pipeline::new(
            Frames(frames.into()),
            Recorder::default(),
            Window {
                shown: Vec::new(),
                close_after,
            },
            Annotator::default(),
        )
    }

    #[test]
    fn clock() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.frames(), 0);
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.frames(), 2);
    }

    #[test]
    fn read_failures_are_skipped() {
        let mut pipeline = pipeline(
            vec![
                Ok(frame()),
                Err(anyhow::anyhow!("no frame")),
                Ok(frame()),
                Err(anyhow::anyhow!("no frame")),
                Err(anyhow::anyhow!("no frame")),
                Ok(frame()),
            ],
            3,
        );
        let mut diagnostics = Vec::new();
        pipeline.run(&mut diagnostics).unwrap();

        assert_eq!(pipeline.detector().timestamps, [0, 1, 2]);
        assert_eq!(pipeline.sink().shown.len(), 3);
        assert_eq!(pipeline.clock().frames(), 3);

        let diagnostics = String::from_utf8(diagnostics).unwrap();
        assert_eq!(diagnostics.lines().count(), 3);
        for line in diagnostics.lines() {
            assert_eq!(
                line,
                "Left index finger at X=0.50, Y=0.50 | gesture: fist"
            );
        }
    }

    #[test]
    fn stop_is_checked_before_reading() {
        let mut pipeline = pipeline(vec![Ok(frame())], 0);
        pipeline.run(&mut std::io::sink()).unwrap();
        assert!(pipeline.detector().timestamps.is_empty());
    }

    #[test]
    fn mirroring() {
        let mut mirrored = pipeline(vec![Ok(frame())], 1);
        assert_eq!(mirrored.step(&mut std::io::sink()).unwrap(), Step::Processed);
        assert_eq!(mirrored.detector().first_pixels, [Color::RED]);

        let mut plain = pipeline(vec![Ok(frame())], 1).mirror(false);
        assert_eq!(plain.step(&mut std::io::sink()).unwrap(), Step::Processed);
        assert_eq!(plain.detector().first_pixels, [Color::NULL]);

        assert_eq!(plain.step(&mut std::io::sink()).unwrap(), Step::Skipped);
    }

    #[test]
    fn detector_errors_are_fatal() {
        let mut pipeline = pipeline(vec![Ok(frame()), Ok(frame())], 2);
        pipeline.detector.fail = true;
        let err = pipeline.run(&mut std::io::sink()).unwrap_err();
        assert!(format!("{err:#}").contains("model exploded"), "{err:#}");
        assert!(pipeline.sink().shown.is_empty());
    }
}

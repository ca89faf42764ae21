//! Live hand gesture recognition.
//!
//! `handsign` reads frames from a webcam, runs a hand landmark network on them, classifies a small
//! set of static hand gestures from the landmark geometry, and shows the frames with a skeleton
//! and text overlay drawn on top.
//!
//! The pieces are:
//!
//! * [`hand::gesture`]: the landmark classifier, mapping the 21 landmarks of one hand to a
//!   [`Gesture`][hand::gesture::Gesture].
//! * [`annotate`]: the frame annotator, turning a [`DetectionResult`][detection::DetectionResult]
//!   into overlay geometry and drawing it.
//! * [`detection`]: the result types and the [`HandDetector`][detection::HandDetector] trait that
//!   any landmark backend has to implement. [`hand::network`] provides the default ONNX backend,
//!   which picks up new hands with the palm detector in [`hand::palm`].
//! * [`pipeline`]: the single-threaded frame loop tying a frame source, a detector and a display
//!   together.
//!
//! # Coordinates
//!
//! Landmarks use normalized image coordinates: X and Y are in `[0, 1]` relative to the image
//! width and height, X points right and Y points *down*.
//!
//! # Environment Variables
//!
//! Startup configuration is read from the environment by [`config::Config::from_env`]. Besides
//! those variables, `HANDSIGN_JPEG_BACKEND` selects the JPEG decoder used for webcam frames:
//! `zune-jpeg` (the default) or `jpeg-decoder`.

use log::LevelFilter;

pub mod annotate;
pub mod config;
pub mod detection;
pub mod gui;
pub mod hand;
pub mod image;
pub mod nn;
pub mod pipeline;
pub mod resolution;
pub mod timer;
pub mod webcam;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .filter(Some("tract_core"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and `handsign` will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// `wgpu` and `tract` will always log at *warn* level. `RUST_LOG` overrides all of these.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}

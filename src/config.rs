//! Startup configuration from environment variables.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `HANDSIGN_MODEL` | Path to the hand landmark ONNX model (the first command line argument takes precedence) | required |
//! | `HANDSIGN_PALM_MODEL` | Path to the palm detection ONNX model (the second command line argument takes precedence) | none, only one hand in the center of the frame is picked up |
//! | `HANDSIGN_WEBCAM_NAME` | Name of the webcam to open | first supported webcam |
//! | `HANDSIGN_WEBCAM_RESOLUTION` | Minimum webcam resolution, as `WIDTHxHEIGHT` | any |
//! | `HANDSIGN_WEBCAM_FPS` | Minimum webcam frame rate | any |
//! | `HANDSIGN_WEBCAM_PREFER` | `resolution` or `fps`, whichever to keep when the webcam cannot deliver both | `resolution` |
//! | `HANDSIGN_MAX_HANDS` | Maximum number of hands reported per frame | 2 |
//! | `HANDSIGN_MIN_DETECTION_CONFIDENCE` | Threshold for picking up a new hand | 0.5 |
//! | `HANDSIGN_MIN_PRESENCE_CONFIDENCE` | Threshold for reporting a hand | 0.5 |
//! | `HANDSIGN_MIN_TRACKING_CONFIDENCE` | Threshold for keeping track of a hand | 0.5 |
//! | `HANDSIGN_MIRROR` | Flip frames horizontally before detection | `true` |
//! | `HANDSIGN_LABELS` | `mirrored` or `as-detected` side labels | `mirrored` |

use std::{
    env::{self, VarError},
    ffi::OsString,
    path::PathBuf,
    str::FromStr,
};

use anyhow::{anyhow, bail, Context};

use crate::{
    annotate::LabelConvention,
    detection::DetectorOptions,
    resolution::Resolution,
    webcam::{ParamPreference, WebcamOptions, ENV_VAR_WEBCAM_NAME},
};

const ENV_VAR_MODEL: &str = "HANDSIGN_MODEL";
const ENV_VAR_PALM_MODEL: &str = "HANDSIGN_PALM_MODEL";
const ENV_VAR_WEBCAM_RESOLUTION: &str = "HANDSIGN_WEBCAM_RESOLUTION";
const ENV_VAR_WEBCAM_FPS: &str = "HANDSIGN_WEBCAM_FPS";
const ENV_VAR_WEBCAM_PREFER: &str = "HANDSIGN_WEBCAM_PREFER";
const ENV_VAR_MAX_HANDS: &str = "HANDSIGN_MAX_HANDS";
const ENV_VAR_MIN_DETECTION_CONFIDENCE: &str = "HANDSIGN_MIN_DETECTION_CONFIDENCE";
const ENV_VAR_MIN_PRESENCE_CONFIDENCE: &str = "HANDSIGN_MIN_PRESENCE_CONFIDENCE";
const ENV_VAR_MIN_TRACKING_CONFIDENCE: &str = "HANDSIGN_MIN_TRACKING_CONFIDENCE";
const ENV_VAR_MIRROR: &str = "HANDSIGN_MIRROR";
const ENV_VAR_LABELS: &str = "HANDSIGN_LABELS";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: PathBuf,
    pub palm_model: Option<PathBuf>,
    pub webcam_name: Option<String>,
    pub webcam_resolution: Option<Resolution>,
    pub webcam_fps: Option<u32>,
    pub webcam_prefer: ParamPreference,
    pub detector: DetectorOptions,
    pub mirror: bool,
    pub labels: LabelConvention,
}

impl Config {
    /// Reads the configuration from the process environment and command line.
    ///
    /// Any invalid value results in an error.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut args = env::args_os().skip(1);
        Self::from_lookup(
            |name| match env::var(name) {
                Ok(value) => Ok(Some(value)),
                Err(VarError::NotPresent) => Ok(None),
                Err(VarError::NotUnicode(value)) => bail!(
                    "`{name}` is set to non-UTF-8 value {}",
                    value.to_string_lossy()
                ),
            },
            args.next(),
            args.next(),
        )
    }

    /// Returns the webcam format negotiation options.
    pub fn webcam_options(&self) -> WebcamOptions {
        let mut options = WebcamOptions::default().prefer(self.webcam_prefer);
        if let Some(name) = &self.webcam_name {
            options = options.name(name.as_str());
        }
        if let Some(resolution) = self.webcam_resolution {
            options = options.resolution(resolution);
        }
        if let Some(fps) = self.webcam_fps {
            options = options.fps(fps);
        }
        options
    }

    fn from_lookup<F>(
        var: F,
        model_arg: Option<OsString>,
        palm_model_arg: Option<OsString>,
    ) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> anyhow::Result<Option<String>>,
    {
        let model = match (model_arg, var(ENV_VAR_MODEL)?) {
            (Some(arg), _) => PathBuf::from(arg),
            (None, Some(path)) => PathBuf::from(path),
            (None, None) => bail!(
                "no hand landmark model given; pass its path as the first argument or set `{}`",
                ENV_VAR_MODEL
            ),
        };

        let palm_model = match (palm_model_arg, var(ENV_VAR_PALM_MODEL)?) {
            (Some(arg), _) => Some(PathBuf::from(arg)),
            (None, path) => path.map(PathBuf::from),
        };

        let defaults = DetectorOptions::default();
        let detector = DetectorOptions {
            max_hands: parse(&var, ENV_VAR_MAX_HANDS)?.unwrap_or(defaults.max_hands),
            min_detection_confidence: parse(&var, ENV_VAR_MIN_DETECTION_CONFIDENCE)?
                .unwrap_or(defaults.min_detection_confidence),
            min_presence_confidence: parse(&var, ENV_VAR_MIN_PRESENCE_CONFIDENCE)?
                .unwrap_or(defaults.min_presence_confidence),
            min_tracking_confidence: parse(&var, ENV_VAR_MIN_TRACKING_CONFIDENCE)?
                .unwrap_or(defaults.min_tracking_confidence),
        };
        detector.validate()?;

        let mirror = match var(ENV_VAR_MIRROR)? {
            Some(value) => parse_bool(&value)
                .with_context(|| format!("invalid value for `{ENV_VAR_MIRROR}`"))?,
            None => true,
        };
        let labels = match var(ENV_VAR_LABELS)?.as_deref() {
            None | Some("mirrored") => LabelConvention::Mirrored,
            Some("as-detected") => LabelConvention::AsDetected,
            Some(other) => bail!(
                "invalid value '{other}' for `{ENV_VAR_LABELS}` (expected `mirrored` or `as-detected`)"
            ),
        };

        let webcam_resolution = match var(ENV_VAR_WEBCAM_RESOLUTION)? {
            Some(value) => Some(
                parse_resolution(&value)
                    .with_context(|| format!("invalid value for `{ENV_VAR_WEBCAM_RESOLUTION}`"))?,
            ),
            None => None,
        };
        let webcam_prefer = match var(ENV_VAR_WEBCAM_PREFER)?.as_deref() {
            None | Some("resolution") => ParamPreference::Resolution,
            Some("fps") => ParamPreference::Framerate,
            Some(other) => bail!(
                "invalid value '{other}' for `{ENV_VAR_WEBCAM_PREFER}` (expected `resolution` or `fps`)"
            ),
        };

        Ok(Self {
            model,
            palm_model,
            webcam_name: var(ENV_VAR_WEBCAM_NAME)?,
            webcam_resolution,
            webcam_fps: parse(&var, ENV_VAR_WEBCAM_FPS)?,
            webcam_prefer,
            detector,
            mirror,
            labels,
        })
    }
}

fn parse<T, F>(var: F, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> anyhow::Result<Option<String>>,
{
    match var(name)? {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value '{value}' for `{name}`")),
        None => Ok(None),
    }
}

fn parse_resolution(value: &str) -> anyhow::Result<Resolution> {
    let Some((w, h)) = value.trim().split_once(|c| c == 'x' || c == 'X') else {
        bail!("'{value}' is not of the form `WIDTHxHEIGHT`");
    };
    let (w, h): (u32, u32) = (w.trim().parse()?, h.trim().parse()?);
    if w == 0 || h == 0 {
        bail!("resolution {w}x{h} is empty");
    }
    Ok(Resolution::new(w, h))
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("'{value}' is not a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)], arg: Option<&str>) -> anyhow::Result<Config> {
        config_with_args(vars, arg, None)
    }

    fn config_with_args(
        vars: &[(&str, &str)],
        arg: Option<&str>,
        palm_arg: Option<&str>,
    ) -> anyhow::Result<Config> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(
            |name| Ok(vars.get(name).cloned()),
            arg.map(OsString::from),
            palm_arg.map(OsString::from),
        )
    }

    #[test]
    fn defaults() {
        let config = config(&[], Some("hand_landmark.onnx")).unwrap();
        assert_eq!(config.model, PathBuf::from("hand_landmark.onnx"));
        assert_eq!(config.palm_model, None);
        assert_eq!(config.webcam_name, None);
        assert_eq!(config.webcam_resolution, None);
        assert_eq!(config.webcam_fps, None);
        assert_eq!(config.webcam_prefer, ParamPreference::Resolution);
        assert_eq!(config.detector, DetectorOptions::default());
        assert!(config.mirror);
        assert_eq!(config.labels, LabelConvention::Mirrored);
    }

    #[test]
    fn model_is_required() {
        let err = config(&[], None).unwrap_err();
        assert!(err.to_string().contains(ENV_VAR_MODEL), "{err}");

        let config = config(&[(ENV_VAR_MODEL, "env.onnx")], None).unwrap();
        assert_eq!(config.model, PathBuf::from("env.onnx"));
    }

    #[test]
    fn argument_overrides_env() {
        let config = config(&[(ENV_VAR_MODEL, "env.onnx")], Some("arg.onnx")).unwrap();
        assert_eq!(config.model, PathBuf::from("arg.onnx"));
    }

    #[test]
    fn palm_model() {
        let config = config(&[(ENV_VAR_PALM_MODEL, "palm.onnx")], Some("m.onnx")).unwrap();
        assert_eq!(config.palm_model, Some(PathBuf::from("palm.onnx")));

        let config = config_with_args(
            &[(ENV_VAR_PALM_MODEL, "env.onnx")],
            Some("m.onnx"),
            Some("arg.onnx"),
        )
        .unwrap();
        assert_eq!(config.model, PathBuf::from("m.onnx"));
        assert_eq!(config.palm_model, Some(PathBuf::from("arg.onnx")));
    }

    #[test]
    fn webcam_format() {
        let config = config(
            &[
                (ENV_VAR_WEBCAM_RESOLUTION, "1280x720"),
                (ENV_VAR_WEBCAM_FPS, "60"),
                (ENV_VAR_WEBCAM_PREFER, "fps"),
            ],
            Some("m.onnx"),
        )
        .unwrap();
        assert_eq!(config.webcam_resolution, Some(Resolution::RES_720P));
        assert_eq!(config.webcam_fps, Some(60));
        assert_eq!(config.webcam_prefer, ParamPreference::Framerate);

        assert_eq!(
            parse_resolution(" 640 X 480").unwrap(),
            Resolution::new(640, 480)
        );
        for bad in ["640", "640x", "x480", "0x480", "640x-1", "big"] {
            assert!(parse_resolution(bad).is_err(), "{bad} was accepted");
        }
    }

    #[test]
    fn overrides() {
        let config = config(
            &[
                (ENV_VAR_MAX_HANDS, "1"),
                (ENV_VAR_MIN_DETECTION_CONFIDENCE, "0.7"),
                (ENV_VAR_MIN_PRESENCE_CONFIDENCE, " 0.6 "),
                (ENV_VAR_MIN_TRACKING_CONFIDENCE, "0.25"),
                (ENV_VAR_MIRROR, "off"),
                (ENV_VAR_LABELS, "as-detected"),
                ("HANDSIGN_WEBCAM_NAME", "Integrated Camera"),
            ],
            Some("m.onnx"),
        )
        .unwrap();
        assert_eq!(config.detector.max_hands, 1);
        assert_eq!(config.detector.min_detection_confidence, 0.7);
        assert_eq!(config.detector.min_presence_confidence, 0.6);
        assert_eq!(config.detector.min_tracking_confidence, 0.25);
        assert!(!config.mirror);
        assert_eq!(config.labels, LabelConvention::AsDetected);
        assert_eq!(config.webcam_name.as_deref(), Some("Integrated Camera"));
    }

    #[test]
    fn invalid_values_are_errors() {
        for (name, value) in [
            (ENV_VAR_MAX_HANDS, "two"),
            (ENV_VAR_MAX_HANDS, "-1"),
            (ENV_VAR_MIN_DETECTION_CONFIDENCE, "high"),
            (ENV_VAR_MIN_TRACKING_CONFIDENCE, "1.01"),
            (ENV_VAR_MIN_PRESENCE_CONFIDENCE, "-0.1"),
            (ENV_VAR_MIRROR, "sometimes"),
            (ENV_VAR_LABELS, "swapped"),
            (ENV_VAR_WEBCAM_RESOLUTION, "hd"),
            (ENV_VAR_WEBCAM_FPS, "30.5"),
            (ENV_VAR_WEBCAM_PREFER, "both"),
        ] {
            let result = config(&[(name, value)], Some("m.onnx"));
            assert!(result.is_err(), "{name}={value} was accepted");
        }
    }
}

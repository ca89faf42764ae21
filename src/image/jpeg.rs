use std::env::{self, VarError};

use anyhow::bail;
use image::ImageBuffer;
use once_cell::sync::Lazy;

use super::Image;

const ENV_VAR_JPEG_BACKEND: &str = "HANDSIGN_JPEG_BACKEND";

/// Software JPEG decoders that can be selected with `HANDSIGN_JPEG_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JpegBackend {
    /// Uses the `zune-jpeg` crate, a pure-Rust JPEG decoder tuned for speed.
    ZuneJpeg,
    /// Uses the `jpeg-decoder` crate (via `image`), a robust but slow pure-Rust JPEG decoder.
    JpegDecoder,
}

const DEFAULT_BACKEND: JpegBackend = JpegBackend::ZuneJpeg;

impl JpegBackend {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "zune-jpeg" => Some(Self::ZuneJpeg),
            "jpeg-decoder" => Some(Self::JpegDecoder),
            _ => None,
        }
    }
}

static JPEG_BACKEND: Lazy<JpegBackend> = Lazy::new(|| {
    let backend = match env::var(ENV_VAR_JPEG_BACKEND) {
        Ok(name) => JpegBackend::from_name(&name).unwrap_or_else(|| {
            log::warn!(
                "invalid value '{name}' set for `{ENV_VAR_JPEG_BACKEND}`; using {:?}",
                DEFAULT_BACKEND
            );
            DEFAULT_BACKEND
        }),
        Err(VarError::NotPresent) => DEFAULT_BACKEND,
        Err(VarError::NotUnicode(s)) => {
            log::warn!(
                "invalid value {} set for `{ENV_VAR_JPEG_BACKEND}`; using {:?}",
                s.to_string_lossy(),
                DEFAULT_BACKEND
            );
            DEFAULT_BACKEND
        }
    };
    log::debug!("using JPEG decode backend: {:?}", backend);
    backend
});

pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let buf = match *JPEG_BACKEND {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
        }
        JpegBackend::ZuneJpeg => {
            use zune_jpeg::zune_core::colorspace::ColorSpace;
            use zune_jpeg::zune_core::options::DecoderOptions;

            let mut decomp = zune_jpeg::JpegDecoder::new_with_options(
                DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGBA),
                data,
            );
            decomp.decode_headers()?;
            match decomp.get_output_colorspace() {
                Some(ColorSpace::RGBA) => {}
                other => bail!("unsupported colorspace {other:?} (expected RGBA)"),
            }

            let (Some(size), Some((width, height))) =
                (decomp.output_buffer_size(), decomp.dimensions())
            else {
                bail!("JPEG decoder did not report the image dimensions");
            };
            let mut buf = vec![0; size];
            decomp.decode_into(&mut buf)?;
            match ImageBuffer::from_raw(width.into(), height.into(), buf) {
                Some(buf) => buf,
                None => bail!("decoded JPEG data does not match its {width}x{height} size"),
            }
        }
    };

    Ok(Image { buf })
}

//! Neural Network inference.

use std::{ops::RangeInclusive, path::Path, sync::Arc};

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tract_ndarray, tvec, Framework, Graph, InferenceModelExt, IntoTensor, SimplePlan, TValue, TVec,
    Tensor, TypedFact, TypedOp,
};

use crate::{
    image::{Color, Image, Rect},
    resolution::Resolution,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone, Debug)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads and optimizes a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model_data = std::fs::read(path)
            .with_context(|| format!("failed to read network from '{}'", path.display()))?;
        Self::from_onnx(&model_data)
    }

    /// Loads and optimizes a pre-trained model from an in-memory ONNX file.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, or if
    /// the network uses unimplemented operations.
    pub fn from_onnx(raw: &[u8]) -> anyhow::Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut &*raw)?
            .into_optimized()?
            .into_runnable()?;
        Ok(Self(Arc::new(model)))
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the number of output nodes of the network.
    pub fn num_outputs(&self) -> usize {
        self.0.model().outputs.len()
    }

    /// Returns the tensor shape of the input at `index`.
    ///
    /// Fails if the shape is symbolic rather than fixed.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<Vec<usize>> {
        let fact = self.0.model().input_fact(index)?;
        match fact.shape.as_concrete() {
            Some(shape) => Ok(shape.to_vec()),
            None => bail!("network input {index} has symbolic shape {:?}", fact.shape),
        }
    }

    /// Runs the network on a list of input tensors, returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: TVec<Tensor>) -> anyhow::Result<Outputs> {
        let outputs = self.0.run(
            inputs
                .into_iter()
                .map(|t| TValue::from_const(Arc::new(t)))
                .collect(),
        )?;
        Ok(Outputs {
            inner: outputs.into_iter().map(|v| v.into_tensor()).collect(),
        })
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns the `f32` elements of the output tensor at `index`, in row-major order.
    pub fn get(&self, index: usize) -> anyhow::Result<&[f32]> {
        match self.inner.get(index) {
            Some(tensor) => Ok(tensor.as_slice::<f32>()?),
            None => bail!(
                "network produced {} outputs, expected at least {}",
                self.len(),
                index + 1
            ),
        }
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, fixed at 1.
/// - `C` is the number of color channels, 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive] // shouldn't be matched on by user code
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

impl CnnInputShape {
    /// Determines the layout and image size of a tensor shape.
    ///
    /// Returns `None` if `shape` does not describe a single RGB image.
    pub fn detect(shape: &[usize]) -> Option<(Self, Resolution)> {
        let (layout, w, h) = match *shape {
            [1, 3, h, w] => (CnnInputShape::NCHW, w, h),
            [1, h, w, 3] => (CnnInputShape::NHWC, w, h),
            _ => return None,
        };
        Some((layout, Resolution::new(w.try_into().ok()?, h.try_into().ok()?)))
    }
}

/// Maps sRGB colors to the value range a network expects.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    start: f32,
    scale: f32,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let start = *target_range.start();
        let end = *target_range.end();
        assert!(end > start);

        Self {
            start,
            scale: (end - start) / 255.0,
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        [color.r(), color.g(), color.b()].map(|col| col as f32 * self.scale + self.start)
    }
}

/// A convolutional neural network (CNN) that operates on image data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    shape: CnnInputShape,
    input_res: Resolution,
    color_mapper: Arc<ColorMapper>,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input taking a single RGB image, in either NCHW or NHWC
    /// layout.
    pub fn new(nn: NeuralNetwork, color_mapper: ColorMapper) -> anyhow::Result<Self> {
        if nn.num_inputs() != 1 {
            bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let tensor_shape = nn.input_shape(0)?;
        let Some((shape, input_res)) = CnnInputShape::detect(&tensor_shape) else {
            bail!("invalid model input shape for CNN: {:?}", tensor_shape);
        };
        log::debug!("CNN input: {:?} {}", shape, input_res);

        Ok(Self {
            nn,
            shape,
            input_res,
            color_mapper: Arc::new(color_mapper),
        })
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on the `roi` region of `image`, returning the estimated outputs.
    ///
    /// The region is sampled to create the network's input tensor, stretching it if its aspect
    /// ratio differs from the network's input. Parts of `roi` outside of `image` are black.
    pub fn estimate(&self, image: &Image, roi: Rect) -> anyhow::Result<Outputs> {
        let tensor = self.input_tensor(image, roi);
        self.nn.estimate(tvec![tensor])
    }

    fn input_tensor(&self, image: &Image, roi: Rect) -> Tensor {
        let (h, w) = (
            self.input_res.height() as usize,
            self.input_res.width() as usize,
        );
        let sample = |x: usize, y: usize| {
            let (px, py) = roi.point_at(
                (x as f32 + 0.5) / w as f32,
                (y as f32 + 0.5) / h as f32,
            );
            let color = image.get_or_null(px.floor() as i64, py.floor() as i64);
            self.color_mapper.map(color)
        };

        match self.shape {
            CnnInputShape::NCHW => {
                tract_ndarray::Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| sample(x, y)[c])
                    .into()
            }
            CnnInputShape::NHWC => {
                tract_ndarray::Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| sample(x, y)[c])
                    .into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn input_shapes() {
        assert_eq!(
            CnnInputShape::detect(&[1, 3, 224, 224]),
            Some((CnnInputShape::NCHW, Resolution::new(224, 224)))
        );
        assert_eq!(
            CnnInputShape::detect(&[1, 256, 128, 3]),
            Some((CnnInputShape::NHWC, Resolution::new(128, 256)))
        );
        assert_eq!(CnnInputShape::detect(&[1, 63]), None);
        assert_eq!(CnnInputShape::detect(&[2, 3, 224, 224]), None);
        assert_eq!(CnnInputShape::detect(&[1, 1, 224, 224]), None);
    }

    #[test]
    fn linear_color_mapper() {
        let unit = ColorMapper::linear(0.0..=1.0);
        assert_eq!(unit.map(Color::BLACK), [0.0, 0.0, 0.0]);
        assert_eq!(unit.map(Color::YELLOW), [1.0, 1.0, 0.0]);

        let signed = ColorMapper::linear(-1.0..=1.0);
        let [r, g, b] = signed.map(Color::from_rgb8(0, 255, 51));
        assert_relative_eq!(r, -1.0);
        assert_relative_eq!(g, 1.0);
        assert_relative_eq!(b, -0.6);
    }

    #[test]
    fn missing_model_file() {
        assert!(NeuralNetwork::from_path("hand_landmark.tflite").is_err());
        let err = NeuralNetwork::from_path("/nonexistent/hand_landmark.onnx").unwrap_err();
        assert!(err.to_string().contains("failed to read network"), "{err}");
        assert!(NeuralNetwork::from_onnx(b"not a model").is_err());
    }
}

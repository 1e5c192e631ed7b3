//! Generator forward pass.
//!
//! A run is a pure function of `(weights, input)`: every intermediate tensor
//! is owned by the call and dropped when it returns. Encoder activations are
//! released as soon as their decoder stage has consumed them.

use crate::architecture::{
    Activation, Architecture, StageKind, StageOutput, StageSpec, BATCH_NORM_EPSILON,
    IMAGE_CHANNELS, SPATIAL_ALIGNMENT, STRIDE,
};
use crate::{Error, Result};
use pix2pix_core::{CpuEngine, Padding, Tensor, TensorEngine};
use pix2pix_weights::WeightMap;
use std::time::Instant;
use tracing::debug;

/// Output shape of one stage, as recorded by [`Pipeline::run_traced`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTrace {
    /// Stage label such as `decoder_4`
    pub stage: String,
    /// Activation shape `[h, w, c]` after the stage
    pub shape: Vec<usize>,
}

/// A stage with its tensors resolved from the weight map.
struct BoundStage<'a> {
    spec: &'a StageSpec,
    kernel: &'a Tensor,
    bias: &'a Tensor,
    /// `(gamma, beta)` for normalized stages
    norm: Option<(&'a Tensor, &'a Tensor)>,
}

/// Runs the generator on a tensor engine.
#[derive(Debug, Clone)]
pub struct Pipeline<E = CpuEngine> {
    engine: E,
    architecture: Architecture,
}

impl Default for Pipeline<CpuEngine> {
    fn default() -> Self {
        Self::new(CpuEngine::new())
    }
}

impl<E: TensorEngine> Pipeline<E> {
    /// Create a pipeline for the pix2pix generator.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            architecture: Architecture::pix2pix(),
        }
    }

    /// Engine the pipeline runs on.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Stage records in execution order.
    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    /// Check that `input` is an `[H, W, 3]` image with H and W positive
    /// multiples of 256. Returns `(height, width)`.
    pub fn validate_input(&self, input: &Tensor) -> Result<(usize, usize)> {
        let (height, width, channels) = input.dims3().map_err(|_| {
            Error::invalid_input(format!(
                "expected an [height, width, 3] image, got shape {:?}",
                input.shape()
            ))
        })?;
        if channels != IMAGE_CHANNELS {
            return Err(Error::invalid_input(format!(
                "expected {} channels, got {}",
                IMAGE_CHANNELS, channels
            )));
        }
        for (axis, len) in [("height", height), ("width", width)] {
            if len == 0 || len % SPATIAL_ALIGNMENT != 0 {
                return Err(Error::invalid_input(format!(
                    "{} {} is not a positive multiple of {}",
                    axis, len, SPATIAL_ALIGNMENT
                )));
            }
        }
        Ok((height, width))
    }

    /// Check that `weights` holds every tensor the generator reads.
    ///
    /// Fails with [`Error::MissingWeight`] naming the first absent key in
    /// stage order.
    pub fn check_weights(&self, weights: &WeightMap) -> Result<()> {
        self.bind(weights).map(|_| ())
    }

    /// Translate a `[H, W, 3]` image with values in `[0, 255]` into a
    /// `[H, W, 3]` image with values in `[0, 1]`.
    pub fn run(&self, weights: &WeightMap, input: &Tensor) -> Result<Tensor> {
        self.execute(weights, input, None)
    }

    /// Like [`Pipeline::run`], also returning each stage's output shape.
    pub fn run_traced(
        &self,
        weights: &WeightMap,
        input: &Tensor,
    ) -> Result<(Tensor, Vec<StageTrace>)> {
        let mut trace = Vec::with_capacity(self.architecture.stages().count());
        let output = self.execute(weights, input, Some(&mut trace))?;
        Ok((output, trace))
    }

    fn execute(
        &self,
        weights: &WeightMap,
        input: &Tensor,
        mut trace: Option<&mut Vec<StageTrace>>,
    ) -> Result<Tensor> {
        let start = Instant::now();
        let (height, width) = self.validate_input(input)?;
        let stages = self.bind(weights)?;
        let (encoders, decoders) = stages.split_at(self.architecture.encoders().len());

        // [0, 255] -> [-1, 1]
        let normalized = self.engine.div_scalar(input, 255.0);
        let normalized = self.engine.mul_scalar(&normalized, 2.0);
        let normalized = self.engine.sub_scalar(&normalized, 1.0);

        let mut skips: Vec<Option<Tensor>> = Vec::with_capacity(encoders.len());
        for stage in encoders {
            let source = skips.last().and_then(Option::as_ref).unwrap_or(&normalized);
            let output = self.run_stage(stage, source)?;
            self.record(&mut trace, stage, &output);
            skips.push(Some(output));
        }
        drop(normalized);

        let mut previous = take_skip(&mut skips, encoders.len())?;
        for stage in decoders {
            let joined;
            let source = match stage.spec.skip {
                Some(index) => {
                    let skip = take_skip(&mut skips, index)?;
                    joined = self.engine.concat_channels(&previous, &skip)?;
                    &joined
                }
                None => &previous,
            };
            let output = self.run_stage(stage, source)?;
            self.record(&mut trace, stage, &output);
            previous = output;
        }

        // [-1, 1] -> [0, 1]
        let output = self.engine.add_scalar(&previous, 1.0);
        let output = self.engine.div_scalar(&output, 2.0);

        debug!(
            "Generated {}x{} image on {} engine in {:?}",
            width,
            height,
            self.engine.name(),
            start.elapsed()
        );
        Ok(output)
    }

    /// Resolve every stage's tensors before any computation.
    fn bind<'a>(&'a self, weights: &'a WeightMap) -> Result<Vec<BoundStage<'a>>> {
        let lookup = |key: &str| weights.get(key).ok_or_else(|| Error::missing_weight(key));

        self.architecture
            .stages()
            .map(|spec| {
                let kernel = lookup(&spec.kernel_key)?;
                let bias = lookup(&spec.bias_key)?;
                let norm = match &spec.output {
                    StageOutput::BatchNorm {
                        gamma_key,
                        beta_key,
                    } => Some((lookup(gamma_key)?, lookup(beta_key)?)),
                    StageOutput::Linear | StageOutput::Tanh => None,
                };
                Ok(BoundStage {
                    spec,
                    kernel,
                    bias,
                    norm,
                })
            })
            .collect()
    }

    fn run_stage(&self, stage: &BoundStage<'_>, input: &Tensor) -> Result<Tensor> {
        let spec = stage.spec;

        let activated;
        let x = match spec.activation {
            Activation::Identity => input,
            Activation::Relu => {
                activated = self.engine.relu(input);
                &activated
            }
            Activation::LeakyRelu(slope) => {
                activated = self.engine.leaky_relu(input, slope);
                &activated
            }
        };

        let mut y = match spec.kind {
            StageKind::Encoder => self.engine.conv2d(x, stage.kernel, STRIDE, Padding::Same)?,
            StageKind::Decoder => {
                let (h, w, _) = x.dims3()?;
                let (_, _, out_channels, _) = stage.kernel.dims4()?;
                self.engine.conv2d_transpose(
                    x,
                    stage.kernel,
                    [h * STRIDE, w * STRIDE, out_channels],
                    STRIDE,
                    Padding::Same,
                )?
            }
        };
        if spec.apply_bias {
            y = self.engine.add(&y, stage.bias)?;
        }

        match (&spec.output, stage.norm) {
            (StageOutput::BatchNorm { .. }, Some((gamma, beta))) => {
                let moments = self.engine.moments(&y)?;
                Ok(self
                    .engine
                    .batch_norm(&y, &moments, beta, gamma, BATCH_NORM_EPSILON)?)
            }
            (StageOutput::Tanh, _) => Ok(self.engine.tanh(&y)),
            _ => Ok(y),
        }
    }

    fn record(
        &self,
        trace: &mut Option<&mut Vec<StageTrace>>,
        stage: &BoundStage<'_>,
        output: &Tensor,
    ) {
        debug!("{} -> {:?}", stage.spec.name(), output.shape());
        if let Some(trace) = trace.as_deref_mut() {
            trace.push(StageTrace {
                stage: stage.spec.name(),
                shape: output.shape().to_vec(),
            });
        }
    }
}

/// Take an encoder activation out of the skip list, 1-based.
fn take_skip(skips: &mut [Option<Tensor>], index: usize) -> Result<Tensor> {
    index
        .checked_sub(1)
        .and_then(|i| skips.get_mut(i))
        .and_then(Option::take)
        .ok_or_else(|| {
            pix2pix_core::Error::invalid("skip", format!("encoder_{} output is unavailable", index))
                .into()
        })
}

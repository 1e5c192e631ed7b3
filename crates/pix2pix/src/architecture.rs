//! Generator topology as an ordered list of stage records.
//!
//! The generator is a U-Net: eight stride-2 encoder stages, then eight
//! stride-2 decoder stages run from 8 down to 1, each decoder below the
//! bottleneck concatenating the matching encoder activation.

use pix2pix_weights::WeightMap;
use serde::Serialize;

/// Number of encoder (and decoder) stages.
pub const STAGE_COUNT: usize = 8;

/// Stride of every convolution and transposed convolution.
pub const STRIDE: usize = 2;

/// Slope of the leaky ReLU in front of encoder stages 2 to 8.
pub const LEAKY_RELU_SLOPE: f32 = 0.2;

/// Epsilon added to the variance in every normalization.
pub const BATCH_NORM_EPSILON: f32 = 1e-5;

/// Input height and width must be positive multiples of this.
pub const SPATIAL_ALIGNMENT: usize = 1 << STAGE_COUNT;

/// Channels of the input and output images.
pub const IMAGE_CHANNELS: usize = 3;

/// Which half of the U-Net a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageKind {
    Encoder,
    Decoder,
}

impl StageKind {
    fn scope(self) -> &'static str {
        match self {
            StageKind::Encoder => "encoder",
            StageKind::Decoder => "decoder",
        }
    }

    fn layer(self) -> &'static str {
        match self {
            StageKind::Encoder => "conv2d",
            StageKind::Decoder => "conv2d_transpose",
        }
    }
}

/// Activation applied to a stage's input before its convolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Activation {
    Identity,
    Relu,
    LeakyRelu(f32),
}

/// Transform applied after the convolution and bias.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StageOutput {
    /// Raw convolution output
    Linear,
    /// Per-channel normalization with the named scale and offset
    BatchNorm { gamma_key: String, beta_key: String },
    /// Hyperbolic tangent
    Tanh,
}

/// One generator stage and the weight keys it reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSpec {
    /// 1-based stage index within its half
    pub index: usize,
    pub kind: StageKind,
    pub kernel_key: String,
    pub bias_key: String,
    /// Whether the bias is added; encoder 1 was exported without it
    pub apply_bias: bool,
    /// Encoder stage whose output is concatenated after the previous activation
    pub skip: Option<usize>,
    pub activation: Activation,
    pub output: StageOutput,
}

impl StageSpec {
    fn new(kind: StageKind, index: usize) -> Self {
        let prefix = format!("generator/{}_{}", kind.scope(), index);
        let layer = kind.layer();

        let output = match (kind, index) {
            (StageKind::Encoder, 1) => StageOutput::Linear,
            (StageKind::Decoder, 1) => StageOutput::Tanh,
            _ => StageOutput::BatchNorm {
                gamma_key: format!("{prefix}/batch_normalization/gamma"),
                beta_key: format!("{prefix}/batch_normalization/beta"),
            },
        };
        let activation = match (kind, index) {
            (StageKind::Encoder, 1) => Activation::Identity,
            (StageKind::Encoder, _) => Activation::LeakyRelu(LEAKY_RELU_SLOPE),
            (StageKind::Decoder, _) => Activation::Relu,
        };
        let skip = match kind {
            StageKind::Decoder if index < STAGE_COUNT => Some(index),
            _ => None,
        };

        Self {
            index,
            kind,
            kernel_key: format!("{prefix}/{layer}/kernel"),
            bias_key: format!("{prefix}/{layer}/bias"),
            apply_bias: !(kind == StageKind::Encoder && index == 1),
            skip,
            activation,
            output,
        }
    }

    /// Short label such as `encoder_3`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.kind.scope(), self.index)
    }

    /// Every weight key this stage reads, kernel first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let norm = match &self.output {
            StageOutput::BatchNorm {
                gamma_key,
                beta_key,
            } => [Some(gamma_key.as_str()), Some(beta_key.as_str())],
            _ => [None, None],
        };
        [Some(self.kernel_key.as_str()), Some(self.bias_key.as_str())]
            .into_iter()
            .chain(norm)
            .flatten()
    }
}

/// Ordered stage records in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Architecture {
    encoders: Vec<StageSpec>,
    decoders: Vec<StageSpec>,
}

impl Architecture {
    /// The 8-down, 8-up pix2pix generator.
    pub fn pix2pix() -> Self {
        Self {
            encoders: (1..=STAGE_COUNT)
                .map(|i| StageSpec::new(StageKind::Encoder, i))
                .collect(),
            decoders: (1..=STAGE_COUNT)
                .rev()
                .map(|i| StageSpec::new(StageKind::Decoder, i))
                .collect(),
        }
    }

    /// Encoder stages, 1 to 8.
    pub fn encoders(&self) -> &[StageSpec] {
        &self.encoders
    }

    /// Decoder stages, 8 down to 1.
    pub fn decoders(&self) -> &[StageSpec] {
        &self.decoders
    }

    /// All stages in execution order.
    pub fn stages(&self) -> impl Iterator<Item = &StageSpec> {
        self.encoders.iter().chain(&self.decoders)
    }

    /// Every weight key in stage order.
    pub fn required_keys(&self) -> impl Iterator<Item = &str> {
        self.stages().flat_map(|stage| stage.keys())
    }

    /// Required keys absent from `weights`, in stage order.
    pub fn missing_keys<'a>(&'a self, weights: &WeightMap) -> Vec<&'a str> {
        self.required_keys()
            .filter(|key| !weights.contains(key))
            .collect()
    }
}

impl Default for Architecture {
    fn default() -> Self {
        Self::pix2pix()
    }
}

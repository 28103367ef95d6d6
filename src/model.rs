use serde::{Deserialize, Serialize};

/// Position of a layer in execution order.
pub type LayerId = usize;

/// A parsed network definition.
///
/// Definitions describe a single chain of layers: the input blob feeds the
/// first layer and each layer consumes the blob produced by the one before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDef {
    pub name: String,
    pub input: InputDef,
    pub layers: Vec<LayerDef>,
}

/// The externally supplied input blob.
///
/// `shape` is `[batch, channels, height, width]`. The batch dimension fixes
/// the maximum number of instances a single forward pass accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDef {
    pub name: String,
    pub shape: [usize; 4],
}

/// One layer of the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDef {
    pub name: String,
    pub kind: LayerKind,
    /// Name of the blob this layer consumes.
    pub input: String,
    /// Name of the blob this layer produces.
    pub output: String,
    #[serde(default)]
    pub params: LayerParams,
}

/// The set of layer kinds the engine can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Convolution,
    InnerProduct,
    MaxPool,
    AveragePool,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl LayerKind {
    /// Stable string form, matching the serialized representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Convolution => "convolution",
            LayerKind::InnerProduct => "inner_product",
            LayerKind::MaxPool => "max_pool",
            LayerKind::AveragePool => "average_pool",
            LayerKind::Relu => "relu",
            LayerKind::Sigmoid => "sigmoid",
            LayerKind::Tanh => "tanh",
            LayerKind::Softmax => "softmax",
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_stride() -> usize {
    1
}

fn default_bias() -> bool {
    true
}

/// Hyperparameters of a layer.
///
/// All fields are optional in the serialized form; which ones a layer
/// requires depends on its kind. Fields a kind does not use are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParams {
    /// Output channels for convolution, output features for inner product.
    #[serde(default)]
    pub num_output: Option<usize>,
    /// Square kernel extent for convolution and pooling.
    #[serde(default)]
    pub kernel: Option<usize>,
    #[serde(default = "default_stride")]
    pub stride: usize,
    #[serde(default)]
    pub pad: usize,
    /// Whether the layer carries a bias tensor.
    #[serde(default = "default_bias")]
    pub bias: bool,
}

impl Default for LayerParams {
    fn default() -> Self {
        LayerParams {
            num_output: None,
            kernel: None,
            stride: 1,
            pad: 0,
            bias: true,
        }
    }
}

use std::collections::HashMap;
use std::fmt::Debug;

use crate::error::{Error, Result};
use crate::model::{LayerDef, LayerKind};
use super::tensor::{Shape, Tensor};

/// Trained tensors bound to one layer, in binding order.
///
/// Layers that take no weights get an empty set. Weighted layers see their
/// main tensor first and the bias tensor second when the layer carries one.
#[derive(Debug, Clone, Default)]
pub struct LayerWeights {
    pub tensors: Vec<Tensor>,
}

impl LayerWeights {
    pub fn new(tensors: Vec<Tensor>) -> Self {
        LayerWeights { tensors }
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

/// Trait implemented by every executable layer kind.
pub trait LayerOp: Send + Sync + Debug {
    /// Run the layer over one input blob, writing into the output blob.
    ///
    /// The output tensor is preallocated to the shape reported by
    /// `output_shape` for the current geometry.
    fn compute(
        &self,
        layer: &LayerDef,
        weights: &LayerWeights,
        input: &Tensor,
        output: &mut Tensor,
    ) -> Result<()>;

    /// Shape of the output blob for the given input shape.
    fn output_shape(
        &self,
        layer: &LayerDef,
        weights: &LayerWeights,
        input_shape: &Shape,
    ) -> Result<Shape>;

    /// Check the layer definition and its bound weights.
    fn validate(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()>;
}

/// Registry mapping layer kinds to their implementations
#[derive(Debug, Default)]
pub struct LayerOpRegistry {
    ops: HashMap<LayerKind, Box<dyn LayerOp>>,
}

impl LayerOpRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            ops: HashMap::new(),
        }
    }

    /// Register an implementation for a layer kind
    pub fn register(&mut self, kind: LayerKind, op: Box<dyn LayerOp>) -> Result<()> {
        if self.ops.contains_key(&kind) {
            return Err(Error::ValidationError(format!(
                "Layer kind {} is already registered",
                kind
            )));
        }
        self.ops.insert(kind, op);
        Ok(())
    }

    /// Look up the implementation for a layer kind
    pub fn get(&self, kind: LayerKind) -> Option<&dyn LayerOp> {
        self.ops.get(&kind).map(|op| op.as_ref())
    }

    /// Build a registry holding every layer kind the engine ships with.
    pub fn with_standard_layers() -> Self {
        use crate::ops::activations::{Relu, Sigmoid, Softmax, Tanh};
        use crate::ops::math::inner_product::InnerProduct;
        use crate::ops::nn::conv::Convolution;
        use crate::ops::nn::pool::{AveragePool, MaxPool};

        let mut registry = Self::new();

        registry
            .register(LayerKind::Convolution, Box::new(Convolution::default()))
            .unwrap();
        registry
            .register(LayerKind::InnerProduct, Box::new(InnerProduct::default()))
            .unwrap();
        registry
            .register(LayerKind::MaxPool, Box::new(MaxPool::default()))
            .unwrap();
        registry
            .register(LayerKind::AveragePool, Box::new(AveragePool::default()))
            .unwrap();
        registry
            .register(LayerKind::Relu, Box::new(Relu::default()))
            .unwrap();
        registry
            .register(LayerKind::Sigmoid, Box::new(Sigmoid::default()))
            .unwrap();
        registry
            .register(LayerKind::Tanh, Box::new(Tanh::default()))
            .unwrap();
        registry
            .register(LayerKind::Softmax, Box::new(Softmax::default()))
            .unwrap();

        registry
    }
}

/// Check that a weight set holds exactly the expected number of tensors.
pub(crate) fn ensure_weight_count(
    layer: &LayerDef,
    weights: &LayerWeights,
    expected: usize,
) -> Result<()> {
    if weights.len() != expected {
        return Err(Error::InvalidWeights(format!(
            "Layer {} expects {} weight tensor(s), got {}",
            layer.name,
            expected,
            weights.len()
        )));
    }
    Ok(())
}

/// Fetch the kernel extent a layer requires.
pub(crate) fn required_kernel(layer: &LayerDef) -> Result<usize> {
    match layer.params.kernel {
        Some(k) if k > 0 => Ok(k),
        _ => Err(Error::ValidationError(format!(
            "Layer {} requires a positive kernel size",
            layer.name
        ))),
    }
}

/// Fetch the output count a layer requires.
pub(crate) fn required_num_output(layer: &LayerDef) -> Result<usize> {
    match layer.params.num_output {
        Some(n) if n > 0 => Ok(n),
        _ => Err(Error::ValidationError(format!(
            "Layer {} requires a positive num_output",
            layer.name
        ))),
    }
}

/// Spatial output extent for a strided window over a padded axis.
pub(crate) fn windowed_extent(
    layer: &LayerDef,
    input: usize,
    kernel: usize,
    stride: usize,
    pad: usize,
) -> Result<usize> {
    let padded = input + 2 * pad;
    if kernel > padded {
        return Err(Error::UnsupportedGeometry(format!(
            "Layer {}: kernel {} exceeds padded input extent {}",
            layer.name, kernel, padded
        )));
    }
    if stride == 0 {
        return Err(Error::ValidationError(format!(
            "Layer {} has a zero stride",
            layer.name
        )));
    }
    Ok((padded - kernel) / stride + 1)
}

/// Check that an input shape is a 4-D batch of feature maps.
pub(crate) fn ensure_nchw(layer: &LayerDef, shape: &Shape) -> Result<()> {
    if shape.len() != 4 {
        return Err(Error::ExecutionError(format!(
            "Layer {} expects a 4-D input, got shape {:?}",
            layer.name, shape
        )));
    }
    Ok(())
}

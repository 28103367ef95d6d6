use crate::error::{Error, Result};
use crate::model::LayerDef;
use crate::ops::registry::{ensure_weight_count, LayerOp, LayerWeights};
use crate::ops::tensor::{Shape, Tensor};

/// Base struct for elementwise activation layers
#[derive(Debug, Clone)]
pub struct ActivationBase {
    activation_fn: fn(f32) -> f32,
    name: &'static str,
}

/// ReLU activation layer
#[derive(Debug, Clone, Default)]
pub struct Relu;

/// Sigmoid activation layer
#[derive(Debug, Clone, Default)]
pub struct Sigmoid;

/// Tanh activation layer
#[derive(Debug, Clone, Default)]
pub struct Tanh;

/// Softmax layer, normalizing over the channel axis
#[derive(Debug, Clone, Default)]
pub struct Softmax;

impl ActivationBase {
    fn new(activation_fn: fn(f32) -> f32, name: &'static str) -> Self {
        Self {
            activation_fn,
            name,
        }
    }

    fn compute_impl(&self, input: &Tensor, output: &mut Tensor) -> Result<()> {
        if output.shape != input.shape {
            return Err(Error::ExecutionError(format!(
                "{} output shape {:?} does not match input shape {:?}",
                self.name, output.shape, input.shape
            )));
        }

        let f = self.activation_fn;
        output.data.zip_mut_with(&input.data, |out, &x| *out = f(x));
        Ok(())
    }

    fn output_shape_impl(&self, input_shape: &Shape) -> Result<Shape> {
        // Elementwise layers preserve the input shape
        Ok(input_shape.clone())
    }

    fn validate_impl(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()> {
        ensure_weight_count(layer, weights, 0)
    }
}

impl LayerOp for Relu {
    fn compute(
        &self,
        _layer: &LayerDef,
        _weights: &LayerWeights,
        input: &Tensor,
        output: &mut Tensor,
    ) -> Result<()> {
        let base = ActivationBase::new(|x| if x > 0.0 { x } else { 0.0 }, "Relu");
        base.compute_impl(input, output)
    }

    fn output_shape(
        &self,
        _layer: &LayerDef,
        _weights: &LayerWeights,
        input_shape: &Shape,
    ) -> Result<Shape> {
        let base = ActivationBase::new(|_| 0.0, "Relu");
        base.output_shape_impl(input_shape)
    }

    fn validate(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()> {
        let base = ActivationBase::new(|_| 0.0, "Relu");
        base.validate_impl(layer, weights)
    }
}

impl LayerOp for Sigmoid {
    fn compute(
        &self,
        _layer: &LayerDef,
        _weights: &LayerWeights,
        input: &Tensor,
        output: &mut Tensor,
    ) -> Result<()> {
        let base = ActivationBase::new(|x| 1.0 / (1.0 + (-x).exp()), "Sigmoid");
        base.compute_impl(input, output)
    }

    fn output_shape(
        &self,
        _layer: &LayerDef,
        _weights: &LayerWeights,
        input_shape: &Shape,
    ) -> Result<Shape> {
        let base = ActivationBase::new(|_| 0.0, "Sigmoid");
        base.output_shape_impl(input_shape)
    }

    fn validate(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()> {
        let base = ActivationBase::new(|_| 0.0, "Sigmoid");
        base.validate_impl(layer, weights)
    }
}

impl LayerOp for Tanh {
    fn compute(
        &self,
        _layer: &LayerDef,
        _weights: &LayerWeights,
        input: &Tensor,
        output: &mut Tensor,
    ) -> Result<()> {
        let base = ActivationBase::new(|x| x.tanh(), "Tanh");
        base.compute_impl(input, output)
    }

    fn output_shape(
        &self,
        _layer: &LayerDef,
        _weights: &LayerWeights,
        input_shape: &Shape,
    ) -> Result<Shape> {
        let base = ActivationBase::new(|_| 0.0, "Tanh");
        base.output_shape_impl(input_shape)
    }

    fn validate(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()> {
        let base = ActivationBase::new(|_| 0.0, "Tanh");
        base.validate_impl(layer, weights)
    }
}

impl LayerOp for Softmax {
    fn compute(
        &self,
        layer: &LayerDef,
        _weights: &LayerWeights,
        input: &Tensor,
        output: &mut Tensor,
    ) -> Result<()> {
        if input.shape.len() != 4 {
            return Err(Error::ExecutionError(format!(
                "Softmax layer {} expects a 4-D input, got shape {:?}",
                layer.name, input.shape
            )));
        }
        if output.shape != input.shape {
            return Err(Error::ExecutionError(format!(
                "Softmax output shape {:?} does not match input shape {:?}",
                output.shape, input.shape
            )));
        }

        let (batch, channels, height, width) = (
            input.shape[0],
            input.shape[1],
            input.shape[2],
            input.shape[3],
        );

        // Normalize each channel fiber independently, shifting by the fiber
        // maximum before exponentiating
        for n in 0..batch {
            for h in 0..height {
                for w in 0..width {
                    let mut max_val = f32::NEG_INFINITY;
                    for c in 0..channels {
                        let v = input.data[[n, c, h, w]];
                        if v > max_val {
                            max_val = v;
                        }
                    }

                    let mut sum = 0.0f32;
                    for c in 0..channels {
                        let e = (input.data[[n, c, h, w]] - max_val).exp();
                        output.data[[n, c, h, w]] = e;
                        sum += e;
                    }

                    for c in 0..channels {
                        output.data[[n, c, h, w]] /= sum;
                    }
                }
            }
        }

        Ok(())
    }

    fn output_shape(
        &self,
        _layer: &LayerDef,
        _weights: &LayerWeights,
        input_shape: &Shape,
    ) -> Result<Shape> {
        Ok(input_shape.clone())
    }

    fn validate(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()> {
        ensure_weight_count(layer, weights, 0)
    }
}

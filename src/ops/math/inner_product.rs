use crate::error::{Error, Result};
use crate::model::LayerDef;
use crate::ops::registry::{
    ensure_nchw, ensure_weight_count, required_num_output, LayerOp, LayerWeights,
};
use crate::ops::tensor::{Shape, Tensor};
use ndarray::linalg::general_mat_mul;
use ndarray::Array2;

/// Fully connected layer.
///
/// Flattens each instance to a feature vector and multiplies by a
/// `[num_output, in_features]` weight matrix, with an optional bias.
/// The output blob is `[batch, num_output, 1, 1]`.
#[derive(Debug, Clone, Default)]
pub struct InnerProduct;

impl InnerProduct {
    fn in_features(input_shape: &Shape) -> usize {
        input_shape[1] * input_shape[2] * input_shape[3]
    }
}

impl LayerOp for InnerProduct {
    fn compute(
        &self,
        layer: &LayerDef,
        weights: &LayerWeights,
        input: &Tensor,
        output: &mut Tensor,
    ) -> Result<()> {
        let expected = self.output_shape(layer, weights, &input.shape)?;
        if output.shape != expected {
            return Err(Error::ExecutionError(format!(
                "InnerProduct layer {} expects output shape {:?}, got {:?}",
                layer.name, expected, output.shape
            )));
        }

        let num_output = required_num_output(layer)?;
        let batch = input.shape[0];
        let in_features = Self::in_features(&input.shape);

        let x = input.data.view().into_shape((batch, in_features))?;
        let w = weights.tensors[0]
            .data
            .view()
            .into_shape((num_output, in_features))?;

        let mut y = Array2::<f32>::zeros((batch, num_output));
        general_mat_mul(1.0, &x, &w.t(), 0.0, &mut y);

        if layer.params.bias {
            let b = weights.tensors[1].data.view().into_shape(num_output)?;
            y += &b;
        }

        for n in 0..batch {
            for j in 0..num_output {
                output.data[[n, j, 0, 0]] = y[[n, j]];
            }
        }

        Ok(())
    }

    fn output_shape(
        &self,
        layer: &LayerDef,
        weights: &LayerWeights,
        input_shape: &Shape,
    ) -> Result<Shape> {
        ensure_nchw(layer, input_shape)?;

        let num_output = required_num_output(layer)?;
        let in_features = Self::in_features(input_shape);

        let weight_shape = &weights.tensors[0].shape;
        if weight_shape[1] != in_features {
            return Err(Error::InvalidWeights(format!(
                "InnerProduct layer {}: weight matrix expects {} input features, blob has {}",
                layer.name, weight_shape[1], in_features
            )));
        }

        Ok(vec![input_shape[0], num_output, 1, 1])
    }

    fn validate(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()> {
        let num_output = required_num_output(layer)?;

        let expected_tensors = if layer.params.bias { 2 } else { 1 };
        ensure_weight_count(layer, weights, expected_tensors)?;

        let weight_shape = &weights.tensors[0].shape;
        if weight_shape.len() != 2 {
            return Err(Error::InvalidWeights(format!(
                "InnerProduct layer {}: weight tensor must be 2-D, got shape {:?}",
                layer.name, weight_shape
            )));
        }
        if weight_shape[0] != num_output {
            return Err(Error::InvalidWeights(format!(
                "InnerProduct layer {}: weight matrix holds {} rows but num_output is {}",
                layer.name, weight_shape[0], num_output
            )));
        }

        if layer.params.bias {
            let bias_shape = &weights.tensors[1].shape;
            if bias_shape.len() != 1 || bias_shape[0] != num_output {
                return Err(Error::InvalidWeights(format!(
                    "InnerProduct layer {}: bias must be a vector of {} values, got shape {:?}",
                    layer.name, num_output, bias_shape
                )));
            }
        }

        Ok(())
    }
}

//! # Convolution Layer Implementation
//!
//! Direct 2D convolution over NCHW feature maps with square kernels,
//! symmetric zero padding, and a uniform stride. The kernel tensor is
//! `[num_output, in_channels, kernel, kernel]` with an optional
//! `[num_output]` bias.
//!
//! Out-of-bounds taps read as zero, so padding needs no materialized
//! border. Batch instances are independent and run in parallel.

use crate::error::{Error, Result};
use crate::model::LayerDef;
use crate::ops::registry::{
    ensure_nchw, ensure_weight_count, required_kernel, required_num_output, windowed_extent,
    LayerOp, LayerWeights,
};
use crate::ops::tensor::{Shape, Tensor};
use ndarray::{Axis, Zip};

/// 2D convolution layer
#[derive(Debug, Clone, Default)]
pub struct Convolution;

impl LayerOp for Convolution {
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
                "Convolution layer {} expects output shape {:?}, got {:?}",
                layer.name, expected, output.shape
            )));
        }

        let kernel = required_kernel(layer)?;
        let num_output = required_num_output(layer)?;
        let stride = layer.params.stride;
        let pad = layer.params.pad;

        let in_channels = input.shape[1];
        let height = input.shape[2];
        let width = input.shape[3];
        let out_height = expected[2];
        let out_width = expected[3];

        let kernel_w = &weights.tensors[0].data;
        let bias: Option<&[f32]> = if layer.params.bias {
            Some(weights.tensors[1].as_slice())
        } else {
            None
        };

        Zip::from(output.data.axis_iter_mut(Axis(0)))
            .and(input.data.axis_iter(Axis(0)))
            .par_for_each(|mut out_n, in_n| {
                for oc in 0..num_output {
                    let bias_val = bias.map(|b| b[oc]).unwrap_or(0.0);
                    for oh in 0..out_height {
                        for ow in 0..out_width {
                            let mut acc = bias_val;
                            for ic in 0..in_channels {
                                for kh in 0..kernel {
                                    let ih = (oh * stride + kh) as isize - pad as isize;
                                    if ih < 0 || ih >= height as isize {
                                        continue;
                                    }
                                    for kw in 0..kernel {
                                        let iw = (ow * stride + kw) as isize - pad as isize;
                                        if iw < 0 || iw >= width as isize {
                                            continue;
                                        }
                                        acc += in_n[[ic, ih as usize, iw as usize]]
                                            * kernel_w[[oc, ic, kh, kw]];
                                    }
                                }
                            }
                            out_n[[oc, oh, ow]] = acc;
                        }
                    }
                }
            });

        Ok(())
    }

    fn output_shape(
        &self,
        layer: &LayerDef,
        weights: &LayerWeights,
        input_shape: &Shape,
    ) -> Result<Shape> {
        ensure_nchw(layer, input_shape)?;

        let kernel = required_kernel(layer)?;
        let num_output = required_num_output(layer)?;
        let in_channels = input_shape[1];

        let kernel_shape = &weights.tensors[0].shape;
        if kernel_shape[1] != in_channels {
            return Err(Error::InvalidWeights(format!(
                "Convolution layer {}: kernel expects {} input channels, blob has {}",
                layer.name, kernel_shape[1], in_channels
            )));
        }

        let out_height = windowed_extent(layer, input_shape[2], kernel, layer.params.stride, layer.params.pad)?;
        let out_width = windowed_extent(layer, input_shape[3], kernel, layer.params.stride, layer.params.pad)?;

        Ok(vec![input_shape[0], num_output, out_height, out_width])
    }

    fn validate(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()> {
        let kernel = required_kernel(layer)?;
        let num_output = required_num_output(layer)?;

        let expected_tensors = if layer.params.bias { 2 } else { 1 };
        ensure_weight_count(layer, weights, expected_tensors)?;

        let kernel_shape = &weights.tensors[0].shape;
        if kernel_shape.len() != 4 {
            return Err(Error::InvalidWeights(format!(
                "Convolution layer {}: kernel tensor must be 4-D, got shape {:?}",
                layer.name, kernel_shape
            )));
        }
        if kernel_shape[0] != num_output {
            return Err(Error::InvalidWeights(format!(
                "Convolution layer {}: kernel holds {} filters but num_output is {}",
                layer.name, kernel_shape[0], num_output
            )));
        }
        if kernel_shape[2] != kernel || kernel_shape[3] != kernel {
            return Err(Error::InvalidWeights(format!(
                "Convolution layer {}: kernel tensor is {}x{} but the declared kernel is {}",
                layer.name, kernel_shape[2], kernel_shape[3], kernel
            )));
        }

        if layer.params.bias {
            let bias_shape = &weights.tensors[1].shape;
            if bias_shape.len() != 1 || bias_shape[0] != num_output {
                return Err(Error::InvalidWeights(format!(
                    "Convolution layer {}: bias must be a vector of {} values, got shape {:?}",
                    layer.name, num_output, bias_shape
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LayerKind, LayerParams};

    fn conv_layer(kernel: usize, num_output: usize, stride: usize, pad: usize, bias: bool) -> LayerDef {
        LayerDef {
            name: "conv1".to_string(),
            kind: LayerKind::Convolution,
            input: "data".to_string(),
            output: "conv1_out".to_string(),
            params: LayerParams {
                num_output: Some(num_output),
                kernel: Some(kernel),
                stride,
                pad,
                bias,
            },
        }
    }

    fn run(layer: &LayerDef, weights: &LayerWeights, input: &Tensor) -> Tensor {
        let op = Convolution::default();
        op.validate(layer, weights).unwrap();
        let shape = op.output_shape(layer, weights, &input.shape).unwrap();
        let mut output = Tensor::new(&shape);
        op.compute(layer, weights, input, &mut output).unwrap();
        output
    }

    #[test]
    fn test_conv_2x2_kernel() {
        // Input: [batch=1, channels=1, 3x3]
        let input = Tensor::from_vec(
            &[1, 1, 3, 3],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
        )
        .unwrap();

        // Kernel picks the top-left and bottom-right corner of each window
        let kernel = Tensor::from_vec(&[1, 1, 2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let weights = LayerWeights::new(vec![kernel]);

        let layer = conv_layer(2, 1, 1, 0, false);
        let output = run(&layer, &weights, &input);

        assert_eq!(output.shape, vec![1, 1, 2, 2]);
        assert_eq!(output.as_slice(), &[6.0, 8.0, 12.0, 14.0]);
    }

    #[test]
    fn test_conv_bias() {
        let input = Tensor::from_vec(
            &[1, 1, 3, 3],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
        )
        .unwrap();
        let kernel = Tensor::from_vec(&[1, 1, 2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let bias = Tensor::from_vec(&[1], vec![10.0]).unwrap();
        let weights = LayerWeights::new(vec![kernel, bias]);

        let layer = conv_layer(2, 1, 1, 0, true);
        let output = run(&layer, &weights, &input);

        assert_eq!(output.as_slice(), &[16.0, 18.0, 22.0, 24.0]);
    }

    #[test]
    fn test_conv_zero_padding() {
        // Out-of-bounds taps read as zero, so a ones kernel over a padded
        // 2x2 input sums only the covered cells
        let input = Tensor::from_vec(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let kernel = Tensor::from_vec(&[1, 1, 2, 2], vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let weights = LayerWeights::new(vec![kernel]);

        let layer = conv_layer(2, 1, 1, 1, false);
        let output = run(&layer, &weights, &input);

        assert_eq!(output.shape, vec![1, 1, 3, 3]);
        assert_eq!(
            output.as_slice(),
            &[1.0, 3.0, 2.0, 4.0, 10.0, 6.0, 3.0, 7.0, 4.0]
        );
    }

    #[test]
    fn test_conv_multi_channel_batch() {
        // Two instances, two input channels, 1x1 kernel summing channels
        let input = Tensor::from_vec(
            &[2, 2, 1, 1],
            vec![1.0, 10.0, 2.0, 20.0],
        )
        .unwrap();
        let kernel = Tensor::from_vec(&[1, 2, 1, 1], vec![1.0, 1.0]).unwrap();
        let weights = LayerWeights::new(vec![kernel]);

        let layer = conv_layer(1, 1, 1, 0, false);
        let output = run(&layer, &weights, &input);

        assert_eq!(output.shape, vec![2, 1, 1, 1]);
        assert_eq!(output.as_slice(), &[11.0, 22.0]);
    }

    #[test]
    fn test_conv_kernel_exceeds_input() {
        let layer = conv_layer(5, 1, 1, 0, false);
        let kernel = Tensor::new(&[1, 1, 5, 5]);
        let weights = LayerWeights::new(vec![kernel]);

        let op = Convolution::default();
        let err = op.output_shape(&layer, &weights, &vec![1, 1, 3, 3]);
        assert!(matches!(err, Err(Error::UnsupportedGeometry(_))));
    }

    #[test]
    fn test_conv_rejects_wrong_weight_arity() {
        let layer = conv_layer(2, 1, 1, 0, true);
        let kernel = Tensor::new(&[1, 1, 2, 2]);
        let weights = LayerWeights::new(vec![kernel]);

        let op = Convolution::default();
        assert!(op.validate(&layer, &weights).is_err());
    }
}

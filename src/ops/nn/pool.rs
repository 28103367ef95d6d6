use crate::error::{Error, Result};
use crate::model::LayerDef;
use crate::ops::registry::{
    ensure_nchw, ensure_weight_count, required_kernel, windowed_extent, LayerOp, LayerWeights,
};
use crate::ops::tensor::{Shape, Tensor};

/// Pooling reduction applied to each window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolType {
    Max,
    Average,
}

/// Base struct for spatial pooling layers
#[derive(Debug, Clone)]
pub struct PoolingBase {
    pool_type: PoolType,
}

/// Max pooling layer
#[derive(Debug, Clone, Default)]
pub struct MaxPool;

/// Average pooling layer
#[derive(Debug, Clone, Default)]
pub struct AveragePool;

impl PoolingBase {
    fn new(pool_type: PoolType) -> Self {
        Self { pool_type }
    }

    fn compute_impl(
        &self,
        layer: &LayerDef,
        input: &Tensor,
        output: &mut Tensor,
    ) -> Result<()> {
        let expected = self.output_shape_impl(layer, &input.shape)?;
        if output.shape != expected {
            return Err(Error::ExecutionError(format!(
                "Pool layer {} expects output shape {:?}, got {:?}",
                layer.name, expected, output.shape
            )));
        }

        let kernel = required_kernel(layer)?;
        let stride = layer.params.stride;
        let pad = layer.params.pad;

        let batch = input.shape[0];
        let channels = input.shape[1];
        let height = input.shape[2];
        let width = input.shape[3];
        let out_height = expected[2];
        let out_width = expected[3];

        for n in 0..batch {
            for c in 0..channels {
                for oh in 0..out_height {
                    for ow in 0..out_width {
                        let mut max_val = f32::NEG_INFINITY;
                        let mut sum = 0.0f32;
                        let mut count = 0usize;

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
                                let v = input.data[[n, c, ih as usize, iw as usize]];
                                if v > max_val {
                                    max_val = v;
                                }
                                sum += v;
                                count += 1;
                            }
                        }

                        // Padded cells never contribute, averages divide by the
                        // covered count only
                        output.data[[n, c, oh, ow]] = match self.pool_type {
                            PoolType::Max => max_val,
                            PoolType::Average => {
                                if count > 0 {
                                    sum / count as f32
                                } else {
                                    0.0
                                }
                            }
                        };
                    }
                }
            }
        }

        Ok(())
    }

    fn output_shape_impl(&self, layer: &LayerDef, input_shape: &Shape) -> Result<Shape> {
        ensure_nchw(layer, input_shape)?;

        let kernel = required_kernel(layer)?;
        let out_height =
            windowed_extent(layer, input_shape[2], kernel, layer.params.stride, layer.params.pad)?;
        let out_width =
            windowed_extent(layer, input_shape[3], kernel, layer.params.stride, layer.params.pad)?;

        Ok(vec![input_shape[0], input_shape[1], out_height, out_width])
    }

    fn validate_impl(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()> {
        required_kernel(layer)?;
        ensure_weight_count(layer, weights, 0)
    }
}

impl LayerOp for MaxPool {
    fn compute(
        &self,
        layer: &LayerDef,
        _weights: &LayerWeights,
        input: &Tensor,
        output: &mut Tensor,
    ) -> Result<()> {
        PoolingBase::new(PoolType::Max).compute_impl(layer, input, output)
    }

    fn output_shape(
        &self,
        layer: &LayerDef,
        _weights: &LayerWeights,
        input_shape: &Shape,
    ) -> Result<Shape> {
        PoolingBase::new(PoolType::Max).output_shape_impl(layer, input_shape)
    }

    fn validate(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()> {
        PoolingBase::new(PoolType::Max).validate_impl(layer, weights)
    }
}

impl LayerOp for AveragePool {
    fn compute(
        &self,
        layer: &LayerDef,
        _weights: &LayerWeights,
        input: &Tensor,
        output: &mut Tensor,
    ) -> Result<()> {
        PoolingBase::new(PoolType::Average).compute_impl(layer, input, output)
    }

    fn output_shape(
        &self,
        layer: &LayerDef,
        _weights: &LayerWeights,
        input_shape: &Shape,
    ) -> Result<Shape> {
        PoolingBase::new(PoolType::Average).output_shape_impl(layer, input_shape)
    }

    fn validate(&self, layer: &LayerDef, weights: &LayerWeights) -> Result<()> {
        PoolingBase::new(PoolType::Average).validate_impl(layer, weights)
    }
}

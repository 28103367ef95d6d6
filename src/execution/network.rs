use std::fmt;

use log::debug;

use crate::error::{Error, Result};
use crate::execution::mode::{DeviceBinding, ExecutionMode};
use crate::execution::observer::{LayerObserver, LayerView};
use crate::model::NetworkDef;
use crate::ops::registry::{LayerOpRegistry, LayerWeights};
use crate::ops::tensor::{Shape, Tensor};
use crate::parser::model_loader::NetworkLoader;

/// A loaded network ready to run forward passes.
///
/// Blobs are allocated once per geometry: `blobs[0]` is the input blob and
/// `blobs[i + 1]` holds the output of layer `i`. A forward pass refills them
/// in place, so the output view stays valid until the next pass.
pub struct Network {
    def: NetworkDef,
    registry: LayerOpRegistry,
    weights: Vec<LayerWeights>,
    weight_shapes: Vec<Vec<Shape>>,
    blobs: Vec<Tensor>,
    shapes: Vec<Shape>,
    observers: Vec<Box<dyn LayerObserver>>,
    device: Option<DeviceBinding>,
    mode: ExecutionMode,
    batch: usize,
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("name", &self.def.name)
            .field("layers", &self.def.layers.len())
            .field("mode", &self.mode)
            .field("batch", &self.batch)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Network {
    /// Assemble a network from a validated definition and bound weights.
    ///
    /// `weights` must hold one entry per definition layer, in layer order.
    pub fn new(def: NetworkDef, weights: Vec<LayerWeights>, mode: ExecutionMode) -> Result<Self> {
        NetworkLoader::validate(&def)?;

        if weights.len() != def.layers.len() {
            return Err(Error::InvalidWeights(format!(
                "Network has {} layers but {} weight sets were bound",
                def.layers.len(),
                weights.len()
            )));
        }

        let registry = LayerOpRegistry::with_standard_layers();
        for (layer, layer_weights) in def.layers.iter().zip(&weights) {
            let op = registry.get(layer.kind).ok_or_else(|| {
                Error::ValidationError(format!(
                    "No implementation registered for layer kind {}",
                    layer.kind
                ))
            })?;
            op.validate(layer, layer_weights)?;
        }

        let weight_shapes: Vec<Vec<Shape>> = weights
            .iter()
            .map(|set| set.tensors.iter().map(|t| t.shape.clone()).collect())
            .collect();

        let batch = def.input.shape[0];
        let device = match mode {
            ExecutionMode::Gpu => Some(DeviceBinding::new(0)),
            ExecutionMode::Cpu => None,
        };

        let mut network = Network {
            def,
            registry,
            weights,
            weight_shapes,
            blobs: Vec::new(),
            shapes: Vec::new(),
            observers: Vec::new(),
            device,
            mode,
            batch,
        };
        network.reshape(batch)?;

        debug!(
            "network {} ready: {} layers, batch {}, mode {}",
            network.def.name,
            network.def.layers.len(),
            network.batch,
            network.mode
        );
        Ok(network)
    }

    /// Recompute every blob shape for a new batch size and reallocate.
    pub fn reshape(&mut self, batch: usize) -> Result<()> {
        if batch == 0 {
            return Err(Error::UnsupportedGeometry(
                "Batch size must be positive".to_string(),
            ));
        }

        let [_, channels, height, width] = self.def.input.shape;
        let mut shapes: Vec<Shape> = vec![vec![batch, channels, height, width]];

        for (layer, layer_weights) in self.def.layers.iter().zip(&self.weights) {
            let op = self.registry.get(layer.kind).ok_or_else(|| {
                Error::ValidationError(format!(
                    "No implementation registered for layer kind {}",
                    layer.kind
                ))
            })?;
            let previous = shapes.last().ok_or_else(|| {
                Error::ExecutionError("Blob shape chain is empty".to_string())
            })?;
            let next = op.output_shape(layer, layer_weights, previous)?;
            shapes.push(next);
        }

        let mut blobs = Vec::with_capacity(shapes.len());
        blobs.push(Tensor::new(&shapes[0]).with_name(self.def.input.name.clone()));
        for (layer, shape) in self.def.layers.iter().zip(shapes.iter().skip(1)) {
            blobs.push(Tensor::new(shape).with_name(layer.output.clone()));
        }

        self.shapes = shapes;
        self.blobs = blobs;
        self.batch = batch;
        Ok(())
    }

    /// Run one forward pass over `input`, which must fill the input blob
    /// exactly.
    pub fn forward(&mut self, input: &[f32]) -> Result<()> {
        let expected: usize = self.shapes[0].iter().product();
        if input.len() != expected {
            return Err(Error::ExecutionError(format!(
                "Input holds {} values but the input blob needs {}",
                input.len(),
                expected
            )));
        }

        let staged: &[f32] = match self.device.as_mut() {
            Some(device) => device.stage(input),
            None => input,
        };
        self.blobs[0].assign_from_slice(staged)?;

        for index in 0..self.def.layers.len() {
            let layer = &self.def.layers[index];
            let view = LayerView {
                index,
                name: &layer.name,
                kind: layer.kind.as_str(),
                shapes: &self.weight_shapes[index],
            };
            for observer in &mut self.observers {
                observer.on_layer_start(&view);
            }

            let op = self.registry.get(layer.kind).ok_or_else(|| {
                Error::ValidationError(format!(
                    "No implementation registered for layer kind {}",
                    layer.kind
                ))
            })?;
            let (inputs, outputs) = self.blobs.split_at_mut(index + 1);
            op.compute(layer, &self.weights[index], &inputs[index], &mut outputs[0])?;

            for observer in &mut self.observers {
                observer.on_layer_end(index);
            }
        }

        Ok(())
    }

    /// View of the output blob, refilled by the most recent forward pass.
    pub fn output(&self) -> &[f32] {
        self.blobs.last().map(|blob| blob.as_slice()).unwrap_or(&[])
    }

    pub fn input_shape(&self) -> &Shape {
        &self.shapes[0]
    }

    pub fn output_shape(&self) -> &Shape {
        &self.shapes[self.shapes.len() - 1]
    }

    pub fn add_observer(&mut self, observer: Box<dyn LayerObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn layer_count(&self) -> usize {
        self.def.layers.len()
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

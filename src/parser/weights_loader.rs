use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use prost::Message;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::model::NetworkDef;
use crate::ops::registry::LayerWeights;
use crate::ops::tensor::Tensor;
use crate::proto::NetWeights;

/// Loader for binary weight containers
pub struct WeightsLoader;

impl WeightsLoader {
    /// Load a weights container from a file path.
    pub fn load(path: &Path) -> Result<NetWeights> {
        if !path.exists() {
            return Err(Error::ModelNotFound(path.to_path_buf()));
        }

        let mut file = File::open(path).map_err(|e| {
            Error::ModelLoadError(path.to_path_buf(), format!("Failed to open file: {}", e))
        })?;

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).map_err(|e| {
            Error::ModelLoadError(path.to_path_buf(), format!("Failed to read file: {}", e))
        })?;

        Self::decode(&buffer)
    }

    /// Decode a weights container from raw protobuf bytes.
    pub fn decode(bytes: &[u8]) -> Result<NetWeights> {
        Ok(NetWeights::decode(bytes)?)
    }

    /// Match container entries to definition layers, in layer order.
    ///
    /// Every container entry must name a definition layer; layers without an
    /// entry get an empty weight set. Tensor payloads are checked against
    /// their declared dimensions.
    pub fn bind(def: &NetworkDef, weights: &NetWeights) -> Result<Vec<LayerWeights>> {
        let mut by_name: HashMap<&str, &crate::proto::LayerWeightsProto> = HashMap::new();
        for entry in &weights.layers {
            if by_name.insert(entry.name.as_str(), entry).is_some() {
                return Err(Error::InvalidWeights(format!(
                    "Container holds more than one entry for layer {}",
                    entry.name
                )));
            }
        }

        let layer_names: std::collections::HashSet<&str> =
            def.layers.iter().map(|l| l.name.as_str()).collect();
        for entry in &weights.layers {
            if !layer_names.contains(entry.name.as_str()) {
                return Err(Error::InvalidWeights(format!(
                    "Container holds weights for unknown layer {}",
                    entry.name
                )));
            }
        }

        def.layers
            .par_iter()
            .map(|layer| match by_name.get(layer.name.as_str()) {
                Some(entry) => {
                    let mut tensors = Vec::with_capacity(entry.tensors.len());
                    for blob in &entry.tensors {
                        let dims: Vec<usize> = blob.dims.iter().map(|&d| d as usize).collect();
                        let tensor =
                            Tensor::from_vec(&dims, blob.data.clone()).map_err(|e| match e {
                                Error::InvalidWeights(msg) => Error::InvalidWeights(format!(
                                    "Layer {}: {}",
                                    layer.name, msg
                                )),
                                other => other,
                            })?;
                        tensors.push(tensor);
                    }
                    Ok(LayerWeights::new(tensors))
                }
                None => Ok(LayerWeights::default()),
            })
            .collect()
    }
}

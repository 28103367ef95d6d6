use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::NetworkDef;

/// Loader for JSON network definitions
pub struct NetworkLoader;

impl NetworkLoader {
    /// Load and validate a network definition from a file path.
    pub fn load(path: &Path) -> Result<NetworkDef> {
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

        Self::load_from_bytes(&buffer)
    }

    /// Load and validate a network definition from raw JSON bytes.
    pub fn load_from_bytes(data: &[u8]) -> Result<NetworkDef> {
        let def: NetworkDef = serde_json::from_slice(data)?;
        Self::validate(&def)?;
        Ok(def)
    }

    /// Check structural soundness of a definition.
    ///
    /// Layers execute in declaration order and every layer must consume a
    /// blob produced before it. The network as a whole must expose exactly
    /// one external input and one unconsumed output.
    pub fn validate(def: &NetworkDef) -> Result<()> {
        if def.input.name.is_empty() {
            return Err(Error::InvalidDefinition(
                "Input blob has no name".to_string(),
            ));
        }
        if def.input.shape.iter().any(|&d| d == 0) {
            return Err(Error::UnsupportedGeometry(format!(
                "Input shape {:?} has a zero dimension",
                def.input.shape
            )));
        }
        if def.layers.is_empty() {
            return Err(Error::InvalidDefinition("Network has no layers".to_string()));
        }

        let mut all_produced: HashSet<&str> = HashSet::new();
        all_produced.insert(def.input.name.as_str());
        let mut layer_names: HashSet<&str> = HashSet::new();

        for layer in &def.layers {
            if layer.name.is_empty() {
                return Err(Error::InvalidDefinition(
                    "A layer has no name".to_string(),
                ));
            }
            if !layer_names.insert(layer.name.as_str()) {
                return Err(Error::InvalidDefinition(format!(
                    "Duplicate layer name {}",
                    layer.name
                )));
            }
            if !all_produced.insert(layer.output.as_str()) {
                return Err(Error::InvalidDefinition(format!(
                    "Blob {} is produced more than once",
                    layer.output
                )));
            }
        }

        let mut available: HashSet<&str> = HashSet::new();
        available.insert(def.input.name.as_str());
        let mut consumed: HashMap<&str, usize> = HashMap::new();
        let mut dangling: HashSet<&str> = HashSet::new();

        for layer in &def.layers {
            if !available.contains(layer.input.as_str()) {
                if all_produced.contains(layer.input.as_str()) {
                    return Err(Error::InvalidDefinition(format!(
                        "Layer {} consumes blob {} before it is produced",
                        layer.name, layer.input
                    )));
                }
                dangling.insert(layer.input.as_str());
            } else {
                *consumed.entry(layer.input.as_str()).or_insert(0) += 1;
            }
            available.insert(layer.output.as_str());
        }

        let inputs = 1 + dangling.len();
        let outputs = all_produced
            .iter()
            .filter(|blob| !consumed.contains_key(*blob))
            .count();
        if inputs != 1 || outputs != 1 {
            return Err(Error::BlobCount { inputs, outputs });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InputDef, LayerDef, LayerKind, LayerParams};

    fn layer(name: &str, input: &str, output: &str) -> LayerDef {
        LayerDef {
            name: name.to_string(),
            kind: LayerKind::Relu,
            input: input.to_string(),
            output: output.to_string(),
            params: LayerParams::default(),
        }
    }

    fn chain(layers: Vec<LayerDef>) -> NetworkDef {
        NetworkDef {
            name: "net".to_string(),
            input: InputDef {
                name: "data".to_string(),
                shape: [1, 3, 4, 4],
            },
            layers,
        }
    }

    #[test]
    fn test_parse_minimal_definition() {
        let json = r#"{
            "name": "lenet",
            "input": {"name": "data", "shape": [4, 1, 28, 28]},
            "layers": [
                {"name": "conv1", "kind": "convolution", "input": "data", "output": "c1",
                 "params": {"num_output": 8, "kernel": 5}},
                {"name": "relu1", "kind": "relu", "input": "c1", "output": "r1"}
            ]
        }"#;

        let def = NetworkLoader::load_from_bytes(json.as_bytes()).unwrap();
        assert_eq!(def.name, "lenet");
        assert_eq!(def.input.shape, [4, 1, 28, 28]);
        assert_eq!(def.layers.len(), 2);
        assert_eq!(def.layers[0].kind, LayerKind::Convolution);

        // Omitted params fall back to their defaults
        assert_eq!(def.layers[0].params.stride, 1);
        assert_eq!(def.layers[0].params.pad, 0);
        assert!(def.layers[0].params.bias);
        assert_eq!(def.layers[1].params.num_output, None);
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        let json = r#"{
            "name": "net",
            "input": {"name": "data", "shape": [1, 1, 2, 2]},
            "layers": [
                {"name": "l", "kind": "deconvolution", "input": "data", "output": "out"}
            ]
        }"#;

        let err = NetworkLoader::load_from_bytes(json.as_bytes());
        assert!(matches!(err, Err(Error::JsonError(_))));
    }

    #[test]
    fn test_validate_accepts_chain() {
        let def = chain(vec![layer("a", "data", "x"), layer("b", "x", "y")]);
        assert!(NetworkLoader::validate(&def).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let mut def = chain(vec![layer("a", "data", "x")]);
        def.input.shape = [1, 3, 0, 4];
        assert!(matches!(
            NetworkLoader::validate(&def),
            Err(Error::UnsupportedGeometry(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_network() {
        let def = chain(vec![]);
        assert!(matches!(
            NetworkLoader::validate(&def),
            Err(Error::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_validate_counts_dangling_input() {
        // "b" reads a blob nobody produces, so the network would need a
        // second external input; "x" is also left unconsumed
        let def = chain(vec![layer("a", "data", "x"), layer("b", "missing", "y")]);
        assert!(matches!(
            NetworkLoader::validate(&def),
            Err(Error::BlobCount {
                inputs: 2,
                outputs: 2
            })
        ));
    }

    #[test]
    fn test_validate_counts_unconsumed_output() {
        let def = chain(vec![layer("a", "data", "x"), layer("b", "data", "y")]);
        assert!(matches!(
            NetworkLoader::validate(&def),
            Err(Error::BlobCount {
                inputs: 1,
                outputs: 2
            })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_order_chain() {
        let def = chain(vec![layer("a", "x", "y"), layer("b", "data", "x")]);
        assert!(matches!(
            NetworkLoader::validate(&def),
            Err(Error::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_layer_names() {
        let def = chain(vec![layer("a", "data", "x"), layer("a", "x", "y")]);
        assert!(matches!(
            NetworkLoader::validate(&def),
            Err(Error::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = NetworkLoader::load(Path::new("/nonexistent/model.json"));
        assert!(matches!(err, Err(Error::ModelNotFound(_))));
    }
}

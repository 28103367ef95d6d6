//! Wire format of trained weight containers.
//!
//! A weights file is one bare `NetWeights` message.
//! Layer entries are matched to definition layers by name; the tensors of an
//! entry appear in the order the layer binds them (main weight first, then
//! bias when present).

/// Dense row-major tensor payload.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TensorBlob {
    /// Dimension extents, outermost first.
    #[prost(uint64, repeated, tag = "1")]
    pub dims: Vec<u64>,
    /// Element data, `dims` product many values.
    #[prost(float, repeated, tag = "2")]
    pub data: Vec<f32>,
}

/// Trained tensors of one layer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LayerWeightsProto {
    /// Layer name, must match a layer in the definition.
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub tensors: Vec<TensorBlob>,
}

/// Top-level container holding every trained layer of a network.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NetWeights {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub layers: Vec<LayerWeightsProto>,
}
